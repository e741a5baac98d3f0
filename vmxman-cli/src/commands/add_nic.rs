use clap::Args;
use vmxman::{EthernetDevice, NetworkType, Progress};

#[derive(Args, Debug)]
pub struct AddNicArgs {
    /// Name of the machine
    pub name: String,

    /// Host attachment: bridged, hostonly or nat
    #[arg(long, default_value = "bridged")]
    pub network: NetworkType,

    /// Fixed MAC address (generated by the hypervisor when omitted)
    #[arg(long)]
    pub address: Option<String>,
}

pub fn execute(args: AddNicArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let mut manager = global.create_manager()?;
    let vm = manager.get_machine_mut(&args.name)?;

    let mut device = EthernetDevice::new(args.network);
    if let Some(device_type) = vm.operating_system().ok().map(|os| os.suggested_ethernet) {
        device.device_type = device_type;
    }
    device.address = args.address;

    vm.add_ethernet(device)?;
    vm.save(&mut Progress::none())?;

    println!("ethernet{}", vm.ethernet_devices().len() - 1);
    Ok(())
}
