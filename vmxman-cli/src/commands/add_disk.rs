use clap::Args;
use vmxman::{BusType, HardDisk, HardDiskType, Progress, SlotCoordinate};

const MIB: u64 = 1024 * 1024;

#[derive(Args, Debug)]
pub struct AddDiskArgs {
    /// Name of the machine
    pub name: String,

    /// Disk capacity in megabytes
    #[arg(long)]
    pub size_mb: u64,

    /// Image layout: single-sparse, split-sparse, single-flat or split-flat
    #[arg(long = "type", default_value = "single-sparse")]
    pub disk_type: HardDiskType,

    /// Controller kind: ide or scsi
    #[arg(long, default_value = "ide")]
    pub bus: BusType,

    /// Controller number (first free slot when omitted)
    #[arg(long, requires = "device")]
    pub bus_number: Option<u16>,

    /// Device number on the controller
    #[arg(long, requires = "bus_number")]
    pub device: Option<u16>,
}

pub fn execute(args: AddDiskArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    if args.size_mb == 0 {
        anyhow::bail!("Disk size must be at least 1 MB");
    }

    let mut manager = global.create_manager()?;
    let vm = manager.get_machine_mut(&args.name)?;
    let status = vm.refresh_status();
    if !status.can_modify() {
        anyhow::bail!("Machine '{}' is {}; power it off first", args.name, status);
    }

    let coordinate = match (args.bus_number, args.device) {
        (Some(bus_number), Some(device)) => SlotCoordinate::new(args.bus, bus_number, device)?,
        _ => vm
            .find_free_slot(args.bus)
            .ok_or_else(|| anyhow::anyhow!("No free {} slot on '{}'", args.bus, args.name))?,
    };

    let capacity = args
        .size_mb
        .checked_mul(MIB)
        .ok_or_else(|| anyhow::anyhow!("Disk size of {} MB is too large", args.size_mb))?;
    let index = vm.hard_disks().len();
    vm.add_hard_disk(HardDisk::new(coordinate, args.disk_type, capacity));

    let mut last = None;
    let mut progress = Progress::new(|fraction| {
        let percent = (fraction * 100.0).round() as u32;
        if last != Some(percent) {
            eprint!("\rCreating disk: {:3}%", percent);
            last = Some(percent);
        }
    });
    let result = vm.save(&mut progress);
    drop(progress);
    eprintln!();

    if let Err(e) = result {
        // Drop only the disk added here, along with any files it got to write.
        if let Some(disk) = vm.remove_hard_disk(index) {
            if let Err(cleanup) = disk.image.delete() {
                tracing::warn!(error = %cleanup, "Failed to clean up disk files");
            }
        }
        return Err(e.into());
    }

    println!("{}", coordinate);
    Ok(())
}
