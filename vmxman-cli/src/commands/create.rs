use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct CreateBlankArgs {
    /// Name of the new machine
    pub name: String,

    /// Guest operating system identifier (e.g. ubuntu, winxppro)
    #[arg(long)]
    pub os: Option<String>,

    /// Memory size in megabytes (defaults to the guest's suggestion)
    #[arg(long)]
    pub memory: Option<u32>,
}

#[derive(Args, Debug)]
pub struct CreateFromIsoArgs {
    /// ISO image to boot from
    pub iso: PathBuf,

    /// Name of the new machine (defaults to the image file name)
    pub name: Option<String>,
}

pub fn execute_blank(args: CreateBlankArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let mut manager = global.create_manager()?;
    let vm = manager.create_machine(&args.name)?;

    if let Some(os) = &args.os {
        vm.set_operating_system(os)?;
        let suggested = vm.operating_system()?.suggested_ram;
        vm.set_memory_size(suggested);
    }
    if let Some(memory) = args.memory {
        vm.set_memory_size(memory);
    }
    if args.os.is_some() || args.memory.is_some() {
        vm.save(&mut vmxman::Progress::none())?;
    }

    println!("{}", vm.path().display());
    Ok(())
}

pub fn execute_from_iso(
    args: CreateFromIsoArgs,
    global: &crate::cli::GlobalFlags,
) -> anyhow::Result<()> {
    let mut manager = global.create_manager()?;
    let vm = manager.create_machine_from_iso(&args.iso, args.name.as_deref())?;
    println!("{}", vm.path().display());
    Ok(())
}
