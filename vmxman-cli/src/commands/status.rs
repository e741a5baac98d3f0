use clap::Args;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Name of the machine
    pub name: String,
}

pub fn execute(args: StatusArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let manager = global.create_manager()?;
    let vm = manager.get_machine(&args.name)?;
    println!("{}", vm.refresh_status());
    Ok(())
}
