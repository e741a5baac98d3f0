use clap::Args;

use crate::formatter;

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Name of the machine
    pub name: String,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: InfoArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let manager = global.create_manager()?;
    let vm = manager.get_machine(&args.name)?;
    let summary = vm.summary();

    if args.json {
        return formatter::print_json(&summary);
    }

    println!("Name:      {}", summary.name);
    println!("Path:      {}", summary.path.display());
    println!("Status:    {}", summary.status);
    println!("Guest OS:  {}", summary.guest_os);
    if let Some(memory) = summary.memory_mb {
        println!("Memory:    {} MB", memory);
    }
    println!("Sound:     {}", on_off(summary.sound));
    println!("USB:       {}", on_off(summary.usb));
    println!();
    println!("{}", formatter::devices_table(&summary));
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
