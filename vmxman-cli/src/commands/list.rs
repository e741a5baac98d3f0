use clap::Args;

use crate::formatter;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print machine summaries as JSON
    #[arg(long)]
    pub json: bool,

    /// Only print machine names
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn execute(args: ListArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let manager = global.create_manager()?;
    manager.refresh_statuses();

    let summaries: Vec<_> = manager.machines().iter().map(|vm| vm.summary()).collect();

    if args.json {
        return formatter::print_json(&summaries);
    }
    if args.quiet {
        for summary in &summaries {
            println!("{}", summary.name);
        }
        return Ok(());
    }

    println!("{}", formatter::machines_table(&summaries));
    Ok(())
}
