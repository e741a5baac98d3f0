use clap::Args;

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Also delete the descriptor, disk images and companion files
    #[arg(short, long)]
    pub delete: bool,

    /// Name of the machine(s) to remove
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub fn execute(args: RmArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let mut manager = global.create_manager()?;

    let mut errors = Vec::new();
    for target in args.targets {
        if let Err(e) = manager.remove_machine(&target, args.delete) {
            eprintln!("Error removing machine '{}': {}", target, e);
            errors.push(target);
        } else {
            println!("{}", target);
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("Failed to remove {} machine(s): {}", errors.len(), errors.join(", "));
    }
    Ok(())
}
