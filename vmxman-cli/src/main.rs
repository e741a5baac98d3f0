//! `vmxman`: manage virtual machine descriptors and their disk images.

mod cli;
mod commands;
mod formatter;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vmxman::runtime::layout::dirs;

use crate::cli::{Cli, Command};

const LOG_FILE: &str = "vmxman.log";

/// Route tracing output to `<home>/logs/vmxman.log`, rotated daily.
///
/// Returns None when the logs directory cannot be created; the command still runs.
fn init_logging(home_dir: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let logs_dir = home_dir.join(dirs::LOGS_DIR);
    std::fs::create_dir_all(&logs_dir).ok()?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    vmxman::util::register_to_tracing(non_blocking, env_filter);

    Some(guard)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(&cli.global.options().home_dir);

    let result = match cli.command {
        Command::CreateBlank(args) => commands::create::execute_blank(args, &cli.global),
        Command::CreateFromIso(args) => commands::create::execute_from_iso(args, &cli.global),
        Command::List(args) => commands::list::execute(args, &cli.global),
        Command::Info(args) => commands::info::execute(args, &cli.global),
        Command::AddDisk(args) => commands::add_disk::execute(args, &cli.global),
        Command::AddNic(args) => commands::add_nic::execute(args, &cli.global),
        Command::Rm(args) => commands::rm::execute(args, &cli.global),
        Command::Status(args) => commands::status::execute(args, &cli.global),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
