use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vmxman::runtime::constants::envs;
use vmxman::{MachineManager, VmxmanOptions};

use crate::commands::{add_disk, add_nic, create, info, list, rm, status};

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage virtual machine descriptors and disk images")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// vmxman home directory (defaults to ~/.vmxman)
    #[arg(long, global = true, env = envs::VMXMAN_HOME)]
    pub home: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn options(&self) -> VmxmanOptions {
        match &self.home {
            Some(home) => VmxmanOptions::with_home(home),
            None => VmxmanOptions::default(),
        }
    }

    /// Open the machine registry, holding the home directory lock.
    pub fn create_manager(&self) -> anyhow::Result<MachineManager> {
        Ok(MachineManager::new(self.options())?)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty machine
    CreateBlank(create::CreateBlankArgs),

    /// Create a machine that boots from an ISO image
    CreateFromIso(create::CreateFromIsoArgs),

    /// List registered machines
    #[command(visible_alias = "ls")]
    List(list::ListArgs),

    /// Show a machine's settings and devices
    Info(info::InfoArgs),

    /// Create a hard disk image and attach it to a machine
    AddDisk(add_disk::AddDiskArgs),

    /// Attach an ethernet adapter to a machine
    AddNic(add_nic::AddNicArgs),

    /// Unregister machines, optionally deleting their files
    Rm(rm::RmArgs),

    /// Print a machine's power status
    Status(status::StatusArgs),
}
