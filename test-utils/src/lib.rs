//! Shared fixtures for vmxman integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use vmxman::{GuestOsCatalog, MachineManager, VirtualMachine, VmxmanOptions};

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

/// An isolated vmxman home that is removed on drop.
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn options(&self) -> VmxmanOptions {
        VmxmanOptions::with_home(self.path())
    }

    /// Open a manager on this home. Only one may be alive at a time.
    pub fn manager(&self) -> MachineManager {
        MachineManager::new(self.options()).expect("Failed to open manager")
    }

    /// Descriptor path for a standalone machine outside the registry.
    pub fn machine_path(&self, name: &str) -> PathBuf {
        self.path().join("standalone").join(name).join(format!("{}.vmx", name))
    }

    /// A new, unsaved machine at [`machine_path`](Self::machine_path).
    pub fn new_machine(&self, name: &str) -> VirtualMachine {
        VirtualMachine::create(&self.machine_path(name), name, catalog())
            .expect("Failed to create machine")
    }

    /// Write a small placeholder ISO image and return its path.
    pub fn write_iso(&self, file_name: &str) -> PathBuf {
        let path = self.path().join(file_name);
        std::fs::write(&path, b"CD001").expect("Failed to write ISO");
        path
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in guest OS catalog.
pub fn catalog() -> Arc<GuestOsCatalog> {
    Arc::new(GuestOsCatalog::builtin())
}
