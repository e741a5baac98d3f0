#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_cmd::Command;
use tempfile::TempDir;

pub struct TestContext {
    pub cmd: Command,
    pub home: TempDir,
}

impl TestContext {
    /// Another command against the same home directory.
    pub fn new_cmd(&self) -> Command {
        command_for(self.home.path())
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.home.path().join("machines").join(name)
    }

    pub fn create_blank(&self, name: &str) {
        self.new_cmd()
            .args(["create-blank", name])
            .assert()
            .success();
    }

    /// Write a small placeholder ISO image next to the home directory's contents.
    pub fn write_iso(&self, file_name: &str) -> PathBuf {
        let path = self.home.path().join(file_name);
        std::fs::write(&path, b"CD001").expect("Failed to write ISO");
        path
    }
}

fn command_for(home: &Path) -> Command {
    let bin_path = env!("CARGO_BIN_EXE_vmxman");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(60));
    cmd.env_remove("VMXMAN_HOME");
    cmd.arg("--home").arg(home);
    cmd
}

/// Fresh context with an isolated home directory.
pub fn vmxman() -> TestContext {
    let home = TempDir::new().expect("Failed to create temp dir");
    TestContext {
        cmd: command_for(home.path()),
        home,
    }
}
