use std::path::{Path, PathBuf};

use vmxman_shared::constants::vmx;
use vmxman_shared::errors::{VmxError, VmxResult};

use super::constants::filenames;

/// Directory structure constants
pub mod dirs {
    /// Base directory name under the user's home
    pub const VMXMAN_DIR: &str = ".vmxman";

    /// One subdirectory per machine
    pub const MACHINES_DIR: &str = "machines";

    /// Subdirectory for log files
    pub const LOGS_DIR: &str = "logs";
}

/// Paths inside a vmxman home directory.
///
/// ```text
/// <home>/
///   .lock
///   machines.list
///   logs/
///   machines/<name>/<name>.vmx
/// ```
#[derive(Clone, Debug)]
pub struct FilesystemLayout {
    home_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn machines_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::MACHINES_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOGS_DIR)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.home_dir.join(filenames::MACHINES_LIST)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.home_dir.join(filenames::LOCK_FILE)
    }

    /// Directory of the machine called `name`: ~/.vmxman/machines/<name>
    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.machines_dir().join(name)
    }

    /// Descriptor of the machine called `name`: ~/.vmxman/machines/<name>/<name>.vmx
    pub fn machine_descriptor(&self, name: &str) -> PathBuf {
        self.machine_dir(name)
            .join(format!("{}.{}", name, vmx::EXTENSION))
    }

    /// Create the home, machines and logs directories.
    pub fn prepare(&self) -> VmxResult<()> {
        for dir in [self.home_dir.clone(), self.machines_dir(), self.logs_dir()] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| VmxError::storage("create directory", &dir, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let layout = FilesystemLayout::new(PathBuf::from("/h"));
        assert_eq!(layout.registry_path(), PathBuf::from("/h/machines.list"));
        assert_eq!(layout.lock_path(), PathBuf::from("/h/.lock"));
        assert_eq!(layout.logs_dir(), PathBuf::from("/h/logs"));
        assert_eq!(
            layout.machine_descriptor("web"),
            PathBuf::from("/h/machines/web/web.vmx")
        );
    }

    #[test]
    fn test_prepare_creates_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let layout = FilesystemLayout::new(temp_dir.path().join("home"));
        layout.prepare().unwrap();
        assert!(layout.machines_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
    }
}
