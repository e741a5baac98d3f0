//! Home directory lock.
//!
//! Uses flock so only one manager works on a vmxman home at a time. Disk
//! creation assumes a single writer; this lock is what provides it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use vmxman_shared::errors::{VmxError, VmxResult};

use super::constants::filenames;

/// Exclusive lock on a home directory, released on drop or process exit.
#[derive(Debug)]
pub struct HomeLock {
    file: File,
    path: PathBuf,
}

impl HomeLock {
    /// Take the lock without blocking.
    ///
    /// Fails with [`VmxError::Config`] when another process (or another
    /// manager in this process) already holds it.
    pub fn acquire(home_dir: &Path) -> VmxResult<Self> {
        std::fs::create_dir_all(home_dir)
            .map_err(|e| VmxError::storage("create home directory", home_dir, e))?;

        let lock_path = home_dir.join(filenames::LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| VmxError::storage("open lock file", &lock_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(VmxError::Config(format!(
                        "Another vmxman instance is already using directory: {}",
                        home_dir.display()
                    )));
                }
                return Err(VmxError::storage("lock", &lock_path, err));
            }
        }

        tracing::debug!(lock_path = %lock_path.display(), "Acquired home lock");
        Ok(Self {
            file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HomeLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = self.file.as_raw_fd();
            unsafe {
                libc::flock(fd, libc::LOCK_UN);
            }
        }

        tracing::debug!(lock_path = %self.path.display(), "Released home lock");
    }
}
