//! Filesystem watch for status companion files.
//!
//! The watcher callback runs on notify's thread and only forwards matching
//! paths into a channel. The machine's owner drains that channel with
//! [`StatusWatcher::poll`], so status is only ever recomputed on the owning
//! thread.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use vmxman_shared::errors::{VmxError, VmxResult};

use super::{MachineStatus, VirtualMachine};

/// Watches a machine's directory for lock and checkpoint file changes.
pub struct StatusWatcher {
    _watcher: RecommendedWatcher,
    changes: mpsc::UnboundedReceiver<PathBuf>,
    dir: PathBuf,
}

/// Whether `kind` can make a file appear or disappear.
pub fn affects_presence(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

/// Whether `path` names one of `targets` (compared by file name).
pub fn is_watched(targets: &[OsString], path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| targets.iter().any(|t| t == name))
}

impl StatusWatcher {
    /// Start watching the directory of `machine`.
    ///
    /// The lock and checkpoint paths are captured now; call again after
    /// renaming the machine or changing its checkpoint key.
    pub fn new(machine: &VirtualMachine) -> VmxResult<Self> {
        let dir = machine.dir().to_path_buf();
        let targets: Vec<OsString> = [machine.lock_path(), machine.checkpoint_path()]
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
            .collect();

        let (tx, changes) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !affects_presence(&event.kind) {
                    return;
                }
                for path in event.paths {
                    if is_watched(&targets, &path) {
                        // Receiver gone means the watcher is being dropped.
                        let _ = tx.send(path);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Status watch error"),
        })
        .map_err(|e| VmxError::storage("watch", &dir, e))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| VmxError::storage("watch", &dir, e))?;

        tracing::debug!(dir = %dir.display(), "Watching machine status files");
        Ok(Self {
            _watcher: watcher,
            changes,
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Drain pending notifications and refresh `machine` if any arrived.
    ///
    /// Returns the new status when something was pending.
    pub fn poll(&mut self, machine: &VirtualMachine) -> Option<MachineStatus> {
        let mut pending = false;
        while let Ok(path) = self.changes.try_recv() {
            tracing::debug!(path = %path.display(), "Status file changed");
            pending = true;
        }
        pending.then(|| machine.refresh_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest_os::GuestOsCatalog;
    use crate::disk::Progress;
    use notify::event::{CreateKind, DataChange, RemoveKind, RenameMode};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_presence_events() {
        assert!(affects_presence(&EventKind::Create(CreateKind::File)));
        assert!(affects_presence(&EventKind::Remove(RemoveKind::File)));
        assert!(affects_presence(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));
        assert!(!affects_presence(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
    }

    #[test]
    fn test_is_watched_by_file_name() {
        let targets = vec![OsString::from("a.vmx.WRITELOCK"), OsString::from("a.vmss")];
        assert!(is_watched(&targets, Path::new("/x/a.vmx.WRITELOCK")));
        assert!(is_watched(&targets, Path::new("a.vmss")));
        assert!(!is_watched(&targets, Path::new("/x/a.vmx")));
    }

    #[test]
    fn test_poll_without_events_leaves_status() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("w.vmx");
        let mut vm =
            VirtualMachine::create(&path, "W", Arc::new(GuestOsCatalog::builtin())).unwrap();
        vm.save(&mut Progress::none()).unwrap();

        let mut watcher = StatusWatcher::new(&vm).unwrap();
        assert_eq!(watcher.dir(), temp_dir.path());
        assert_eq!(watcher.poll(&vm), None);
        assert_eq!(vm.status(), MachineStatus::Off);
    }
}
