//! Machine power status.
//!
//! Status is never stored in the descriptor. It is derived from companion
//! files next to it:
//!
//! ```text
//! <name>.vmx.WRITELOCK exists      → Running
//! checkpoint file exists           → Suspended
//! neither                          → Off
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Power status of a machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    #[default]
    Off,
    Suspended,
    Running,
}

impl MachineStatus {
    /// Derive status from companion file presence.
    pub fn derive(lock_exists: bool, checkpoint_exists: bool) -> Self {
        if lock_exists {
            MachineStatus::Running
        } else if checkpoint_exists {
            MachineStatus::Suspended
        } else {
            MachineStatus::Off
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, MachineStatus::Running)
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, MachineStatus::Suspended)
    }

    pub fn is_off(&self) -> bool {
        matches!(self, MachineStatus::Off)
    }

    /// Files of a running machine are owned by the player.
    pub fn can_modify(&self) -> bool {
        !self.is_running()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Off => "off",
            MachineStatus::Suspended => "suspended",
            MachineStatus::Running => "running",
        }
    }
}

impl std::str::FromStr for MachineStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(MachineStatus::Off),
            "suspended" => Ok(MachineStatus::Suspended),
            "running" => Ok(MachineStatus::Running),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observable machine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineState {
    pub status: MachineStatus,
    pub name: String,
    /// Last status or name change (UTC).
    pub last_updated: DateTime<Utc>,
}

impl MachineState {
    pub fn new(name: impl Into<String>, status: MachineStatus) -> Self {
        Self {
            status,
            name: name.into(),
            last_updated: Utc::now(),
        }
    }

    /// Apply `status`, returning the previous one if it changed.
    pub fn set_status(&mut self, status: MachineStatus) -> Option<MachineStatus> {
        if self.status == status {
            return None;
        }
        let previous = std::mem::replace(&mut self.status, status);
        self.last_updated = Utc::now();
        Some(previous)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.last_updated = Utc::now();
    }
}

/// Read-only view of a machine's state, shareable across threads.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<RwLock<MachineState>>,
}

impl StatusHandle {
    pub(crate) fn new(inner: Arc<RwLock<MachineState>>) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> MachineStatus {
        self.inner.read().status
    }

    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    pub fn snapshot(&self) -> MachineState {
        self.inner.read().clone()
    }
}

/// Notifications published by a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineEvent {
    /// Power status changed (lock or checkpoint file appeared or vanished).
    StatusChanged {
        path: PathBuf,
        from: MachineStatus,
        to: MachineStatus,
    },
    /// The descriptor was written.
    Saved { path: PathBuf },
    /// Descriptor and owned files were removed.
    Deleted { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_status() {
        assert_eq!(MachineStatus::derive(false, false), MachineStatus::Off);
        assert_eq!(MachineStatus::derive(false, true), MachineStatus::Suspended);
        assert_eq!(MachineStatus::derive(true, false), MachineStatus::Running);
        // Lock wins over checkpoint
        assert_eq!(MachineStatus::derive(true, true), MachineStatus::Running);
    }

    #[test]
    fn test_status_predicates() {
        assert!(MachineStatus::Running.is_running());
        assert!(!MachineStatus::Running.can_modify());
        assert!(MachineStatus::Suspended.is_suspended());
        assert!(MachineStatus::Suspended.can_modify());
        assert!(MachineStatus::Off.is_off());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            MachineStatus::Off,
            MachineStatus::Suspended,
            MachineStatus::Running,
        ] {
            assert_eq!(status.as_str().parse::<MachineStatus>(), Ok(status));
            assert_eq!(status.to_string(), status.as_str());
        }
        assert!("paused".parse::<MachineStatus>().is_err());
    }

    #[test]
    fn test_set_status_reports_change() {
        let mut state = MachineState::new("vm", MachineStatus::Off);
        assert_eq!(state.set_status(MachineStatus::Off), None);

        let before = state.last_updated;
        assert_eq!(
            state.set_status(MachineStatus::Running),
            Some(MachineStatus::Off)
        );
        assert!(state.last_updated >= before);
        assert_eq!(state.status, MachineStatus::Running);
    }

    #[test]
    fn test_status_handle_shares_state() {
        let inner = Arc::new(RwLock::new(MachineState::new("vm", MachineStatus::Off)));
        let handle = StatusHandle::new(inner.clone());

        inner.write().set_status(MachineStatus::Suspended);
        assert_eq!(handle.status(), MachineStatus::Suspended);
        assert_eq!(handle.name(), "vm");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&MachineStatus::Suspended).unwrap();
        assert_eq!(json, "\"suspended\"");
    }
}
