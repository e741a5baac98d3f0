//! Error types shared across the vmxman crates.
//!
//! Errors are categorized by how a caller is expected to react:
//! - Parse anomalies that abort a read ([`VmxError::Format`])
//! - Invariant violations raised before any destructive action
//!   ([`VmxError::ConflictingDevice`], [`VmxError::Immutable`],
//!   [`VmxError::InsufficientSpace`])
//! - Low-level failures propagated unchanged ([`VmxError::Storage`], [`VmxError::Io`])

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout vmxman.
pub type VmxResult<T> = Result<T, VmxError>;

#[derive(Debug, Error)]
pub enum VmxError {
    /// Malformed descriptor content that cannot be skipped.
    #[error("format: {0}")]
    Format(String),

    /// Two storage devices claim the same bus coordinate.
    #[error("conflicting devices: {0}")]
    ConflictingDevice(String),

    /// Attempt to change something fixed at creation time.
    #[error("immutable: {0}")]
    Immutable(String),

    /// Not enough free space to create a preallocated image.
    #[error(
        "insufficient disk space in {}: {required} bytes required, {available} available ({} short)",
        path.display(),
        required.saturating_sub(*available)
    )]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    /// Lookup by name or path failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem operation failed, with context.
    #[error("storage: {0}")]
    Storage(String),

    /// Long-running operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid options or registry content.
    #[error("config: {0}")]
    Config(String),

    /// Generic IO error (catch-all).
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl VmxError {
    /// Wrap an IO error with the operation and path it happened on.
    pub fn storage(op: &str, path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("Failed to {} {}: {}", op, path.display(), err))
    }

    /// Whether this error was raised by an invariant check before any write happened.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            VmxError::ConflictingDevice(_)
                | VmxError::Immutable(_)
                | VmxError::InsufficientSpace { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_insufficient_space_names_shortfall() {
        let err = VmxError::InsufficientSpace {
            path: PathBuf::from("/vms/disk0"),
            required: 4096,
            available: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("/vms/disk0"));
        assert!(msg.contains("3072 short"));
    }

    #[test]
    fn test_storage_context() {
        let err = VmxError::storage(
            "create",
            Path::new("/tmp/x.vmdk"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "storage: Failed to create /tmp/x.vmdk: denied");
    }

    #[test]
    fn test_io_conversion() {
        let err: VmxError = io::Error::other("boom").into();
        assert!(matches!(err, VmxError::Io(_)));
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_precondition_classification() {
        assert!(VmxError::ConflictingDevice("ide0:0".into()).is_precondition());
        assert!(VmxError::Immutable("type".into()).is_precondition());
        assert!(!VmxError::Format("bad".into()).is_precondition());
    }
}
