//! Home directory handling: options, layout and the single-owner lock.

pub mod constants;
pub mod layout;
pub mod lock;
pub mod options;

pub use layout::FilesystemLayout;
pub use lock::HomeLock;
pub use options::VmxmanOptions;
