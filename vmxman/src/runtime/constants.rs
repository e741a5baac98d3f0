//! Constants for the vmxman runtime.

pub mod envs {
    /// Overrides the home directory.
    pub const VMXMAN_HOME: &str = "VMXMAN_HOME";
}

/// File naming patterns
pub mod filenames {
    /// Home directory lock
    pub const LOCK_FILE: &str = ".lock";

    /// Registry of known machine descriptors, one path per line
    pub const MACHINES_LIST: &str = "machines.list";
}
