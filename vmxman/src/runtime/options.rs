//! Configuration for vmxman.

use std::path::PathBuf;

use dirs::home_dir;
use serde::{Deserialize, Serialize};

use crate::runtime::constants::envs as const_envs;
use crate::runtime::layout::dirs as const_dirs;

/// Options used when opening a vmxman home.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VmxmanOptions {
    /// Holds the machine registry, the machines and the logs.
    pub home_dir: PathBuf,
}

impl VmxmanOptions {
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
        }
    }
}

impl Default for VmxmanOptions {
    fn default() -> Self {
        let home_dir = std::env::var(const_envs::VMXMAN_HOME)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut path = home_dir().unwrap_or_else(|| PathBuf::from("."));
                path.push(const_dirs::VMXMAN_DIR);
                path
            });

        Self { home_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_home() {
        let options = VmxmanOptions::with_home("/srv/vms");
        assert_eq!(options.home_dir, PathBuf::from("/srv/vms"));
    }

    #[test]
    fn test_serde_round_trip() {
        let options = VmxmanOptions::with_home("/srv/vms");
        let json = serde_json::to_string(&options).unwrap();
        let back: VmxmanOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.home_dir, options.home_dir);
    }
}
