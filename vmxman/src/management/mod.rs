//! Machine registry for a vmxman home.
//!
//! - **MachineManager**: owns every registered machine and the home lock
//! - **ManagerEvent**: added/removed notifications
//!
//! ```rust,no_run
//! use vmxman::{MachineManager, VmxmanOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manager = MachineManager::new(VmxmanOptions::default())?;
//! manager.create_machine("web")?;
//! for vm in manager.machines() {
//!     println!("{} ({})", vm.name(), vm.status());
//! }
//! # Ok(())
//! # }
//! ```

mod manager;

pub use manager::{MachineManager, ManagerEvent};
