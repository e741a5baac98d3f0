//! Machine descriptor key/value storage.
//!
//! - `ConfigStore` - raw `key = "value"` map with sorted serialization
//! - `DEFAULT_DESCRIPTOR` - built-in descriptor used for new machines

mod store;

pub use store::ConfigStore;

/// Descriptor text every new machine starts from.
pub const DEFAULT_DESCRIPTOR: &str = include_str!("../../resources/defaults.vmx");
