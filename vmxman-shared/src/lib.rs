//! vmxman shared code
//!
//! Error taxonomy and on-disk constants used by the core library,
//! the command line front end and the test fixtures.

pub mod constants;
pub mod errors;

pub use errors::{VmxError, VmxResult};
