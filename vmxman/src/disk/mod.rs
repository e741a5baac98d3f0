//! Virtual disk images.
//!
//! - [`extent`]: one extent file, flat or sparse
//! - [`descriptor`]: the descriptor text tying extents together
//! - [`image`]: creation, inspection and deletion of whole disks
//! - [`progress`]: fractional progress and cancellation for long writes

pub mod constants;
pub mod descriptor;
mod error;
pub mod extent;
mod geometry;
pub mod image;
mod progress;

pub use descriptor::{AdapterType, DiskDescriptor, HardDiskType};
pub use error::ExtentLineError;
pub use extent::{Extent, ExtentAccess, ExtentState, ExtentType, SparseLayout};
pub use geometry::Geometry;
pub use image::{HardDiskImage, plan_extent_sizes};
pub use progress::Progress;
