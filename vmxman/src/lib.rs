//! vmxman: virtual machine descriptors and virtual disk images.
//!
//! - [`config`]: raw `key = "value"` descriptor storage
//! - [`devices`]: hard disks, CD drives and ethernet adapters, and their slot keys
//! - [`disk`]: sparse/flat disk image creation and descriptor codec
//! - [`guest_os`]: guest operating system catalog
//! - [`machine`]: the virtual machine aggregate and its status
//! - [`management`]: registry of machines in a home directory
//! - [`runtime`]: home directory options, layout and lock

pub mod config;
pub mod devices;
pub mod disk;
pub mod guest_os;
pub mod machine;
pub mod management;
pub mod runtime;
pub mod util;

pub use vmxman_shared::errors::{VmxError, VmxResult};

pub use devices::{
    BusType, CdDeviceType, CdDrive, Device, DiskFile, EthernetDevice, EthernetDeviceType, HardDisk,
    NetworkType, ScsiDeviceType, SlotCoordinate, StorageDevice,
};
pub use disk::{HardDiskImage, HardDiskType, Progress};
pub use guest_os::{GuestOs, GuestOsCatalog};
pub use machine::{
    MachineEvent, MachineStatus, MachineSummary, StatusHandle, StatusWatcher, VirtualMachine,
};
pub use management::{MachineManager, ManagerEvent};
pub use runtime::VmxmanOptions;
