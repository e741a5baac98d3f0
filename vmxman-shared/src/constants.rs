//! Constants shared by the core library and its front ends.
//!
//! These values are part of on-disk formats and must not change.

/// Machine descriptor (`.vmx`) keys and values.
pub mod vmx {
    pub const DISPLAY_NAME: &str = "displayName";
    pub const MEMSIZE: &str = "memsize";
    pub const GUEST_OS: &str = "guestOS";
    pub const SOUND_PRESENT: &str = "sound.present";
    pub const USB_PRESENT: &str = "usb.present";
    pub const NVRAM: &str = "nvram";
    pub const CHECKPOINT_STATE: &str = "checkpoint.vmState";

    /// Per-slot key suffixes.
    pub const PRESENT: &str = "present";
    pub const FILE_NAME: &str = "fileName";
    pub const DEVICE_TYPE: &str = "deviceType";
    pub const CONNECTION_TYPE: &str = "connectionType";
    pub const ADDRESS: &str = "address";
    pub const VIRTUAL_DEV: &str = "virtualDev";

    pub const TRUE: &str = "TRUE";
    pub const FALSE: &str = "FALSE";

    /// Sentinel file name for a physical drive picked by the player.
    pub const AUTO_DETECT: &str = "auto detect";

    /// Descriptor file extension.
    pub const EXTENSION: &str = "vmx";
}

/// Device slot enumeration bounds.
pub mod slots {
    /// Buses per controller kind (IDE or SCSI).
    pub const BUS_COUNT: u16 = 2;

    /// Devices per bus.
    pub const DEVICE_COUNT: u16 = 6;

    /// Ethernet adapters.
    pub const ETHERNET_COUNT: u16 = 10;
}

/// Companion files that live next to a machine descriptor.
pub mod companions {
    /// Appended to the descriptor path; exists while the machine runs.
    pub const LOCK_SUFFIX: &str = ".WRITELOCK";

    pub const LOG_FILE: &str = "vmware.log";
    pub const SNAPSHOT_EXTENSION: &str = "vmsd";
    pub const MEMORY_EXTENSION: &str = "vmem";
    pub const NVRAM_EXTENSION: &str = "nvram";
    pub const CHECKPOINT_EXTENSION: &str = "vmss";
}

/// Virtual disk (`.vmdk`) layout.
pub mod vmdk {
    /// Bytes per sector.
    pub const SECTOR_SIZE: u64 = 512;

    /// Grain size in sectors (64KB grains).
    pub const GRAIN_SIZE: u64 = 128;

    /// Grain table entries per table.
    pub const GTES_PER_GT: u64 = 512;

    /// Sectors occupied by one grain table (512 entries * 4 bytes).
    pub const GT_SECTORS: u64 = 4;

    /// Largest extent of a split disk in sectors (2GB).
    pub const SPLIT_EXTENT_SECTORS: u64 = 1 << 22;

    /// Disk image file extension.
    pub const EXTENSION: &str = "vmdk";
}
