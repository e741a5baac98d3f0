//! Disk image constants.
//!
//! Centralized location for all vmdk layout and engine tuning values.

pub use vmxman_shared::constants::vmdk::{
    EXTENSION, GRAIN_SIZE, GT_SECTORS, GTES_PER_GT, SECTOR_SIZE, SPLIT_EXTENT_SECTORS,
};

/// Sparse extent header layout
pub mod sparse {
    /// "KDMV" read as a little-endian u32
    pub const MAGIC: u32 = 0x564d_444b;

    /// Magic as it appears at byte 0 of a sparse file
    pub const MAGIC_BYTES: &[u8; 4] = b"KDMV";

    pub const VERSION: u32 = 1;

    /// Valid newline detection + redundant grain table
    pub const FLAGS: u32 = 3;

    /// Newline-corruption detection bytes that follow the unclean-shutdown flag
    pub const TERMINATOR: [u8; 4] = [b'\n', b' ', b'\r', b'\n'];

    /// Header occupies exactly one sector
    pub const HEADER_SIZE: usize = 512;

    /// Redundant grain directory starts right after the header
    pub const REDUNDANT_GD_SECTOR: u64 = 1;

    /// Bytes per grain directory / grain table entry
    pub const ENTRY_SIZE: u64 = 4;
}

/// Flat extent creation
pub mod flat {
    /// Zero-fill write size in bytes
    pub const CHUNK_SIZE: usize = 8192;
}

/// Descriptor text handling
pub mod descriptor {
    /// Max bytes scanned when the descriptor is embedded after a sparse header
    pub const EMBEDDED_READ_LIMIT: u64 = 2048;

    /// Max bytes scanned from a standalone descriptor file
    pub const TEXT_READ_LIMIT: u64 = 64 * 1024;

    /// Byte offset of an embedded descriptor
    pub const EMBEDDED_OFFSET: u64 = 512;

    pub const PARENT_CID_NONE: &str = "ffffffff";

    pub const VIRTUAL_HW_VERSION: &str = "4";
}

/// CHS geometry
pub mod geometry {
    pub const SECTORS_PER_TRACK: u64 = 63;
    pub const IDE_HEADS: u64 = 16;
    pub const SCSI_HEADS: u64 = 255;
}
