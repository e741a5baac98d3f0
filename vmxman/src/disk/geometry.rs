//! Cylinder/head/sector geometry derived from disk capacity.

use serde::{Deserialize, Serialize};

use super::constants::SECTOR_SIZE;
use super::constants::geometry::{IDE_HEADS, SCSI_HEADS, SECTORS_PER_TRACK};
use crate::devices::BusType;

/// CHS triple as recorded in the disk database (`ddb.geometry.*`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub cylinders: u64,
    pub heads: u64,
    pub sectors: u64,
}

impl Geometry {
    /// Geometry for a disk of `total_sectors` attached to `bus`.
    ///
    /// Cylinders are truncated, so the geometry may describe slightly less
    /// than the full capacity.
    pub fn for_capacity(total_sectors: u64, bus: BusType) -> Self {
        let heads = match bus {
            BusType::Ide => IDE_HEADS,
            BusType::Scsi => SCSI_HEADS,
        };
        let sectors = SECTORS_PER_TRACK;
        Self {
            cylinders: (total_sectors / heads) / sectors,
            heads,
            sectors,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cylinders == 0 || self.heads == 0 || self.sectors == 0
    }

    pub fn total_sectors(&self) -> u64 {
        self.cylinders * self.heads * self.sectors
    }

    /// Capacity in bytes described by this geometry.
    pub fn capacity_bytes(&self) -> u64 {
        self.total_sectors() * SECTOR_SIZE
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.cylinders, self.heads, self.sectors)
    }
}
