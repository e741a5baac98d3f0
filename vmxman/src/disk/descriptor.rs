//! Disk descriptor text.
//!
//! The descriptor names the disk's create type, lists its extents and carries
//! the disk database (adapter and CHS geometry). It is either a standalone
//! text file or embedded right after the header of a sparse extent.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vmxman_shared::errors::{VmxError, VmxResult};

use super::constants::descriptor::{
    EMBEDDED_OFFSET, EMBEDDED_READ_LIMIT, PARENT_CID_NONE, TEXT_READ_LIMIT, VIRTUAL_HW_VERSION,
};
use super::constants::sparse::MAGIC_BYTES;
use super::extent::{Extent, ExtentType};
use super::geometry::Geometry;
use crate::config::ConfigStore;
use crate::devices::{BusType, ScsiDeviceType};

/// How a disk's data is laid out across extent files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardDiskType {
    /// One growable extent.
    SingleSparse,
    /// Growable extents of at most 2GB each.
    SplitSparse,
    /// One preallocated extent.
    SingleFlat,
    /// Preallocated extents of at most 2GB each.
    SplitFlat,
}

impl HardDiskType {
    pub const ALL: [HardDiskType; 4] = [
        HardDiskType::SingleSparse,
        HardDiskType::SplitSparse,
        HardDiskType::SingleFlat,
        HardDiskType::SplitFlat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HardDiskType::SingleSparse => "single-sparse",
            HardDiskType::SplitSparse => "split-sparse",
            HardDiskType::SingleFlat => "single-flat",
            HardDiskType::SplitFlat => "split-flat",
        }
    }

    /// Value of the descriptor's `createType` field.
    pub fn create_type(&self) -> &'static str {
        match self {
            HardDiskType::SingleSparse => "monolithicSparse",
            HardDiskType::SplitSparse => "twoGbMaxExtentSparse",
            HardDiskType::SingleFlat => "monolithicFlat",
            HardDiskType::SplitFlat => "twoGbMaxExtentFlat",
        }
    }

    pub fn from_create_type(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.create_type() == value)
    }

    pub fn is_split(&self) -> bool {
        matches!(self, HardDiskType::SplitSparse | HardDiskType::SplitFlat)
    }

    pub fn extent_type(&self) -> ExtentType {
        match self {
            HardDiskType::SingleSparse | HardDiskType::SplitSparse => ExtentType::Sparse,
            HardDiskType::SingleFlat | HardDiskType::SplitFlat => ExtentType::Flat,
        }
    }
}

impl FromStr for HardDiskType {
    type Err = VmxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .or_else(|| Self::from_create_type(s))
            .ok_or_else(|| VmxError::InvalidArgument(format!("unknown disk type '{}'", s)))
    }
}

impl std::fmt::Display for HardDiskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Controller recorded in `ddb.adapterType`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterType {
    #[default]
    Ide,
    BusLogic,
    LsiLogic,
}

impl AdapterType {
    pub fn for_bus(bus: BusType, scsi: ScsiDeviceType) -> Self {
        match (bus, scsi) {
            (BusType::Ide, _) => AdapterType::Ide,
            (BusType::Scsi, ScsiDeviceType::BusLogic) => AdapterType::BusLogic,
            (BusType::Scsi, ScsiDeviceType::LsiLogic) => AdapterType::LsiLogic,
        }
    }

    pub fn bus(&self) -> BusType {
        match self {
            AdapterType::Ide => BusType::Ide,
            AdapterType::BusLogic | AdapterType::LsiLogic => BusType::Scsi,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterType::Ide => "ide",
            AdapterType::BusLogic => "buslogic",
            AdapterType::LsiLogic => "lsilogic",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "ide" => Some(AdapterType::Ide),
            "buslogic" => Some(AdapterType::BusLogic),
            "lsilogic" => Some(AdapterType::LsiLogic),
            _ => None,
        }
    }
}

/// Parsed or to-be-written descriptor contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskDescriptor {
    pub cid: u32,
    /// `None` when the descriptor had no recognized `createType`.
    pub disk_type: Option<HardDiskType>,
    pub extents: Vec<Extent>,
    pub adapter: AdapterType,
    pub geometry: Geometry,
}

impl DiskDescriptor {
    /// A descriptor with a fresh random content id.
    pub fn new(disk_type: HardDiskType, adapter: AdapterType, geometry: Geometry) -> Self {
        Self {
            cid: rand::random(),
            disk_type: Some(disk_type),
            extents: Vec::new(),
            adapter,
            geometry,
        }
    }

    /// Read the descriptor at `path`, standalone or embedded in a sparse extent.
    pub fn read_from(path: &Path) -> VmxResult<Self> {
        let mut file = File::open(path).map_err(|e| VmxError::storage("open", path, e))?;

        let mut magic = [0u8; 4];
        let is_sparse = match file.read_exact(&mut magic) {
            Ok(()) => &magic == MAGIC_BYTES,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(VmxError::storage("read", path, e)),
        };

        let (offset, limit) = if is_sparse {
            (EMBEDDED_OFFSET, EMBEDDED_READ_LIMIT)
        } else {
            (0, TEXT_READ_LIMIT)
        };
        tracing::debug!(path = %path.display(), embedded = is_sparse, "Reading disk descriptor");

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| VmxError::storage("seek", path, e))?;
        let mut raw = Vec::new();
        file.take(limit)
            .read_to_end(&mut raw)
            .map_err(|e| VmxError::storage("read", path, e))?;

        // Embedded descriptors are NUL padded
        if let Some(end) = raw.iter().position(|b| *b == 0) {
            raw.truncate(end);
        }

        Self::parse(&String::from_utf8_lossy(&raw))
    }

    /// Parse descriptor text.
    ///
    /// Malformed extent lines are fatal; any other unrecognized line is skipped.
    pub fn parse(text: &str) -> VmxResult<Self> {
        let mut descriptor = Self {
            cid: 0,
            disk_type: None,
            extents: Vec::new(),
            adapter: AdapterType::default(),
            geometry: Geometry::default(),
        };

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if Extent::looks_like_descriptor_line(line) {
                descriptor.extents.push(Extent::parse_descriptor_line(line)?);
                continue;
            }

            let Some((key, value)) = ConfigStore::parse_line(line) else {
                tracing::warn!(line, "Skipping malformed descriptor line");
                continue;
            };

            match key.as_str() {
                "CID" => match u32::from_str_radix(&value, 16) {
                    Ok(cid) => descriptor.cid = cid,
                    Err(_) => tracing::warn!(value = %value, "Ignoring invalid CID"),
                },
                "createType" => {
                    descriptor.disk_type = HardDiskType::from_create_type(&value);
                    if descriptor.disk_type.is_none() {
                        tracing::warn!(value = %value, "Unknown createType");
                    }
                }
                "ddb.adapterType" => match AdapterType::parse(&value) {
                    Some(adapter) => descriptor.adapter = adapter,
                    None => tracing::warn!(value = %value, "Unknown adapter type"),
                },
                "ddb.geometry.cylinders" => {
                    descriptor.geometry.cylinders = parse_geometry(&key, &value)
                }
                "ddb.geometry.heads" => descriptor.geometry.heads = parse_geometry(&key, &value),
                "ddb.geometry.sectors" => {
                    descriptor.geometry.sectors = parse_geometry(&key, &value)
                }
                _ => tracing::debug!(key = %key, "Ignoring descriptor key"),
            }
        }

        Ok(descriptor)
    }

    /// Total size of all extents in sectors.
    pub fn extent_sectors(&self) -> u64 {
        self.extents.iter().map(Extent::capacity).sum()
    }

    /// Render the descriptor text.
    pub fn render(&self) -> String {
        let create_type = self
            .disk_type
            .map(|t| t.create_type())
            .unwrap_or("custom");

        let mut out = String::new();
        out.push_str("# Disk DescriptorFile\n");
        out.push_str("version=1\n");
        out.push_str(&format!("CID={:08x}\n", self.cid));
        out.push_str(&format!("parentCID={}\n", PARENT_CID_NONE));
        out.push_str(&format!("createType=\"{}\"\n", create_type));
        out.push('\n');

        out.push_str("# Extent description\n");
        for extent in &self.extents {
            out.push_str(&extent.to_descriptor_line());
            out.push('\n');
        }
        out.push('\n');

        out.push_str("# The Disk Data Base\n");
        out.push_str("#DDB\n");
        out.push('\n');
        out.push_str(&format!("ddb.virtualHWVersion = \"{}\"\n", VIRTUAL_HW_VERSION));
        out.push_str(&format!("ddb.adapterType = \"{}\"\n", self.adapter.as_str()));
        out.push_str(&format!("ddb.geometry.cylinders = \"{}\"\n", self.geometry.cylinders));
        out.push_str(&format!("ddb.geometry.heads = \"{}\"\n", self.geometry.heads));
        out.push_str(&format!("ddb.geometry.sectors = \"{}\"\n", self.geometry.sectors));
        out
    }
}

fn parse_geometry(key: &str, value: &str) -> u64 {
    value.parse().unwrap_or_else(|_| {
        tracing::warn!(key, value, "Ignoring invalid geometry value");
        0
    })
}
