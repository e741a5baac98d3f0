//! Device enumerations and slot coordinates.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vmxman_shared::constants::{slots, vmx};
use vmxman_shared::errors::VmxError;

/// Storage controller kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    Ide,
    Scsi,
}

impl BusType {
    pub const ALL: [BusType; 2] = [BusType::Ide, BusType::Scsi];

    /// Key prefix used in the machine descriptor.
    pub fn as_str(&self) -> &'static str {
        match self {
            BusType::Ide => "ide",
            BusType::Scsi => "scsi",
        }
    }
}

impl FromStr for BusType {
    type Err = VmxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ide" => Ok(BusType::Ide),
            "scsi" => Ok(BusType::Scsi),
            _ => Err(VmxError::InvalidArgument(format!("unknown bus type '{}'", s))),
        }
    }
}

impl std::fmt::Display for BusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position of a storage device: bus kind, bus number, device number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotCoordinate {
    pub bus: BusType,
    pub bus_number: u16,
    pub device_number: u16,
}

impl SlotCoordinate {
    /// Build a coordinate, rejecting numbers outside the slot grid.
    pub fn new(bus: BusType, bus_number: u16, device_number: u16) -> Result<Self, VmxError> {
        if bus_number >= slots::BUS_COUNT || device_number >= slots::DEVICE_COUNT {
            return Err(VmxError::InvalidArgument(format!(
                "slot {}{}:{} is outside {} buses x {} devices",
                bus.as_str(),
                bus_number,
                device_number,
                slots::BUS_COUNT,
                slots::DEVICE_COUNT
            )));
        }
        Ok(Self {
            bus,
            bus_number,
            device_number,
        })
    }

    /// Every coordinate on `bus`, in bus-major order.
    pub fn all(bus: BusType) -> impl Iterator<Item = SlotCoordinate> {
        (0..slots::BUS_COUNT).flat_map(move |bus_number| {
            (0..slots::DEVICE_COUNT).map(move |device_number| SlotCoordinate {
                bus,
                bus_number,
                device_number,
            })
        })
    }

    /// Prefix shared by every key of this slot, e.g. `ide0:3.`.
    pub fn base_key(&self) -> String {
        format!("{}.", self)
    }

    pub fn key(&self, suffix: &str) -> String {
        format!("{}{}", self.base_key(), suffix)
    }
}

impl std::fmt::Display for SlotCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}:{}",
            self.bus.as_str(),
            self.bus_number,
            self.device_number
        )
    }
}

impl FromStr for SlotCoordinate {
    type Err = VmxError;

    /// Parse `ide0:1` / `scsi1:5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VmxError::InvalidArgument(format!("invalid slot '{}'", s));
        let split = s.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
        let (bus, numbers) = s.split_at(split);
        let (bus_number, device_number) = numbers.split_once(':').ok_or_else(invalid)?;
        Self::new(
            bus.parse()?,
            bus_number.parse().map_err(|_| invalid())?,
            device_number.parse().map_err(|_| invalid())?,
        )
    }
}

/// File behind a storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskFile {
    /// Physical drive chosen by the player at power-on.
    AutoDetect,
    Path(PathBuf),
}

impl DiskFile {
    /// Interpret a `fileName` value from a descriptor living in `dir`.
    pub fn from_descriptor_value(value: &str, dir: &Path) -> Self {
        if value == vmx::AUTO_DETECT {
            DiskFile::AutoDetect
        } else {
            DiskFile::Path(crate::util::resolve_in(dir, Path::new(value)))
        }
    }

    /// Value to store in `fileName` for a descriptor living in `dir`.
    pub fn to_descriptor_value(&self, dir: &Path) -> String {
        match self {
            DiskFile::AutoDetect => vmx::AUTO_DETECT.to_string(),
            DiskFile::Path(path) => crate::util::relative_to_dir(path, dir),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            DiskFile::AutoDetect => None,
            DiskFile::Path(path) => Some(path),
        }
    }
}

impl std::fmt::Display for DiskFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiskFile::AutoDetect => write!(f, "{}", vmx::AUTO_DETECT),
            DiskFile::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How a CD drive is backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CdDeviceType {
    /// Host drive, raw access.
    Raw,
    /// ISO image file.
    Iso,
    /// Host drive through the legacy ATAPI emulation.
    Legacy,
}

impl CdDeviceType {
    /// Value of the slot's `deviceType` key.
    pub fn device_type(&self) -> &'static str {
        match self {
            CdDeviceType::Raw => "cdrom-raw",
            CdDeviceType::Iso => "cdrom-image",
            CdDeviceType::Legacy => "atapi-cdrom",
        }
    }

    pub fn from_device_type(value: &str) -> Option<Self> {
        match value {
            "cdrom-raw" => Some(CdDeviceType::Raw),
            "cdrom-image" => Some(CdDeviceType::Iso),
            "atapi-cdrom" => Some(CdDeviceType::Legacy),
            _ => None,
        }
    }
}

/// Host attachment of an ethernet adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    #[default]
    Bridged,
    HostOnly,
    Nat,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Bridged => "bridged",
            NetworkType::HostOnly => "hostonly",
            NetworkType::Nat => "nat",
        }
    }

    /// Parse a `connectionType` value, falling back to bridged.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(value, "Unknown connection type, using bridged");
            NetworkType::Bridged
        })
    }
}

impl FromStr for NetworkType {
    type Err = VmxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bridged" => Ok(NetworkType::Bridged),
            "hostonly" => Ok(NetworkType::HostOnly),
            "nat" => Ok(NetworkType::Nat),
            _ => Err(VmxError::InvalidArgument(format!(
                "unknown network type '{}'",
                s
            ))),
        }
    }
}

/// Emulated ethernet adapter model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EthernetDeviceType {
    #[default]
    PcNet,
    VmxNet,
    E1000,
}

impl EthernetDeviceType {
    /// Value of `ethernetN.virtualDev`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EthernetDeviceType::PcNet => "vlance",
            EthernetDeviceType::VmxNet => "vmxnet",
            EthernetDeviceType::E1000 => "e1000",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "vlance" => Some(EthernetDeviceType::PcNet),
            "vmxnet" => Some(EthernetDeviceType::VmxNet),
            "e1000" => Some(EthernetDeviceType::E1000),
            _ => None,
        }
    }
}

/// SCSI controller model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScsiDeviceType {
    #[default]
    BusLogic,
    LsiLogic,
}

impl ScsiDeviceType {
    /// Value of `scsiN.virtualDev`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScsiDeviceType::BusLogic => "buslogic",
            ScsiDeviceType::LsiLogic => "lsilogic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "buslogic" => Some(ScsiDeviceType::BusLogic),
            "lsilogic" => Some(ScsiDeviceType::LsiLogic),
            _ => None,
        }
    }
}
