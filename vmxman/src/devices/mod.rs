//! Devices attached to a virtual machine.
//!
//! Storage devices occupy a [`SlotCoordinate`]; ethernet adapters are
//! numbered sequentially. [`registry`] maps both to and from descriptor keys.

pub mod registry;
mod types;

use std::path::{Path, PathBuf};

use serde::Serialize;

pub use types::{
    BusType, CdDeviceType, DiskFile, EthernetDeviceType, NetworkType, ScsiDeviceType,
    SlotCoordinate,
};

use crate::disk::{AdapterType, HardDiskImage, HardDiskType};

/// A hard disk in a storage slot.
#[derive(Debug, Clone)]
pub struct HardDisk {
    pub coordinate: SlotCoordinate,
    pub image: HardDiskImage,
}

impl HardDisk {
    /// A new disk without a file; one is assigned on the next machine save.
    pub fn new(coordinate: SlotCoordinate, disk_type: HardDiskType, capacity_bytes: u64) -> Self {
        let adapter = AdapterType::for_bus(coordinate.bus, ScsiDeviceType::default());
        Self {
            coordinate,
            image: HardDiskImage::new(disk_type, adapter, capacity_bytes),
        }
    }

    pub fn file_name(&self) -> Option<&Path> {
        self.image.path()
    }

    pub fn capacity(&self) -> u64 {
        self.image.capacity()
    }

    pub fn disk_type(&self) -> HardDiskType {
        self.image.disk_type()
    }

    pub fn display_name(&self) -> String {
        "Hard Disk".to_string()
    }
}

/// A CD-ROM drive in a storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CdDrive {
    pub coordinate: SlotCoordinate,
    pub file: DiskFile,
    pub cd_type: CdDeviceType,
}

impl CdDrive {
    /// Drive backed by an ISO image.
    pub fn iso(coordinate: SlotCoordinate, image: PathBuf) -> Self {
        Self {
            coordinate,
            file: DiskFile::Path(image),
            cd_type: CdDeviceType::Iso,
        }
    }

    /// Host drive picked by the player.
    pub fn physical(coordinate: SlotCoordinate) -> Self {
        Self {
            coordinate,
            file: DiskFile::AutoDetect,
            cd_type: CdDeviceType::Raw,
        }
    }

    pub fn display_name(&self) -> String {
        match (self.cd_type, &self.file) {
            (CdDeviceType::Iso, DiskFile::Path(path)) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("CD-ROM ({})", name)
            }
            (CdDeviceType::Legacy, _) => "CD-ROM (Physical, Legacy mode)".to_string(),
            _ => "CD-ROM (Physical)".to_string(),
        }
    }
}

/// A network adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EthernetDevice {
    pub network_type: NetworkType,
    /// Fixed MAC address, generated by the player when absent.
    pub address: Option<String>,
    pub device_type: EthernetDeviceType,
}

impl EthernetDevice {
    pub fn new(network_type: NetworkType) -> Self {
        Self {
            network_type,
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> String {
        let network = match self.network_type {
            NetworkType::Bridged => "Bridged",
            NetworkType::HostOnly => "Host only",
            NetworkType::Nat => "NAT",
        };
        format!("Ethernet ({})", network)
    }
}

/// Anything that sits in a storage slot.
#[derive(Debug, Clone)]
pub enum StorageDevice {
    HardDisk(HardDisk),
    CdDrive(CdDrive),
}

impl StorageDevice {
    pub fn coordinate(&self) -> SlotCoordinate {
        match self {
            StorageDevice::HardDisk(disk) => disk.coordinate,
            StorageDevice::CdDrive(drive) => drive.coordinate,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            StorageDevice::HardDisk(disk) => disk.display_name(),
            StorageDevice::CdDrive(drive) => drive.display_name(),
        }
    }
}

/// Borrowed view over every device kind, for uniform listing.
#[derive(Debug, Clone, Copy)]
pub enum Device<'a> {
    HardDisk(&'a HardDisk),
    CdDrive(&'a CdDrive),
    Ethernet(&'a EthernetDevice),
}

impl Device<'_> {
    pub fn display_name(&self) -> String {
        match self {
            Device::HardDisk(disk) => disk.display_name(),
            Device::CdDrive(drive) => drive.display_name(),
            Device::Ethernet(nic) => nic.display_name(),
        }
    }

    /// Slot of a storage device; `None` for ethernet adapters.
    pub fn coordinate(&self) -> Option<SlotCoordinate> {
        match self {
            Device::HardDisk(disk) => Some(disk.coordinate),
            Device::CdDrive(drive) => Some(drive.coordinate),
            Device::Ethernet(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(bus: BusType, b: u16, d: u16) -> SlotCoordinate {
        SlotCoordinate::new(bus, b, d).unwrap()
    }

    #[test]
    fn test_display_names() {
        let disk = HardDisk::new(slot(BusType::Ide, 0, 0), HardDiskType::SingleSparse, 1024);
        assert_eq!(Device::HardDisk(&disk).display_name(), "Hard Disk");

        let iso = CdDrive::iso(slot(BusType::Ide, 1, 0), PathBuf::from("/isos/debian.iso"));
        assert_eq!(iso.display_name(), "CD-ROM (debian.iso)");

        let mut raw = CdDrive::physical(slot(BusType::Ide, 1, 0));
        assert_eq!(raw.display_name(), "CD-ROM (Physical)");
        raw.cd_type = CdDeviceType::Legacy;
        assert_eq!(raw.display_name(), "CD-ROM (Physical, Legacy mode)");

        assert_eq!(
            EthernetDevice::new(NetworkType::HostOnly).display_name(),
            "Ethernet (Host only)"
        );
        assert_eq!(
            Device::Ethernet(&EthernetDevice::new(NetworkType::Nat)).display_name(),
            "Ethernet (NAT)"
        );
    }

    #[test]
    fn test_scsi_disk_adapter() {
        let disk = HardDisk::new(slot(BusType::Scsi, 0, 1), HardDiskType::SingleFlat, 1024);
        assert_eq!(disk.image.adapter(), AdapterType::BusLogic);
        assert_eq!(disk.file_name(), None);
    }

    #[test]
    fn test_storage_device_coordinate() {
        let at = slot(BusType::Ide, 1, 1);
        let device = StorageDevice::CdDrive(CdDrive::physical(at));
        assert_eq!(device.coordinate(), at);
        assert_eq!(Device::Ethernet(&EthernetDevice::default()).coordinate(), None);
    }
}
