//! Translation between descriptor keys and typed devices.
//!
//! Storage slots use keys like `ide0:1.present`, `ide0:1.fileName` and
//! `ide0:1.deviceType`; ethernet adapters use `ethernet3.present`,
//! `ethernet3.connectionType`, `ethernet3.address` and `ethernet3.virtualDev`.

use std::collections::HashSet;
use std::path::Path;

use vmxman_shared::constants::{slots, vmx};
use vmxman_shared::errors::{VmxError, VmxResult};

use super::{
    BusType, CdDeviceType, CdDrive, DiskFile, EthernetDevice, EthernetDeviceType, HardDisk,
    NetworkType, ScsiDeviceType, SlotCoordinate, StorageDevice,
};
use crate::config::ConfigStore;
use crate::disk::{AdapterType, HardDiskImage};

const HARD_DISK_DEVICE_TYPE: &str = "disk";
const ETHERNET_PREFIX: &str = "ethernet";

/// Whether `key` holds a true flag.
pub fn is_present(store: &ConfigStore, key: &str) -> bool {
    store
        .get(key)
        .is_some_and(|value| value.eq_ignore_ascii_case(vmx::TRUE))
}

fn ethernet_key(index: usize, suffix: &str) -> String {
    format!("{}{}.{}", ETHERNET_PREFIX, index, suffix)
}

fn controller_key(bus_number: u16, suffix: &str) -> String {
    format!("{}{}.{}", BusType::Scsi.as_str(), bus_number, suffix)
}

/// SCSI controller model configured for `bus_number`, if any.
pub fn scsi_controller(store: &ConfigStore, bus_number: u16) -> Option<ScsiDeviceType> {
    store
        .get(&controller_key(bus_number, vmx::VIRTUAL_DEV))
        .and_then(ScsiDeviceType::parse)
}

/// Materialize every present storage device on `bus`.
///
/// `dir` is the machine descriptor's directory; relative file names resolve
/// against it. Existing disk images are opened, so a corrupt disk descriptor
/// fails the scan.
pub fn scan_disks(store: &ConfigStore, bus: BusType, dir: &Path) -> VmxResult<Vec<StorageDevice>> {
    let mut devices = Vec::new();

    for coordinate in SlotCoordinate::all(bus) {
        if !is_present(store, &coordinate.key(vmx::PRESENT)) {
            continue;
        }

        let file = store
            .get(&coordinate.key(vmx::FILE_NAME))
            .map(|value| DiskFile::from_descriptor_value(value, dir));
        let device_type = store
            .get(&coordinate.key(vmx::DEVICE_TYPE))
            .unwrap_or(HARD_DISK_DEVICE_TYPE);

        if device_type == HARD_DISK_DEVICE_TYPE {
            let Some(path) = file.as_ref().and_then(DiskFile::as_path) else {
                tracing::warn!(slot = %coordinate, "Skipping hard disk without a file name");
                continue;
            };

            let image = if path.exists() {
                HardDiskImage::open(path)?
            } else {
                tracing::warn!(slot = %coordinate, path = %path.display(), "Hard disk file is missing");
                let scsi = match bus {
                    BusType::Scsi => scsi_controller(store, coordinate.bus_number).unwrap_or_default(),
                    BusType::Ide => ScsiDeviceType::default(),
                };
                HardDiskImage::unloaded(path.to_path_buf(), AdapterType::for_bus(bus, scsi))
            };

            tracing::debug!(slot = %coordinate, path = %path.display(), "Found hard disk");
            devices.push(StorageDevice::HardDisk(HardDisk { coordinate, image }));
            continue;
        }

        let cd_type = CdDeviceType::from_device_type(device_type).unwrap_or_else(|| {
            tracing::warn!(slot = %coordinate, device_type, "Unknown device type, using raw CD-ROM");
            CdDeviceType::Raw
        });

        tracing::debug!(slot = %coordinate, cd_type = cd_type.device_type(), "Found CD-ROM");
        devices.push(StorageDevice::CdDrive(CdDrive {
            coordinate,
            file: file.unwrap_or(DiskFile::AutoDetect),
            cd_type,
        }));
    }

    Ok(devices)
}

/// Materialize every present ethernet adapter.
pub fn scan_ethernet(store: &ConfigStore) -> Vec<EthernetDevice> {
    (0..slots::ETHERNET_COUNT as usize)
        .filter(|index| is_present(store, &ethernet_key(*index, vmx::PRESENT)))
        .map(|index| {
            let network_type = store
                .get(&ethernet_key(index, vmx::CONNECTION_TYPE))
                .map(NetworkType::parse_lenient)
                .unwrap_or_default();
            let address = store
                .get(&ethernet_key(index, vmx::ADDRESS))
                .filter(|a| !a.is_empty())
                .map(str::to_string);
            let device_type = store
                .get(&ethernet_key(index, vmx::VIRTUAL_DEV))
                .and_then(EthernetDeviceType::parse)
                .unwrap_or_default();

            tracing::debug!(index, network = network_type.as_str(), "Found ethernet adapter");
            EthernetDevice {
                network_type,
                address,
                device_type,
            }
        })
        .collect()
}

/// Write the keys of one storage device.
///
/// Raw CD drives are written as legacy drives when `legacy_guest` is set.
pub fn write_disk(
    store: &mut ConfigStore,
    device: &StorageDevice,
    dir: &Path,
    legacy_guest: bool,
) -> VmxResult<()> {
    let coordinate = device.coordinate();

    let (file, device_type) = match device {
        StorageDevice::HardDisk(disk) => {
            let path = disk.file_name().ok_or_else(|| {
                VmxError::InvalidArgument(format!("hard disk at {} has no file name", coordinate))
            })?;
            (
                crate::util::relative_to_dir(path, dir),
                HARD_DISK_DEVICE_TYPE,
            )
        }
        StorageDevice::CdDrive(drive) => {
            let cd_type = match drive.cd_type {
                CdDeviceType::Raw if legacy_guest => CdDeviceType::Legacy,
                other => other,
            };
            (drive.file.to_descriptor_value(dir), cd_type.device_type())
        }
    };

    store.set(coordinate.key(vmx::PRESENT), vmx::TRUE);
    store.set(coordinate.key(vmx::FILE_NAME), file);
    store.set(coordinate.key(vmx::DEVICE_TYPE), device_type);
    Ok(())
}

/// Enable each SCSI controller that has at least one device attached.
pub fn write_controllers<'a, I>(store: &mut ConfigStore, coordinates: I, model: ScsiDeviceType)
where
    I: IntoIterator<Item = &'a SlotCoordinate>,
{
    let buses: HashSet<u16> = coordinates
        .into_iter()
        .filter(|c| c.bus == BusType::Scsi)
        .map(|c| c.bus_number)
        .collect();

    for bus_number in buses {
        store.set(controller_key(bus_number, vmx::PRESENT), vmx::TRUE);
        store.set(controller_key(bus_number, vmx::VIRTUAL_DEV), model.as_str());
    }
}

/// Write ethernet adapters at indices `0..devices.len()`.
///
/// Stale keys must be cleared first with [`remove_ethernet_keys`].
pub fn write_ethernet(store: &mut ConfigStore, devices: &[EthernetDevice]) -> VmxResult<()> {
    if devices.len() > slots::ETHERNET_COUNT as usize {
        return Err(VmxError::InvalidArgument(format!(
            "at most {} ethernet adapters are supported, got {}",
            slots::ETHERNET_COUNT,
            devices.len()
        )));
    }

    for (index, device) in devices.iter().enumerate() {
        store.set(ethernet_key(index, vmx::PRESENT), vmx::TRUE);
        store.set(
            ethernet_key(index, vmx::CONNECTION_TYPE),
            device.network_type.as_str(),
        );
        if let Some(address) = &device.address {
            store.set(ethernet_key(index, vmx::ADDRESS), address.as_str());
        }
        store.set(
            ethernet_key(index, vmx::VIRTUAL_DEV),
            device.device_type.as_str(),
        );
    }
    Ok(())
}

/// Remove every key of the slot at `coordinate`.
pub fn remove_device(store: &mut ConfigStore, coordinate: SlotCoordinate) -> usize {
    store.remove_prefix(&coordinate.base_key())
}

fn has_indexed_prefix(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

/// Remove all `ide<N>…` and `scsi<N>…` keys.
pub fn strip_storage_keys(store: &mut ConfigStore) -> usize {
    store.remove_where(|key| {
        BusType::ALL
            .iter()
            .any(|bus| has_indexed_prefix(key, bus.as_str()))
    })
}

/// Remove all `ethernet<N>.*` keys.
pub fn remove_ethernet_keys(store: &mut ConfigStore) -> usize {
    store.remove_where(|key| has_indexed_prefix(key, ETHERNET_PREFIX))
}

/// Fail if two storage devices share a coordinate.
pub fn check_conflicts<I>(coordinates: I) -> VmxResult<()>
where
    I: IntoIterator<Item = SlotCoordinate>,
{
    let mut seen = HashSet::new();
    for coordinate in coordinates {
        if !seen.insert(coordinate) {
            return Err(VmxError::ConflictingDevice(format!(
                "more than one device at {}",
                coordinate
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"
ide0:0.present = "TRUE"
ide0:0.fileName = "disk0.vmdk"
ide1:0.present = "true"
ide1:0.fileName = "auto detect"
ide1:0.deviceType = "cdrom-raw"
ide1:1.present = "TRUE"
ide1:1.fileName = "/isos/boot.iso"
ide1:1.deviceType = "cdrom-image"
ide0:1.present = "FALSE"
ide0:1.fileName = "ignored.vmdk"
scsi0:2.present = "TRUE"
scsi0:2.deviceType = "floppy-ish"
ethernet0.present = "TRUE"
ethernet0.connectionType = "nat"
ethernet0.virtualDev = "e1000"
ethernet1.present = "TRUE"
ethernet1.connectionType = "custom"
ethernet1.address = "00:50:56:00:00:01"
ethernet3.present = "FALSE"
"#;

    fn slot(bus: BusType, b: u16, d: u16) -> SlotCoordinate {
        SlotCoordinate::new(bus, b, d).unwrap()
    }

    #[test]
    fn test_scan_ide() {
        let store = ConfigStore::from_text(SAMPLE);
        let dir = Path::new("/vms/test");
        let devices = scan_disks(&store, BusType::Ide, dir).unwrap();
        assert_eq!(devices.len(), 3);

        match &devices[0] {
            StorageDevice::HardDisk(disk) => {
                assert_eq!(disk.coordinate, slot(BusType::Ide, 0, 0));
                assert_eq!(disk.file_name(), Some(Path::new("/vms/test/disk0.vmdk")));
            }
            other => panic!("expected hard disk, got {:?}", other),
        }
        match &devices[1] {
            StorageDevice::CdDrive(drive) => {
                assert_eq!(drive.file, DiskFile::AutoDetect);
                assert_eq!(drive.cd_type, CdDeviceType::Raw);
            }
            other => panic!("expected CD drive, got {:?}", other),
        }
        match &devices[2] {
            StorageDevice::CdDrive(drive) => {
                assert_eq!(drive.file, DiskFile::Path(PathBuf::from("/isos/boot.iso")));
                assert_eq!(drive.cd_type, CdDeviceType::Iso);
            }
            other => panic!("expected CD drive, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_device_type_defaults_to_raw() {
        let store = ConfigStore::from_text(SAMPLE);
        let devices = scan_disks(&store, BusType::Scsi, Path::new("/vms")).unwrap();
        assert_eq!(devices.len(), 1);
        match &devices[0] {
            StorageDevice::CdDrive(drive) => {
                assert_eq!(drive.cd_type, CdDeviceType::Raw);
                assert_eq!(drive.file, DiskFile::AutoDetect);
            }
            other => panic!("expected CD drive, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_ethernet() {
        let store = ConfigStore::from_text(SAMPLE);
        let nics = scan_ethernet(&store);
        assert_eq!(nics.len(), 2);
        assert_eq!(nics[0].network_type, NetworkType::Nat);
        assert_eq!(nics[0].device_type, EthernetDeviceType::E1000);
        assert_eq!(nics[1].network_type, NetworkType::Bridged);
        assert_eq!(nics[1].address.as_deref(), Some("00:50:56:00:00:01"));
    }

    #[test]
    fn test_write_cd_drive_legacy_promotion() {
        let mut store = ConfigStore::new();
        let drive = StorageDevice::CdDrive(CdDrive::physical(slot(BusType::Ide, 1, 0)));

        write_disk(&mut store, &drive, Path::new("/vms"), false).unwrap();
        assert_eq!(store.get("ide1:0.deviceType"), Some("cdrom-raw"));
        assert_eq!(store.get("ide1:0.fileName"), Some("auto detect"));

        write_disk(&mut store, &drive, Path::new("/vms"), true).unwrap();
        assert_eq!(store.get("ide1:0.deviceType"), Some("atapi-cdrom"));
        assert_eq!(store.get("ide1:0.present"), Some("TRUE"));
    }

    #[test]
    fn test_write_disk_requires_file_name() {
        let mut store = ConfigStore::new();
        let disk = StorageDevice::HardDisk(HardDisk::new(
            slot(BusType::Ide, 0, 0),
            crate::disk::HardDiskType::SingleSparse,
            1024,
        ));
        let result = write_disk(&mut store, &disk, Path::new("/vms"), false);
        assert!(matches!(result, Err(VmxError::InvalidArgument(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_write_ethernet_sequential() {
        let mut store = ConfigStore::from_text(SAMPLE);
        remove_ethernet_keys(&mut store);
        let nics = vec![
            EthernetDevice::new(NetworkType::HostOnly),
            EthernetDevice {
                network_type: NetworkType::Nat,
                address: Some("00:50:56:aa:bb:cc".into()),
                device_type: EthernetDeviceType::VmxNet,
            },
        ];
        write_ethernet(&mut store, &nics).unwrap();

        assert_eq!(store.get("ethernet0.connectionType"), Some("hostonly"));
        assert_eq!(store.get("ethernet1.address"), Some("00:50:56:aa:bb:cc"));
        assert_eq!(store.get("ethernet1.virtualDev"), Some("vmxnet"));
        assert!(!store.contains_key("ethernet3.present"));
        assert_eq!(scan_ethernet(&store), nics);
    }

    #[test]
    fn test_write_ethernet_limit() {
        let mut store = ConfigStore::new();
        let nics = vec![EthernetDevice::default(); 11];
        assert!(write_ethernet(&mut store, &nics).is_err());
    }

    #[test]
    fn test_remove_device_clears_prefix_only() {
        let mut store = ConfigStore::from_text(SAMPLE);
        let removed = remove_device(&mut store, slot(BusType::Ide, 1, 0));
        assert_eq!(removed, 3);
        assert!(!store.contains_key("ide1:0.present"));
        assert!(store.contains_key("ide1:1.present"));
    }

    #[test]
    fn test_strip_storage_keys() {
        let mut store = ConfigStore::from_text(SAMPLE);
        store.set("scsi0.present", "TRUE");
        store.set("idealKey", "kept");
        strip_storage_keys(&mut store);
        assert!(store.iter().all(|(k, _)| !k.starts_with("ide") || k == "idealKey"));
        assert!(store.iter().all(|(k, _)| !k.starts_with("scsi")));
        assert!(store.contains_key("ethernet0.present"));
    }

    #[test]
    fn test_write_controllers() {
        let mut store = ConfigStore::new();
        let coords = [
            slot(BusType::Scsi, 1, 0),
            slot(BusType::Scsi, 1, 3),
            slot(BusType::Ide, 0, 0),
        ];
        write_controllers(&mut store, &coords, ScsiDeviceType::LsiLogic);
        assert_eq!(store.get("scsi1.present"), Some("TRUE"));
        assert_eq!(store.get("scsi1.virtualDev"), Some("lsilogic"));
        assert!(!store.contains_key("scsi0.present"));
        assert_eq!(scsi_controller(&store, 1), Some(ScsiDeviceType::LsiLogic));
    }

    #[test]
    fn test_check_conflicts() {
        let a = slot(BusType::Ide, 0, 0);
        let b = slot(BusType::Scsi, 0, 0);
        let c = slot(BusType::Ide, 0, 1);
        assert!(check_conflicts([a, b, c]).is_ok());
        assert!(matches!(
            check_conflicts([a, b, a]),
            Err(VmxError::ConflictingDevice(_))
        ));
    }
}
