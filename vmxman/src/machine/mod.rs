//! Virtual machine aggregate.
//!
//! A [`VirtualMachine`] ties a descriptor's [`ConfigStore`] to the typed
//! devices read from it and the disk images they point at.
//!
//! Mutation happens through `&mut self` on the owning thread. Status is kept
//! in shared state so other threads can observe it through a
//! [`StatusHandle`] or by subscribing to [`MachineEvent`]s.

mod state;
mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use vmxman_shared::constants::{companions, slots, vmx};
use vmxman_shared::errors::{VmxError, VmxResult};

pub use state::{MachineEvent, MachineState, MachineStatus, StatusHandle};
pub use watcher::StatusWatcher;

use crate::config::{ConfigStore, DEFAULT_DESCRIPTOR};
use crate::devices::registry;
use crate::devices::{
    BusType, CdDrive, Device, EthernetDevice, HardDisk, ScsiDeviceType, SlotCoordinate,
    StorageDevice,
};
use crate::disk::{AdapterType, Progress};
use crate::guest_os::{GuestOs, GuestOsCatalog};
use crate::util::{normalize_lexically, remove_if_exists, resolve_in};

const EVENT_CAPACITY: usize = 64;
const DEFAULT_GUEST_OS: &str = "other";

/// One machine descriptor and everything it references.
#[derive(Debug)]
pub struct VirtualMachine {
    path: PathBuf,
    store: ConfigStore,
    hard_disks: Vec<HardDisk>,
    cd_drives: Vec<CdDrive>,
    ethernet: Vec<EthernetDevice>,
    catalog: Arc<GuestOsCatalog>,
    state: Arc<RwLock<MachineState>>,
    events: broadcast::Sender<MachineEvent>,
}

fn absolute(path: &Path) -> VmxResult<PathBuf> {
    let path = std::path::absolute(path)
        .map_err(|e| VmxError::storage("resolve", path, e))?;
    Ok(normalize_lexically(&path))
}

impl VirtualMachine {
    /// A new machine at `path` built from the default descriptor.
    ///
    /// Nothing is written until [`save`](Self::save).
    pub fn create(path: &Path, name: &str, catalog: Arc<GuestOsCatalog>) -> VmxResult<Self> {
        let store = ConfigStore::from_text(DEFAULT_DESCRIPTOR);
        let mut machine = Self::from_store(absolute(path)?, store, catalog)?;
        machine.set_name(name);

        tracing::info!(path = %machine.path.display(), name, "Created machine from defaults");
        Ok(machine)
    }

    /// Read an existing descriptor.
    pub fn load(path: &Path, catalog: Arc<GuestOsCatalog>) -> VmxResult<Self> {
        let path = absolute(path)?;
        let mut store = ConfigStore::new();
        store.load_file(&path)?;

        let machine = Self::from_store(path, store, catalog)?;
        tracing::info!(
            path = %machine.path.display(),
            disks = machine.hard_disks.len(),
            cd_drives = machine.cd_drives.len(),
            nics = machine.ethernet.len(),
            "Loaded machine"
        );
        Ok(machine)
    }

    fn from_store(path: PathBuf, store: ConfigStore, catalog: Arc<GuestOsCatalog>) -> VmxResult<Self> {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut hard_disks = Vec::new();
        let mut cd_drives = Vec::new();
        for bus in BusType::ALL {
            for device in registry::scan_disks(&store, bus, &dir)? {
                match device {
                    StorageDevice::HardDisk(disk) => hard_disks.push(disk),
                    StorageDevice::CdDrive(drive) => cd_drives.push(drive),
                }
            }
        }
        let ethernet = registry::scan_ethernet(&store);

        let name = store.get(vmx::DISPLAY_NAME).unwrap_or_default().to_string();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let machine = Self {
            path,
            store,
            hard_disks,
            cd_drives,
            ethernet,
            catalog,
            state: Arc::new(RwLock::new(MachineState::new(name, MachineStatus::Off))),
            events,
        };
        machine.refresh_status();
        Ok(machine)
    }

    /// Descriptor path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the descriptor and its companion files.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn sibling(&self, extension: &str) -> PathBuf {
        self.dir().join(format!("{}.{}", self.stem(), extension))
    }

    /// Exists while a player has the machine open.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(companions::LOCK_SUFFIX);
        PathBuf::from(name)
    }

    /// Suspend-state file; exists while the machine is suspended.
    pub fn checkpoint_path(&self) -> PathBuf {
        match self.store.get(vmx::CHECKPOINT_STATE) {
            Some(value) if !value.is_empty() => resolve_in(self.dir(), Path::new(value)),
            _ => self.sibling(companions::CHECKPOINT_EXTENSION),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir().join(companions::LOG_FILE)
    }

    // Typed accessors

    pub fn name(&self) -> &str {
        self.store.get(vmx::DISPLAY_NAME).unwrap_or_default()
    }

    pub fn set_name(&mut self, name: &str) {
        self.store.set(vmx::DISPLAY_NAME, name);
        self.state.write().set_name(name);
    }

    /// Guest memory in MB.
    pub fn memory_size(&self) -> Option<u32> {
        let value = self.store.get(vmx::MEMSIZE)?;
        match value.parse() {
            Ok(mb) => Some(mb),
            Err(_) => {
                tracing::warn!(value, "Ignoring invalid memsize");
                None
            }
        }
    }

    pub fn set_memory_size(&mut self, mb: u32) {
        self.store.set(vmx::MEMSIZE, mb.to_string());
    }

    pub fn guest_os_name(&self) -> &str {
        self.store.get(vmx::GUEST_OS).unwrap_or(DEFAULT_GUEST_OS)
    }

    pub fn operating_system(&self) -> VmxResult<&GuestOs> {
        self.catalog.lookup(self.guest_os_name())
    }

    /// Set the guest OS; unknown identifiers are rejected.
    pub fn set_operating_system(&mut self, name: &str) -> VmxResult<()> {
        self.catalog.lookup(name)?;
        self.store.set(vmx::GUEST_OS, name);
        Ok(())
    }

    pub fn sound_enabled(&self) -> bool {
        self.store.get_bool(vmx::SOUND_PRESENT).unwrap_or(false)
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.store.set_bool(vmx::SOUND_PRESENT, enabled);
    }

    pub fn usb_enabled(&self) -> bool {
        self.store.get_bool(vmx::USB_PRESENT).unwrap_or(false)
    }

    pub fn set_usb_enabled(&mut self, enabled: bool) {
        self.store.set_bool(vmx::USB_PRESENT, enabled);
    }

    /// Raw descriptor value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.store.get(key)
    }

    /// Raw descriptor write. Device keys are regenerated on save.
    pub fn set(&mut self, key: &str, value: &str) {
        self.store.set(key, value);
    }

    pub fn config(&self) -> &ConfigStore {
        &self.store
    }

    // Devices

    pub fn hard_disks(&self) -> &[HardDisk] {
        &self.hard_disks
    }

    pub fn hard_disks_mut(&mut self) -> &mut [HardDisk] {
        &mut self.hard_disks
    }

    pub fn cd_drives(&self) -> &[CdDrive] {
        &self.cd_drives
    }

    pub fn ethernet_devices(&self) -> &[EthernetDevice] {
        &self.ethernet
    }

    /// Every device, storage first in slot order, then ethernet.
    pub fn devices(&self) -> Vec<Device<'_>> {
        let mut storage: Vec<Device<'_>> = self
            .hard_disks
            .iter()
            .map(Device::HardDisk)
            .chain(self.cd_drives.iter().map(Device::CdDrive))
            .collect();
        storage.sort_by_key(|d| d.coordinate());
        storage.extend(self.ethernet.iter().map(Device::Ethernet));
        storage
    }

    fn storage_coordinates(&self) -> impl Iterator<Item = SlotCoordinate> + '_ {
        self.hard_disks
            .iter()
            .map(|d| d.coordinate)
            .chain(self.cd_drives.iter().map(|d| d.coordinate))
    }

    /// First unused slot on `bus`.
    pub fn find_free_slot(&self, bus: BusType) -> Option<SlotCoordinate> {
        let used: Vec<_> = self.storage_coordinates().collect();
        SlotCoordinate::all(bus).find(|slot| !used.contains(slot))
    }

    /// Attach a hard disk. Slot conflicts are reported by [`save`](Self::save).
    pub fn add_hard_disk(&mut self, disk: HardDisk) {
        tracing::debug!(slot = %disk.coordinate, "Adding hard disk");
        self.hard_disks.push(disk);
    }

    /// Attach a CD drive. Slot conflicts are reported by [`save`](Self::save).
    pub fn add_cd_drive(&mut self, drive: CdDrive) {
        tracing::debug!(slot = %drive.coordinate, "Adding CD drive");
        self.cd_drives.push(drive);
    }

    pub fn add_ethernet(&mut self, device: EthernetDevice) -> VmxResult<()> {
        if self.ethernet.len() >= slots::ETHERNET_COUNT as usize {
            return Err(VmxError::InvalidArgument(format!(
                "machine already has {} ethernet adapters",
                slots::ETHERNET_COUNT
            )));
        }
        self.ethernet.push(device);
        Ok(())
    }

    /// Detach whatever occupies `coordinate` and drop its descriptor keys.
    ///
    /// Backing files are left alone.
    pub fn remove_storage(&mut self, coordinate: SlotCoordinate) -> Option<StorageDevice> {
        registry::remove_device(&mut self.store, coordinate);

        if let Some(index) = self.hard_disks.iter().position(|d| d.coordinate == coordinate) {
            return Some(StorageDevice::HardDisk(self.hard_disks.remove(index)));
        }
        if let Some(index) = self.cd_drives.iter().position(|d| d.coordinate == coordinate) {
            return Some(StorageDevice::CdDrive(self.cd_drives.remove(index)));
        }
        None
    }

    /// Detach the hard disk at position `index` in [`hard_disks`](Self::hard_disks).
    ///
    /// Unlike [`remove_storage`](Self::remove_storage) this picks one device
    /// even when several share a slot. Backing files are left alone.
    pub fn remove_hard_disk(&mut self, index: usize) -> Option<HardDisk> {
        (index < self.hard_disks.len()).then(|| self.hard_disks.remove(index))
    }

    /// Detach the adapter at `index`; later adapters shift down on save.
    pub fn remove_ethernet(&mut self, index: usize) -> Option<EthernetDevice> {
        (index < self.ethernet.len()).then(|| self.ethernet.remove(index))
    }

    // Status

    pub fn status(&self) -> MachineStatus {
        self.state.read().status
    }

    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle::new(self.state.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MachineEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: MachineEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Recompute status from companion files, publishing a change event.
    pub fn refresh_status(&self) -> MachineStatus {
        let status = MachineStatus::derive(self.lock_path().exists(), self.checkpoint_path().exists());
        let previous = self.state.write().set_status(status);

        if let Some(from) = previous {
            tracing::info!(path = %self.path.display(), %from, to = %status, "Machine status changed");
            self.publish(MachineEvent::StatusChanged {
                path: self.path.clone(),
                from,
                to: status,
            });
        }
        status
    }

    // Persistence

    fn guest_hints(&self) -> (bool, ScsiDeviceType) {
        match self.operating_system() {
            Ok(os) => (os.is_legacy, os.suggested_scsi),
            Err(_) => {
                tracing::warn!(guest_os = self.guest_os_name(), "Unknown guest OS, assuming a modern guest");
                (false, ScsiDeviceType::default())
            }
        }
    }

    fn next_disk_path(&self, taken: &[PathBuf]) -> PathBuf {
        (0u32..)
            .map(|n| self.dir().join(format!("disk{}.vmdk", n)))
            .find(|candidate| !candidate.exists() && !taken.contains(candidate))
            .unwrap_or_else(|| self.dir().join("disk.vmdk"))
    }

    /// Give every file-less hard disk a fresh `disk<N>.vmdk` name.
    fn assign_disk_names(&mut self) -> VmxResult<()> {
        let mut taken: Vec<PathBuf> = self
            .hard_disks
            .iter()
            .filter_map(|d| d.file_name().map(Path::to_path_buf))
            .collect();

        for index in 0..self.hard_disks.len() {
            if self.hard_disks[index].file_name().is_some() {
                continue;
            }
            let path = self.next_disk_path(&taken);
            tracing::debug!(slot = %self.hard_disks[index].coordinate, path = %path.display(), "Assigned disk file");
            self.hard_disks[index].image.set_path(path.clone())?;
            taken.push(path);
        }
        Ok(())
    }

    /// Write the descriptor, creating any missing disk images first.
    ///
    /// Slot conflicts are rejected before anything touches the filesystem.
    /// Disk creation progress is spread evenly over the disks being created.
    pub fn save(&mut self, progress: &mut Progress<'_>) -> VmxResult<()> {
        registry::check_conflicts(self.storage_coordinates())?;

        let dir = self.dir().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| VmxError::storage("create directory", &dir, e))?;

        let stem = self.stem();
        if !self.store.contains_key(vmx::NVRAM) {
            self.store.set(vmx::NVRAM, format!("{}.{}", stem, companions::NVRAM_EXTENSION));
        }
        if !self.store.contains_key(vmx::CHECKPOINT_STATE) {
            self.store.set(
                vmx::CHECKPOINT_STATE,
                format!("{}.{}", stem, companions::CHECKPOINT_EXTENSION),
            );
        }

        let (legacy_guest, scsi_model) = self.guest_hints();
        registry::strip_storage_keys(&mut self.store);

        self.assign_disk_names()?;
        let mut pending = Vec::new();
        for (index, disk) in self.hard_disks.iter().enumerate() {
            if disk.image.exists() {
                continue;
            }
            if disk.image.capacity() == 0 {
                // Size unknown: the slot keeps pointing at the missing file.
                tracing::warn!(
                    slot = %disk.coordinate,
                    path = ?disk.file_name(),
                    "Disk file is missing and its size is unknown, not recreating"
                );
                continue;
            }
            pending.push(index);
        }
        for (slice, index) in pending.iter().enumerate() {
            let disk = &mut self.hard_disks[*index];
            if disk.coordinate.bus == BusType::Scsi {
                disk.image
                    .set_adapter(AdapterType::for_bus(BusType::Scsi, scsi_model));
            }
            let mut sub = progress.slice(slice, pending.len());
            disk.image.create(&mut sub)?;
        }

        let storage: Vec<StorageDevice> = self
            .hard_disks
            .iter()
            .cloned()
            .map(StorageDevice::HardDisk)
            .chain(self.cd_drives.iter().cloned().map(StorageDevice::CdDrive))
            .collect();
        for device in &storage {
            registry::write_disk(&mut self.store, device, &dir, legacy_guest)?;
        }
        let coordinates: Vec<SlotCoordinate> = storage.iter().map(StorageDevice::coordinate).collect();
        registry::write_controllers(&mut self.store, &coordinates, scsi_model);

        registry::remove_ethernet_keys(&mut self.store);
        registry::write_ethernet(&mut self.store, &self.ethernet)?;

        self.store.save_file(&self.path)?;
        tracing::info!(path = %self.path.display(), keys = self.store.len(), "Saved machine");

        self.publish(MachineEvent::Saved {
            path: self.path.clone(),
        });
        self.refresh_status();
        Ok(())
    }

    /// Remove the descriptor, every disk image and the companion files.
    ///
    /// Files that are already gone are skipped.
    pub fn delete(&self) -> VmxResult<()> {
        for disk in &self.hard_disks {
            disk.image.delete()?;
        }

        let companions = [
            self.lock_path(),
            self.checkpoint_path(),
            self.log_path(),
            self.sibling(companions::SNAPSHOT_EXTENSION),
            self.sibling(companions::MEMORY_EXTENSION),
        ];
        for path in &companions {
            remove_if_exists(path)?;
        }
        remove_if_exists(&self.path)?;

        tracing::info!(path = %self.path.display(), "Deleted machine");
        self.publish(MachineEvent::Deleted {
            path: self.path.clone(),
        });
        Ok(())
    }

    /// Serializable snapshot for listings.
    pub fn summary(&self) -> MachineSummary {
        let devices = self
            .devices()
            .into_iter()
            .map(|device| DeviceSummary::from_device(&device))
            .collect();

        MachineSummary {
            name: self.name().to_string(),
            path: self.path.clone(),
            status: self.status(),
            guest_os: self.guest_os_name().to_string(),
            memory_mb: self.memory_size(),
            sound: self.sound_enabled(),
            usb: self.usb_enabled(),
            devices,
        }
    }
}

/// Listing view of a machine.
#[derive(Debug, Clone, Serialize)]
pub struct MachineSummary {
    pub name: String,
    pub path: PathBuf,
    pub status: MachineStatus,
    pub guest_os: String,
    pub memory_mb: Option<u32>,
    pub sound: bool,
    pub usb: bool,
    pub devices: Vec<DeviceSummary>,
}

/// Listing view of one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    /// Storage slot such as `ide0:0`; absent for ethernet adapters.
    pub slot: Option<String>,
    pub file: Option<String>,
    pub capacity_bytes: Option<u64>,
    pub disk_type: Option<String>,
}

impl DeviceSummary {
    fn from_device(device: &Device<'_>) -> Self {
        let (file, capacity_bytes, disk_type) = match device {
            Device::HardDisk(disk) => (
                disk.file_name().map(|p| p.display().to_string()),
                Some(disk.capacity()),
                Some(disk.disk_type().to_string()),
            ),
            Device::CdDrive(drive) => (Some(drive.file.to_string()), None, None),
            Device::Ethernet(nic) => (nic.address.clone(), None, None),
        };

        Self {
            name: device.display_name(),
            slot: device.coordinate().map(|c| c.to_string()),
            file,
            capacity_bytes,
            disk_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::NetworkType;
    use crate::disk::HardDiskType;
    use tempfile::TempDir;

    fn catalog() -> Arc<GuestOsCatalog> {
        Arc::new(GuestOsCatalog::builtin())
    }

    fn slot(bus: BusType, b: u16, d: u16) -> SlotCoordinate {
        SlotCoordinate::new(bus, b, d).unwrap()
    }

    #[test]
    fn test_create_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let vm = VirtualMachine::create(&temp_dir.path().join("a/a.vmx"), "Alpha", catalog()).unwrap();

        assert_eq!(vm.name(), "Alpha");
        assert_eq!(vm.memory_size(), Some(256));
        assert_eq!(vm.guest_os_name(), "other");
        assert!(vm.usb_enabled());
        assert_eq!(vm.ethernet_devices().len(), 1);
        assert_eq!(vm.ethernet_devices()[0].network_type, NetworkType::Nat);
        assert!(vm.hard_disks().is_empty());
        assert_eq!(vm.status(), MachineStatus::Off);
        assert!(!vm.path().exists());
    }

    #[test]
    fn test_save_writes_sorted_descriptor_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("b/b.vmx");
        let mut vm = VirtualMachine::create(&path, "Beta", catalog()).unwrap();
        vm.add_cd_drive(CdDrive::physical(slot(BusType::Ide, 1, 0)));
        vm.save(&mut Progress::none()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let keys: Vec<&str> = text.lines().map(|l| l.split(" = ").next().unwrap()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        assert!(text.contains("nvram = \"b.nvram\"\n"));
        assert!(text.contains("checkpoint.vmState = \"b.vmss\"\n"));
        assert!(text.contains("ide1:0.deviceType = \"cdrom-raw\"\n"));
        assert!(text.contains("ide1:0.fileName = \"auto detect\"\n"));
    }

    #[test]
    fn test_legacy_guest_promotes_raw_cd() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("old.vmx");
        let mut vm = VirtualMachine::create(&path, "Old", catalog()).unwrap();
        vm.set_operating_system("win98").unwrap();
        vm.add_cd_drive(CdDrive::physical(slot(BusType::Ide, 1, 0)));
        vm.save(&mut Progress::none()).unwrap();

        assert_eq!(vm.get("ide1:0.deviceType"), Some("atapi-cdrom"));
        let reloaded = VirtualMachine::load(&path, catalog()).unwrap();
        assert_eq!(
            reloaded.cd_drives()[0].cd_type,
            crate::devices::CdDeviceType::Legacy
        );
    }

    #[test]
    fn test_unknown_guest_os_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut vm = VirtualMachine::create(&temp_dir.path().join("c.vmx"), "C", catalog()).unwrap();
        assert!(matches!(
            vm.set_operating_system("plan9"),
            Err(VmxError::NotFound(_))
        ));
        assert_eq!(vm.guest_os_name(), "other");
    }

    #[test]
    fn test_conflict_blocks_save_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("d/d.vmx");
        let mut vm = VirtualMachine::create(&path, "D", catalog()).unwrap();
        let at = slot(BusType::Ide, 0, 0);
        vm.add_hard_disk(HardDisk::new(at, HardDiskType::SingleSparse, 1024 * 1024));
        vm.add_cd_drive(CdDrive::physical(at));

        let result = vm.save(&mut Progress::none());
        assert!(matches!(result, Err(VmxError::ConflictingDevice(_))));
        assert!(!temp_dir.path().join("d").exists());
    }

    #[test]
    fn test_remove_hard_disk_by_index_keeps_slot_sibling() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("g/g.vmx");
        let mut vm = VirtualMachine::create(&path, "G", catalog()).unwrap();
        let at = slot(BusType::Ide, 0, 0);
        vm.add_hard_disk(HardDisk::new(at, HardDiskType::SingleSparse, 1 << 20));
        vm.save(&mut Progress::none()).unwrap();

        vm.add_hard_disk(HardDisk::new(at, HardDiskType::SingleFlat, 2 << 20));
        assert!(vm.save(&mut Progress::none()).is_err());

        let removed = vm.remove_hard_disk(1).unwrap();
        assert_eq!(removed.disk_type(), HardDiskType::SingleFlat);
        assert_eq!(vm.hard_disks().len(), 1);
        assert_eq!(vm.hard_disks()[0].disk_type(), HardDiskType::SingleSparse);
        assert!(vm.remove_hard_disk(1).is_none());

        vm.save(&mut Progress::none()).unwrap();
        assert_eq!(vm.get("ide0:0.fileName"), Some("disk0.vmdk"));
    }

    #[test]
    fn test_disk_names_skip_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("disk0.vmdk"), b"not ours").unwrap();

        let mut vm = VirtualMachine::create(&temp_dir.path().join("e.vmx"), "E", catalog()).unwrap();
        vm.add_hard_disk(HardDisk::new(slot(BusType::Ide, 0, 0), HardDiskType::SingleSparse, 1 << 20));
        vm.add_hard_disk(HardDisk::new(slot(BusType::Ide, 0, 1), HardDiskType::SingleSparse, 1 << 20));
        vm.save(&mut Progress::none()).unwrap();

        assert_eq!(vm.get("ide0:0.fileName"), Some("disk1.vmdk"));
        assert_eq!(vm.get("ide0:1.fileName"), Some("disk2.vmdk"));
    }

    #[test]
    fn test_scsi_disk_gets_controller_from_guest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("f.vmx");
        let mut vm = VirtualMachine::create(&path, "F", catalog()).unwrap();
        vm.set_operating_system("ubuntu").unwrap();
        vm.add_hard_disk(HardDisk::new(slot(BusType::Scsi, 0, 0), HardDiskType::SingleSparse, 1 << 20));
        vm.save(&mut Progress::none()).unwrap();

        assert_eq!(vm.get("scsi0.present"), Some("TRUE"));
        assert_eq!(vm.get("scsi0.virtualDev"), Some("lsilogic"));
        assert_eq!(vm.hard_disks()[0].image.adapter(), AdapterType::LsiLogic);
    }

    #[test]
    fn test_remove_storage_and_ethernet() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("g.vmx");
        let mut vm = VirtualMachine::create(&path, "G", catalog()).unwrap();
        vm.add_cd_drive(CdDrive::physical(slot(BusType::Ide, 1, 0)));
        vm.add_ethernet(EthernetDevice::new(NetworkType::HostOnly)).unwrap();
        vm.save(&mut Progress::none()).unwrap();
        assert!(vm.get("ethernet1.present").is_some());

        assert!(vm.remove_storage(slot(BusType::Ide, 1, 0)).is_some());
        assert!(vm.remove_storage(slot(BusType::Ide, 1, 0)).is_none());
        assert!(vm.get("ide1:0.present").is_none());

        let removed = vm.remove_ethernet(0).unwrap();
        assert_eq!(removed.network_type, NetworkType::Nat);
        assert!(vm.remove_ethernet(5).is_none());
        vm.save(&mut Progress::none()).unwrap();

        let reloaded = VirtualMachine::load(&path, catalog()).unwrap();
        assert!(reloaded.cd_drives().is_empty());
        assert_eq!(reloaded.ethernet_devices().len(), 1);
        assert_eq!(reloaded.ethernet_devices()[0].network_type, NetworkType::HostOnly);
        assert!(reloaded.get("ethernet1.present").is_none());
    }

    #[test]
    fn test_find_free_slot() {
        let temp_dir = TempDir::new().unwrap();
        let mut vm = VirtualMachine::create(&temp_dir.path().join("h.vmx"), "H", catalog()).unwrap();
        assert_eq!(vm.find_free_slot(BusType::Ide), Some(slot(BusType::Ide, 0, 0)));
        vm.add_cd_drive(CdDrive::physical(slot(BusType::Ide, 0, 0)));
        assert_eq!(vm.find_free_slot(BusType::Ide), Some(slot(BusType::Ide, 0, 1)));
    }

    #[test]
    fn test_summary_lists_devices_in_slot_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut vm = VirtualMachine::create(&temp_dir.path().join("i.vmx"), "I", catalog()).unwrap();
        vm.add_cd_drive(CdDrive::physical(slot(BusType::Ide, 1, 0)));
        vm.add_hard_disk(HardDisk::new(slot(BusType::Ide, 0, 0), HardDiskType::SingleFlat, 1 << 20));

        let summary = vm.summary();
        assert_eq!(summary.name, "I");
        assert_eq!(summary.devices.len(), 3);
        assert_eq!(summary.devices[0].slot.as_deref(), Some("ide0:0"));
        assert_eq!(summary.devices[0].capacity_bytes, Some(1 << 20));
        assert_eq!(summary.devices[1].name, "CD-ROM (Physical)");
        assert_eq!(summary.devices[2].name, "Ethernet (NAT)");
        assert!(serde_json::to_string(&summary).is_ok());
    }

    #[test]
    fn test_status_events() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("j.vmx");
        let mut vm = VirtualMachine::create(&path, "J", catalog()).unwrap();
        vm.save(&mut Progress::none()).unwrap();

        let mut events = vm.subscribe();
        let handle = vm.status_handle();

        std::fs::write(vm.lock_path(), b"").unwrap();
        assert_eq!(vm.refresh_status(), MachineStatus::Running);
        assert_eq!(handle.status(), MachineStatus::Running);
        assert_eq!(
            events.try_recv().unwrap(),
            MachineEvent::StatusChanged {
                path: vm.path().to_path_buf(),
                from: MachineStatus::Off,
                to: MachineStatus::Running,
            }
        );

        // No change, no event
        vm.refresh_status();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_delete_removes_owned_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("k.vmx");
        let mut vm = VirtualMachine::create(&path, "K", catalog()).unwrap();
        vm.add_hard_disk(HardDisk::new(slot(BusType::Ide, 0, 0), HardDiskType::SplitSparse, 1 << 20));
        vm.save(&mut Progress::none()).unwrap();

        std::fs::write(vm.log_path(), b"log").unwrap();
        std::fs::write(temp_dir.path().join("k.vmsd"), b"").unwrap();
        std::fs::write(temp_dir.path().join("k.vmem"), b"").unwrap();
        std::fs::write(temp_dir.path().join("unrelated.txt"), b"").unwrap();

        vm.delete().unwrap();

        let left: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["unrelated.txt".to_string()]);
    }
}
