//! Registry of known machines, persisted as a list of descriptor paths.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use vmxman_shared::errors::{VmxError, VmxResult};

use crate::devices::{BusType, CdDrive, SlotCoordinate};
use crate::disk::Progress;
use crate::guest_os::GuestOsCatalog;
use crate::machine::VirtualMachine;
use crate::runtime::{FilesystemLayout, HomeLock, VmxmanOptions};
use crate::util::write_atomic;

const EVENT_CAPACITY: usize = 64;

/// Notifications published by a [`MachineManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    Added { name: String, path: PathBuf },
    Removed { name: String, path: PathBuf },
}

/// Owns the machines registered in one home directory.
///
/// Holds the home lock for its whole lifetime.
#[derive(Debug)]
pub struct MachineManager {
    layout: FilesystemLayout,
    catalog: Arc<GuestOsCatalog>,
    machines: Vec<VirtualMachine>,
    events: broadcast::Sender<ManagerEvent>,
    _lock: HomeLock,
}

impl MachineManager {
    /// Open the home in `options` with the built-in guest OS catalog.
    pub fn new(options: VmxmanOptions) -> VmxResult<Self> {
        Self::with_catalog(options, Arc::new(GuestOsCatalog::builtin()))
    }

    pub fn with_catalog(options: VmxmanOptions, catalog: Arc<GuestOsCatalog>) -> VmxResult<Self> {
        let layout = FilesystemLayout::new(options.home_dir);
        layout.prepare()?;
        let lock = HomeLock::acquire(layout.home_dir())?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut manager = Self {
            layout,
            catalog,
            machines: Vec::new(),
            events,
            _lock: lock,
        };
        manager.load_registry()?;

        tracing::info!(
            home = %manager.layout.home_dir().display(),
            machines = manager.machines.len(),
            "Opened machine registry"
        );
        Ok(manager)
    }

    fn load_registry(&mut self) -> VmxResult<()> {
        let path = self.layout.registry_path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(VmxError::storage("read", &path, e)),
        };

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match VirtualMachine::load(Path::new(line), self.catalog.clone()) {
                Ok(vm) => self.machines.push(vm),
                Err(e) => {
                    tracing::warn!(path = line, error = %e, "Dropping machine that failed to load")
                }
            }
        }
        Ok(())
    }

    fn save_registry(&self) -> VmxResult<()> {
        let paths: Vec<&Path> = self.machines.iter().map(VirtualMachine::path).collect();
        write_atomic(&self.layout.registry_path(), |w| {
            for path in &paths {
                writeln!(w, "{}", path.display())?;
            }
            Ok(())
        })
    }

    pub fn layout(&self) -> &FilesystemLayout {
        &self.layout
    }

    pub fn catalog(&self) -> &Arc<GuestOsCatalog> {
        &self.catalog
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    pub fn machines(&self) -> &[VirtualMachine] {
        &self.machines
    }

    fn position(&self, name: &str) -> VmxResult<usize> {
        self.machines
            .iter()
            .position(|vm| vm.name() == name)
            .ok_or_else(|| VmxError::NotFound(format!("machine '{}'", name)))
    }

    pub fn get_machine(&self, name: &str) -> VmxResult<&VirtualMachine> {
        Ok(&self.machines[self.position(name)?])
    }

    pub fn get_machine_mut(&mut self, name: &str) -> VmxResult<&mut VirtualMachine> {
        let index = self.position(name)?;
        Ok(&mut self.machines[index])
    }

    /// Register `vm`. Returns `false` if its descriptor was already registered.
    pub fn add_machine(&mut self, vm: VirtualMachine) -> VmxResult<bool> {
        if self.machines.iter().any(|m| m.path() == vm.path()) {
            tracing::debug!(path = %vm.path().display(), "Machine already registered");
            return Ok(false);
        }

        let event = ManagerEvent::Added {
            name: vm.name().to_string(),
            path: vm.path().to_path_buf(),
        };
        self.machines.push(vm);
        if let Err(e) = self.save_registry() {
            self.machines.pop();
            return Err(e);
        }

        tracing::info!(?event, "Registered machine");
        let _ = self.events.send(event);
        Ok(true)
    }

    /// Unregister the machine called `name`, optionally deleting its files.
    ///
    /// Running machines cannot have their files deleted.
    pub fn remove_machine(&mut self, name: &str, delete_files: bool) -> VmxResult<VirtualMachine> {
        let index = self.position(name)?;
        if delete_files && self.machines[index].refresh_status().is_running() {
            return Err(VmxError::InvalidArgument(format!(
                "machine '{}' is running",
                name
            )));
        }

        let vm = self.machines.remove(index);
        self.save_registry()?;
        if delete_files {
            vm.delete()?;
            let dir = vm.dir();
            // Only drop the directory if nothing else lives there.
            if dir.starts_with(self.layout.machines_dir()) && std::fs::remove_dir(dir).is_ok() {
                tracing::debug!(dir = %dir.display(), "Removed machine directory");
            }
        }

        tracing::info!(name, delete_files, "Unregistered machine");
        let _ = self.events.send(ManagerEvent::Removed {
            name: name.to_string(),
            path: vm.path().to_path_buf(),
        });
        Ok(vm)
    }

    fn validate_new_name(&self, name: &str) -> VmxResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(VmxError::InvalidArgument(format!(
                "invalid machine name '{}'",
                name
            )));
        }
        if self.machines.iter().any(|vm| vm.name() == name) {
            return Err(VmxError::InvalidArgument(format!(
                "machine '{}' already exists",
                name
            )));
        }

        let path = self.layout.machine_descriptor(name);
        if path.exists() {
            return Err(VmxError::InvalidArgument(format!(
                "descriptor {} already exists",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Create, save and register an empty machine.
    pub fn create_machine(&mut self, name: &str) -> VmxResult<&mut VirtualMachine> {
        let path = self.validate_new_name(name)?;
        let mut vm = VirtualMachine::create(&path, name, self.catalog.clone())?;
        vm.save(&mut Progress::none())?;
        self.register_new(vm)
    }

    /// Create a machine that boots from `iso`.
    ///
    /// The name defaults to the image's file stem. The image is attached to
    /// the secondary IDE master.
    pub fn create_machine_from_iso(
        &mut self,
        iso: &Path,
        name: Option<&str>,
    ) -> VmxResult<&mut VirtualMachine> {
        let iso = std::path::absolute(iso).map_err(|e| VmxError::storage("resolve", iso, e))?;
        if !iso.is_file() {
            return Err(VmxError::NotFound(format!("ISO image {}", iso.display())));
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => iso
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| VmxError::InvalidArgument(format!("cannot name a machine after {}", iso.display())))?,
        };

        let path = self.validate_new_name(&name)?;
        let mut vm = VirtualMachine::create(&path, &name, self.catalog.clone())?;
        vm.add_cd_drive(CdDrive::iso(SlotCoordinate::new(BusType::Ide, 1, 0)?, iso));
        vm.save(&mut Progress::none())?;
        self.register_new(vm)
    }

    fn register_new(&mut self, vm: VirtualMachine) -> VmxResult<&mut VirtualMachine> {
        let name = vm.name().to_string();
        self.add_machine(vm)?;
        self.get_machine_mut(&name)
    }

    /// Recompute the status of every machine.
    pub fn refresh_statuses(&self) {
        for vm in &self.machines {
            vm.refresh_status();
        }
    }
}
