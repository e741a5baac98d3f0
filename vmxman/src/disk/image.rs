//! Hard disk image engine.
//!
//! A [`HardDiskImage`] owns one descriptor file plus the extent files it
//! lists. Extents live next to the descriptor and are named
//! `<stem>-<n>.vmdk` with `n` counting from 1.

use std::io::Write;
use std::path::{Path, PathBuf};

use vmxman_shared::errors::{VmxError, VmxResult};

use super::constants::{EXTENSION, GRAIN_SIZE, SECTOR_SIZE, SPLIT_EXTENT_SECTORS};
use super::descriptor::{AdapterType, DiskDescriptor, HardDiskType};
use super::extent::{Extent, ExtentAccess, ExtentType};
use super::geometry::Geometry;
use super::progress::Progress;
use crate::util::{available_space, remove_if_exists, write_atomic};

/// Split `total_sectors` into extent sizes.
///
/// Split disks get full 2GB extents followed by one smaller extent holding
/// any remainder. Single disks get one extent.
pub fn plan_extent_sizes(total_sectors: u64, split: bool) -> Vec<u64> {
    if total_sectors == 0 {
        return Vec::new();
    }
    if !split {
        return vec![total_sectors];
    }

    let full = total_sectors / SPLIT_EXTENT_SECTORS;
    let remainder = total_sectors % SPLIT_EXTENT_SECTORS;

    let mut sizes = vec![SPLIT_EXTENT_SECTORS; full as usize];
    if remainder > 0 {
        sizes.push(remainder);
    }
    sizes
}

/// File name of extent `index` (1-based) of the disk described by `descriptor`.
pub fn extent_file_name(descriptor: &Path, index: usize) -> String {
    let stem = descriptor
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "disk".to_string());
    format!("{}-{}.{}", stem, index, EXTENSION)
}

/// A virtual hard disk: descriptor, extents and geometry.
#[derive(Debug, Clone)]
pub struct HardDiskImage {
    path: Option<PathBuf>,
    disk_type: HardDiskType,
    adapter: AdapterType,
    /// Explicitly requested size in bytes.
    capacity: Option<u64>,
    /// Geometry read from an existing descriptor.
    geometry: Geometry,
    extents: Vec<Extent>,
    cid: Option<u32>,
}

impl HardDiskImage {
    /// A disk not yet backed by any file.
    pub fn new(disk_type: HardDiskType, adapter: AdapterType, capacity_bytes: u64) -> Self {
        Self {
            path: None,
            disk_type,
            adapter,
            capacity: Some(capacity_bytes),
            geometry: Geometry::default(),
            extents: Vec::new(),
            cid: None,
        }
    }

    /// A disk whose descriptor lives at `path` but has not been read.
    ///
    /// Used for slots pointing at files that may not exist.
    pub fn unloaded(path: PathBuf, adapter: AdapterType) -> Self {
        Self {
            path: Some(path),
            disk_type: HardDiskType::SingleSparse,
            adapter,
            capacity: None,
            geometry: Geometry::default(),
            extents: Vec::new(),
            cid: None,
        }
    }

    /// Read an existing disk from its descriptor.
    pub fn open(path: &Path) -> VmxResult<Self> {
        let descriptor = DiskDescriptor::read_from(path)?;
        let disk_type = descriptor.disk_type.unwrap_or_else(|| {
            tracing::warn!(path = %path.display(), "Descriptor has no known createType, assuming single sparse");
            HardDiskType::SingleSparse
        });

        tracing::debug!(
            path = %path.display(),
            disk_type = disk_type.as_str(),
            extents = descriptor.extents.len(),
            "Opened disk image"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            disk_type,
            adapter: descriptor.adapter,
            capacity: None,
            geometry: descriptor.geometry,
            extents: descriptor.extents,
            cid: Some(descriptor.cid),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: PathBuf) -> VmxResult<()> {
        self.ensure_not_created("move")?;
        self.path = Some(path);
        Ok(())
    }

    /// Whether the descriptor file exists on disk.
    pub fn exists(&self) -> bool {
        self.path.as_deref().is_some_and(Path::exists)
    }

    fn ensure_not_created(&self, op: &str) -> VmxResult<()> {
        if let Some(path) = self.path.as_deref().filter(|p| p.exists()) {
            return Err(VmxError::Immutable(format!(
                "cannot {} disk {} after it has been created",
                op,
                path.display()
            )));
        }
        Ok(())
    }

    pub fn disk_type(&self) -> HardDiskType {
        self.disk_type
    }

    /// Change the layout; only allowed before the descriptor is written.
    pub fn set_disk_type(&mut self, disk_type: HardDiskType) -> VmxResult<()> {
        if disk_type == self.disk_type {
            return Ok(());
        }
        self.ensure_not_created("change the type of")?;
        self.disk_type = disk_type;
        self.extents.clear();
        Ok(())
    }

    pub fn adapter(&self) -> AdapterType {
        self.adapter
    }

    pub fn set_adapter(&mut self, adapter: AdapterType) {
        self.adapter = adapter;
    }

    /// Size in bytes.
    ///
    /// An explicit size wins, then the sum of the extents, then the geometry.
    pub fn capacity(&self) -> u64 {
        if let Some(capacity) = self.capacity {
            return capacity;
        }
        let extent_sectors: u64 = self.extents.iter().map(Extent::capacity).sum();
        if extent_sectors > 0 {
            return extent_sectors * SECTOR_SIZE;
        }
        self.geometry.capacity_bytes()
    }

    pub fn set_capacity(&mut self, bytes: u64) -> VmxResult<()> {
        self.ensure_not_created("resize")?;
        self.capacity = Some(bytes);
        self.extents.clear();
        Ok(())
    }

    /// Capacity in whole sectors.
    pub fn total_sectors(&self) -> u64 {
        self.capacity().div_ceil(SECTOR_SIZE)
    }

    /// Geometry for the current capacity and bus.
    ///
    /// Disks loaded without an explicit size keep the geometry they were
    /// described with.
    pub fn geometry(&self) -> Geometry {
        if self.capacity.is_none() && !self.geometry.is_empty() {
            return self.geometry;
        }
        Geometry::for_capacity(self.total_sectors(), self.adapter.bus())
    }

    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    /// Paths of every extent file.
    pub fn extent_paths(&self) -> Vec<PathBuf> {
        let Some(dir) = self.path.as_deref().and_then(Path::parent) else {
            return Vec::new();
        };
        self.extents
            .iter()
            .map(|extent| dir.join(extent.file_name()))
            .collect()
    }

    /// Replace the extent list with a fresh plan for the current capacity.
    ///
    /// Sparse disks are grown to a whole number of grains first, so the
    /// extents always add up to the disk's sector count.
    pub fn plan_extents(&mut self) -> VmxResult<()> {
        let path = self.require_path()?.to_path_buf();
        let extent_type = self.disk_type.extent_type();

        let mut total = self.total_sectors();
        if extent_type == ExtentType::Sparse && total % GRAIN_SIZE != 0 {
            total = total.div_ceil(GRAIN_SIZE) * GRAIN_SIZE;
            self.capacity = Some(total * SECTOR_SIZE);
        }

        self.extents = plan_extent_sizes(total, self.disk_type.is_split())
            .into_iter()
            .enumerate()
            .map(|(i, sectors)| {
                Extent::new(
                    ExtentAccess::ReadWrite,
                    extent_type,
                    sectors,
                    extent_file_name(&path, i + 1),
                )
            })
            .collect();

        tracing::debug!(
            path = %path.display(),
            extents = self.extents.len(),
            "Planned extents"
        );
        Ok(())
    }

    fn require_path(&self) -> VmxResult<&Path> {
        self.path
            .as_deref()
            .ok_or_else(|| VmxError::InvalidArgument("disk has no file name".to_string()))
    }

    /// Descriptor for the current state.
    pub fn descriptor(&self) -> DiskDescriptor {
        let mut descriptor = DiskDescriptor::new(self.disk_type, self.adapter, self.geometry());
        if let Some(cid) = self.cid {
            descriptor.cid = cid;
        }
        descriptor.extents = self.extents.clone();
        descriptor
    }

    /// Write the descriptor text to the disk's path.
    pub fn write_descriptor(&mut self) -> VmxResult<()> {
        let path = self.require_path()?.to_path_buf();
        let descriptor = self.descriptor();
        self.cid = Some(descriptor.cid);

        let text = descriptor.render();
        write_atomic(&path, |w| w.write_all(text.as_bytes()))
    }

    /// Create the descriptor and every extent file.
    ///
    /// Progress is spread evenly over the extents. When a callback is
    /// attached the final 100% event is always delivered.
    pub fn create(&mut self, progress: &mut Progress<'_>) -> VmxResult<()> {
        let result = self.create_inner(progress);
        progress.finish();
        result
    }

    fn create_inner(&mut self, progress: &mut Progress<'_>) -> VmxResult<()> {
        let path = self.require_path()?.to_path_buf();
        self.ensure_not_created("create")?;

        if self.capacity() == 0 {
            return Err(VmxError::InvalidArgument(format!(
                "disk {} has zero capacity",
                path.display()
            )));
        }

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if self.disk_type.extent_type() == ExtentType::Flat {
            let required = self.capacity();
            let available = available_space(&dir)?;
            if available < required {
                return Err(VmxError::InsufficientSpace {
                    path: dir,
                    required,
                    available,
                });
            }
        }

        std::fs::create_dir_all(&dir).map_err(|e| VmxError::storage("create directory", &dir, e))?;

        self.plan_extents()?;

        tracing::info!(
            path = %path.display(),
            disk_type = self.disk_type.as_str(),
            bytes = self.capacity(),
            extents = self.extents.len(),
            "Creating disk image"
        );
        self.write_descriptor()?;

        let count = self.extents.len();
        for (index, extent) in self.extents.iter_mut().enumerate() {
            let mut slice = progress.slice(index, count);
            extent.create(&dir, &mut slice)?;
        }

        tracing::info!(path = %path.display(), "Created disk image");
        Ok(())
    }

    /// Remove every extent file and then the descriptor.
    ///
    /// Files that are already gone are skipped.
    pub fn delete(&self) -> VmxResult<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        for extent_path in self.extent_paths() {
            remove_if_exists(&extent_path)?;
        }
        if remove_if_exists(path)? {
            tracing::info!(path = %path.display(), "Deleted disk image");
        }
        Ok(())
    }
}
