//! Single extent codec.
//!
//! An extent is either a flat file of zeroed sectors or a sparse file made of
//! a one-sector header, a redundant and a primary grain directory with their
//! (empty) grain tables, padded to a grain boundary:
//!
//! ```text
//! sector 0            header
//! sector 1            redundant grain directory + grain tables
//! sector 1 + meta     primary grain directory + grain tables
//! ...                 zero padding up to `overhead` sectors
//! ```

use std::fs::OpenOptions;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vmxman_shared::errors::{VmxError, VmxResult};

use super::constants::flat::CHUNK_SIZE;
use super::constants::sparse;
use super::constants::{GRAIN_SIZE, GT_SECTORS, GTES_PER_GT, SECTOR_SIZE};
use super::error::ExtentLineError;
use super::progress::Progress;

/// Access mode of an extent as written in the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtentAccess {
    ReadWrite,
    ReadOnly,
    NoAccess,
}

impl ExtentAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtentAccess::ReadWrite => "RW",
            ExtentAccess::ReadOnly => "RDONLY",
            ExtentAccess::NoAccess => "NOACCESS",
        }
    }
}

impl FromStr for ExtentAccess {
    type Err = ExtentLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RW" => Ok(ExtentAccess::ReadWrite),
            "RDONLY" => Ok(ExtentAccess::ReadOnly),
            "NOACCESS" => Ok(ExtentAccess::NoAccess),
            other => Err(ExtentLineError::UnknownAccess(other.to_string())),
        }
    }
}

/// Storage layout of an extent file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtentType {
    Flat,
    Sparse,
}

impl ExtentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtentType::Flat => "FLAT",
            ExtentType::Sparse => "SPARSE",
        }
    }
}

impl FromStr for ExtentType {
    type Err = ExtentLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FLAT" => Ok(ExtentType::Flat),
            "SPARSE" => Ok(ExtentType::Sparse),
            other => Err(ExtentLineError::UnknownType(other.to_string())),
        }
    }
}

/// Lifecycle of an extent's backing file.
///
/// ```text
/// Unwritten → Writing → Written
///     ↑          │
///     └─ failure ┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtentState {
    Unwritten,
    Writing,
    Written,
}

fn round_up(value: u64, multiple: u64) -> u64 {
    value.div_ceil(multiple) * multiple
}

/// Metadata layout of a sparse extent, derived from its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseLayout {
    /// Capacity in sectors, rounded up to a whole grain.
    pub capacity: u64,
    pub grain_size: u64,
    /// Grain tables per directory copy.
    pub num_tables: u64,
    /// Sectors taken by one grain directory.
    pub gd_sectors: u64,
    /// Sectors taken by one directory plus its tables.
    pub metadata_sectors: u64,
    /// Header plus both copies, padded to a grain boundary.
    pub overhead: u64,
}

impl SparseLayout {
    pub fn new(capacity_sectors: u64) -> Self {
        let grain_size = GRAIN_SIZE;
        let capacity = round_up(capacity_sectors, grain_size);
        let grains = capacity.div_ceil(grain_size);
        let num_tables = grains.div_ceil(GTES_PER_GT);
        let gd_sectors = (num_tables * sparse::ENTRY_SIZE).div_ceil(SECTOR_SIZE);
        let metadata_sectors = num_tables * GT_SECTORS + gd_sectors;
        let overhead = round_up(sparse::REDUNDANT_GD_SECTOR + 2 * metadata_sectors, grain_size);

        Self {
            capacity,
            grain_size,
            num_tables,
            gd_sectors,
            metadata_sectors,
            overhead,
        }
    }

    pub fn redundant_gd_offset(&self) -> u64 {
        sparse::REDUNDANT_GD_SECTOR
    }

    pub fn primary_gd_offset(&self) -> u64 {
        sparse::REDUNDANT_GD_SECTOR + self.metadata_sectors
    }

    /// The one-sector extent header.
    pub fn header(&self) -> [u8; sparse::HEADER_SIZE] {
        let mut header = [0u8; sparse::HEADER_SIZE];

        // 0-3:   magic ("KDMV")
        // 4-7:   version
        // 8-11:  flags
        // 12-19: capacity (sectors)
        // 20-27: grain size (sectors)
        // 28-35: embedded descriptor offset
        // 36-43: embedded descriptor size
        // 44-47: grain table entries per table
        // 48-55: redundant grain directory offset
        // 56-63: grain directory offset
        // 64-71: metadata overhead (sectors)
        // 72:    unclean shutdown
        // 73-76: newline detection bytes
        // 77-78: compression algorithm
        header[0..4].copy_from_slice(&sparse::MAGIC.to_le_bytes());
        header[4..8].copy_from_slice(&sparse::VERSION.to_le_bytes());
        header[8..12].copy_from_slice(&sparse::FLAGS.to_le_bytes());
        header[12..20].copy_from_slice(&self.capacity.to_le_bytes());
        header[20..28].copy_from_slice(&self.grain_size.to_le_bytes());
        header[28..36].copy_from_slice(&0u64.to_le_bytes());
        header[36..44].copy_from_slice(&0u64.to_le_bytes());
        header[44..48].copy_from_slice(&(GTES_PER_GT as u32).to_le_bytes());
        header[48..56].copy_from_slice(&self.redundant_gd_offset().to_le_bytes());
        header[56..64].copy_from_slice(&self.primary_gd_offset().to_le_bytes());
        header[64..72].copy_from_slice(&self.overhead.to_le_bytes());
        header[72] = 0;
        header[73..77].copy_from_slice(&sparse::TERMINATOR);
        header[77..79].copy_from_slice(&0u16.to_le_bytes());

        header
    }

    /// Grain directory starting at `gd_offset`, padded to whole sectors.
    ///
    /// Tables follow the directory back to back, four sectors each.
    pub fn grain_directory(&self, gd_offset: u64) -> Vec<u8> {
        let mut directory = vec![0u8; (self.gd_sectors * SECTOR_SIZE) as usize];
        let first_table = gd_offset + self.gd_sectors;

        for table in 0..self.num_tables {
            let entry = (first_table + table * GT_SECTORS) as u32;
            let at = (table * sparse::ENTRY_SIZE) as usize;
            directory[at..at + 4].copy_from_slice(&entry.to_le_bytes());
        }

        directory
    }

    /// Write the whole metadata region (`overhead` sectors).
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.header())?;

        let blank_table = vec![0u8; (GT_SECTORS * SECTOR_SIZE) as usize];
        for gd_offset in [self.redundant_gd_offset(), self.primary_gd_offset()] {
            writer.write_all(&self.grain_directory(gd_offset))?;
            for _ in 0..self.num_tables {
                writer.write_all(&blank_table)?;
            }
        }

        let written = sparse::REDUNDANT_GD_SECTOR + 2 * self.metadata_sectors;
        let padding = (self.overhead - written) * SECTOR_SIZE;
        std::io::copy(&mut std::io::repeat(0).take(padding), writer)?;

        Ok(())
    }
}

/// One extent of a virtual disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    access: ExtentAccess,
    /// Size in sectors.
    capacity: u64,
    extent_type: ExtentType,
    /// File name relative to the disk descriptor.
    file_name: String,
    /// Start offset in sectors inside a flat file.
    offset: u64,
    state: ExtentState,
}

impl Extent {
    /// A planned extent whose file does not exist yet.
    pub fn new(
        access: ExtentAccess,
        extent_type: ExtentType,
        capacity: u64,
        file_name: impl Into<String>,
    ) -> Self {
        let mut extent = Self {
            access,
            capacity: 0,
            extent_type,
            file_name: file_name.into(),
            offset: 0,
            state: ExtentState::Unwritten,
        };
        extent.capacity = extent.aligned_capacity(capacity);
        extent
    }

    /// An extent read back from an existing descriptor.
    pub fn existing(
        access: ExtentAccess,
        extent_type: ExtentType,
        capacity: u64,
        file_name: impl Into<String>,
        offset: u64,
    ) -> Self {
        Self {
            access,
            capacity,
            extent_type,
            file_name: file_name.into(),
            offset,
            state: ExtentState::Written,
        }
    }

    fn aligned_capacity(&self, sectors: u64) -> u64 {
        match self.extent_type {
            ExtentType::Sparse => round_up(sectors, GRAIN_SIZE),
            ExtentType::Flat => sectors,
        }
    }

    /// Change the size in sectors. Sparse extents round up to a whole grain.
    pub fn set_capacity(&mut self, sectors: u64) -> VmxResult<()> {
        self.ensure_unwritten("resize")?;
        self.capacity = self.aligned_capacity(sectors);
        Ok(())
    }

    pub fn access(&self) -> ExtentAccess {
        self.access
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn extent_type(&self) -> ExtentType {
        self.extent_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn state(&self) -> ExtentState {
        self.state
    }

    pub fn sparse_layout(&self) -> Option<SparseLayout> {
        match self.extent_type {
            ExtentType::Sparse => Some(SparseLayout::new(self.capacity)),
            ExtentType::Flat => None,
        }
    }

    /// Bytes the extent file occupies right after creation.
    pub fn initial_file_size(&self) -> u64 {
        match self.sparse_layout() {
            Some(layout) => layout.overhead * SECTOR_SIZE,
            None => self.capacity * SECTOR_SIZE,
        }
    }

    fn ensure_unwritten(&self, op: &str) -> VmxResult<()> {
        if self.state != ExtentState::Unwritten {
            return Err(VmxError::Immutable(format!(
                "cannot {} extent {} once it has been written",
                op, self.file_name
            )));
        }
        Ok(())
    }

    /// Create the extent file inside `dir`.
    ///
    /// The terminal 100% event is always emitted when a callback is attached,
    /// whether or not creation succeeded. A failed creation leaves the partial
    /// file behind; it must be removed before retrying.
    pub fn create(&mut self, dir: &Path, progress: &mut Progress<'_>) -> VmxResult<()> {
        let result = self.create_inner(dir, progress);
        progress.finish();
        result
    }

    fn create_inner(&mut self, dir: &Path, progress: &mut Progress<'_>) -> VmxResult<()> {
        self.ensure_unwritten("create")?;
        progress.check_cancelled()?;

        let path = dir.join(&self.file_name);
        tracing::info!(
            path = %path.display(),
            extent_type = self.extent_type.as_str(),
            sectors = self.capacity,
            "Creating extent"
        );

        self.state = ExtentState::Writing;
        let result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| VmxError::storage("create extent", &path, e))
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                match self.extent_type {
                    ExtentType::Flat => create_flat(&mut writer, self.capacity, progress),
                    ExtentType::Sparse => create_sparse(&mut writer, self.capacity),
                }
                .and_then(|()| {
                    writer
                        .flush()
                        .map_err(|e| VmxError::storage("flush extent", &path, e))
                })
                .map_err(|e| match e {
                    VmxError::Io(io) => VmxError::storage("write extent", &path, io),
                    other => other,
                })
            });

        match result {
            Ok(()) => {
                self.state = ExtentState::Written;
                tracing::info!(path = %path.display(), "Created extent");
                Ok(())
            }
            Err(e) => {
                self.state = ExtentState::Unwritten;
                tracing::warn!(path = %path.display(), error = %e, "Extent creation failed");
                Err(e)
            }
        }
    }

    /// Descriptor line for this extent, e.g. `RW 2097152 SPARSE "disk-1.vmdk"`.
    pub fn to_descriptor_line(&self) -> String {
        match self.extent_type {
            ExtentType::Flat => format!(
                "{} {} {} \"{}\" {}",
                self.access.as_str(),
                self.capacity,
                self.extent_type.as_str(),
                self.file_name,
                self.offset
            ),
            ExtentType::Sparse => format!(
                "{} {} {} \"{}\"",
                self.access.as_str(),
                self.capacity,
                self.extent_type.as_str(),
                self.file_name
            ),
        }
    }

    /// Whether `line` has the shape of an extent line
    /// (`WORD <number> WORD "..."`).
    pub fn looks_like_descriptor_line(line: &str) -> bool {
        let mut tokens = line.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        let second = tokens.next().unwrap_or_default();
        !first.is_empty()
            && first.chars().all(|c| c.is_ascii_uppercase())
            && !second.is_empty()
            && second.chars().all(|c| c.is_ascii_digit())
            && line.contains('"')
    }

    /// Parse `Access Capacity Type "File" [Offset]`.
    pub fn parse_descriptor_line(line: &str) -> Result<Self, ExtentLineError> {
        let line = line.trim();
        let (access, rest) = split_token(line).ok_or(ExtentLineError::MissingField("access"))?;
        let access: ExtentAccess = access.parse()?;

        let (capacity, rest) = split_token(rest).ok_or(ExtentLineError::MissingField("capacity"))?;
        let capacity = parse_number("capacity", capacity)?;

        let (extent_type, rest) = split_token(rest).ok_or(ExtentLineError::MissingField("type"))?;
        let extent_type: ExtentType = extent_type.parse()?;

        let rest = rest
            .trim_start()
            .strip_prefix('"')
            .ok_or(ExtentLineError::MissingField("file name"))?;
        let (file_name, rest) = rest
            .split_once('"')
            .ok_or(ExtentLineError::UnterminatedFileName)?;

        let offset = match rest.trim() {
            "" => 0,
            value => parse_number("offset", value)?,
        };

        Ok(Self::existing(access, extent_type, capacity, file_name, offset))
    }
}

fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(end) => Some((&s[..end], &s[end..])),
        None => Some((s, "")),
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<u64, ExtentLineError> {
    value.parse().map_err(|_| ExtentLineError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Write `capacity` zeroed sectors, reporting at whole-percent steps.
pub fn create_flat<W: Write + ?Sized>(
    writer: &mut W,
    capacity: u64,
    progress: &mut Progress<'_>,
) -> VmxResult<()> {
    let total = capacity * SECTOR_SIZE;
    let zeros = [0u8; CHUNK_SIZE];
    let mut written = 0u64;
    let mut last_percent = 0u64;

    while written < total {
        progress.check_cancelled()?;

        let chunk = (total - written).min(CHUNK_SIZE as u64) as usize;
        writer.write_all(&zeros[..chunk])?;
        written += chunk as u64;

        let percent = written * 100 / total;
        if percent > last_percent {
            last_percent = percent;
            progress.report(written as f64 / total as f64);
        }
    }

    Ok(())
}

/// Write the header, both grain directories and blank grain tables.
pub fn create_sparse<W: Write + ?Sized>(writer: &mut W, capacity: u64) -> VmxResult<()> {
    SparseLayout::new(capacity).write_to(writer)?;
    Ok(())
}
