use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use vmxman_shared::errors::{VmxError, VmxResult};

pub fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .try_init();
}

/// Write a file by filling a temporary sibling and renaming it over `path`.
///
/// Readers observe either the previous content or the complete new content.
pub fn write_atomic<F>(path: &Path, fill: F) -> VmxResult<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let tmp = NamedTempFile::new_in(&parent)
        .map_err(|e| VmxError::storage("create temporary file in", &parent, e))?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        fill(&mut writer).map_err(|e| VmxError::storage("write", path, e))?;
        writer
            .flush()
            .map_err(|e| VmxError::storage("flush", path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| VmxError::storage("sync", path, e))?;

    tmp.persist(path)
        .map_err(|e| VmxError::storage("replace", path, e.error))?;

    tracing::debug!(path = %path.display(), "Wrote file atomically");
    Ok(())
}

/// Collapse `.` and `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `path` against `base_dir` unless it is already absolute.
pub fn resolve_in(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_lexically(path)
    } else {
        normalize_lexically(&base_dir.join(path))
    }
}

/// Render `path` for storage in a descriptor living in `dir`.
///
/// Files directly inside `dir` are stored by bare name, everything else
/// keeps its full path.
pub fn relative_to_dir(path: &Path, dir: &Path) -> String {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if parent == dir => name.to_string_lossy().into_owned(),
        _ => path.to_string_lossy().into_owned(),
    }
}

/// Bytes available to unprivileged users on the filesystem holding `path`.
///
/// Walks up to the nearest existing ancestor so the probe works before the
/// target file or its directory has been created.
pub fn available_space(path: &Path) -> VmxResult<u64> {
    let mut probe = path;
    while !probe.exists() {
        match probe.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => probe = parent,
            _ => {
                probe = Path::new(".");
                break;
            }
        }
    }

    let stat = nix::sys::statvfs::statvfs(probe)
        .map_err(|e| VmxError::storage("query free space of", probe, e))?;

    #[allow(clippy::unnecessary_cast)]
    let available = stat.blocks_available() as u64 * stat.fragment_size() as u64;
    Ok(available)
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
pub fn remove_if_exists(path: &Path) -> VmxResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed file");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(VmxError::storage("remove", path, e)),
    }
}
