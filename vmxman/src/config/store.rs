//! Line-oriented `key = "value"` store backing a machine descriptor.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use vmxman_shared::constants::vmx;
use vmxman_shared::errors::{VmxError, VmxResult};

use crate::util::write_atomic;

/// Raw key/value map of a descriptor file.
///
/// Keys are kept ordered so serialization is deterministic. Values are
/// stored without their surrounding quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    entries: BTreeMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse descriptor text into a fresh store.
    pub fn from_text(text: &str) -> Self {
        let mut store = Self::new();
        // Reading from a byte slice cannot fail.
        let _ = store.load(text.as_bytes());
        store
    }

    /// Split one descriptor line into key and unquoted value.
    ///
    /// Returns `None` for lines without `=`, comment lines and lines with an
    /// empty key.
    pub fn parse_line(line: &str) -> Option<(String, String)> {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            return None;
        }

        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }

        let value = value.trim();
        let value = value.strip_prefix('"').unwrap_or(value);
        let value = value.strip_suffix('"').unwrap_or(value);

        Some((key.to_string(), value.to_string()))
    }

    /// Replace the whole content with the lines read from `reader`.
    ///
    /// Duplicate keys are resolved last-write-wins.
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> VmxResult<()> {
        self.entries.clear();

        for (number, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match Self::parse_line(&line) {
                Some((key, value)) => {
                    if let Some(previous) = self.entries.insert(key.clone(), value) {
                        tracing::debug!(
                            line = number + 1,
                            key = %key,
                            previous = %previous,
                            "Duplicate descriptor key, keeping last value"
                        );
                    }
                }
                None => {
                    if !line.trim_start().starts_with('#') {
                        tracing::warn!(line = number + 1, "Skipping malformed descriptor line");
                    }
                }
            }
        }

        Ok(())
    }

    /// Serialize every pair as `key = "value"`, sorted by key.
    pub fn save<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        for (key, value) in &self.entries {
            writeln!(writer, "{} = \"{}\"", key, value)?;
        }
        Ok(())
    }

    /// Load from a descriptor file on disk.
    pub fn load_file(&mut self, path: &Path) -> VmxResult<()> {
        let file = std::fs::File::open(path).map_err(|e| VmxError::storage("open", path, e))?;
        self.load(file)
            .map_err(|e| VmxError::storage("read", path, e))?;
        tracing::debug!(path = %path.display(), keys = self.entries.len(), "Loaded descriptor");
        Ok(())
    }

    /// Write the store to `path`, replacing the previous file atomically.
    pub fn save_file(&self, path: &Path) -> VmxResult<()> {
        write_atomic(path, |w| self.save(w))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Boolean view of a `"TRUE"`/`"FALSE"` value (case-insensitive).
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v.eq_ignore_ascii_case(vmx::TRUE))
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, if value { vmx::TRUE } else { vmx::FALSE });
    }

    /// Remove every key starting with `prefix`, returning how many were removed.
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        self.remove_where(|key| key.starts_with(prefix))
    }

    /// Remove every key matching `predicate`, returning how many were removed.
    pub fn remove_where<P: Fn(&str) -> bool>(&mut self, predicate: P) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
