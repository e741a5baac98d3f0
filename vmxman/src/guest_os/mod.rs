//! Guest operating system catalog.
//!
//! The catalog is loaded once and then read-only. Machines hold it behind an
//! `Arc` so every machine of a manager shares the same instance.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};

use serde::Serialize;
use vmxman_shared::errors::{VmxError, VmxResult};

use crate::devices::{EthernetDeviceType, ScsiDeviceType};

const BUILTIN_CATALOG: &str = include_str!("../../resources/operating-systems.csv");

/// What the machine layer needs to know about a guest OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestOs {
    /// Identifier stored in the `guestOS` key.
    pub name: String,
    pub display_name: String,
    /// Old guests that need the legacy ATAPI CD-ROM emulation.
    pub is_legacy: bool,
    pub suggested_scsi: ScsiDeviceType,
    pub suggested_ethernet: EthernetDeviceType,
    /// Recommended memory in MB.
    pub suggested_ram: u32,
}

/// Lookup table of guest operating systems keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct GuestOsCatalog {
    entries: HashMap<String, GuestOs>,
}

impl GuestOsCatalog {
    /// The catalog shipped with the library.
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_CATALOG)
    }

    /// Load a catalog from CSV rows:
    /// `name,legacy,ethernet,scsi,ram,"display name"`.
    pub fn from_reader<R: Read>(reader: R) -> VmxResult<Self> {
        let mut entries = HashMap::new();
        for (number, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_row(&line) {
                Some(os) => {
                    entries.insert(os.name.clone(), os);
                }
                None => tracing::warn!(line = number + 1, "Skipping malformed guest OS row"),
            }
        }
        tracing::debug!(count = entries.len(), "Loaded guest OS catalog");
        Ok(Self { entries })
    }

    fn parse(text: &str) -> Self {
        // Reading from a byte slice cannot fail.
        Self::from_reader(text.as_bytes()).unwrap_or_default()
    }

    pub fn lookup(&self, name: &str) -> VmxResult<&GuestOs> {
        self.entries
            .get(name)
            .ok_or_else(|| VmxError::NotFound(format!("guest OS '{}'", name)))
    }

    /// Every entry, sorted by display name.
    pub fn list(&self) -> Vec<&GuestOs> {
        let mut all: Vec<_> = self.entries.values().collect();
        all.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_row(line: &str) -> Option<GuestOs> {
    let mut fields = line.splitn(6, ',').map(str::trim);
    let name = fields.next().filter(|n| !n.is_empty())?;
    let is_legacy = fields.next()?.eq_ignore_ascii_case("TRUE");

    let ethernet = fields.next()?;
    let suggested_ethernet = EthernetDeviceType::parse(ethernet).unwrap_or_else(|| {
        tracing::warn!(name, ethernet, "Unknown ethernet type in catalog, using vlance");
        EthernetDeviceType::PcNet
    });

    let suggested_scsi = match fields.next()? {
        "LSI" => ScsiDeviceType::LsiLogic,
        "BUS" => ScsiDeviceType::BusLogic,
        other => {
            tracing::warn!(name, scsi = other, "Unknown SCSI type in catalog, using buslogic");
            ScsiDeviceType::BusLogic
        }
    };

    let suggested_ram = fields.next()?.parse().ok()?;
    let display_name = fields.next()?.trim_matches('"').to_string();

    Some(GuestOs {
        name: name.to_string(),
        display_name,
        is_legacy,
        suggested_scsi,
        suggested_ethernet,
        suggested_ram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = GuestOsCatalog::builtin();
        assert!(catalog.len() >= 30);

        let win98 = catalog.lookup("win98").unwrap();
        assert!(win98.is_legacy);
        assert_eq!(win98.display_name, "Windows 98");

        let ubuntu = catalog.lookup("ubuntu-64").unwrap();
        assert!(!ubuntu.is_legacy);
        assert_eq!(ubuntu.suggested_scsi, ScsiDeviceType::LsiLogic);
        assert_eq!(ubuntu.suggested_ethernet, EthernetDeviceType::E1000);

        assert!(catalog.lookup("other").is_ok());
    }

    #[test]
    fn test_unknown_guest_is_not_found() {
        let catalog = GuestOsCatalog::builtin();
        assert!(matches!(catalog.lookup("beos"), Err(VmxError::NotFound(_))));
    }

    #[test]
    fn test_from_reader_skips_bad_rows() {
        let csv = "good,FALSE,bogus,XYZ,512,\"Good, Inc. OS\"\nbad,FALSE\n\nworse,TRUE,vlance,BUS,lots,\"x\"\n";
        let catalog = GuestOsCatalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 1);

        let good = catalog.lookup("good").unwrap();
        assert_eq!(good.display_name, "Good, Inc. OS");
        assert_eq!(good.suggested_ethernet, EthernetDeviceType::PcNet);
        assert_eq!(good.suggested_scsi, ScsiDeviceType::BusLogic);
        assert_eq!(good.suggested_ram, 512);
    }

    #[test]
    fn test_list_sorted_by_display_name() {
        let catalog = GuestOsCatalog::builtin();
        let names: Vec<_> = catalog.list().iter().map(|os| os.display_name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
