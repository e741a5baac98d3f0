//! Table and JSON rendering for command output.

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, Table};
use serde::Serialize;
use vmxman::MachineSummary;

/// Output as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn plain_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(header.iter().map(Cell::new));
    table
}

/// One row per machine.
pub fn machines_table(machines: &[MachineSummary]) -> Table {
    let mut table = plain_table(&["NAME", "STATUS", "GUEST OS", "MEMORY", "PATH"]);
    for vm in machines {
        table.add_row(vec![
            vm.name.clone(),
            vm.status.to_string(),
            vm.guest_os.clone(),
            vm.memory_mb.map(|mb| format!("{} MB", mb)).unwrap_or_default(),
            vm.path.display().to_string(),
        ]);
    }
    table
}

/// One row per device of a machine.
pub fn devices_table(summary: &MachineSummary) -> Table {
    let mut table = plain_table(&["SLOT", "DEVICE", "FILE", "SIZE", "TYPE"]);
    for device in &summary.devices {
        table.add_row(vec![
            device.slot.clone().unwrap_or_else(|| "-".to_string()),
            device.name.clone(),
            device.file.clone().unwrap_or_default(),
            device.capacity_bytes.map(human_size).unwrap_or_default(),
            device.disk_type.clone().unwrap_or_default(),
        ]);
    }
    table
}

/// Render a byte count with a binary unit.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
