//! End-of-session summary.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::device::DiscoveredDevice;

/// Validated devices grouped by unit, with totals.
pub fn format_summary(devices: &[DiscoveredDevice]) -> String {
    let mut units: BTreeMap<u32, Vec<&DiscoveredDevice>> = BTreeMap::new();
    for device in devices {
        if let Some(unit) = device.unit_number {
            units.entry(unit).or_default().push(device);
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "DISCOVERY SUMMARY");
    let _ = writeln!(out, "{}", "=".repeat(60));

    if units.is_empty() {
        let _ = writeln!(out, "No validated devices.");
        return out;
    }

    for (unit, members) in &units {
        let _ = writeln!(out, "\nUnit {}:", unit);
        for device in members {
            let role = device
                .role
                .map(|r| r.to_string())
                .unwrap_or_else(|| "?".to_string());
            let _ = write!(out, "  {}: {} ({})", role, device.ip, device.mac);
            if let Some(name) = &device.device_name {
                let _ = write!(out, " - {}", name);
            }
            let _ = writeln!(out);
        }
    }

    let total: usize = units.values().map(Vec::len).sum();
    let _ = writeln!(out, "\nTotal units: {}", units.len());
    let _ = writeln!(out, "Total devices: {}", total);
    out
}
