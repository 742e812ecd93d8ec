//! Persistent device registry.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::device::{DeviceRecord, DiscoveredDevice};
use crate::error::Result;

/// JSON file holding the validated devices of the last session.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    path: PathBuf,
}

impl DeviceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the registry with `devices` as a pretty-printed JSON array.
    pub fn save(&self, devices: &[DiscoveredDevice]) -> Result<()> {
        let records: Vec<DeviceRecord> = devices.iter().map(DeviceRecord::from).collect();
        let json = serde_json::to_string_pretty(&records)?;
        fs::write(&self.path, json)?;

        info!(path = %self.path.display(), count = records.len(), "Saved device registry");
        Ok(())
    }

    /// Save the devices validated in a session.
    ///
    /// A session that validated nothing leaves the existing registry as it is.
    /// Returns whether the file was written.
    pub fn save_session(&self, validated: &[DiscoveredDevice]) -> Result<bool> {
        if validated.is_empty() {
            info!(path = %self.path.display(), "No devices validated, registry left unchanged");
            return Ok(false);
        }
        self.save(validated)?;
        Ok(true)
    }

    pub fn load(&self) -> Result<Vec<DeviceRecord>> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RoleCode;
    use std::net::Ipv4Addr;

    fn validated(host: u8, unit: u32, role: RoleCode) -> DiscoveredDevice {
        let mut device = DiscoveredDevice::new(
            Ipv4Addr::new(192, 168, 20, host),
            format!("00:02:01:00:00:{:02X}", host).parse().unwrap(),
            20,
        );
        device.is_validated = true;
        device.unit_number = Some(unit);
        device.role = Some(role);
        device
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DeviceRegistry::new(dir.path().join("devices.json"));

        registry
            .save(&[validated(29, 1, RoleCode::A), validated(33, 1, RoleCode::B)])
            .unwrap();
        registry.save(&[validated(30, 2, RoleCode::T)]).unwrap();

        let records = registry.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip_address, Ipv4Addr::new(192, 168, 20, 30));
        assert_eq!(records[0].heater_type, Some(RoleCode::T));
    }

    #[test]
    fn test_pretty_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DeviceRegistry::new(dir.path().join("devices.json"));
        registry.save(&[validated(29, 1, RoleCode::A)]).unwrap();

        let content = fs::read_to_string(registry.path()).unwrap();
        assert!(content.starts_with("[\n"));
        assert!(content.contains("\"mac_address\": \"00:02:01:00:00:1D\""));
    }

    #[test]
    fn test_empty_session_keeps_previous_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DeviceRegistry::new(dir.path().join("devices.json"));

        assert!(registry.save_session(&[validated(29, 1, RoleCode::A)]).unwrap());
        assert!(!registry.save_session(&[]).unwrap());

        let records = registry.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip_address, Ipv4Addr::new(192, 168, 20, 29));
    }

    #[test]
    fn test_empty_session_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DeviceRegistry::new(dir.path().join("devices.json"));

        assert!(!registry.save_session(&[]).unwrap());
        assert!(!registry.path().exists());
    }
}
