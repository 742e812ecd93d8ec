//! Discovered devices and their registry records.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mac::MacAddress;

/// Device type reported for every master found by the scanner.
pub const IOLINK_MASTER: &str = "IO-Link Master";

/// Role of a device within its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleCode {
    /// Heater A (primary)
    A,
    /// Heater B (secondary)
    B,
    /// Heater C (tertiary)
    C,
    /// Temperature sensor
    T,
    /// Other
    O,
}

impl RoleCode {
    pub const ALL: [RoleCode; 5] = [RoleCode::A, RoleCode::B, RoleCode::C, RoleCode::T, RoleCode::O];

    pub fn description(&self) -> &'static str {
        match self {
            RoleCode::A => "Heater A (Primary)",
            RoleCode::B => "Heater B (Secondary)",
            RoleCode::C => "Heater C (Tertiary)",
            RoleCode::T => "Temperature Sensor",
            RoleCode::O => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid role code '{0}' (expected A, B, C, T or O)")]
pub struct RoleParseError(pub String);

impl FromStr for RoleCode {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RoleCode::A),
            "B" => Ok(RoleCode::B),
            "C" => Ok(RoleCode::C),
            "T" => Ok(RoleCode::T),
            "O" => Ok(RoleCode::O),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            RoleCode::A => "A",
            RoleCode::B => "B",
            RoleCode::C => "C",
            RoleCode::T => "T",
            RoleCode::O => "O",
        };
        f.write_str(code)
    }
}

/// A master found on the network.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDevice {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
    pub subnet: u8,
    pub device_type: String,
    pub is_validated: bool,
    pub unit_number: Option<u32>,
    pub role: Option<RoleCode>,
    pub device_name: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredDevice {
    /// A freshly probed, not yet validated master.
    pub fn new(ip: Ipv4Addr, mac: MacAddress, subnet: u8) -> Self {
        Self {
            ip,
            mac,
            subnet,
            device_type: IOLINK_MASTER.to_string(),
            is_validated: false,
            unit_number: None,
            role: None,
            device_name: None,
            discovered_at: Utc::now(),
        }
    }
}

/// One entry of the registry file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub ip_address: Ipv4Addr,
    pub mac_address: MacAddress,
    pub subnet: u8,
    pub unit_number: Option<u32>,
    pub heater_type: Option<RoleCode>,
    pub device_name: Option<String>,
    pub is_validated: bool,
    pub discovered_at: DateTime<Utc>,
}

impl From<&DiscoveredDevice> for DeviceRecord {
    fn from(device: &DiscoveredDevice) -> Self {
        Self {
            ip_address: device.ip,
            mac_address: device.mac,
            subnet: device.subnet,
            unit_number: device.unit_number,
            heater_type: device.role,
            device_name: device.device_name.clone(),
            is_validated: device.is_validated,
            discovered_at: device.discovered_at,
        }
    }
}
