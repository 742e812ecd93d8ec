//! Query surface for the layer above the bridge.
//!
//! Every result serializes with a `status` of `ok` or `error`, so callers can
//! hand them to any transport unchanged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{DeviceSnapshot, Reading};
use crate::context::BridgeContext;
use crate::relay::{RelayResult, RelayStatus};

/// Bridge-wide status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: RelayStatus,
    pub unit: String,
    pub subnet: u8,
    pub default_address: String,
    pub devices: Vec<DeviceStatus>,
    pub timestamp: DateTime<Utc>,
}

/// Per-device health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub key: String,
    pub ip: Option<String>,
    pub port: u8,
    #[serde(flatten)]
    pub snapshot: DeviceSnapshot,
}

/// Answer to a latest-reading query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingResponse {
    pub status: RelayStatus,
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<Reading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Synchronous operations offered to the layer above.
#[derive(Debug, Clone)]
pub struct BridgeApi {
    ctx: Arc<BridgeContext>,
}

impl BridgeApi {
    pub fn new(ctx: Arc<BridgeContext>) -> Self {
        Self { ctx }
    }

    /// Unit addressing and the health of every device.
    pub fn get_status(&self) -> StatusReport {
        let config = self.ctx.config();
        let resolver = self.ctx.resolver();
        let cache = self.ctx.cache();

        let devices = config
            .devices
            .iter()
            .map(|device| DeviceStatus {
                key: device.key.clone(),
                ip: resolver
                    .normalize(device.host.as_deref())
                    .ok()
                    .map(|ip| ip.to_string()),
                port: device.port,
                snapshot: cache.snapshot(&device.key).unwrap_or_default(),
            })
            .collect();

        StatusReport {
            status: RelayStatus::Ok,
            unit: config.unit.name.clone(),
            subnet: resolver.subnet(),
            default_address: resolver.default_address().to_string(),
            devices,
            timestamp: Utc::now(),
        }
    }

    /// Most recent reading of a device.
    pub fn latest_reading(&self, key: &str) -> ReadingResponse {
        let (status, reading, message) = match self.ctx.cache().snapshot(key) {
            None => (
                RelayStatus::Error,
                None,
                Some(format!("Unknown device '{}'", key)),
            ),
            Some(DeviceSnapshot { reading: None, .. }) => (
                RelayStatus::Error,
                None,
                Some(format!("No reading yet for '{}'", key)),
            ),
            Some(DeviceSnapshot {
                reading: Some(reading),
                ..
            }) => (RelayStatus::Ok, Some(reading), None),
        };

        ReadingResponse {
            status,
            device: key.to_string(),
            reading,
            message,
        }
    }

    /// Switch a port's output; `ip` defaults to the unit's default master.
    pub async fn set_port_output(&self, port: u8, state: bool, ip: Option<&str>) -> RelayResult {
        self.ctx.relay().set_output(port, state, ip).await
    }

    /// Read a port's output; `ip` defaults to the unit's default master.
    pub async fn get_port_output(&self, port: u8, ip: Option<&str>) -> RelayResult {
        self.ctx.relay().get_output(port, ip).await
    }
}
