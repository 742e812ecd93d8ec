//! Configuration for the IO-Link bridge.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use iolink_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, ZenohConfig};

use crate::address::AddressResolver;

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IolinkBridgeConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// IO-Link specific settings
    #[serde(default)]
    pub iolink: IolinkConfig,
}

impl BridgeConfig for IolinkBridgeConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.iolink.key_prefix
    }

    fn validate(&self) -> iolink_bridge_framework::Result<()> {
        self.iolink.validate()
    }
}

/// IO-Link master configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IolinkConfig {
    /// Key expression prefix for bridge status and command results (default: "iolink")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Base poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout for every request sent to a master
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Consecutive network errors tolerated before the poll delay grows
    #[serde(default = "default_backoff_threshold")]
    pub backoff_threshold: u32,

    /// Upper bound of the poll delay while backing off
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// HTTP port of the masters when it is not 80
    #[serde(default)]
    pub http_port: Option<u16>,

    /// Unit addressing
    #[serde(default)]
    pub unit: UnitConfig,

    /// Devices to poll
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,

    /// Bus channels readings are published on
    #[serde(default)]
    pub channels: ChannelConfig,

    /// Output commands received from the bus
    #[serde(default)]
    pub commands: CommandConfig,
}

fn default_key_prefix() -> String {
    "iolink".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_backoff_threshold() -> u32 {
    10
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_devices() -> Vec<DeviceConfig> {
    vec![DeviceConfig::new("htr_a", "29"), DeviceConfig::new("htr_b", "33")]
}

impl Default for IolinkConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            backoff_threshold: default_backoff_threshold(),
            max_backoff_ms: default_max_backoff_ms(),
            http_port: None,
            unit: UnitConfig::default(),
            devices: default_devices(),
            channels: ChannelConfig::default(),
            commands: CommandConfig::default(),
        }
    }
}

impl IolinkConfig {
    /// Build the address resolver for this unit.
    pub fn resolver(&self) -> Result<AddressResolver, BridgeError> {
        AddressResolver::from_unit(&self.unit).map_err(|e| BridgeError::validation(e.to_string()))
    }

    /// Look up a device by key.
    pub fn device(&self, key: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.key == key)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.key_prefix.is_empty() {
            return Err(BridgeError::validation("key_prefix cannot be empty"));
        }

        if self.poll_interval_ms == 0 {
            return Err(BridgeError::validation("poll_interval_ms must be > 0"));
        }

        if self.request_timeout_ms == 0 {
            return Err(BridgeError::validation("request_timeout_ms must be > 0"));
        }

        if self.unit.name.is_empty() {
            return Err(BridgeError::validation("unit.name cannot be empty"));
        }

        let resolver = self.resolver()?;

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.key.is_empty() {
                return Err(BridgeError::validation("Device key cannot be empty"));
            }

            if !seen.insert(device.key.as_str()) {
                return Err(BridgeError::validation(format!(
                    "Duplicate device key '{}'",
                    device.key
                )));
            }

            if device.port == 0 {
                return Err(BridgeError::validation(format!(
                    "Device '{}': port must be >= 1",
                    device.key
                )));
            }

            resolver.normalize(device.host.as_deref()).map_err(|e| {
                BridgeError::validation(format!("Device '{}': {}", device.key, e))
            })?;
        }

        for (name, template) in [
            ("aggregate", &self.channels.aggregate),
            ("device", &self.channels.device),
            ("unit_device", &self.channels.unit_device),
        ] {
            if template.is_empty() {
                return Err(BridgeError::validation(format!(
                    "channels.{} cannot be empty",
                    name
                )));
            }
        }

        if self.commands.enabled && self.commands.key_expr.is_empty() {
            return Err(BridgeError::validation(
                "commands.key_expr cannot be empty when commands are enabled",
            ));
        }

        Ok(())
    }
}

/// Addressing of the unit the masters belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Unit name, substituted for `{unit}` in channel templates
    #[serde(default = "default_unit_name")]
    pub name: String,

    /// Third octet of the unit network
    #[serde(default = "default_subnet")]
    pub subnet: u8,

    /// First two octets shared by every unit
    #[serde(default = "default_network_prefix")]
    pub network_prefix: String,

    /// Host used when a device or command gives none
    #[serde(default = "default_host")]
    pub default_host: String,
}

fn default_unit_name() -> String {
    "unit1".to_string()
}

fn default_subnet() -> u8 {
    20
}

fn default_network_prefix() -> String {
    "192.168".to_string()
}

fn default_host() -> String {
    "29".to_string()
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            name: default_unit_name(),
            subnet: default_subnet(),
            network_prefix: default_network_prefix(),
            default_host: default_host(),
        }
    }
}

/// Configuration for a single IO-Link device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device key (cache key, `{device}` in channel templates)
    pub key: String,

    /// Host octet, legacy `subnet.host`, or full address of the master
    #[serde(default)]
    pub host: Option<String>,

    /// Identifier used in event source URLs (default: the key)
    #[serde(default)]
    pub device_id: Option<String>,

    /// Master port the sensor is attached to
    #[serde(default = "default_port")]
    pub port: u8,

    /// Engineering unit of the decoded value
    #[serde(default = "default_unit_label")]
    pub unit_label: String,
}

fn default_port() -> u8 {
    6
}

fn default_unit_label() -> String {
    "F".to_string()
}

impl DeviceConfig {
    /// Create a device on the default port.
    pub fn new(key: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            host: Some(host.into()),
            device_id: None,
            port: default_port(),
            unit_label: default_unit_label(),
        }
    }

    /// Identifier used in event source URLs.
    pub fn device_id(&self) -> &str {
        self.device_id.as_deref().unwrap_or(&self.key)
    }
}

/// Channel name templates. `{unit}` and `{device}` are substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_aggregate_channel")]
    pub aggregate: String,

    #[serde(default = "default_device_channel")]
    pub device: String,

    #[serde(default = "default_unit_device_channel")]
    pub unit_device: String,
}

fn default_aggregate_channel() -> String {
    "instruments_ti".to_string()
}

fn default_device_channel() -> String {
    "instrument/{device}".to_string()
}

fn default_unit_device_channel() -> String {
    "instrument/{unit}/{device}/temperature".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            aggregate: default_aggregate_channel(),
            device: default_device_channel(),
            unit_device: default_unit_device_channel(),
        }
    }
}

impl ChannelConfig {
    /// Channels a device's readings are published on, shared channel first.
    pub fn channels_for(&self, unit: &str, device: &str) -> Vec<String> {
        let mut channels = Vec::with_capacity(3);
        for template in [&self.aggregate, &self.device, &self.unit_device] {
            let channel = render_channel(template, unit, device);
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
        channels
    }
}

/// Substitute `{unit}` and `{device}` in a channel template.
pub fn render_channel(template: &str, unit: &str, device: &str) -> String {
    template.replace("{unit}", unit).replace("{device}", device)
}

/// Output command intake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Subscribe to output commands
    #[serde(default = "default_commands_enabled")]
    pub enabled: bool,

    /// Key expression commands arrive on (`.../{device}/iolink/{port}`)
    #[serde(default = "default_command_key_expr")]
    pub key_expr: String,
}

fn default_commands_enabled() -> bool {
    true
}

fn default_command_key_expr() -> String {
    "instrument/*/iolink/*".to_string()
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            enabled: default_commands_enabled(),
            key_expr: default_command_key_expr(),
        }
    }
}
