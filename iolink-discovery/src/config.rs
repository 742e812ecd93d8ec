//! Discovery configuration.
//!
//! Everything has a default, so the tool runs without a config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use iolink_common::LoggingConfig;

use crate::error::{DiscoveryError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Subnets to scan. Empty means: derive from the default routes.
    #[serde(default)]
    pub subnets: Vec<u8>,

    /// Subnets scanned when no default route is found
    #[serde(default = "default_subnets")]
    pub default_subnets: Vec<u8>,

    /// Host octets probed in every subnet
    #[serde(default = "default_candidate_hosts")]
    pub candidate_hosts: Vec<u8>,

    /// First two octets of every scanned address
    #[serde(default = "default_network_prefix")]
    pub network_prefix: String,

    /// HTTP port of the masters when it is not 80
    #[serde(default)]
    pub http_port: Option<u16>,

    /// Timeout of each probe and of the active scan
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Fall back to `nmap -sn` when ARP and device info give no MAC
    #[serde(default = "default_active_scan")]
    pub active_scan: bool,

    /// Registry file
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_subnets() -> Vec<u8> {
    vec![20, 21, 22, 25, 30]
}

fn default_candidate_hosts() -> Vec<u8> {
    (29..=35).collect()
}

fn default_network_prefix() -> String {
    "192.168".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_active_scan() -> bool {
    true
}

fn default_output() -> PathBuf {
    PathBuf::from("discovered_devices.json")
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            subnets: Vec::new(),
            default_subnets: default_subnets(),
            candidate_hosts: default_candidate_hosts(),
            network_prefix: default_network_prefix(),
            http_port: None,
            probe_timeout_ms: default_probe_timeout_ms(),
            active_scan: default_active_scan(),
            output: default_output(),
        }
    }
}

impl DiscoveryConfig {
    /// Load and validate a JSON5 file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = iolink_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON5 string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = iolink_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// The two prefix octets.
    pub fn prefix_octets(&self) -> Result<[u8; 2]> {
        let octets: Vec<u8> = self
            .network_prefix
            .split('.')
            .map(|p| p.parse::<u8>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| self.prefix_error())?;

        match octets.as_slice() {
            [a, b] => Ok([*a, *b]),
            _ => Err(self.prefix_error()),
        }
    }

    fn prefix_error(&self) -> DiscoveryError {
        DiscoveryError::Config(format!(
            "Invalid network_prefix '{}' (expected two octets, e.g. 192.168)",
            self.network_prefix
        ))
    }

    pub fn validate(&self) -> Result<()> {
        self.prefix_octets()?;

        if self.candidate_hosts.is_empty() {
            return Err(DiscoveryError::Config(
                "candidate_hosts cannot be empty".to_string(),
            ));
        }

        if self.subnets.is_empty() && self.default_subnets.is_empty() {
            return Err(DiscoveryError::Config(
                "default_subnets cannot be empty when no subnets are given".to_string(),
            ));
        }

        if self.probe_timeout_ms == 0 {
            return Err(DiscoveryError::Config(
                "probe_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::parse("{}").unwrap();
        assert!(config.subnets.is_empty());
        assert_eq!(config.default_subnets, vec![20, 21, 22, 25, 30]);
        assert_eq!(config.candidate_hosts, vec![29, 30, 31, 32, 33, 34, 35]);
        assert_eq!(config.prefix_octets().unwrap(), [192, 168]);
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert!(config.active_scan);
        assert_eq!(config.output, PathBuf::from("discovered_devices.json"));
    }

    #[test]
    fn test_overrides() {
        let config = DiscoveryConfig::parse(
            r#"{
                subnets: [30],
                candidate_hosts: [40, 41],
                network_prefix: "10.1",
                active_scan: false,
                output: "/tmp/unit3.json",
            }"#,
        )
        .unwrap();

        assert_eq!(config.subnets, vec![30]);
        assert_eq!(config.prefix_octets().unwrap(), [10, 1]);
        assert!(!config.active_scan);
    }

    #[test]
    fn test_validation() {
        assert!(DiscoveryConfig::parse(r#"{ network_prefix: "192" }"#).is_err());
        assert!(DiscoveryConfig::parse(r#"{ network_prefix: "192.999" }"#).is_err());
        assert!(DiscoveryConfig::parse(r#"{ candidate_hosts: [] }"#).is_err());
        assert!(DiscoveryConfig::parse(r#"{ default_subnets: [] }"#).is_err());
        assert!(DiscoveryConfig::parse(r#"{ default_subnets: [], subnets: [20] }"#).is_ok());
    }
}
