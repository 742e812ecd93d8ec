//! Hardware identity resolution.
//!
//! A master answering on HTTP is only registered once its MAC address is
//! known. Strategies are tried in order and the first hit wins:
//!
//! 1. the kernel ARP table (the probe itself usually populated it)
//! 2. the `mac` / `macAddress` field of the master's device info
//! 3. an active `nmap -sn` scan of the host

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use crate::mac::MacAddress;

/// One way of finding a host's MAC address.
#[async_trait]
pub trait IdentityStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, ip: Ipv4Addr, device_info: &serde_json::Value) -> Option<MacAddress>;
}

/// Kernel neighbour table (`/proc/net/arp`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ArpTable;

#[async_trait]
impl IdentityStrategy for ArpTable {
    fn name(&self) -> &'static str {
        "arp"
    }

    async fn resolve(&self, ip: Ipv4Addr, _device_info: &serde_json::Value) -> Option<MacAddress> {
        arp_lookup(ip)
    }
}

#[cfg(target_os = "linux")]
fn arp_lookup(ip: Ipv4Addr) -> Option<MacAddress> {
    let entries = match procfs::net::arp() {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(error = %e, "Cannot read ARP table");
            return None;
        }
    };

    entries
        .into_iter()
        .filter(|entry| entry.ip_address == ip)
        .find_map(|entry| entry.hw_address.and_then(MacAddress::from_bytes))
}

#[cfg(not(target_os = "linux"))]
fn arp_lookup(_ip: Ipv4Addr) -> Option<MacAddress> {
    None
}

/// The MAC the master reports about itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceInfoField;

#[async_trait]
impl IdentityStrategy for DeviceInfoField {
    fn name(&self) -> &'static str {
        "deviceinfo"
    }

    async fn resolve(&self, _ip: Ipv4Addr, device_info: &serde_json::Value) -> Option<MacAddress> {
        mac_from_device_info(device_info)
    }
}

/// Read `mac` or `macAddress` from a device info payload.
pub fn mac_from_device_info(device_info: &serde_json::Value) -> Option<MacAddress> {
    ["mac", "macAddress"]
        .into_iter()
        .filter_map(|field| device_info.get(field).and_then(|v| v.as_str()))
        .find_map(|s| s.parse().ok())
}

/// `nmap -sn <ip>`, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct ActiveScan {
    program: String,
    timeout: Duration,
}

impl ActiveScan {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "nmap".to_string(),
            timeout,
        }
    }

    /// Use another scanner binary with nmap-compatible output.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl IdentityStrategy for ActiveScan {
    fn name(&self) -> &'static str {
        "active-scan"
    }

    async fn resolve(&self, ip: Ipv4Addr, _device_info: &serde_json::Value) -> Option<MacAddress> {
        let mut command = tokio::process::Command::new(&self.program);
        command.arg("-sn").arg(ip.to_string()).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(output)) => {
                tracing::debug!(%ip, status = %output.status, "Active scan failed");
                return None;
            }
            Ok(Err(e)) => {
                tracing::debug!(%ip, program = %self.program, error = %e, "Cannot run active scan");
                return None;
            }
            Err(_) => {
                tracing::debug!(%ip, timeout = ?self.timeout, "Active scan timed out");
                return None;
            }
        };

        parse_nmap_mac(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Extract the MAC from `nmap -sn` output (`MAC Address: 00:02:01:AA:BB:CC (Vendor)`).
pub fn parse_nmap_mac(output: &str) -> Option<MacAddress> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once("MAC Address:")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// Ordered chain of identity strategies.
pub struct IdentityResolver {
    strategies: Vec<Box<dyn IdentityStrategy>>,
}

impl IdentityResolver {
    pub fn new(strategies: Vec<Box<dyn IdentityStrategy>>) -> Self {
        Self { strategies }
    }

    /// ARP, then device info, then (optionally) an active scan.
    pub fn standard(active_scan: bool, timeout: Duration) -> Self {
        let mut strategies: Vec<Box<dyn IdentityStrategy>> =
            vec![Box::new(ArpTable), Box::new(DeviceInfoField)];
        if active_scan {
            strategies.push(Box::new(ActiveScan::new(timeout)));
        }
        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First MAC any strategy finds.
    pub async fn resolve(&self, ip: Ipv4Addr, device_info: &serde_json::Value) -> Option<MacAddress> {
        for strategy in &self.strategies {
            if let Some(mac) = strategy.resolve(ip, device_info).await {
                tracing::debug!(%ip, %mac, strategy = strategy.name(), "Resolved identity");
                return Some(mac);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl IdentityStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn resolve(&self, _ip: Ipv4Addr, _info: &serde_json::Value) -> Option<MacAddress> {
            self.0.and_then(|s| s.parse().ok())
        }
    }

    #[test]
    fn test_mac_from_device_info() {
        let mac = mac_from_device_info(&json!({ "mac": "00:02:01:aa:bb:cc" })).unwrap();
        assert_eq!(mac.to_string(), "00:02:01:AA:BB:CC");

        let mac = mac_from_device_info(&json!({ "macAddress": "00-02-01-AA-BB-CD" })).unwrap();
        assert_eq!(mac.to_string(), "00:02:01:AA:BB:CD");

        assert!(mac_from_device_info(&json!({ "mac": "00:00:00:00:00:00" })).is_none());
        assert!(mac_from_device_info(&json!({ "serial": "X1" })).is_none());
    }

    #[test]
    fn test_parse_nmap_mac() {
        let output = "Starting Nmap 7.94\n\
                      Nmap scan report for 192.168.20.29\n\
                      Host is up (0.00050s latency).\n\
                      MAC Address: 00:02:01:AA:BB:CC (ifm electronic)\n\
                      Nmap done: 1 IP address (1 host up) scanned in 0.21 seconds\n";
        assert_eq!(
            parse_nmap_mac(output).unwrap().to_string(),
            "00:02:01:AA:BB:CC"
        );
        assert!(parse_nmap_mac("Host seems down.").is_none());
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let resolver = IdentityResolver::new(vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some("00:02:01:00:00:01"))),
            Box::new(Fixed(Some("00:02:01:00:00:02"))),
        ]);

        let mac = resolver.resolve(Ipv4Addr::LOCALHOST, &json!({})).await;
        assert_eq!(mac.unwrap().to_string(), "00:02:01:00:00:01");
    }

    #[tokio::test]
    async fn test_missing_scanner_binary() {
        let scan = ActiveScan::new(Duration::from_secs(1)).with_program("/nonexistent/nmap");
        assert!(scan.resolve(Ipv4Addr::LOCALHOST, &json!({})).await.is_none());
    }

    #[test]
    fn test_standard_chain() {
        let resolver = IdentityResolver::standard(false, Duration::from_secs(1));
        assert_eq!(resolver.strategy_names(), vec!["arp", "deviceinfo"]);

        let resolver = IdentityResolver::standard(true, Duration::from_secs(1));
        assert_eq!(resolver.strategy_names().len(), 3);
    }
}
