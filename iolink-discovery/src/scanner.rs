//! Subnet enumeration and master probing.

use std::net::Ipv4Addr;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::device::DiscoveredDevice;
use crate::device_id::{
    DEVICE_ID_PATHS, STATUS_PAGES, device_id_from_body, device_id_from_page,
};
use crate::error::{DiscoveryError, Result};
use crate::identity::IdentityResolver;

/// Path every IO-Link master answers with its device info.
pub const DEVICE_INFO_PATH: &str = "/iolinkmaster/deviceinfo";

/// Third octets of the default-route gateways.
pub fn subnets_from_gateways(gateways: impl IntoIterator<Item = Ipv4Addr>) -> Vec<u8> {
    let mut subnets = Vec::new();
    for gateway in gateways {
        let subnet = gateway.octets()[2];
        if !subnets.contains(&subnet) {
            subnets.push(subnet);
        }
    }
    subnets
}

/// Configured subnets, else the subnets of `gateways`, else the fallback set.
pub fn select_subnets(
    config: &DiscoveryConfig,
    gateways: impl IntoIterator<Item = Ipv4Addr>,
) -> Vec<u8> {
    if !config.subnets.is_empty() {
        return config.subnets.clone();
    }

    let found = subnets_from_gateways(gateways);
    if found.is_empty() {
        info!(subnets = ?config.default_subnets, "No default route, using default subnets");
        config.default_subnets.clone()
    } else {
        found
    }
}

/// Gateways of the default routes in the kernel routing table.
#[cfg(target_os = "linux")]
pub fn default_gateways() -> Vec<Ipv4Addr> {
    match procfs::net::route() {
        Ok(routes) => routes
            .into_iter()
            .filter(|r| r.destination.is_unspecified() && r.mask.is_unspecified())
            .filter(|r| !r.gateway.is_unspecified())
            .map(|r| r.gateway)
            .collect(),
        Err(e) => {
            warn!(error = %e, "Cannot read routing table");
            Vec::new()
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn default_gateways() -> Vec<Ipv4Addr> {
    Vec::new()
}

/// Outcome of looking up one host's device ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostLookup {
    /// Nothing accepts connections on the master's HTTP port.
    Unreachable,
    /// Reachable, but no endpoint or page gave a device ID.
    NotFound,
    /// The ID and the path it was read from.
    Found { device_id: String, path: String },
}

/// Probes candidate hosts and resolves their identity.
pub struct DiscoveryScanner {
    client: reqwest::Client,
    config: DiscoveryConfig,
    prefix: [u8; 2],
    identity: IdentityResolver,
}

impl DiscoveryScanner {
    pub fn new(config: DiscoveryConfig, identity: IdentityResolver) -> Result<Self> {
        let prefix = config.prefix_octets()?;
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .map_err(|e| DiscoveryError::Http(e.to_string()))?;

        Ok(Self {
            client,
            config,
            prefix,
            identity,
        })
    }

    /// Scanner with the standard identity chain.
    pub fn from_config(config: DiscoveryConfig) -> Result<Self> {
        let identity = IdentityResolver::standard(config.active_scan, config.probe_timeout());
        Self::new(config, identity)
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Subnets to scan for this host's routing table.
    pub fn subnets(&self) -> Vec<u8> {
        if !self.config.subnets.is_empty() {
            return self.config.subnets.clone();
        }

        select_subnets(&self.config, default_gateways())
    }

    /// Scan every subnet, one after the other.
    pub async fn discover_all(&self) -> Vec<DiscoveredDevice> {
        info!("Starting IO-Link discovery");

        let mut devices = Vec::new();
        for subnet in self.subnets() {
            devices.extend(self.scan_subnet(subnet).await);
        }

        info!(count = devices.len(), "Discovery complete");
        devices
    }

    /// Probe every candidate host of a subnet concurrently.
    pub async fn scan_subnet(&self, subnet: u8) -> Vec<DiscoveredDevice> {
        let [a, b] = self.prefix;
        info!("Scanning subnet {}.{}.{}.x for IO-Link masters", a, b, subnet);

        let probes = self
            .config
            .candidate_hosts
            .iter()
            .map(|host| self.check_host(Ipv4Addr::new(a, b, subnet, *host), subnet));

        let devices: Vec<DiscoveredDevice> = join_all(probes).await.into_iter().flatten().collect();

        for device in &devices {
            info!(ip = %device.ip, mac = %device.mac, "Found IO-Link master");
        }

        devices
    }

    /// Probe one host; `Some` only when it answers and its MAC is known.
    pub async fn check_host(&self, ip: Ipv4Addr, subnet: u8) -> Option<DiscoveredDevice> {
        let device_info = self.probe(ip).await?;

        match self.identity.resolve(ip, &device_info).await {
            Some(mac) => Some(DiscoveredDevice::new(ip, mac, subnet)),
            None => {
                warn!(%ip, "Master answered but its MAC address could not be resolved, skipping");
                None
            }
        }
    }

    fn url(&self, ip: Ipv4Addr, path: &str) -> String {
        match self.config.http_port {
            Some(port) => format!("http://{}:{}{}", ip, port, path),
            None => format!("http://{}{}", ip, path),
        }
    }

    /// GET the device info; `Some` for a 200 response with a JSON body.
    pub async fn probe(&self, ip: Ipv4Addr) -> Option<serde_json::Value> {
        let url = self.url(ip, DEVICE_INFO_PATH);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(%ip, error = %e, "No answer");
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            debug!(%ip, status = %response.status(), "Not an IO-Link master");
            return None;
        }

        match response.json::<serde_json::Value>().await {
            Ok(info) => Some(info),
            Err(e) => {
                debug!(%ip, error = %e, "Device info is not JSON");
                None
            }
        }
    }

    /// Whether the master's HTTP port accepts a TCP connection.
    pub async fn is_reachable(&self, ip: Ipv4Addr) -> bool {
        let port = self.config.http_port.unwrap_or(80);
        let connect = tokio::net::TcpStream::connect((ip, port));

        match tokio::time::timeout(self.config.probe_timeout(), connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(%ip, port, error = %e, "Connection failed");
                false
            }
            Err(_) => {
                debug!(%ip, port, "Connection timed out");
                false
            }
        }
    }

    /// Find the device ID of a single master.
    ///
    /// Tries the device-info endpoints first, then searches the status pages.
    pub async fn lookup_device_id(&self, ip: Ipv4Addr) -> HostLookup {
        if !self.is_reachable(ip).await {
            return HostLookup::Unreachable;
        }

        for path in DEVICE_ID_PATHS {
            let body = self.fetch(ip, path).await;
            if let Some(device_id) = body.as_deref().and_then(device_id_from_body) {
                info!(%ip, path, %device_id, "Found device ID");
                return HostLookup::Found {
                    device_id,
                    path: path.to_string(),
                };
            }
        }

        for path in STATUS_PAGES {
            let body = self.fetch(ip, path).await;
            if let Some(device_id) = body.as_deref().and_then(device_id_from_page) {
                info!(%ip, path, %device_id, "Found device ID on status page");
                return HostLookup::Found {
                    device_id,
                    path: path.to_string(),
                };
            }
        }

        HostLookup::NotFound
    }

    /// Body of a 200 response, `None` for anything else.
    async fn fetch(&self, ip: Ipv4Addr, path: &str) -> Option<String> {
        let response = match self.client.get(self.url(ip, path)).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(%ip, path, error = %e, "Request failed");
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            debug!(%ip, path, status = %response.status(), "No device info");
            return None;
        }

        response.text().await.ok()
    }
}
