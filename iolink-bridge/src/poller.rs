//! IO-Link device polling and event publishing.

use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::cache::{Reading, ReadingSlot};
use crate::config::DeviceConfig;
use crate::decode::decode_process_data;
use crate::events::EventPublisher;
use crate::relay::master_base_url;

/// Error type for polling operations.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// Timeout, refused connection or non-success status.
    #[error("Network error: {0}")]
    Network(String),
    /// Unparseable body, missing field or bad hex.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Published(Reading),
    NetworkError { consecutive_errors: u32 },
    ProtocolError,
}

/// URL of a port's process data input.
pub fn pdin_url(ip: Ipv4Addr, http_port: Option<u16>, port: u8) -> String {
    format!(
        "{}/iolinkmaster/port[{}]/iolinkdevice/pdin/getdata",
        master_base_url(ip, http_port),
        port
    )
}

/// A poller for a single IO-Link device.
pub struct DevicePoller {
    device: DeviceConfig,
    url: String,
    client: reqwest::Client,
    events: EventPublisher,
    slot: ReadingSlot,
    backoff: BackoffPolicy,
}

impl DevicePoller {
    /// Create a new poller for a device at a resolved address.
    pub fn new(
        device: DeviceConfig,
        ip: Ipv4Addr,
        http_port: Option<u16>,
        client: reqwest::Client,
        events: EventPublisher,
        slot: ReadingSlot,
        backoff: BackoffPolicy,
    ) -> Self {
        let url = pdin_url(ip, http_port, device.port);
        Self {
            device,
            url,
            client,
            events,
            slot,
            backoff,
        }
    }

    pub fn key(&self) -> &str {
        &self.device.key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run the polling loop.
    pub async fn run(self) {
        info!(
            device = %self.device.key,
            url = %self.url,
            channels = ?self.events.channels(),
            "Starting IO-Link poller"
        );

        loop {
            self.poll_cycle().await;
            tokio::time::sleep(self.next_delay()).await;
        }
    }

    /// Delay before the next cycle given the current error count.
    pub fn next_delay(&self) -> Duration {
        self.backoff.delay(self.slot.consecutive_errors())
    }

    /// Perform one poll cycle: fetch, decode, publish, cache.
    pub async fn poll_cycle(&self) -> CycleOutcome {
        match self.poll_once().await {
            Ok(reading) => {
                self.events
                    .publish_reading(self.device.device_id(), self.device.port, &reading)
                    .await;
                self.slot.record_reading(reading.clone());
                CycleOutcome::Published(reading)
            }
            Err(PollError::Network(message)) => {
                let errors = self.slot.record_error(message.clone());
                warn!(
                    device = %self.device.key,
                    consecutive_errors = errors,
                    error = %message,
                    "Poll failed"
                );
                CycleOutcome::NetworkError {
                    consecutive_errors: errors,
                }
            }
            Err(e @ PollError::Protocol(_)) => {
                warn!(device = %self.device.key, error = %e, "Skipping cycle");
                CycleOutcome::ProtocolError
            }
        }
    }

    /// Fetch and decode one reading.
    async fn poll_once(&self) -> Result<Reading, PollError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PollError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Network(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PollError::Network(e.to_string()))?;

        let raw = extract_value(&body)?;
        let decoded = decode_process_data(&raw).map_err(|e| PollError::Protocol(e.to_string()))?;

        debug!(device = %self.device.key, raw = %raw, value = decoded.value, "Decoded process data");

        Ok(Reading {
            value: decoded.value,
            unit: self.device.unit_label.clone(),
            timestamp: Utc::now(),
            raw,
            device: self.device.key.clone(),
        })
    }
}

/// Pull `data.value` out of a `getdata` response.
fn extract_value(body: &[u8]) -> Result<String, PollError> {
    let json: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| PollError::Protocol(e.to_string()))?;

    json.pointer("/data/value")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| PollError::Protocol("missing data.value".to_string()))
}
