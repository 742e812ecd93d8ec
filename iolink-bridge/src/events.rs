//! Event envelopes and their publication on the bus.
//!
//! A reading is published twice: once as an engineering value at
//! [`ENGINEERING_ADDRESS`], once as the raw process data at the device's
//! `pdin` address. Subscribers receive the envelope layout IO-Link masters use
//! for their own data-changed events:
//!
//! ```json
//! {"code":"event","correlation_id":123,"address":"/processdatamaster/temperature",
//!  "data":{"event_sequence":"1718000000",
//!          "source_url":"htr_a/timer[1]/counter/datachanged",
//!          "payload":{"/processdatamaster/temperature":{"code":200,"data":20.0}}}}
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iolink_bridge_framework::{PublishStats, Publisher};

use crate::cache::Reading;

/// Address of the engineering value.
pub const ENGINEERING_ADDRESS: &str = "/processdatamaster/temperature";

const EVENT_CODE: &str = "event";
const CORRELATION_ID: u64 = 123;
const PAYLOAD_OK: u16 = 200;

/// Address of a port's raw process data.
pub fn raw_address(port: u8) -> String {
    format!("/iolinkmaster/port[{}]/iolinkdevice/pdin", port)
}

/// A data-changed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub code: String,
    pub correlation_id: u64,
    pub address: String,
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// Unix seconds, as text.
    pub event_sequence: String,
    pub source_url: String,
    pub payload: BTreeMap<String, PayloadEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadEntry {
    pub code: u16,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Build an envelope carrying `data` at `address`.
    pub fn new(
        device_id: &str,
        address: impl Into<String>,
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let address = address.into();
        let mut payload = BTreeMap::new();
        payload.insert(
            address.clone(),
            PayloadEntry {
                code: PAYLOAD_OK,
                data,
            },
        );

        Self {
            code: EVENT_CODE.to_string(),
            correlation_id: CORRELATION_ID,
            address,
            data: EventData {
                event_sequence: timestamp.timestamp().to_string(),
                source_url: format!("{}/timer[1]/counter/datachanged", device_id),
                payload,
            },
        }
    }

    /// Envelope for an engineering value.
    pub fn engineering(device_id: &str, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            device_id,
            ENGINEERING_ADDRESS,
            serde_json::json!(value),
            timestamp,
        )
    }

    /// Envelope for raw process data.
    pub fn raw(device_id: &str, port: u8, raw: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            device_id,
            raw_address(port),
            serde_json::Value::String(raw.to_string()),
            timestamp,
        )
    }

    /// The value carried at the envelope's own address.
    pub fn value(&self) -> Option<&serde_json::Value> {
        self.data.payload.get(&self.address).map(|entry| &entry.data)
    }
}

/// Publishes envelopes for one device on its channels.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    publisher: Publisher,
    channels: Vec<String>,
}

impl EventPublisher {
    pub fn new(publisher: Publisher, channels: Vec<String>) -> Self {
        Self {
            publisher,
            channels,
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Put one envelope on every channel.
    pub async fn publish(&self, envelope: &EventEnvelope) -> PublishStats {
        self.publisher
            .publish_to_keys(&self.channels, envelope)
            .await
    }

    /// Publish both envelopes of a reading.
    ///
    /// The two are independent: a failed engineering put does not stop the
    /// raw one.
    pub async fn publish_reading(&self, device_id: &str, port: u8, reading: &Reading) -> PublishStats {
        let engineering = EventEnvelope::engineering(device_id, reading.value, reading.timestamp);
        let raw = EventEnvelope::raw(device_id, port, &reading.raw, reading.timestamp);

        let mut stats = self.publish(&engineering).await;
        stats.merge(self.publish(&raw).await);

        if stats.failed > 0 {
            tracing::warn!(
                device = %reading.device,
                failed = stats.failed,
                total = stats.total(),
                "Some event puts failed"
            );
        } else {
            tracing::debug!(device = %reading.device, value = reading.value, "Published reading");
        }

        stats
    }
}
