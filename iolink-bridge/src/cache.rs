//! Latest reading per device.
//!
//! Every device key gets one slot. The slot's single writer is handed out by
//! [`ReadingCache::register`] before the cache is shared, after which the key
//! set never changes. Each slot is a `watch` channel, so readers always see a
//! complete snapshot and never contend with writers of other keys.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A decoded reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Engineering value.
    pub value: f64,
    /// Engineering unit label.
    pub unit: String,
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
    /// Process data as received from the master.
    pub raw: String,
    /// Device key.
    pub device: String,
}

/// What the cache holds for one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Most recent successful reading.
    pub reading: Option<Reading>,
    /// Network errors since the last successful read.
    pub consecutive_errors: u32,
    /// Message of the most recent network error.
    pub last_error: Option<String>,
}

/// Map from device key to its latest snapshot.
#[derive(Debug, Default)]
pub struct ReadingCache {
    slots: BTreeMap<String, watch::Receiver<DeviceSnapshot>>,
}

impl ReadingCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key and return its writer.
    ///
    /// Returns `None` if the key already has a writer.
    pub fn register(&mut self, key: impl Into<String>) -> Option<ReadingSlot> {
        let key = key.into();
        if self.slots.contains_key(&key) {
            return None;
        }

        let (tx, rx) = watch::channel(DeviceSnapshot::default());
        self.slots.insert(key.clone(), rx);
        Some(ReadingSlot { key, tx })
    }

    /// Latest reading for a key.
    pub fn latest(&self, key: &str) -> Option<Reading> {
        self.slots.get(key).and_then(|rx| rx.borrow().reading.clone())
    }

    /// Full snapshot for a key.
    pub fn snapshot(&self, key: &str) -> Option<DeviceSnapshot> {
        self.slots.get(key).map(|rx| rx.borrow().clone())
    }

    /// Snapshots of every registered key, ordered by key.
    pub fn snapshots(&self) -> Vec<(String, DeviceSnapshot)> {
        self.slots
            .iter()
            .map(|(key, rx)| (key.clone(), rx.borrow().clone()))
            .collect()
    }

    /// Registered keys, ordered.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The single writer of one cache slot.
#[derive(Debug)]
pub struct ReadingSlot {
    key: String,
    tx: watch::Sender<DeviceSnapshot>,
}

impl ReadingSlot {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Store a successful reading, clearing the error state.
    pub fn record_reading(&self, reading: Reading) {
        self.tx.send_modify(|snapshot| {
            snapshot.reading = Some(reading);
            snapshot.consecutive_errors = 0;
            snapshot.last_error = None;
        });
    }

    /// Count a network error. The previous reading is kept.
    pub fn record_error(&self, message: impl Into<String>) -> u32 {
        let message = message.into();
        let mut errors = 0;
        self.tx.send_modify(|snapshot| {
            snapshot.consecutive_errors = snapshot.consecutive_errors.saturating_add(1);
            snapshot.last_error = Some(message);
            errors = snapshot.consecutive_errors;
        });
        errors
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.tx.borrow().consecutive_errors
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.tx.borrow().clone()
    }
}
