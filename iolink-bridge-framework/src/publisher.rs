//! JSON publisher for Zenoh.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{BridgeError, Result};

/// Publisher for sending JSON messages to Zenoh.
///
/// Wraps a Zenoh session and provides convenient methods for publishing
/// serializable values to one or many key expressions.
#[derive(Clone, Debug)]
pub struct Publisher {
    session: Arc<zenoh::Session>,
    key_prefix: String,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(session: Arc<zenoh::Session>, key_prefix: impl Into<String>) -> Self {
        Self {
            session,
            key_prefix: key_prefix.into(),
        }
    }

    /// Get the key prefix.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Get a reference to the Zenoh session.
    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Build a full key expression from a suffix.
    pub fn build_key(&self, suffix: &str) -> String {
        join_key(&self.key_prefix, suffix)
    }

    /// Publish a JSON value under the publisher's prefix.
    pub async fn publish<T: Serialize>(&self, key_suffix: &str, value: &T) -> Result<()> {
        let key = self.build_key(key_suffix);
        self.publish_json(&key, value).await
    }

    /// Publish a JSON value to a full key (not using prefix).
    pub async fn publish_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(key, payload).await
    }

    /// Publish raw bytes to a key.
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Publish the same JSON value to several full keys.
    ///
    /// Each put is independent: a failure is logged and counted, and the
    /// remaining keys are still attempted.
    pub async fn publish_to_keys<T, I, K>(&self, keys: I, value: &T) -> PublishStats
    where
        T: Serialize,
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut stats = PublishStats::default();

        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize message");
                stats.failed = keys.into_iter().count();
                return stats;
            }
        };

        for key in keys {
            let key = key.as_ref();
            match self.publish_raw(key, payload.clone()).await {
                Ok(()) => {
                    stats.success += 1;
                    tracing::trace!(key, "Published");
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(error = %e, "Failed to publish message");
                }
            }
        }

        stats
    }
}

/// Join a key prefix and a suffix with a `/`.
pub fn join_key(prefix: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        prefix.to_string()
    } else if prefix.is_empty() {
        suffix.to_string()
    } else {
        format!("{}/{}", prefix, suffix)
    }
}

/// Statistics from a multi-key publish operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successful puts.
    pub success: usize,
    /// Number of failed puts.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted puts.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }

    /// Merge another set of statistics into this one.
    pub fn merge(&mut self, other: PublishStats) {
        self.success += other.success;
        self.failed += other.failed;
    }
}
