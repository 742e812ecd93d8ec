//! Shared bridge state.
//!
//! Built once at startup and shared by `Arc` between the pollers, the command
//! intake and the query surface. Dropped by the runner at shutdown.

use std::sync::Arc;
use std::time::Duration;

use iolink_bridge_framework::{BridgeError, Publisher};

use crate::address::AddressResolver;
use crate::backoff::BackoffPolicy;
use crate::cache::ReadingCache;
use crate::config::IolinkConfig;
use crate::events::EventPublisher;
use crate::poller::DevicePoller;
use crate::relay::CommandRelay;

/// Everything the bridge's tasks share.
#[derive(Debug)]
pub struct BridgeContext {
    publisher: Publisher,
    http: reqwest::Client,
    cache: ReadingCache,
    resolver: AddressResolver,
    relay: CommandRelay,
    config: IolinkConfig,
}

/// The shared context plus one poller per configured device.
pub struct BridgeSetup {
    pub context: Arc<BridgeContext>,
    pub pollers: Vec<DevicePoller>,
}

impl BridgeContext {
    /// Build the context and the device pollers.
    ///
    /// Cache slots are registered here, before the context is shared, so each
    /// poller holds the only writer for its device.
    pub fn build(publisher: Publisher, config: IolinkConfig) -> Result<BridgeSetup, BridgeError> {
        let resolver = config.resolver()?;
        let timeout = Duration::from_millis(config.request_timeout_ms);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::config(format!("Failed to build HTTP client: {}", e)))?;

        let backoff = BackoffPolicy::from_config(&config);
        let mut cache = ReadingCache::new();
        let mut pollers = Vec::with_capacity(config.devices.len());

        for device in &config.devices {
            let slot = cache.register(&device.key).ok_or_else(|| {
                BridgeError::validation(format!("Duplicate device key '{}'", device.key))
            })?;

            let ip = resolver
                .normalize(device.host.as_deref())
                .map_err(|e| BridgeError::validation(format!("Device '{}': {}", device.key, e)))?;

            let events = EventPublisher::new(
                publisher.clone(),
                config.channels.channels_for(&config.unit.name, &device.key),
            );

            pollers.push(DevicePoller::new(
                device.clone(),
                ip,
                config.http_port,
                http.clone(),
                events,
                slot,
                backoff,
            ));
        }

        let relay = CommandRelay::new(http.clone(), resolver.clone(), config.http_port, timeout);

        let context = Arc::new(Self {
            publisher,
            http,
            cache,
            resolver,
            relay,
            config,
        });

        Ok(BridgeSetup { context, pollers })
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn cache(&self) -> &ReadingCache {
        &self.cache
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    pub fn relay(&self) -> &CommandRelay {
        &self.relay
    }

    pub fn config(&self) -> &IolinkConfig {
        &self.config
    }

    /// Configured host of a device, if the key is known.
    pub fn device_host(&self, key: &str) -> Option<&str> {
        self.config.device(key).and_then(|d| d.host.as_deref())
    }
}
