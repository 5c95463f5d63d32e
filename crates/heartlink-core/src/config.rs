//! Runtime configuration for the central.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use heartlink_types::DecoderMode;

use crate::error::{Error, Result};

/// Advertised name of the peripheral the central connects to.
pub const DEFAULT_TARGET_NAME: &str = "BLEScanner";

/// Default capacity of the transport event channel.
const DEFAULT_EVENT_BUFFER: usize = 64;

/// Default capacity of the command channel.
const DEFAULT_COMMAND_BUFFER: usize = 16;

/// Default capacity of the observer broadcast channel.
const DEFAULT_OBSERVER_CAPACITY: usize = 100;

/// Default timeout for a connection attempt.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 10;

/// Configuration for [`HeartRateCentral`](crate::HeartRateCentral) and the
/// btleplug transport.
///
/// Deserializes from TOML/JSON with every field optional:
///
/// ```
/// use heartlink_core::CentralConfig;
///
/// let config = CentralConfig::default()
///     .target_name("Polar H10 1234")
///     .event_buffer(128);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralConfig {
    /// Exact advertised name that triggers a connection.
    pub target_name: String,
    /// Capacity of the bounded transport event channel.
    pub event_buffer: usize,
    /// Capacity of the command channel.
    pub command_buffer: usize,
    /// Capacity of the observer broadcast channel.
    pub observer_capacity: usize,
    /// Payload decoder.
    pub decoder: DecoderMode,
    /// Connection attempt timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Service discovery timeout in seconds.
    pub discovery_timeout_secs: u64,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            target_name: DEFAULT_TARGET_NAME.to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            observer_capacity: DEFAULT_OBSERVER_CAPACITY,
            decoder: DecoderMode::default(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            discovery_timeout_secs: DEFAULT_DISCOVERY_TIMEOUT_SECS,
        }
    }
}

impl CentralConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target peripheral name.
    #[must_use]
    pub fn target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = name.into();
        self
    }

    /// Set the transport event channel capacity.
    #[must_use]
    pub fn event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    /// Set the command channel capacity.
    #[must_use]
    pub fn command_buffer(mut self, size: usize) -> Self {
        self.command_buffer = size;
        self
    }

    /// Set the observer broadcast capacity.
    #[must_use]
    pub fn observer_capacity(mut self, size: usize) -> Self {
        self.observer_capacity = size;
        self
    }

    /// Set the payload decoder.
    #[must_use]
    pub fn decoder(mut self, decoder: DecoderMode) -> Self {
        self.decoder = decoder;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout_secs = timeout.as_secs();
        self
    }

    /// Connection timeout as a [`Duration`].
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Discovery timeout as a [`Duration`].
    pub fn discovery_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    /// Validate the config and return an error if invalid.
    ///
    /// Checks that:
    /// - `target_name` is not empty
    /// - all channel capacities are > 0
    /// - both timeouts are > 0
    pub fn validate(&self) -> Result<()> {
        if self.target_name.is_empty() {
            return Err(Error::invalid_config("target_name must not be empty"));
        }
        if self.event_buffer == 0 {
            return Err(Error::invalid_config("event_buffer must be > 0"));
        }
        if self.command_buffer == 0 {
            return Err(Error::invalid_config("command_buffer must be > 0"));
        }
        if self.observer_capacity == 0 {
            return Err(Error::invalid_config("observer_capacity must be > 0"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::invalid_config("connect_timeout_secs must be > 0"));
        }
        if self.discovery_timeout_secs == 0 {
            return Err(Error::invalid_config("discovery_timeout_secs must be > 0"));
        }
        Ok(())
    }
}
