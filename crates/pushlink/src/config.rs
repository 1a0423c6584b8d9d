//! Client configuration.
//!
//! Configuration is captured once when a
//! [`ConnectionManager`](crate::ConnectionManager) is built and never changes
//! afterwards. It covers:
//! - The channel endpoint (scheme, host and path, never the token)
//! - Fixed-interval reconnection settings
//! - Heartbeat interval

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

/// Default delay between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;
/// Default cap on consecutive reconnection attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// Default channel path on the server.
pub const DEFAULT_WS_PATH: &str = "/ws/messages";

const fn default_reconnect_interval_ms() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_MS
}

const fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}

const fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

/// Connection manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Channel endpoint, e.g. `wss://example.com/ws/messages`.
    pub endpoint_url: String,
    /// Delay between reconnection attempts in milliseconds.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Consecutive reconnection attempts before giving up. Zero disables
    /// automatic reconnection.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Interval between heartbeat pings in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

impl ManagerConfig {
    /// Create a configuration with default timings.
    #[must_use]
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
        }
    }

    /// Set the reconnection interval.
    #[must_use]
    pub const fn with_reconnect_interval_ms(mut self, millis: u64) -> Self {
        self.reconnect_interval_ms = millis;
        self
    }

    /// Set the reconnection attempt cap.
    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub const fn with_heartbeat_interval_ms(mut self, millis: u64) -> Self {
        self.heartbeat_interval_ms = millis;
        self
    }

    /// Delay between reconnection attempts.
    #[must_use]
    pub const fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Interval between heartbeat pings.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ClientError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ClientError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ClientError> {
        toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("failed to serialize: {e}")))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ClientError> {
        let url = Url::parse(&self.endpoint_url)?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::Config(format!(
                "endpoint_url must use ws:// or wss://, got '{}'",
                url.scheme()
            )));
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(ClientError::Config(
                "endpoint_url must not carry a query or fragment".to_string(),
            ));
        }

        if self.reconnect_interval_ms == 0 {
            return Err(ClientError::Config(
                "reconnect_interval_ms must be positive".to_string(),
            ));
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(ClientError::Config(
                "heartbeat_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the transport URL for `token`: the endpoint with the token
    /// appended as one percent-encoded path segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot carry path segments.
    pub fn session_url(&self, token: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.endpoint_url)?;
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::InvalidUrl(format!("{} cannot have a path", self.endpoint_url))
            })?
            .pop_if_empty()
            .push(token);
        Ok(url)
    }
}

/// Endpoint location pieces, resolved from flags or environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Use `wss` instead of `ws`.
    pub secure: bool,
    /// Host with optional port.
    pub host: String,
    /// Channel path.
    pub path: String,
}

impl Endpoint {
    /// Create a plain-text endpoint on the default path.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            secure: false,
            host: host.into(),
            path: DEFAULT_WS_PATH.to_string(),
        }
    }

    /// Use TLS.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Override the channel path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Render as an endpoint URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let path = self.path.trim_start_matches('/');
        format!("{scheme}://{}/{path}", self.host.trim_end_matches('/'))
    }
}
