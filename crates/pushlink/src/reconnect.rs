//! Fixed-interval reconnection policy.
//!
//! Unlike exponential backoff, every retry waits the same interval. The
//! attempt counter lives in the connection manager and resets to zero each
//! time a connection opens, so the cap bounds consecutive failures only.

use std::time::Duration;

use crate::config::ManagerConfig;

/// Reconnection policy derived from [`ManagerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before each reconnection attempt.
    pub interval: Duration,
    /// Maximum consecutive attempts.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Decide the next attempt given how many have already been made.
    ///
    /// Returns the 1-based number of the next attempt and its delay, or
    /// `None` once the cap is reached.
    #[must_use]
    pub fn next_attempt(&self, attempts_made: u32) -> Option<(u32, Duration)> {
        self.should_reconnect(attempts_made)
            .then(|| (attempts_made + 1, self.interval))
    }

    /// Check if another attempt is allowed.
    #[must_use]
    pub const fn should_reconnect(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl From<&ManagerConfig> for ReconnectPolicy {
    fn from(config: &ManagerConfig) -> Self {
        Self::new(config.reconnect_interval(), config.max_reconnect_attempts)
    }
}
