//! Connection status types.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Status of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Not connected. Initial state, and final state after a manual
    /// disconnect or exhausted reconnection.
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport open; heartbeats running.
    Connected,
    /// The transport reported an error. A close normally follows.
    Error,
}

impl ConnectionStatus {
    /// Lowercase name as used in logs and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic wrapper for connection status.
///
/// Written only while the manager's state lock is held, so readers see
/// transitions in order without taking the lock themselves.
#[derive(Debug)]
pub(crate) struct AtomicConnectionStatus(AtomicU32);

impl AtomicConnectionStatus {
    pub(crate) const fn new(status: ConnectionStatus) -> Self {
        Self(AtomicU32::new(status as u32))
    }

    pub(crate) fn load(&self) -> ConnectionStatus {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionStatus::Disconnected,
            1 => ConnectionStatus::Connecting,
            2 => ConnectionStatus::Connected,
            _ => ConnectionStatus::Error,
        }
    }

    /// Store `status`, returning whether it differs from the previous value.
    pub(crate) fn replace(&self, status: ConnectionStatus) -> bool {
        self.0.swap(status as u32, Ordering::SeqCst) != status as u32
    }
}
