//! # pushlink
//!
//! Client for an authenticated push-notification channel over WebSocket.
//!
//! A [`ConnectionManager`] opens `<endpoint>/<token>`, keeps it alive with
//! periodic `{"type":"ping"}` frames, reconnects at a fixed interval after
//! unexpected closes and fans inbound [`PushMessage`]s out to subscribers.
//!
//! ```no_run
//! use pushlink::{ConnectionManager, ManagerConfig};
//!
//! # async fn run() -> Result<(), pushlink::ClientError> {
//! let manager = ConnectionManager::new(ManagerConfig::new("wss://api.example.com/ws/messages"))?;
//! let _messages = manager.on_message(|message| println!("{}: {}", message.kind, message.data));
//! let _status = manager.on_status_change(|status| println!("status: {status}"));
//! manager.connect("session-token");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod heartbeat;
pub mod manager;
pub mod reconnect;
pub mod registry;
mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{Endpoint, ManagerConfig};
pub use error::ClientError;
pub use heartbeat::HeartbeatHandle;
pub use manager::ConnectionManager;
pub use pushlink_proto::PushMessage;
pub use reconnect::ReconnectPolicy;
pub use registry::{SubscriberSet, Subscription};
pub use state::ConnectionStatus;
pub use transport::{Connector, InboundFrame, Outbound, Transport, WsConnector};
