//! Heartbeat/keepalive mechanism.
//!
//! While a session is connected, a heartbeat task queues a `{"type":"ping"}`
//! frame every interval. Replies are swallowed by the inbound path. There is
//! no missed-pong timeout: a dead peer is detected only when the transport
//! itself reports a close or an error.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pushlink_proto::ping_frame;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::transport::Outbound;

/// Handle for controlling the heartbeat task. Dropping it stops the task.
#[derive(Debug)]
pub struct HeartbeatHandle {
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    pings_sent: Arc<AtomicU64>,
}

impl HeartbeatHandle {
    /// Check if the heartbeat task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of pings queued so far.
    #[must_use]
    pub fn pings_sent(&self) -> u64 {
        self.pings_sent.load(Ordering::SeqCst)
    }

    /// Stop the heartbeat task.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start a periodic heartbeat task writing into `tx`.
///
/// The first ping goes out one full `interval` after the call. The task ends
/// when `parent` is cancelled, when the handle is stopped or dropped, or when
/// `tx` is closed because the transport went away.
pub fn start_heartbeat_task(
    interval: Duration,
    tx: mpsc::UnboundedSender<Outbound>,
    parent: &CancellationToken,
) -> HeartbeatHandle {
    let handle = HeartbeatHandle {
        cancel: parent.child_token(),
        running: Arc::new(AtomicBool::new(true)),
        pings_sent: Arc::new(AtomicU64::new(0)),
    };

    let cancel = handle.cancel.clone();
    let running = Arc::clone(&handle.running);
    let pings_sent = Arc::clone(&handle.pings_sent);

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if tx.send(Outbound::Text(ping_frame())).is_err() {
                        tracing::debug!("transport closed, stopping heartbeat");
                        break;
                    }
                    let sent = pings_sent.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::trace!(sent, "heartbeat ping queued");
                }
            }
        }

        running.store(false, Ordering::SeqCst);
    });

    handle
}
