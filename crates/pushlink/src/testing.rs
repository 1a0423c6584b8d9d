//! In-memory connector for manager tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use futures::channel::mpsc as fmpsc;
use futures::future::{self, BoxFuture};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::ClientError;
use crate::transport::{Connector, InboundFrame, Outbound, Transport};

struct Shared {
    failures: AtomicU32,
    hang: AtomicBool,
    urls: Mutex<Vec<String>>,
    opened_at: Mutex<Vec<Instant>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

/// Connector whose transports are channel pairs handed to the test.
#[derive(Clone)]
pub(crate) struct MockConnector {
    shared: Arc<Shared>,
}

impl MockConnector {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            shared: Arc::new(Shared {
                failures: AtomicU32::new(0),
                hang: AtomicBool::new(false),
                urls: Mutex::new(Vec::new()),
                opened_at: Mutex::new(Vec::new()),
                peers,
            }),
        };
        (connector, rx)
    }

    /// Refuse the next `count` connection attempts.
    pub(crate) fn fail_next(&self, count: u32) {
        self.shared.failures.store(count, Ordering::SeqCst);
    }

    /// Never resolve the next connection attempt.
    pub(crate) fn hang_next(&self) {
        self.shared.hang.store(true, Ordering::SeqCst);
    }

    /// Connection attempts so far.
    pub(crate) fn attempts(&self) -> usize {
        self.shared.urls.lock().len()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.shared.urls.lock().clone()
    }

    pub(crate) fn opened_at(&self) -> Vec<Instant> {
        self.shared.opened_at.lock().clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Transport, ClientError>> {
        let shared = Arc::clone(&self.shared);
        let url = url.to_string();
        Box::pin(async move {
            shared.urls.lock().push(url.clone());
            shared.opened_at.lock().push(Instant::now());

            if shared.hang.swap(false, Ordering::SeqCst) {
                future::pending::<()>().await;
            }

            let refused = shared
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refused {
                return Err(ClientError::Connect("connection refused".to_string()));
            }

            let (out_tx, out_rx) = fmpsc::unbounded();
            let (in_tx, in_rx) = fmpsc::unbounded();
            let _ = shared.peers.send(MockPeer {
                url,
                sent: out_rx,
                inbound: in_tx,
            });

            let sink = out_tx.sink_map_err(|e| ClientError::Transport(e.to_string()));
            Ok(Transport::new(sink, in_rx))
        })
    }
}

/// Server side of a mock transport. Dropping it ends the client's stream.
pub(crate) struct MockPeer {
    pub url: String,
    sent: fmpsc::UnboundedReceiver<Outbound>,
    inbound: fmpsc::UnboundedSender<Result<InboundFrame, ClientError>>,
}

impl MockPeer {
    pub(crate) fn push(&self, item: Result<InboundFrame, ClientError>) {
        let _ = self.inbound.unbounded_send(item);
    }

    pub(crate) fn push_text(&self, text: &str) {
        self.push(Ok(InboundFrame::Text(text.to_string())));
    }

    pub(crate) fn close(&self, code: u16, reason: &str) {
        self.push(Ok(InboundFrame::Closed {
            code: Some(code),
            reason: reason.to_string(),
        }));
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.push(Err(ClientError::Transport(reason.to_string())));
    }

    /// Next frame the client wrote, or `None` once the client dropped its sink.
    pub(crate) async fn next_sent(&mut self) -> Option<Outbound> {
        self.sent.next().await
    }
}
