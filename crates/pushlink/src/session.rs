//! I/O task for a single connection attempt.
//!
//! One task per generation: it opens the transport, then pumps outbound
//! frames and inbound frames until the peer closes, the transport fails or
//! the session is cancelled. Cancellation is a manual teardown, so the task
//! closes the transport and exits without reporting anything back.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::heartbeat::start_heartbeat_task;
use crate::manager::Inner;
use crate::transport::{FrameSink, InboundFrame, Outbound, Transport};

/// Upper bound on writing the close frame during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    fn without_code(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }
}

pub(crate) async fn run(
    inner: Arc<Inner>,
    generation: u64,
    url: String,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        result = inner.connector.connect(&url) => result,
    };

    let Transport {
        mut sink,
        mut stream,
    } = match opened {
        Ok(transport) => transport,
        Err(e) => {
            inner.open_failed(generation, &e);
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    if !inner.opened(generation, outbound_tx.clone()) {
        tracing::debug!(generation, "session superseded while opening");
        close_sink(&mut sink).await;
        return;
    }

    let heartbeat = start_heartbeat_task(inner.heartbeat_interval(), outbound_tx, &cancel);

    let close = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                heartbeat.stop();
                close_sink(&mut sink).await;
                return;
            }
            Some(frame) = outbound_rx.recv() => {
                if let Err(e) = sink.send(frame).await {
                    inner.errored(generation, &e);
                    break CloseInfo::without_code(e.to_string());
                }
            }
            item = stream.next() => match item {
                Some(Ok(InboundFrame::Text(text))) => inner.dispatch(&text),
                Some(Ok(InboundFrame::Closed { code, reason })) => {
                    break CloseInfo { code, reason };
                }
                Some(Err(e)) => {
                    inner.errored(generation, &e);
                    break CloseInfo::without_code(e.to_string());
                }
                None => break CloseInfo::without_code("stream ended"),
            },
        }
    };

    tracing::debug!(generation, pings = heartbeat.pings_sent(), "session ended");
    heartbeat.stop();
    inner.closed(generation, close);
}

async fn close_sink(sink: &mut FrameSink) {
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Outbound::Close)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "close frame not delivered"),
        Err(_) => tracing::debug!("timed out sending close frame"),
    }
}
