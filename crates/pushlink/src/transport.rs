//! Transport seam between the connection manager and the network.
//!
//! The manager only sees a [`Connector`] that opens a [`Transport`]: a sink
//! of [`Outbound`] frames and a stream of [`InboundFrame`]s. [`WsConnector`]
//! is the production implementation over `tokio-tungstenite`.

use std::fmt;
use std::pin::Pin;

use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::error::ClientError;

/// Frame written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Text frame.
    Text(String),
    /// Close the transport.
    Close,
}

/// Frame read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Text frame.
    Text(String),
    /// The peer closed the transport.
    Closed {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },
}

/// Outbound half of a transport.
pub type FrameSink = Pin<Box<dyn Sink<Outbound, Error = ClientError> + Send>>;

/// Inbound half of a transport. The stream ending counts as a close.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<InboundFrame, ClientError>> + Send>>;

/// An open duplex transport.
pub struct Transport {
    /// Outbound frames.
    pub sink: FrameSink,
    /// Inbound frames.
    pub stream: FrameStream,
}

impl Transport {
    /// Assemble a transport from its halves.
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<Outbound, Error = ClientError> + Send + 'static,
        R: Stream<Item = Result<InboundFrame, ClientError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Opens transports to a URL.
pub trait Connector: Send + Sync + 'static {
    /// Open a transport to `url`.
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Transport, ClientError>>;
}

/// WebSocket connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Transport, ClientError>> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| ClientError::Connect(e.to_string()))?;

            let (write, read) = ws_stream.split();

            let sink = write
                .sink_map_err(|e| ClientError::Transport(e.to_string()))
                .with(|frame: Outbound| future::ready(Ok::<_, ClientError>(to_ws_message(frame))));

            let stream = read.filter_map(|item| future::ready(from_ws_message(item)));

            Ok(Transport::new(sink, stream))
        })
    }
}

fn to_ws_message(frame: Outbound) -> Message {
    match frame {
        Outbound::Text(text) => Message::Text(text.into()),
        Outbound::Close => Message::Close(None),
    }
}

fn from_ws_message(
    item: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<InboundFrame, ClientError>> {
    match item {
        Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text.as_str().to_owned()))),
        Ok(Message::Close(frame)) => Some(Ok(match frame {
            Some(frame) => InboundFrame::Closed {
                code: Some(u16::from(frame.code)),
                reason: frame.reason.as_str().to_owned(),
            },
            None => InboundFrame::Closed {
                code: None,
                reason: String::new(),
            },
        })),
        // Protocol-level ping/pong is answered by tungstenite itself.
        Ok(_) => None,
        Err(e) => Some(Err(ClientError::Transport(e.to_string()))),
    }
}
