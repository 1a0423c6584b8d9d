//! Connection manager: the state machine behind the push channel.
//!
//! A [`ConnectionManager`] owns one logical connection. `connect` opens it,
//! unexpected closes are retried at a fixed interval up to a cap, and
//! `disconnect` shuts everything down for good. Each opened session has a
//! generation number and a cancellation token; tearing a session down
//! cancels its heartbeat, its I/O task and any pending reconnect timer in
//! one step, and every late callback checks its generation before touching
//! shared state.
//!
//! Status changes are recorded under the state lock and published after it
//! is released, all under one reentrant publication lock. Status callbacks
//! therefore run one at a time and in transition order. A callback may call
//! back into the manager; the changes it causes are queued and delivered
//! once every subscriber has seen the current one.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use pushlink_proto::{decode_inbound, encode_payload, Inbound, PushMessage};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ManagerConfig;
use crate::error::ClientError;
use crate::reconnect::ReconnectPolicy;
use crate::registry::{SubscriberSet, Subscription};
use crate::session::{self, CloseInfo};
use crate::state::{AtomicConnectionStatus, ConnectionStatus};
use crate::transport::{Connector, Outbound, WsConnector};

/// Handle to a push-channel connection.
///
/// Cloning is cheap and every clone drives the same connection. Build one
/// at startup and hand clones to the components that need it.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager that connects over WebSocket.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: ManagerConfig) -> Result<Self, ClientError> {
        Self::with_connector(config, WsConnector)
    }

    /// Create a manager that opens transports through `connector`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn with_connector(
        config: ManagerConfig,
        connector: impl Connector,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                policy: ReconnectPolicy::from(&config),
                config,
                connector: Arc::new(connector),
                status: AtomicConnectionStatus::new(ConnectionStatus::Disconnected),
                state: Mutex::new(ManagerState::default()),
                publication: ReentrantMutex::new(RefCell::new(Publication::default())),
                messages: SubscriberSet::new("message"),
                statuses: SubscriberSet::new("status"),
            }),
        })
    }

    /// Open the channel with `token`.
    ///
    /// Returns immediately; progress is reported through
    /// [`on_status_change`](Self::on_status_change). Does nothing if already
    /// connected. Any previous session and its timers are torn down first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, token: impl Into<String>) {
        self.inner.connect(token.into());
    }

    /// Close the channel and disable automatic reconnection until the next
    /// [`connect`](Self::connect). Safe to call at any time.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Send `payload`. A payload serializing to a JSON string is sent as
    /// that raw string, anything else as JSON text.
    ///
    /// Returns `false` if not connected or the payload cannot be encoded.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        if !self.is_connected() {
            tracing::warn!("cannot send message: not connected");
            return false;
        }

        match encode_payload(payload).map_err(ClientError::from) {
            Ok(text) => self.inner.send_text(text),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound payload");
                false
            }
        }
    }

    /// Send pre-encoded text. Returns `false` if not connected.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.inner.send_text(text.into())
    }

    /// Register a callback for every inbound message except heartbeat
    /// replies.
    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PushMessage) + Send + Sync + 'static,
    {
        self.inner.messages.subscribe(callback)
    }

    /// Register a callback for status transitions. The callback receives
    /// the current status before this method returns.
    ///
    /// Status callbacks are serialized: one that blocks holds up every other
    /// status change, including `connect` and `disconnect` on other threads.
    pub fn on_status_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        let _published = self.inner.publication.lock();
        self.inner
            .statuses
            .subscribe_with_current(callback, &self.inner.status.load())
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.load()
    }

    /// Whether the channel is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Consecutive reconnection attempts since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state.lock().reconnect_attempts
    }

    /// The configured endpoint, without any token.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.config.endpoint_url
    }

    /// The configuration this manager was built with.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.config.endpoint_url)
            .field("status", &self.inner.status.load())
            .field("messages", &self.inner.messages)
            .field("statuses", &self.inner.statuses)
            .finish_non_exhaustive()
    }
}

/// Shared state behind every [`ConnectionManager`] clone and session task.
pub(crate) struct Inner {
    config: ManagerConfig,
    policy: ReconnectPolicy,
    pub(crate) connector: Arc<dyn Connector>,
    status: AtomicConnectionStatus,
    state: Mutex<ManagerState>,
    /// Held across recording and publishing a status change.
    publication: ReentrantMutex<RefCell<Publication>>,
    messages: SubscriberSet<PushMessage>,
    statuses: SubscriberSet<ConnectionStatus>,
}

#[derive(Default)]
struct ManagerState {
    token: Option<String>,
    manual_close: bool,
    reconnect_attempts: u32,
    generation: u64,
    session: Option<SessionSlot>,
    reconnect_timer: Option<CancellationToken>,
}

impl ManagerState {
    fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.generation == generation)
    }

    /// Cancel the live session (if any) and the pending reconnect timer.
    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
        }
        if let Some(timer) = self.reconnect_timer.take() {
            timer.cancel();
        }
    }
}

/// Status changes recorded under the state lock, awaiting publication.
#[derive(Default)]
struct StatusChanges(Vec<ConnectionStatus>);

#[derive(Default)]
struct Publication {
    /// A publisher further up this thread's stack is delivering.
    draining: bool,
    queue: VecDeque<ConnectionStatus>,
}

struct SessionSlot {
    generation: u64,
    cancel: CancellationToken,
    /// Set once the transport is open.
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

impl Inner {
    pub(crate) fn heartbeat_interval(&self) -> std::time::Duration {
        self.config.heartbeat_interval()
    }

    fn connect(self: &Arc<Self>, token: String) {
        let published = self.publication.lock();
        let mut changes = StatusChanges::default();
        let (generation, cancel) = {
            let mut state = self.state.lock();
            if self.status.load() == ConnectionStatus::Connected {
                tracing::info!(endpoint = %self.config.endpoint_url, "already connected");
                return;
            }

            state.teardown();
            state.generation += 1;
            let generation = state.generation;
            let cancel = CancellationToken::new();
            state.session = Some(SessionSlot {
                generation,
                cancel: cancel.clone(),
                outbound: None,
            });
            state.token = Some(token.clone());
            state.manual_close = false;
            self.transition(&mut changes, ConnectionStatus::Connecting);
            (generation, cancel)
        };
        self.publish(&published, changes);

        match self.config.session_url(&token) {
            Ok(url) => {
                tracing::debug!(
                    endpoint = %self.config.endpoint_url,
                    generation,
                    "opening transport"
                );
                tokio::spawn(session::run(Arc::clone(self), generation, url.into(), cancel));
            }
            Err(e) => self.open_failed(generation, &e),
        }
    }

    fn disconnect(&self) {
        let published = self.publication.lock();
        let mut changes = StatusChanges::default();
        {
            let mut state = self.state.lock();
            state.manual_close = true;
            state.teardown();
            state.reconnect_attempts = 0;
            self.transition(&mut changes, ConnectionStatus::Disconnected);
        }
        self.publish(&published, changes);
        tracing::info!(endpoint = %self.config.endpoint_url, "disconnected");
    }

    fn send_text(&self, text: String) -> bool {
        let state = self.state.lock();
        let outbound = state
            .session
            .as_ref()
            .and_then(|session| session.outbound.as_ref())
            .filter(|_| self.status.load() == ConnectionStatus::Connected);

        let Some(outbound) = outbound else {
            tracing::warn!("cannot send message: not connected");
            return false;
        };

        if outbound.send(Outbound::Text(text)).is_err() {
            tracing::error!("send failed: transport already closed");
            return false;
        }
        true
    }

    /// The transport for `generation` opened. Returns `false` if the session
    /// was superseded while opening.
    pub(crate) fn opened(
        &self,
        generation: u64,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> bool {
        let published = self.publication.lock();
        let mut changes = StatusChanges::default();
        {
            let mut state = self.state.lock();
            let Some(session) = state
                .session
                .as_mut()
                .filter(|session| session.generation == generation)
            else {
                return false;
            };
            session.outbound = Some(outbound);
            state.reconnect_attempts = 0;
            self.transition(&mut changes, ConnectionStatus::Connected);
        }
        self.publish(&published, changes);
        tracing::info!(endpoint = %self.config.endpoint_url, "connected");
        true
    }

    /// Opening the transport for `generation` failed. Treated as an error
    /// followed by an unexpected close.
    pub(crate) fn open_failed(self: &Arc<Self>, generation: u64, error: &ClientError) {
        let _published = self.publication.lock();
        tracing::error!(endpoint = %self.config.endpoint_url, error = %error, "connection error");
        self.errored(generation, error);
        self.closed(
            generation,
            CloseInfo {
                code: None,
                reason: error.to_string(),
            },
        );
    }

    /// The transport for `generation` reported an error.
    pub(crate) fn errored(&self, generation: u64, error: &ClientError) {
        let published = self.publication.lock();
        let mut changes = StatusChanges::default();
        {
            let state = self.state.lock();
            if !state.is_current(generation) {
                return;
            }
            self.transition(&mut changes, ConnectionStatus::Error);
        }
        tracing::warn!(error = %error, "transport error");
        self.publish(&published, changes);
    }

    /// The transport for `generation` closed.
    pub(crate) fn closed(self: &Arc<Self>, generation: u64, close: CloseInfo) {
        let published = self.publication.lock();
        let mut changes = StatusChanges::default();
        let manual_close = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return;
            }
            state.teardown();
            self.transition(&mut changes, ConnectionStatus::Disconnected);
            state.manual_close
        };
        tracing::info!(code = ?close.code, reason = %close.reason, "connection closed");
        self.publish(&published, changes);
        drop(published);

        if !manual_close {
            self.schedule_reconnect(generation);
        }
    }

    /// Deliver one inbound text frame to message subscribers.
    pub(crate) fn dispatch(&self, text: &str) {
        match decode_inbound(text, Utc::now().timestamp_millis()).map_err(ClientError::from) {
            Ok(Inbound::Heartbeat) => tracing::trace!("heartbeat reply received"),
            Ok(Inbound::Message(message)) => {
                let delivered = self.messages.notify(&message);
                tracing::debug!(kind = %message.kind, delivered, "message delivered");
            }
            Err(e) => tracing::warn!(error = %e, "dropping malformed message"),
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, generation: u64) {
        let (attempt, delay, timer) = {
            let mut state = self.state.lock();
            if state.manual_close || state.generation != generation {
                return;
            }

            let Some((attempt, delay)) = self.policy.next_attempt(state.reconnect_attempts) else {
                tracing::warn!(
                    max = self.policy.max_attempts,
                    "max reconnect attempts reached"
                );
                return;
            };

            state.reconnect_attempts = attempt;
            let timer = CancellationToken::new();
            if let Some(previous) = state.reconnect_timer.replace(timer.clone()) {
                previous.cancel();
            }
            (attempt, delay, timer)
        };

        tracing::info!(
            attempt,
            max = self.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnecting"
        );

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = timer.cancelled() => {}
                () = tokio::time::sleep(delay) => inner.fire_reconnect(generation),
            }
        });
    }

    fn fire_reconnect(self: &Arc<Self>, generation: u64) {
        let token = {
            let mut state = self.state.lock();
            if state.manual_close || state.generation != generation {
                return;
            }
            state.reconnect_timer = None;
            state.token.clone()
        };

        if let Some(token) = token {
            self.connect(token);
        }
    }

    /// Record a status change. Must be called with the publication lock and
    /// the state lock held; the change is published by
    /// [`publish`](Self::publish) once the state lock is released.
    fn transition(&self, changes: &mut StatusChanges, status: ConnectionStatus) {
        if self.status.replace(status) {
            changes.0.push(status);
        }
    }

    /// Deliver recorded changes in order. When called from inside a status
    /// callback, the changes are queued for the outer publisher instead.
    fn publish(&self, publication: &RefCell<Publication>, changes: StatusChanges) {
        {
            let mut pending = publication.borrow_mut();
            pending.queue.extend(changes.0);
            if pending.draining {
                return;
            }
            pending.draining = true;
        }

        loop {
            let next = publication.borrow_mut().queue.pop_front();
            let Some(status) = next else {
                break;
            };
            tracing::debug!(%status, "status changed");
            self.statuses.notify(&status);
        }

        publication.borrow_mut().draining = false;
    }
}
