//! Request/response correlation over an unreliable message connection.
//!
//! # The problem (for beginners)
//!
//! The relay connection is a plain message pipe: we can push an [`Envelope`]
//! out, and envelopes arrive whenever the other side feels like sending them.
//! Nothing ties a response to the request that caused it.  Several lookups
//! may be in flight at once and their answers can come back in any order.
//!
//! The [`Channel`] turns that pipe into an `async fn request(..) -> response`
//! call:
//!
//! 1. Every request is stamped with a fresh [`RequestId`] in `header.id`.
//! 2. The id is remembered in a table of *pending requests* together with a
//!    one-shot reply slot for the waiting caller.
//! 3. When an envelope arrives carrying that id, the slot is filled and the
//!    entry removed.  The caller wakes up with the response.
//!
//! # Actor design
//!
//! One background task (spawned by [`Channel::spawn`]) owns the pending table
//! and is the only code that ever touches it.  Callers talk to it through an
//! `mpsc` command queue; inbound traffic arrives on the connection's event
//! queue.  Because a single task processes all of these one at a time, no
//! lock is needed and a request can never be resolved twice.
//!
//! ```text
//!  Channel handles ──Command──▶ ┌────────────┐ ──send()──▶ Transport
//!                               │ actor task │
//!  Connection ──ConnectionEvent▶│  pending   │ ──Envelope──▶ broadcast (pushes)
//!                               └────────────┘
//! ```
//!
//! Writes are performed in their own spawned tasks so one slow send never
//! delays correlation of unrelated responses.  A failed write is reported
//! back to the actor and fails exactly the request that issued it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use restock_core::{Envelope, RequestId};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Capacity of the command queue between handles and the actor.
const COMMAND_QUEUE: usize = 256;
/// Capacity of the unsolicited-envelope broadcast.
const PUSH_QUEUE: usize = 64;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised by a [`Transport`] when writing an envelope.
#[derive(Debug, Error)]
pub enum TransportError {
    /// There is currently no open connection to write to.
    #[error("not connected to the relay")]
    NotConnected,

    /// The envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    /// The WebSocket layer rejected the write.
    #[error("websocket error: {0}")]
    WebSocket(String),
}

/// Why a request did not produce a response envelope.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Writing this request to the connection failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// No response arrived within the allowed time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The remote side answered with an `error` envelope.
    #[error("remote error: {0}")]
    Remote(String),

    /// The channel was shut down before the request settled.
    #[error("channel closed")]
    Closed,

    /// A request with the same id is already pending.
    #[error("request {0} is already pending")]
    DuplicateRequest(RequestId),
}

// ── Connection seam ───────────────────────────────────────────────────────────

/// Events delivered by the connection to the channel.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A connection to the relay was (re)established.
    Connected,
    /// The connection was lost; the connection layer will retry.
    Disconnected,
    /// An envelope was received.
    Message(Envelope),
}

/// Outbound half of the connection.
///
/// Implemented by the WebSocket connection in production and by
/// `MockTransport` in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Writes one envelope to the connection.
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;
}

/// Anything that can perform a correlated request.
///
/// The inventory client depends on this trait instead of [`Channel`] so it
/// can be tested against a scripted responder.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Sends `envelope` and waits for its response.
    async fn request(&self, envelope: Envelope) -> Result<Envelope, ChannelError>;
}

#[async_trait]
impl<T: Requester + ?Sized> Requester for Arc<T> {
    async fn request(&self, envelope: Envelope) -> Result<Envelope, ChannelError> {
        (**self).request(envelope).await
    }
}

// ── Pending request table ─────────────────────────────────────────────────────

type ReplySlot = oneshot::Sender<Result<Envelope, ChannelError>>;

/// Outstanding requests keyed by correlation id.
///
/// Every operation removes the entry it settles, so each slot is filled at
/// most once.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: HashMap<RequestId, ReplySlot>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `slot` under `id`.
    ///
    /// If `id` is already pending the existing entry is left untouched, the
    /// new slot receives [`ChannelError::DuplicateRequest`] and `false` is
    /// returned.
    pub fn register(&mut self, id: RequestId, slot: ReplySlot) -> bool {
        if self.entries.contains_key(&id) {
            warn!(%id, "rejecting duplicate request id");
            let _ = slot.send(Err(ChannelError::DuplicateRequest(id)));
            return false;
        }
        self.entries.insert(id, slot);
        true
    }

    /// Resolves the request matching `envelope`'s id.
    ///
    /// An `error` envelope resolves it with [`ChannelError::Remote`].  Returns
    /// `false` when the envelope has no id or the id is not pending.
    pub fn complete(&mut self, envelope: Envelope) -> bool {
        let Some(slot) = envelope.id().and_then(|id| self.entries.remove(&id)) else {
            return false;
        };
        let result = if envelope.is_error() {
            Err(ChannelError::Remote(envelope.error_message()))
        } else {
            Ok(envelope)
        };
        // The caller may have stopped waiting in the meantime.
        let _ = slot.send(result);
        true
    }

    /// Resolves the request `id` with `error`.
    pub fn fail(&mut self, id: RequestId, error: ChannelError) -> bool {
        match self.entries.remove(&id) {
            Some(slot) => {
                let _ = slot.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Forgets the request `id` without resolving it.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Drops every entry whose caller has gone away.  Returns how many were
    /// removed.
    pub fn remove_stale(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_closed());
        before - self.entries.len()
    }

    /// Resolves every pending request with [`ChannelError::Closed`].
    pub fn close_all(&mut self) -> usize {
        let count = self.entries.len();
        for (_, slot) in self.entries.drain() {
            let _ = slot.send(Err(ChannelError::Closed));
        }
        count
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Tunables for a [`Channel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Default per-request timeout.  `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// How often abandoned entries are swept from the pending table.
    pub sweep_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

// ── Channel handle ────────────────────────────────────────────────────────────

enum Command {
    Request {
        id: RequestId,
        envelope: Envelope,
        reply: ReplySlot,
    },
    Cancel(RequestId),
    PendingCount(oneshot::Sender<usize>),
    Shutdown,
}

/// Cloneable handle to the correlation actor.
///
/// The actor keeps running while any handle (or any [`PendingReply`]) is
/// alive, or until [`Channel::shutdown`] is called.
#[derive(Debug, Clone)]
pub struct Channel {
    commands: mpsc::Sender<Command>,
    pushes: broadcast::Sender<Envelope>,
    default_timeout: Option<Duration>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Request { id, .. } => write!(f, "Request({id})"),
            Command::Cancel(id) => write!(f, "Cancel({id})"),
            Command::PendingCount(_) => f.write_str("PendingCount"),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl Channel {
    /// Starts the correlation actor.
    ///
    /// `transport` carries outbound envelopes; `events` delivers everything
    /// the connection receives.  Must be called from within a Tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<ConnectionEvent>,
        config: ChannelConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let (pushes_tx, _) = broadcast::channel(PUSH_QUEUE);
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();

        let task = ChannelTask {
            transport,
            pending: PendingRequests::new(),
            commands: commands_rx,
            events,
            pushes: pushes_tx.clone(),
            failures_tx,
            failures_rx,
            sweep_interval: config.sweep_interval,
        };
        tokio::spawn(task.run());

        Self {
            commands: commands_tx,
            pushes: pushes_tx,
            default_timeout: config.request_timeout,
        }
    }

    /// Sends `envelope` and waits for the correlated response, using the
    /// channel's default timeout.
    ///
    /// # Errors
    ///
    /// See [`ChannelError`].  Each error is specific to this call; other
    /// in-flight requests are unaffected.
    pub async fn request(&self, envelope: Envelope) -> Result<Envelope, ChannelError> {
        self.request_with_timeout(envelope, self.default_timeout)
            .await
    }

    /// Like [`request`](Self::request) with an explicit timeout (`None` waits
    /// indefinitely).
    ///
    /// # Errors
    ///
    /// See [`ChannelError`].
    pub async fn request_with_timeout(
        &self,
        envelope: Envelope,
        timeout: Option<Duration>,
    ) -> Result<Envelope, ChannelError> {
        let reply = self.begin(envelope).await;
        match timeout {
            Some(limit) => reply.wait_timeout(limit).await,
            None => reply.wait().await,
        }
    }

    /// Registers and sends `envelope`, returning a handle to its eventual
    /// response.
    ///
    /// Any id already present in the header is replaced with a fresh one.
    pub async fn begin(&self, envelope: Envelope) -> PendingReply {
        let id = RequestId::new();
        let envelope = envelope.with_id(id);
        let (reply_tx, reply_rx) = oneshot::channel();

        trace!(%id, kind = envelope.kind(), "registering request");
        if self
            .commands
            .send(Command::Request {
                id,
                envelope,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            // The reply slot was dropped with the command, so waiting on the
            // handle reports Closed.
            debug!(%id, "request issued after channel shutdown");
        }

        PendingReply {
            id,
            rx: reply_rx,
            commands: self.commands.clone(),
            settled: false,
        }
    }

    /// Subscribes to inbound envelopes that carry no correlation id.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.pushes.subscribe()
    }

    /// Number of requests currently awaiting a response.
    pub async fn pending_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::PendingCount(tx)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Stops the actor.  Every request still pending resolves with
    /// [`ChannelError::Closed`]; later requests fail the same way.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

#[async_trait]
impl Requester for Channel {
    async fn request(&self, envelope: Envelope) -> Result<Envelope, ChannelError> {
        Channel::request(self, envelope).await
    }
}

// ── Pending reply handle ──────────────────────────────────────────────────────

/// The caller's side of one in-flight request.
///
/// Dropping an unsettled handle cancels the request: its entry is removed and
/// a late response is silently discarded.
#[derive(Debug)]
pub struct PendingReply {
    id: RequestId,
    rx: oneshot::Receiver<Result<Envelope, ChannelError>>,
    commands: mpsc::Sender<Command>,
    settled: bool,
}

impl PendingReply {
    /// Correlation id stamped on the outbound envelope.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Waits for the response with no time limit.
    ///
    /// # Errors
    ///
    /// See [`ChannelError`].
    pub async fn wait(mut self) -> Result<Envelope, ChannelError> {
        let outcome = (&mut self.rx).await;
        self.settled = true;
        outcome.unwrap_or(Err(ChannelError::Closed))
    }

    /// Waits at most `limit` for the response.  On timeout the request is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Timeout`] when `limit` elapses; otherwise see
    /// [`ChannelError`].
    pub async fn wait_timeout(mut self, limit: Duration) -> Result<Envelope, ChannelError> {
        match tokio::time::timeout(limit, &mut self.rx).await {
            Ok(outcome) => {
                self.settled = true;
                outcome.unwrap_or(Err(ChannelError::Closed))
            }
            Err(_) => {
                debug!(id = %self.id, ?limit, "request timed out");
                Err(ChannelError::Timeout(limit))
            }
        }
    }

    /// Abandons the request.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if !self.settled {
            // A full queue only delays cleanup until the next sweep.
            let _ = self.commands.try_send(Command::Cancel(self.id));
        }
    }
}

// ── Actor task ────────────────────────────────────────────────────────────────

struct ChannelTask {
    transport: Arc<dyn Transport>,
    pending: PendingRequests,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Receiver<ConnectionEvent>,
    pushes: broadcast::Sender<Envelope>,
    failures_tx: mpsc::UnboundedSender<(RequestId, TransportError)>,
    failures_rx: mpsc::UnboundedReceiver<(RequestId, TransportError)>,
    sweep_interval: Duration,
}

impl ChannelTask {
    async fn run(mut self) {
        let mut sweep = tokio::time::interval_at(
            tokio::time::Instant::now() + self.sweep_interval,
            self.sweep_interval,
        );
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Request { id, envelope, reply }) => {
                        self.start_request(id, envelope, reply);
                    }
                    Some(Command::Cancel(id)) => {
                        if self.pending.cancel(id) {
                            debug!(%id, "request cancelled");
                        }
                    }
                    Some(Command::PendingCount(reply)) => {
                        let _ = reply.send(self.pending.len());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                event = self.events.recv(), if events_open => match event {
                    Some(ConnectionEvent::Message(envelope)) => self.on_inbound(envelope),
                    Some(ConnectionEvent::Connected) => info!("relay connection established"),
                    Some(ConnectionEvent::Disconnected) => {
                        warn!(pending = self.pending.len(), "relay connection lost");
                    }
                    None => {
                        debug!("connection event stream ended");
                        events_open = false;
                    }
                },
                Some((id, error)) = self.failures_rx.recv() => {
                    self.pending.fail(id, ChannelError::Transport(error));
                }
                _ = sweep.tick() => {
                    let removed = self.pending.remove_stale();
                    if removed > 0 {
                        debug!(removed, "swept abandoned requests");
                    }
                }
            }
        }

        let closed = self.pending.close_all();
        info!(closed, "request channel stopped");
    }

    fn start_request(&mut self, id: RequestId, envelope: Envelope, reply: ReplySlot) {
        if !self.pending.register(id, reply) {
            return;
        }

        let transport = Arc::clone(&self.transport);
        let failures = self.failures_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.send(envelope).await {
                warn!(%id, "failed to send request: {e}");
                let _ = failures.send((id, e));
            }
        });
    }

    fn on_inbound(&mut self, envelope: Envelope) {
        match envelope.id() {
            Some(id) => {
                if !self.pending.complete(envelope) {
                    debug!(%id, "dropping response with unknown correlation id");
                }
            }
            None => {
                trace!(kind = envelope.kind(), "unsolicited envelope");
                // No subscribers simply means nobody is interested.
                let _ = self.pushes.send(envelope);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(id: RequestId, kind: &str) -> Envelope {
        Envelope::new("", kind, json!({})).with_id(id)
    }

    #[test]
    fn test_register_then_complete_resolves_slot() {
        // Arrange
        let mut pending = PendingRequests::new();
        let id = RequestId::new();
        let (tx, mut rx) = oneshot::channel();
        assert!(pending.register(id, tx));

        // Act
        let matched = pending.complete(response(id, "item_info"));

        // Assert
        assert!(matched);
        assert!(pending.is_empty());
        let envelope = rx.try_recv().unwrap().unwrap();
        assert_eq!(envelope.kind(), "item_info");
    }

    #[test]
    fn test_complete_with_unknown_id_changes_nothing() {
        let mut pending = PendingRequests::new();
        let id = RequestId::new();
        let (tx, mut rx) = oneshot::channel();
        pending.register(id, tx);

        let matched = pending.complete(response(RequestId::new(), "item_info"));

        assert!(!matched);
        assert!(pending.contains(id));
        assert!(rx.try_recv().is_err(), "slot must still be empty");
    }

    #[test]
    fn test_complete_without_id_is_not_a_match() {
        let mut pending = PendingRequests::new();
        assert!(!pending.complete(Envelope::new("", "item_info", json!({}))));
    }

    #[test]
    fn test_error_envelope_resolves_as_remote_error() {
        let mut pending = PendingRequests::new();
        let id = RequestId::new();
        let (tx, mut rx) = oneshot::channel();
        pending.register(id, tx);

        let request = Envelope::new("inventory", "info_req", json!({})).with_id(id);
        pending.complete(request.reply_error("not found"));

        match rx.try_recv().unwrap() {
            Err(ChannelError::Remote(message)) => assert_eq!(message, "not found"),
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_id_is_rejected_and_first_entry_kept() {
        // Arrange
        let mut pending = PendingRequests::new();
        let id = RequestId::new();
        let (first_tx, mut first_rx) = oneshot::channel();
        let (second_tx, mut second_rx) = oneshot::channel();

        // Act
        assert!(pending.register(id, first_tx));
        let accepted = pending.register(id, second_tx);

        // Assert
        assert!(!accepted);
        assert!(matches!(
            second_rx.try_recv().unwrap(),
            Err(ChannelError::DuplicateRequest(dup)) if dup == id
        ));
        pending.complete(response(id, "item_info"));
        assert!(first_rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn test_second_response_for_same_id_is_dropped() {
        let mut pending = PendingRequests::new();
        let id = RequestId::new();
        let (tx, _rx) = oneshot::channel();
        pending.register(id, tx);

        assert!(pending.complete(response(id, "item_info")));
        assert!(!pending.complete(response(id, "item_info")));
    }

    #[test]
    fn test_fail_resolves_only_the_named_request() {
        let mut pending = PendingRequests::new();
        let (a, b) = (RequestId::new(), RequestId::new());
        let (a_tx, mut a_rx) = oneshot::channel();
        let (b_tx, mut b_rx) = oneshot::channel();
        pending.register(a, a_tx);
        pending.register(b, b_tx);

        pending.fail(a, ChannelError::Transport(TransportError::NotConnected));

        assert!(matches!(
            a_rx.try_recv().unwrap(),
            Err(ChannelError::Transport(TransportError::NotConnected))
        ));
        assert!(b_rx.try_recv().is_err(), "b must still be pending");
        assert!(pending.contains(b));
    }

    #[test]
    fn test_remove_stale_drops_entries_whose_caller_is_gone() {
        let mut pending = PendingRequests::new();
        let (gone_tx, gone_rx) = oneshot::channel();
        let (live_tx, _live_rx) = oneshot::channel();
        pending.register(RequestId::new(), gone_tx);
        pending.register(RequestId::new(), live_tx);
        drop(gone_rx);

        assert_eq!(pending.remove_stale(), 1);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_close_all_fails_everything_with_closed() {
        let mut pending = PendingRequests::new();
        let (tx, mut rx) = oneshot::channel();
        pending.register(RequestId::new(), tx);

        assert_eq!(pending.close_all(), 1);
        assert!(pending.is_empty());
        assert!(matches!(rx.try_recv().unwrap(), Err(ChannelError::Closed)));
    }

    #[test]
    fn test_default_config_has_no_timeout() {
        let config = ChannelConfig::default();
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
    }
}
