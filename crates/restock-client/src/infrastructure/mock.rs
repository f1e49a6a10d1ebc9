//! Recording test doubles for the channel seams.
//!
//! # Why mocks?
//!
//! The real transport needs a running relay, and the real channel needs a
//! transport.  These doubles replace both with in-memory recording so tests
//! can see exactly which envelopes were sent and script exactly which
//! responses come back.
//!
//! # Usage in tests
//!
//! ```ignore
//! let (transport, mut outbox) = MockTransport::with_outbox();
//! let (events_tx, events_rx) = mpsc::channel(16);
//! let channel = Channel::spawn(Arc::new(transport), events_rx, ChannelConfig::default());
//!
//! let reply = channel.begin(request).await;
//! let sent = outbox.recv().await.unwrap();           // the stamped request
//! events_tx.send(ConnectionEvent::Message(sent.reply("item_info", body))).await?;
//! let response = reply.wait().await?;
//! ```
//!
//! # Failure injection
//!
//! [`MockTransport::set_failing`] makes every subsequent `send` fail with
//! [`TransportError::NotConnected`], which is how the "transport failure
//! affects only its own request" behaviour is exercised.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use restock_core::Envelope;
use tokio::sync::mpsc;

use crate::application::channel::{ChannelError, Requester, Transport, TransportError};

/// A transport that records every envelope instead of writing to a socket.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Every envelope successfully "sent", in order.
    pub sent: Mutex<Vec<Envelope>>,
    failing: AtomicBool,
    outbox: Option<mpsc::UnboundedSender<Envelope>>,
}

impl MockTransport {
    /// Creates a transport with empty records that accepts every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that also forwards each sent envelope to the
    /// returned receiver, so async tests can await the write.
    pub fn with_outbox() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            outbox: Some(tx),
            ..Self::default()
        };
        (transport, rx)
    }

    /// When `true`, every subsequent send fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    /// Records the envelope, or fails if `set_failing(true)` was called.
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().unwrap().push(envelope.clone());
        if let Some(outbox) = &self.outbox {
            let _ = outbox.send(envelope);
        }
        Ok(())
    }
}

/// A requester that records requests and replays scripted responses.
///
/// Responses are returned in the order they were pushed.  When the script
/// runs out, requests fail with [`ChannelError::Closed`].
#[derive(Debug, Default)]
pub struct MockRequester {
    /// Every request received, in order.
    pub requests: Mutex<Vec<Envelope>>,
    responses: Mutex<VecDeque<Result<Envelope, ChannelError>>>,
}

impl MockRequester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of the next request.
    pub fn push_response(&self, response: Result<Envelope, ChannelError>) {
        self.responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl Requester for MockRequester {
    async fn request(&self, envelope: Envelope) -> Result<Envelope, ChannelError> {
        self.requests.lock().unwrap().push(envelope);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ChannelError::Closed))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
