//! Scan listener use case: drives the [`ScanDecoder`] from a live key stream.
//!
//! The decoder in `restock-core` is a pure state machine that never reads a
//! clock.  This listener supplies what it lacks:
//!
//! - the current time for every keystroke,
//! - a real timer, so a half-typed scan is discarded once the inactivity
//!   window closes even when no further key ever arrives,
//! - the "is a text field focused?" predicate, injected at construction,
//! - the registered `on_barcode_scanned` handlers.
//!
//! Time is read from `tokio::time`, so tests can run the listener under a
//! paused virtual clock.

use std::time::{Duration, Instant};

use restock_core::{Barcode, KeyEvent, ScanDecoder, ScanOutcome};
use tokio::sync::mpsc;
use tracing::debug;

type FocusPredicate = Box<dyn Fn() -> bool + Send + Sync>;
type BarcodeHandler = Box<dyn FnMut(Barcode) + Send>;

/// Turns keystrokes into `on_barcode_scanned` callbacks.
pub struct ScanListener {
    decoder: ScanDecoder,
    is_input_focused: FocusPredicate,
    handlers: Vec<BarcodeHandler>,
}

impl ScanListener {
    /// Creates a listener with the standard inactivity timeout.
    ///
    /// `is_input_focused` is consulted on every keystroke; while it returns
    /// `true` keys belong to the focused field and are ignored.
    pub fn new(is_input_focused: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::with_decoder(ScanDecoder::new(), is_input_focused)
    }

    /// Creates a listener with a custom inactivity timeout.
    pub fn with_inactivity_timeout(
        inactivity_timeout: Duration,
        is_input_focused: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::with_decoder(
            ScanDecoder::with_inactivity_timeout(inactivity_timeout),
            is_input_focused,
        )
    }

    fn with_decoder(
        decoder: ScanDecoder,
        is_input_focused: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            decoder,
            is_input_focused: Box::new(is_input_focused),
            handlers: Vec::new(),
        }
    }

    /// Registers a handler called synchronously with every committed barcode,
    /// in registration order.
    pub fn on_barcode_scanned(&mut self, handler: impl FnMut(Barcode) + Send + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Feeds one keystroke observed at `now`.
    pub fn handle_key(&mut self, event: KeyEvent, now: Instant) -> ScanOutcome {
        let focused = (self.is_input_focused)();
        let outcome = self.decoder.on_key(event.key, focused, now);
        if let ScanOutcome::Committed(barcode) = &outcome {
            for handler in &mut self.handlers {
                handler(barcode.clone());
            }
        }
        outcome
    }

    /// Fires the inactivity timer if it is due at `now`.
    pub fn expire(&mut self, now: Instant) -> bool {
        self.decoder.expire(now)
    }

    /// Number of digits of a partial scan currently buffered.
    pub fn pending_len(&self) -> usize {
        self.decoder.pending_len()
    }

    /// Consumes keys until the sender side closes, then returns the listener.
    pub async fn run(mut self, mut keys: mpsc::Receiver<KeyEvent>) -> Self {
        loop {
            let deadline = self.decoder.deadline();
            tokio::select! {
                key = keys.recv() => match key {
                    Some(event) => {
                        self.handle_key(event, tokio::time::Instant::now().into_std());
                    }
                    None => break,
                },
                _ = sleep_until(deadline) => {
                    self.expire(tokio::time::Instant::now().into_std());
                }
            }
        }
        debug!(discarded = self.pending_len(), "key stream closed");
        self
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
