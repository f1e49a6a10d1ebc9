//! Scan decoder: recognising barcode scans in a raw keystroke stream.
//!
//! # How a barcode scanner talks to a computer (for beginners)
//!
//! Most USB barcode scanners identify themselves as a keyboard.  Scanning a
//! product makes the scanner "type" every digit of the code, very quickly,
//! exactly as if a person had pressed the keys.  There is no vendor protocol
//! and no marker telling us where a scan starts.
//!
//! The decoder therefore uses two simple heuristics:
//!
//! - **Length** – a complete code has exactly [`COMMIT_THRESHOLD`] digits.
//!   As soon as that many digits have accumulated, the scan is committed.
//! - **Speed** – a scanner emits digits far faster than a human types.  If
//!   more than [`INACTIVITY_TIMEOUT`] passes between two digits, whatever was
//!   buffered is treated as stray keystrokes and thrown away.
//!
//! Keys that are not `0`–`9`, and any key pressed while a text field in the
//! UI has focus, are ignored entirely so that normal typing is never hijacked.
//!
//! # Time handling
//!
//! [`ScanDecoder`] never reads the clock.  Every call receives `now` from the
//! caller, and the inactivity timer is represented by a stored deadline.  The
//! async driver in the client crate sleeps until [`ScanDecoder::deadline`] and
//! then calls [`ScanDecoder::expire`]; tests simply pass hand-crafted instants.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// Number of digits in a complete barcode (UPC-A).
pub const COMMIT_THRESHOLD: usize = 12;

/// Maximum silence between two digits of the same scan.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_millis(1000);

// ── Barcode ───────────────────────────────────────────────────────────────────

/// Errors produced when validating a barcode string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarcodeError {
    /// The string does not have exactly [`COMMIT_THRESHOLD`] characters.
    #[error("barcode must have exactly {COMMIT_THRESHOLD} digits, got {len}")]
    WrongLength { len: usize },

    /// The string contains a character outside `0`–`9`.
    #[error("barcode contains non-digit character {ch:?}")]
    NonDigit { ch: char },
}

/// A complete, validated barcode: exactly 12 ASCII digits.
///
/// Values are produced by the [`ScanDecoder`] or by parsing user input with
/// [`FromStr`] / [`TryFrom`].  On the wire a barcode is a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Barcode(String);

impl Barcode {
    /// Returns the digits as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the barcode and returns the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for Barcode {
    type Error = BarcodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if let Some(ch) = value.chars().find(|c| !c.is_ascii_digit()) {
            return Err(BarcodeError::NonDigit { ch });
        }
        // All characters are ASCII here, so byte length == character count.
        if value.len() != COMMIT_THRESHOLD {
            return Err(BarcodeError::WrongLength { len: value.len() });
        }
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for Barcode {
    type Error = BarcodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl FromStr for Barcode {
    type Err = BarcodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl From<Barcode> for String {
    fn from(barcode: Barcode) -> Self {
        barcode.0
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Key events ────────────────────────────────────────────────────────────────

/// A single keystroke delivered by the input source.
///
/// Ephemeral: produced by the input source and consumed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The character the key produced.
    pub key: char,
}

impl KeyEvent {
    /// Creates a key event for `key`.
    pub fn new(key: char) -> Self {
        Self { key }
    }
}

impl From<char> for KeyEvent {
    fn from(key: char) -> Self {
        Self { key }
    }
}

/// What happened to a keystroke fed into [`ScanDecoder::on_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The key was filtered out (UI focused or not a digit).  No state changed.
    Ignored,
    /// The digit was appended; `len` digits are now buffered and the
    /// inactivity timer was restarted.
    Buffered { len: usize },
    /// The digit completed a barcode.  The buffer is empty again.
    Committed(Barcode),
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Keystroke → barcode state machine.
///
/// # Invariants
///
/// - The buffer only ever contains `0`–`9`.
/// - The buffer length is strictly less than [`COMMIT_THRESHOLD`] between
///   calls; it is cleared at the instant it reaches the threshold.
/// - `deadline` is `Some` exactly when the buffer is non-empty.
///
/// # Example
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use restock_core::{ScanDecoder, ScanOutcome};
///
/// let mut decoder = ScanDecoder::new();
/// let mut now = Instant::now();
/// let mut committed = None;
/// for key in "036000291452".chars() {
///     now += Duration::from_millis(20);
///     if let ScanOutcome::Committed(code) = decoder.on_key(key, false, now) {
///         committed = Some(code);
///     }
/// }
/// assert_eq!(committed.unwrap().as_str(), "036000291452");
/// ```
#[derive(Debug, Clone)]
pub struct ScanDecoder {
    buffer: String,
    deadline: Option<Instant>,
    inactivity_timeout: Duration,
}

impl ScanDecoder {
    /// Creates a decoder with the standard [`INACTIVITY_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_inactivity_timeout(INACTIVITY_TIMEOUT)
    }

    /// Creates a decoder with a custom inactivity timeout.
    pub fn with_inactivity_timeout(inactivity_timeout: Duration) -> Self {
        Self {
            buffer: String::with_capacity(COMMIT_THRESHOLD),
            deadline: None,
            inactivity_timeout,
        }
    }

    /// Feeds one keystroke into the decoder.
    ///
    /// - `ui_focused == true` → ignored; no buffer mutation, no timer reset.
    /// - `key` not in `0`–`9` → ignored.
    /// - Otherwise the pending timer is cancelled and the digit appended.  At
    ///   [`COMMIT_THRESHOLD`] digits the barcode is returned and the buffer
    ///   cleared; below it the timer is restarted.
    ///
    /// A timer whose deadline is at or before `now` counts as having fired
    /// already, so the stale prefix is discarded before the new digit lands.
    pub fn on_key(&mut self, key: char, ui_focused: bool, now: Instant) -> ScanOutcome {
        if ui_focused || !key.is_ascii_digit() {
            trace!(?key, ui_focused, "keystroke ignored by scan decoder");
            return ScanOutcome::Ignored;
        }

        self.expire(now);
        self.deadline = None;
        self.buffer.push(key);

        if self.buffer.len() == COMMIT_THRESHOLD {
            let digits = std::mem::take(&mut self.buffer);
            debug!(barcode = %digits, "barcode scanned");
            return ScanOutcome::Committed(Barcode(digits));
        }

        self.deadline = Some(now + self.inactivity_timeout);
        ScanOutcome::Buffered {
            len: self.buffer.len(),
        }
    }

    /// Fires the inactivity timer if it is due at `now`.
    ///
    /// Clears the buffer without emitting anything.  Returns `true` when a
    /// partial scan was discarded.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                debug!(
                    discarded = self.buffer.len(),
                    "scan inactivity timeout; discarding partial input"
                );
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Instant at which the inactivity timer fires, if one is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Number of digits currently buffered.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any buffered digits and cancels the timer.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.deadline = None;
    }
}

impl Default for ScanDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
