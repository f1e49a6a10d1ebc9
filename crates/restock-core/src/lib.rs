//! # restock-core
//!
//! Shared library for the Restock point-of-sale client containing the scan
//! decoder, the pricing rules, and the envelope protocol spoken with the
//! inventory service.
//!
//! It has zero dependencies on async runtimes, sockets, or terminals.
//!
//! # Architecture overview (for beginners)
//!
//! A USB barcode scanner behaves like a very fast keyboard: when a product is
//! scanned, it "types" the digits of the barcode one after another.  The POS
//! client listens to every keystroke, recognises these bursts, and asks the
//! remote inventory service what the scanned product is.
//!
//! This crate (`restock-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure business logic.  The [`ScanDecoder`] turns a stream
//!   of keystrokes into complete 12-digit [`Barcode`]s, and the `pricing`
//!   module computes the per-unit shelf price from a bulk purchase.
//!
//! - **`protocol`** – How messages travel over the network.  Every message is
//!   an [`Envelope`]: a small JSON object with a routing `header` and a free
//!   form `body`.  Typed payload structs describe the bodies of each message
//!   kind.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `restock_core::Barcode` instead of `restock_core::domain::scan::Barcode`.
pub use domain::pricing::{unit_cost_cents, BulkCost, PricingError};
pub use domain::scan::{
    Barcode, BarcodeError, KeyEvent, ScanDecoder, ScanOutcome, COMMIT_THRESHOLD,
    INACTIVITY_TIMEOUT,
};
pub use protocol::envelope::{Envelope, Header, RequestId};
