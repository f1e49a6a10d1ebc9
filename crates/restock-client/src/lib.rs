//! restock-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does restock-client do? (for beginners)
//!
//! The client runs at the shop counter.  A USB barcode scanner is plugged in
//! and "types" barcodes as if it were a keyboard.  The client:
//!
//! 1. Reads every keystroke and recognises complete 12-digit scans.
//! 2. Keeps a WebSocket connection to the relay open, reconnecting whenever
//!    it drops, and identifies itself with the `pos` role.
//! 3. Sends an `info_req` for each scanned barcode and waits for the matching
//!    answer from the inventory service, even when several lookups are in
//!    flight at once.
//! 4. Lets the operator create or re-price items with `update_info`, deriving
//!    the unit price from the bulk purchase cost.

/// Application layer: use cases for the client.
pub mod application;

/// Infrastructure layer: WebSocket connection, config file, and key input.
pub mod infrastructure;
