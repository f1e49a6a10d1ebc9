//! Application layer use cases for the POS client.
//!
//! # What use cases does the client have?
//!
//! - **`scan_listener`** – Feeds live keystrokes into the scan decoder,
//!   runs its inactivity timer, and notifies registered handlers of every
//!   completed barcode.
//!
//! - **`channel`** – Turns the fire-and-forget relay connection into
//!   `request(envelope) -> response` calls by correlating ids.  The
//!   connection itself is injected through the `Transport` trait.
//!
//! - **`inventory`** – Typed `info_req` / `update_info` calls built on the
//!   channel, mapping raw responses to item, user, or "unknown" outcomes.

pub mod channel;
pub mod inventory;
pub mod scan_listener;
