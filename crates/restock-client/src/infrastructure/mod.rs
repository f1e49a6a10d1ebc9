//! Infrastructure layer for the client application.
//!
//! Contains I/O-facing adapters: the relay connection, the configuration
//! file, and the keystroke source.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `restock_core`, but MUST NOT be imported by the `application` or domain
//! layers (tests excepted).
//!
//! # Sub-modules
//!
//! - **`connection`** – WebSocket client that connects to the relay,
//!   announces the `pos` role, turns text frames into envelopes, and
//!   reconnects automatically if the connection drops.  Implements the
//!   application's `Transport` trait.
//!
//! - **`config`** – TOML configuration file with serde defaults for every
//!   field.
//!
//! - **`keyboard`** – Reads raw bytes (standard input in the binary) and
//!   forwards them as key events.
//!
//! - **`mock`** – Recording test doubles for `Transport` and `Requester`.

pub mod config;
pub mod connection;
pub mod keyboard;
pub mod mock;
