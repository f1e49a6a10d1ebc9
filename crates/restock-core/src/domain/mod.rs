//! Domain entities for the Restock POS client.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from OS APIs, network libraries, async runtimes, or
//!   terminal frameworks.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Here that means: recognising a barcode scan in a keystroke stream, and
//! turning a bulk purchase into a per-unit price.  Neither needs a clock of
//! its own; time is always passed in by the caller.

/// Keystroke → barcode state machine.
///
/// See [`scan::ScanDecoder`] for the main type.
pub mod scan;

/// Unit price calculation for new and updated inventory items.
pub mod pricing;
