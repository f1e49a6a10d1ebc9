//! Protocol module containing the envelope wire format and typed payloads.

pub mod envelope;
pub mod messages;

pub use envelope::{Envelope, Header, RequestId};
pub use messages::*;
