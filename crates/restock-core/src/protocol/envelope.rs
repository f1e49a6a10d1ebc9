//! The envelope: the single message shape used for all relay traffic.
//!
//! Every message exchanged with the relay is a JSON object of the form:
//!
//! ```json
//! { "header": { "to": "inventory", "type": "info_req", "id": "…" },
//!   "body":   { "barcode": "000000000001" } }
//! ```
//!
//! - `header.to` names the destination component.  Responses usually leave
//!   it out, in which case it deserializes as the empty string.
//! - `header.type` names the *shape* of the body (`item_info`, `user_info`,
//!   …).  It says nothing about success or failure, except for the reserved
//!   `error` kind.
//! - `header.id` is the correlation id linking a response to the request
//!   that caused it.  Requests always carry one; unsolicited pushes from the
//!   relay carry none.  It is omitted from the JSON when absent so that
//!   messages without correlation look exactly like the classic
//!   `{header: {to, type}, body}` shape.
//!
//! The body is kept as an untyped [`serde_json::Value`] at this level.  Use
//! [`Envelope::payload`] to decode it into one of the structs in
//! [`super::messages`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::messages::{kinds, ErrorBody};

/// Correlation id linking a request to its eventual response.
///
/// A random UUID v4, so ids from a previous run (or a previous connection)
/// can never be mistaken for ids of the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Routing information carried by every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Destination component id (e.g. `"inventory"`).
    #[serde(default)]
    pub to: String,

    /// Message kind, serialized as `"type"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Correlation id; see the module docs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

/// A complete protocol message: header plus JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl Envelope {
    /// Builds an envelope with no correlation id.
    pub fn new(to: impl Into<String>, kind: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            header: Header {
                to: to.into(),
                kind: kind.into(),
                id: None,
            },
            body,
        }
    }

    /// Builds an envelope whose body is `payload` serialized to JSON.
    ///
    /// # Errors
    ///
    /// Returns the serde error if `payload` cannot be represented as JSON
    /// (e.g. a map with non-string keys).
    pub fn with_payload<T: Serialize>(
        to: impl Into<String>,
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(to, kind, serde_json::to_value(payload)?))
    }

    /// Returns a copy of this envelope stamped with `id`.
    pub fn with_id(mut self, id: RequestId) -> Self {
        self.header.id = Some(id);
        self
    }

    /// Message kind (`header.type`).
    pub fn kind(&self) -> &str {
        &self.header.kind
    }

    /// Correlation id, if any.
    pub fn id(&self) -> Option<RequestId> {
        self.header.id
    }

    /// Decodes the body into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the body does not match `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }

    /// Builds a response to this envelope carrying the same correlation id.
    pub fn reply(&self, kind: impl Into<String>, body: serde_json::Value) -> Envelope {
        Envelope {
            header: Header {
                to: String::new(),
                kind: kind.into(),
                id: self.header.id,
            },
            body,
        }
    }

    /// Builds an `error` response to this envelope.
    pub fn reply_error(&self, message: impl Into<String>) -> Envelope {
        let body = ErrorBody {
            message: message.into(),
        };
        // ErrorBody is a single string field; serializing it cannot fail.
        self.reply(
            kinds::ERROR,
            serde_json::to_value(body).unwrap_or(serde_json::Value::Null),
        )
    }

    /// `true` when this envelope is a remote error report.
    pub fn is_error(&self) -> bool {
        self.header.kind == kinds::ERROR
    }

    /// Best-effort human readable message of an `error` envelope.
    pub fn error_message(&self) -> String {
        if let Ok(ErrorBody { message }) = self.payload::<ErrorBody>() {
            return message;
        }
        match &self.body {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "remote error".to_string(),
            other => other.to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
