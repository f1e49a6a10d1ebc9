//! Typed payloads for each message kind.
//!
//! The envelope body is free-form JSON; these structs describe the bodies the
//! POS client actually sends and understands.
//!
//! # Message flow
//!
//! ```text
//! POS → inventory:  info_req    { barcode }
//! inventory → POS:  item_info   { id, barcode?, name, cents }
//!                 | user_info   { id?, name? }          (scanned a badge)
//!                 | error       { message }             (unknown barcode)
//!
//! POS → inventory:  update_info { id | null, name, cents, barcode }
//! inventory → POS:  any kind (acknowledgement) | error
//!
//! POS → relay:      identify    { role }                (once per connection)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::envelope::Envelope;
use crate::domain::scan::Barcode;

/// Message kind strings (`header.type`).
pub mod kinds {
    /// Look up a scanned barcode.
    pub const INFO_REQ: &str = "info_req";
    /// An existing inventory item.
    pub const ITEM_INFO: &str = "item_info";
    /// The scanned value identified a user rather than an item.
    pub const USER_INFO: &str = "user_info";
    /// Create or update an inventory item.
    pub const UPDATE_INFO: &str = "update_info";
    /// The remote side rejected a request.
    pub const ERROR: &str = "error";
    /// Connection-time role announcement to the relay.
    pub const IDENTIFY: &str = "identify";
}

/// Destination component ids (`header.to`).
pub mod destinations {
    /// The inventory service.
    pub const INVENTORY: &str = "inventory";
    /// The relay itself.
    pub const RELAY: &str = "relay";
}

/// Body of an `info_req`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRequest {
    pub barcode: Barcode,
}

/// Inventory record id as the inventory service assigned it.
///
/// Services backed by a database hand out numeric ids, others use strings;
/// both are kept exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

/// Body of an `item_info` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub id: ItemId,
    /// Not every response repeats the barcode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Empty when the service sends no name.
    #[serde(default)]
    pub name: String,
    /// Current unit price in cents.
    pub cents: i64,
}

/// Body of a `user_info` response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of an `update_info` request.
///
/// `id: None` creates a new item; `Some` updates the existing record.  The
/// field is always present on the wire (`null` for create).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub id: Option<String>,
    pub name: String,
    pub cents: u64,
    pub barcode: Barcode,
}

/// Body of an `error` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Body of the `identify` handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identify {
    /// Logical peer role, e.g. `"pos"`.
    pub role: String,
}

// ── Envelope builders ─────────────────────────────────────────────────────────

/// Builds the `info_req` envelope for `barcode`.
///
/// # Errors
///
/// Only fails if JSON serialization fails, which cannot happen for this
/// payload in practice.
pub fn info_request(barcode: &Barcode) -> Result<Envelope, serde_json::Error> {
    Envelope::with_payload(
        destinations::INVENTORY,
        kinds::INFO_REQ,
        &InfoRequest {
            barcode: barcode.clone(),
        },
    )
}

/// Builds the `update_info` envelope for `update`.
///
/// # Errors
///
/// Only fails if JSON serialization fails.
pub fn update_request(update: &UpdateInfo) -> Result<Envelope, serde_json::Error> {
    Envelope::with_payload(destinations::INVENTORY, kinds::UPDATE_INFO, update)
}

/// Builds the `identify` envelope announcing `role` to the relay.
///
/// # Errors
///
/// Only fails if JSON serialization fails.
pub fn identify(role: &str) -> Result<Envelope, serde_json::Error> {
    Envelope::with_payload(
        destinations::RELAY,
        kinds::IDENTIFY,
        &Identify {
            role: role.to_string(),
        },
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn barcode(s: &str) -> Barcode {
        Barcode::try_from(s).unwrap()
    }

    #[test]
    fn test_info_request_envelope_shape() {
        // Act
        let env = info_request(&barcode("000000000001")).unwrap();

        // Assert
        assert_eq!(env.header.to, "inventory");
        assert_eq!(env.kind(), "info_req");
        assert_eq!(env.body, json!({"barcode": "000000000001"}));
    }

    #[test]
    fn test_item_info_without_barcode_deserializes() {
        let body = json!({"id": "x", "name": "Soap", "cents": 199});

        let item: ItemInfo = serde_json::from_value(body).unwrap();

        assert_eq!(item.id, ItemId::from("x"));
        assert_eq!(item.name, "Soap");
        assert_eq!(item.cents, 199);
        assert!(item.barcode.is_none());
    }

    #[test]
    fn test_item_info_missing_name_defaults_to_empty() {
        let item: ItemInfo = serde_json::from_value(json!({"id": "x", "cents": 1})).unwrap();
        assert_eq!(item.name, "");
    }

    #[test]
    fn test_item_info_accepts_numeric_id() {
        // Arrange
        let body = json!({"id": 42, "barcode": "000000000001", "name": "Soap", "cents": 199});

        // Act
        let item: ItemInfo = serde_json::from_value(body).unwrap();

        // Assert
        assert_eq!(item.id, ItemId::from(42u64));
        assert_eq!(item.id.to_string(), "42");
        assert_eq!(serde_json::to_value(&item.id).unwrap(), json!(42));
    }

    #[test]
    fn test_item_info_missing_id_is_rejected() {
        let result: Result<ItemInfo, _> = serde_json::from_value(json!({"name": "Soap", "cents": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_update_serializes_null_id() {
        let update = UpdateInfo {
            id: None,
            name: "Soap".to_string(),
            cents: 199,
            barcode: barcode("036000291452"),
        };

        let env = update_request(&update).unwrap();

        assert_eq!(env.kind(), "update_info");
        assert_eq!(
            env.body,
            json!({"id": null, "name": "Soap", "cents": 199, "barcode": "036000291452"})
        );
    }

    #[test]
    fn test_existing_item_update_carries_id() {
        let update = UpdateInfo {
            id: Some("42".to_string()),
            name: "Soap".to_string(),
            cents: 250,
            barcode: barcode("036000291452"),
        };

        let env = update_request(&update).unwrap();

        assert_eq!(env.body["id"], "42");
    }

    #[test]
    fn test_user_info_accepts_empty_body() {
        let user: UserInfo = serde_json::from_value(json!({})).unwrap();
        assert_eq!(user, UserInfo::default());
    }

    #[test]
    fn test_identify_targets_relay() {
        let env = identify("pos").unwrap();
        assert_eq!(env.header.to, "relay");
        assert_eq!(env.kind(), "identify");
        assert_eq!(env.body, json!({"role": "pos"}));
    }
}
