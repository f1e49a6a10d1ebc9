//! Integration tests for the envelope wire format.
//!
//! These tests work on literal JSON text, the way envelopes actually travel
//! between the POS client, the relay and the inventory service.

use restock_core::protocol::messages::{
    identify, info_request, kinds, update_request, ItemInfo, UpdateInfo, UserInfo,
};
use restock_core::{Barcode, Envelope, RequestId, ScanDecoder, ScanOutcome};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

fn barcode(s: &str) -> Barcode {
    s.parse().expect("valid barcode")
}

#[test]
fn test_scanned_barcode_becomes_info_req_text() {
    // Arrange: scan a barcode with the decoder
    let mut decoder = ScanDecoder::new();
    let mut now = Instant::now();
    let mut scanned = None;
    for key in "000000000001".chars() {
        now += Duration::from_millis(15);
        if let ScanOutcome::Committed(code) = decoder.on_key(key, false, now) {
            scanned = Some(code);
        }
    }

    // Act
    let envelope = info_request(&scanned.expect("scan must commit")).unwrap();
    let text = serde_json::to_string(&envelope).unwrap();

    // Assert
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        value,
        json!({
            "header": {"to": "inventory", "type": "info_req"},
            "body": {"barcode": "000000000001"}
        })
    );
}

#[test]
fn test_item_info_response_text_decodes_to_item() {
    let id = RequestId::new();
    let text = format!(
        r#"{{"header":{{"type":"item_info","id":"{id}"}},"body":{{"id":"x","barcode":"000000000001","name":"Soap","cents":199}}}}"#
    );

    let envelope: Envelope = serde_json::from_str(&text).unwrap();
    let item: ItemInfo = envelope.payload().unwrap();

    assert_eq!(envelope.id(), Some(id));
    assert_eq!(envelope.kind(), kinds::ITEM_INFO);
    assert_eq!(item.name, "Soap");
    assert_eq!(item.cents, 199);
    assert_eq!(item.barcode.as_deref(), Some("000000000001"));
}

#[test]
fn test_user_info_response_text_decodes_to_user() {
    let text = r#"{"header":{"type":"user_info"},"body":{"name":"Ada"}}"#;

    let envelope: Envelope = serde_json::from_str(text).unwrap();
    let user: UserInfo = envelope.payload().unwrap();

    assert_eq!(user.name.as_deref(), Some("Ada"));
    assert!(user.id.is_none());
}

#[test]
fn test_info_req_with_invalid_barcode_is_rejected() {
    let text = r#"{"header":{"to":"inventory","type":"info_req"},"body":{"barcode":"12ab"}}"#;

    let envelope: Envelope = serde_json::from_str(text).unwrap();
    let result: Result<restock_core::protocol::messages::InfoRequest, _> = envelope.payload();

    assert!(result.is_err());
}

#[test]
fn test_update_round_trips_through_text() {
    let update = UpdateInfo {
        id: None,
        name: "Soap".to_string(),
        cents: 199,
        barcode: barcode("036000291452"),
    };
    let id = RequestId::new();
    let envelope = update_request(&update).unwrap().with_id(id);

    let text = serde_json::to_string(&envelope).unwrap();
    let decoded: Envelope = serde_json::from_str(&text).unwrap();

    assert_eq!(decoded, envelope);
    assert_eq!(decoded.payload::<UpdateInfo>().unwrap(), update);
}

#[test]
fn test_identify_text_shape() {
    let text = serde_json::to_string(&identify("pos").unwrap()).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(
        value,
        json!({"header": {"to": "relay", "type": "identify"}, "body": {"role": "pos"}})
    );
}
