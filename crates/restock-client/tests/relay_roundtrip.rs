//! Integration tests against an in-process WebSocket relay.
//!
//! The fake relay binds an ephemeral port on 127.0.0.1, accepts the client's
//! WebSocket, records every envelope it receives, and answers `info_req`
//! with an `item_info` carrying the same correlation id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use restock_client::application::channel::{Channel, ChannelConfig, ConnectionEvent};
use restock_client::application::inventory::{InventoryClient, LookupOutcome};
use restock_client::infrastructure::connection::{ConnectionConfig, WsConnection};
use restock_core::Envelope;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

fn connection_config(port: u16) -> ConnectionConfig {
    ConnectionConfig {
        url: ConnectionConfig::relay_url("127.0.0.1", port),
        reconnect_interval: Duration::from_millis(100),
        ..ConnectionConfig::default()
    }
}

/// Serves `sessions` WebSocket sessions one after another.  Each session
/// answers lookups until the client goes away, or closes right after the
/// handshake envelope when `hang_up_after_identify` is set.
async fn spawn_relay(
    sessions: usize,
    hang_up_after_identify: bool,
) -> (u16, mpsc::UnboundedReceiver<Envelope>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for session in 0..sessions {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let last = session + 1 == sessions;

            while let Some(Ok(frame)) = ws.next().await {
                let Message::Text(text) = frame else { continue };
                let envelope: Envelope = serde_json::from_str(&text).unwrap();
                let _ = seen_tx.send(envelope.clone());

                if envelope.kind() == "identify" && hang_up_after_identify && !last {
                    let _ = ws.close(None).await;
                    break;
                }
                if envelope.kind() == "info_req" {
                    let reply = envelope.reply(
                        "item_info",
                        json!({"id": "x", "name": "Soap", "cents": 199}),
                    );
                    let text = serde_json::to_string(&reply).unwrap();
                    ws.send(Message::Text(text)).await.unwrap();
                }
            }
        }
    });

    (port, seen_rx)
}

#[tokio::test]
async fn test_client_identifies_then_lookup_round_trips() {
    // Arrange
    let (port, mut seen) = spawn_relay(1, false).await;
    let running = Arc::new(AtomicBool::new(true));
    let connection = Arc::new(WsConnection::new(connection_config(port)));
    let events = Arc::clone(&connection).start(Arc::clone(&running));
    let channel = Channel::spawn(
        connection.clone(),
        events,
        ChannelConfig {
            request_timeout: Some(WAIT),
            ..ChannelConfig::default()
        },
    );
    timeout(WAIT, connection.wait_connected()).await.unwrap();

    // Assert: the first envelope on the wire is the role announcement
    let identify = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(identify.header.to, "relay");
    assert_eq!(identify.kind(), "identify");
    assert_eq!(identify.body, json!({"role": "pos"}));

    // Act
    let client = InventoryClient::new(channel.clone());
    let outcome = client.lookup(&"000000000001".parse().unwrap()).await.unwrap();

    // Assert
    match outcome {
        LookupOutcome::Item(item) => {
            assert_eq!(item.name, "Soap");
            assert_eq!(item.cents, 199);
        }
        other => panic!("expected item, got {other:?}"),
    }
    let request = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(request.kind(), "info_req");
    assert!(request.id().is_some(), "requests must carry a correlation id");

    running.store(false, Ordering::Relaxed);
    channel.shutdown().await;
}

#[tokio::test]
async fn test_connection_reconnects_and_identifies_again() {
    // Arrange: the relay hangs up on the first session
    let (port, mut seen) = spawn_relay(2, true).await;
    let running = Arc::new(AtomicBool::new(true));
    let connection = Arc::new(WsConnection::new(connection_config(port)));

    // Act
    let mut events = Arc::clone(&connection).start(Arc::clone(&running));
    let mut observed = Vec::new();
    for _ in 0..3 {
        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        observed.push(match event {
            ConnectionEvent::Connected => "connected",
            ConnectionEvent::Disconnected => "disconnected",
            ConnectionEvent::Message(_) => "message",
        });
    }

    // Assert
    assert_eq!(observed, vec!["connected", "disconnected", "connected"]);
    for _ in 0..2 {
        let envelope = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
        assert_eq!(envelope.kind(), "identify");
    }
    assert!(connection.is_connected());

    running.store(false, Ordering::Relaxed);
}
