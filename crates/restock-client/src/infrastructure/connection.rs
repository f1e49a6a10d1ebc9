//! WebSocket connection to the relay.
//!
//! Architecture:
//! - `WsConnection` owns the write half of the current WebSocket (if any).
//! - A background task connects, announces the client's role with an
//!   `identify` envelope, and reads text frames.  Each frame is decoded as an
//!   [`Envelope`] and forwarded as a [`ConnectionEvent`] on an `mpsc`
//!   channel.
//! - When the socket closes the write half is cleared, so writes fail fast
//!   with [`TransportError::NotConnected`] until the next connect succeeds.
//!   The loop waits `reconnect_interval` and tries again until `running` is
//!   cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use restock_core::protocol::messages;
use restock_core::Envelope;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::application::channel::{ConnectionEvent, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Configuration for the relay connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// WebSocket URL of the relay, e.g. `ws://localhost:8080/`.
    pub url: String,
    /// Role announced in the `identify` handshake.
    pub role: String,
    /// Pause between a disconnect (or failed connect) and the next attempt.
    pub reconnect_interval: Duration,
}

impl ConnectionConfig {
    /// Builds the relay URL for `host` and `port`.
    pub fn relay_url(host: &str, port: u16) -> String {
        format!("ws://{host}:{port}/")
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: Self::relay_url("localhost", 8080),
            role: "pos".to_string(),
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

/// Auto-reconnecting WebSocket client for the relay.
pub struct WsConnection {
    config: ConnectionConfig,
    writer: Mutex<Option<WsWriter>>,
    connected: watch::Sender<bool>,
}

impl WsConnection {
    /// Creates a new (not yet connected) `WsConnection`.
    pub fn new(config: ConnectionConfig) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            config,
            writer: Mutex::new(None),
            connected,
        }
    }

    /// Starts the connect/read/reconnect loop in a background task.
    ///
    /// Returns the receiver of [`ConnectionEvent`]s immediately.  The loop
    /// stops once `running` is cleared or the receiver is dropped.
    pub fn start(self: Arc<Self>, running: Arc<AtomicBool>) -> mpsc::Receiver<ConnectionEvent> {
        let (tx, rx) = mpsc::channel(128);

        tokio::spawn(async move {
            while running.load(Ordering::Relaxed) {
                match connect_async(self.config.url.as_str()).await {
                    Ok((stream, _response)) => {
                        info!("connected to relay at {}", self.config.url);
                        let (writer, reader) = stream.split();
                        *self.writer.lock().await = Some(writer);

                        self.identify().await;
                        self.connected.send_replace(true);
                        if tx.send(ConnectionEvent::Connected).await.is_err() {
                            break;
                        }

                        let listening = self.read_loop(reader, &tx).await;

                        *self.writer.lock().await = None;
                        self.connected.send_replace(false);
                        if !listening || tx.send(ConnectionEvent::Disconnected).await.is_err() {
                            break;
                        }
                        info!(
                            "disconnected from relay; reconnecting in {:?}",
                            self.config.reconnect_interval
                        );
                    }
                    Err(e) => {
                        warn!("could not connect to relay at {}: {e}", self.config.url);
                    }
                }

                if running.load(Ordering::Relaxed) {
                    time::sleep(self.config.reconnect_interval).await;
                }
            }
            debug!("relay connection loop stopped");
        });

        rx
    }

    /// Waits until a connection to the relay is open.
    pub async fn wait_connected(&self) {
        let mut connected = self.connected.subscribe();
        // The sender lives in `self`, so the wait cannot fail while we hold it.
        let _ = connected.wait_for(|up| *up).await;
    }

    /// `true` while a WebSocket is open.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Announces this client's role to the relay.
    async fn identify(&self) {
        match messages::identify(&self.config.role) {
            Ok(envelope) => {
                if let Err(e) = self.send(envelope).await {
                    warn!("failed to identify to relay: {e}");
                }
            }
            Err(e) => warn!("failed to encode identify envelope: {e}"),
        }
    }

    /// Forwards decoded frames on `tx` until the socket closes.
    ///
    /// Returns `false` if the event receiver has been dropped.
    async fn read_loop(&self, mut reader: WsReader, tx: &mpsc::Sender<ConnectionEvent>) -> bool {
        while let Some(frame) = reader.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<Envelope>(&text) {
                    Ok(envelope) => {
                        debug!(kind = envelope.kind(), id = ?envelope.id(), "received envelope");
                        if tx.send(ConnectionEvent::Message(envelope)).await.is_err() {
                            return false;
                        }
                    }
                    Err(e) => warn!("skipping malformed frame: {e}"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "relay closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("relay connection error: {e}");
                    break;
                }
            }
        }
        true
    }
}

#[async_trait]
impl Transport for WsConnection {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let text = serde_json::to_string(&envelope)?;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;
        writer
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
