//! Keystroke source.
//!
//! A keyboard-emulating scanner attached to a terminal shows up as bytes on
//! standard input.  Each byte is forwarded as one [`KeyEvent`]; the decoder
//! filters out everything that is not a digit (including the Enter most
//! scanners append).  Bytes outside ASCII map to Latin-1 characters, which
//! the decoder ignores as well.
//!
//! A terminal in canonical mode delivers input a line at a time, so digits
//! typed by hand reach the decoder in one burst when Enter is pressed.

use restock_core::KeyEvent;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::debug;

/// Reads `reader` to the end, sending every byte to `keys`.
///
/// Returns early (successfully) when the receiver is dropped.
///
/// # Errors
///
/// Propagates I/O errors from `reader`.
pub async fn forward_keys<R>(mut reader: R, keys: mpsc::Sender<KeyEvent>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 256];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            debug!("key source reached end of input");
            return Ok(());
        }
        for &byte in &buf[..n] {
            if keys.send(KeyEvent::new(char::from(byte))).await.is_err() {
                return Ok(());
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
