//! End-to-end scan scenarios for the scan listener.
//!
//! Keys are sent through the same `mpsc` queue the binary uses, under
//! Tokio's paused clock, so the inactivity timer runs on virtual time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use restock_client::application::scan_listener::ScanListener;
use restock_core::KeyEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Scanner {
    keys: mpsc::Sender<KeyEvent>,
    scanned: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<ScanListener>,
}

impl Scanner {
    fn start(focused: Arc<AtomicBool>) -> Self {
        let scanned = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&scanned);
        let mut listener = ScanListener::new(move || focused.load(Ordering::Relaxed));
        listener.on_barcode_scanned(move |code| sink.lock().unwrap().push(code.into_string()));

        let (keys, rx) = mpsc::channel(64);
        let task = tokio::spawn(listener.run(rx));
        Self {
            keys,
            scanned,
            task,
        }
    }

    /// Types `digits` with `gap` between keys, the way a scanner does.
    async fn type_keys(&self, digits: &str, gap: Duration) {
        for key in digits.chars() {
            self.keys.send(KeyEvent::new(key)).await.unwrap();
            tokio::time::sleep(gap).await;
        }
    }

    async fn finish(self) -> (Vec<String>, ScanListener) {
        drop(self.keys);
        let listener = self.task.await.unwrap();
        let scanned = self.scanned.lock().unwrap().clone();
        (scanned, listener)
    }
}

const FAST: Duration = Duration::from_millis(20);

#[tokio::test(start_paused = true)]
async fn test_fast_scan_commits_exactly_once() {
    // Arrange
    let scanner = Scanner::start(Arc::new(AtomicBool::new(false)));

    // Act
    scanner.type_keys("123456789012", FAST).await;
    let (scanned, listener) = scanner.finish().await;

    // Assert
    assert_eq!(scanned, vec!["123456789012"]);
    assert_eq!(listener.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_discards_prefix_then_full_scan_commits() {
    let scanner = Scanner::start(Arc::new(AtomicBool::new(false)));

    scanner.type_keys("12", FAST).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;
    scanner.type_keys("345678901234", FAST).await;
    let (scanned, _) = scanner.finish().await;

    assert_eq!(scanned, vec!["345678901234"]);
}

#[tokio::test(start_paused = true)]
async fn test_back_to_back_scans_commit_in_order() {
    let scanner = Scanner::start(Arc::new(AtomicBool::new(false)));

    scanner
        .type_keys("111111111111222222222222", Duration::from_millis(5))
        .await;
    let (scanned, _) = scanner.finish().await;

    assert_eq!(scanned, vec!["111111111111", "222222222222"]);
}

#[tokio::test(start_paused = true)]
async fn test_trailing_enter_and_letters_are_ignored() {
    let scanner = Scanner::start(Arc::new(AtomicBool::new(false)));

    scanner.type_keys("0360a0029145\n2", FAST).await;
    let (scanned, _) = scanner.finish().await;

    assert_eq!(scanned, vec!["036000291452"]);
}

#[tokio::test(start_paused = true)]
async fn test_typing_into_focused_field_never_scans() {
    let scanner = Scanner::start(Arc::new(AtomicBool::new(true)));

    scanner.type_keys("123456789012", FAST).await;
    let (scanned, listener) = scanner.finish().await;

    assert!(scanned.is_empty());
    assert_eq!(listener.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_partial_scan_is_cleared_by_timer() {
    let scanner = Scanner::start(Arc::new(AtomicBool::new(false)));

    scanner.type_keys("98765", FAST).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    let (scanned, listener) = scanner.finish().await;

    assert!(scanned.is_empty());
    assert_eq!(listener.pending_len(), 0);
}
