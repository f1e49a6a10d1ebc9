//! TOML configuration file for the POS client.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! client that talks to `ws://localhost:8080/` as role `pos`.  Example:
//!
//! ```toml
//! [relay]
//! host = "store-server.local"
//! port = 8080
//! role = "pos"
//! reconnect_interval_secs = 5
//!
//! [requests]
//! timeout_secs = 10        # 0 waits forever
//! sweep_interval_secs = 30
//!
//! [scanner]
//! inactivity_timeout_ms = 1000
//!
//! [inventory]
//! destination = "inventory"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, so partial files work and older
//! files keep working when new fields are added.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::channel::ChannelConfig;
use crate::infrastructure::connection::ConnectionConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub requests: RequestConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

/// Where the relay lives and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Role announced to the relay on every connect.
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
}

/// Request correlation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestConfig {
    /// Per-request timeout in seconds; `0` disables the timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Scan decoder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScannerConfig {
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,
}

/// Inventory service addressing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryConfig {
    /// Component id the relay routes inventory requests to.
    #[serde(default = "default_destination")]
    pub destination: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_role() -> String {
    "pos".to_string()
}
fn default_reconnect_interval_secs() -> u64 {
    5
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_sweep_interval_secs() -> u64 {
    30
}
fn default_inactivity_timeout_ms() -> u64 {
    1000
}
fn default_destination() -> String {
    "inventory".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            role: default_role(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            destination: default_destination(),
        }
    }
}

// ── Derived runtime settings ──────────────────────────────────────────────────

impl ClientConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or mistyped fields.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Settings for the relay connection.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: ConnectionConfig::relay_url(&self.relay.host, self.relay.port),
            role: self.relay.role.clone(),
            reconnect_interval: Duration::from_secs(self.relay.reconnect_interval_secs),
        }
    }

    /// Settings for the request channel.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            request_timeout: self.request_timeout(),
            sweep_interval: Duration::from_secs(self.requests.sweep_interval_secs.max(1)),
        }
    }

    /// Per-request timeout, `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.requests.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Scan decoder inactivity window, at least 1 ms.  A zero window would
    /// expire every digit before the next one arrives.
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.scanner.inactivity_timeout_ms.max(1))
    }
}

/// Loads the configuration at `path`, returning [`ClientConfig::default`]
/// if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// or [`ConfigError::Parse`] if the file is not valid TOML.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => ClientConfig::from_toml_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
