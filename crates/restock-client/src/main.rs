//! Restock POS client entry point.
//!
//! Connects to the relay, then runs one of three commands:
//!
//! ```text
//! restock [OPTIONS] [COMMAND]
//!
//! Commands:
//!   scan     Read scanner keystrokes from stdin and look up every barcode (default)
//!   lookup   Look up a single barcode
//!   update   Create or re-price an item from its bulk purchase
//!
//! Options:
//!   --config <PATH>            TOML configuration file
//!   --relay-host <HOST>        Relay hostname [default: localhost]
//!   --relay-port <PORT>        Relay port [default: 8080]
//!   --request-timeout <SECS>   Per-request timeout, 0 waits forever [default: 10]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                  | Description                     |
//! |---------------------------|---------------------------------|
//! | `RESTOCK_CONFIG`          | Path to the TOML config file    |
//! | `RESTOCK_RELAY_HOST`      | Relay hostname                  |
//! | `RESTOCK_RELAY_PORT`      | Relay port                      |
//! | `RESTOCK_REQUEST_TIMEOUT` | Per-request timeout (secs)      |
//!
//! Precedence: CLI flag, then environment variable, then config file, then
//! built-in default.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ WsConnection::start()   -- WebSocket reconnect loop, identifies as "pos"
//!  └─ Channel::spawn()        -- request/response correlation actor
//!  └─ InventoryClient         -- info_req / update_info
//!  └─ scan mode:
//!       stdin ─▶ forward_keys ─▶ ScanListener ─▶ barcode ─▶ lookup ─▶ stdout
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use restock_client::application::channel::{Channel, Requester};
use restock_client::application::inventory::{
    InventoryClient, InventoryError, ItemUpdate, LookupOutcome,
};
use restock_client::application::scan_listener::ScanListener;
use restock_client::infrastructure::config::{load_config, ClientConfig};
use restock_client::infrastructure::connection::WsConnection;
use restock_client::infrastructure::keyboard::forward_keys;
use restock_core::{Barcode, BulkCost};

/// How long one-shot commands wait for the relay before giving up.
const CONNECT_WAIT: Duration = Duration::from_secs(10);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Restock point-of-sale client.
#[derive(Debug, Parser)]
#[command(
    name = "restock",
    about = "Point-of-sale barcode scanner client for the Restock inventory service",
    version
)]
struct Cli {
    /// TOML configuration file.  A missing file means "use defaults".
    #[arg(long, env = "RESTOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Hostname or IP address of the relay.
    #[arg(long, env = "RESTOCK_RELAY_HOST")]
    relay_host: Option<String>,

    /// WebSocket port of the relay.
    #[arg(long, env = "RESTOCK_RELAY_PORT")]
    relay_port: Option<u16>,

    /// Per-request timeout in seconds; 0 waits forever.
    #[arg(long, env = "RESTOCK_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Read scanner keystrokes from stdin and look up every barcode.
    Scan,
    /// Look up a single barcode.
    Lookup {
        /// The 12-digit barcode.
        barcode: String,
    },
    /// Create or re-price an item from its bulk purchase.
    Update {
        /// The item's 12-digit barcode.
        #[arg(long)]
        barcode: String,
        /// Display name.
        #[arg(long)]
        name: String,
        /// Total cost of the bulk purchase, e.g. 12.34.
        #[arg(long)]
        bulk_cost: String,
        /// Number of units in the bulk purchase.
        #[arg(long)]
        bulk_count: u32,
        /// The bulk purchase was taxed.
        #[arg(long)]
        tax: bool,
        /// Id of the existing item; omit to create a new one.
        #[arg(long)]
        id: Option<String>,
    },
}

/// A validated command, ready to run.
#[derive(Debug, PartialEq, Eq)]
enum Job {
    Scan,
    Lookup(Barcode),
    Update(ItemUpdate),
}

impl Cli {
    /// Loads the config file (if any) and applies the CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    fn load_client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ClientConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.relay_host {
            config.relay.host.clone_from(host);
        }
        if let Some(port) = self.relay_port {
            config.relay.port = port;
        }
        if let Some(secs) = self.request_timeout {
            config.requests.timeout_secs = secs;
        }
    }
}

impl Command {
    /// Validates the command's arguments.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed barcode or bulk cost, or a zero bulk
    /// count.
    fn into_job(self) -> anyhow::Result<Job> {
        match self {
            Command::Scan => Ok(Job::Scan),
            Command::Lookup { barcode } => Ok(Job::Lookup(parse_barcode(&barcode)?)),
            Command::Update {
                barcode,
                name,
                bulk_cost,
                bulk_count,
                tax,
                id,
            } => {
                let barcode = parse_barcode(&barcode)?;
                let bulk_cost: BulkCost = bulk_cost
                    .parse()
                    .with_context(|| format!("invalid --bulk-cost {bulk_cost:?}"))?;
                let update = ItemUpdate::priced(id, name, barcode, bulk_cost, bulk_count, tax)
                    .context("cannot price item")?;
                Ok(Job::Update(update))
            }
        }
    }
}

fn parse_barcode(value: &str) -> anyhow::Result<Barcode> {
    value
        .parse()
        .with_context(|| format!("invalid barcode {value:?}"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_client_config()?;
    let job = cli.command.unwrap_or(Command::Scan).into_job()?;

    info!("Restock POS client starting");

    // ── Relay connection and request channel ──────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let connection = Arc::new(WsConnection::new(config.connection_config()));
    let events = Arc::clone(&connection).start(Arc::clone(&running));
    let channel = Channel::spawn(connection.clone(), events, config.channel_config());
    let inventory = InventoryClient::new(channel.clone())
        .with_destination(config.inventory.destination.clone());

    let result = match job {
        Job::Scan => run_scan(&config, &channel, &inventory).await,
        Job::Lookup(barcode) => {
            wait_for_relay(&connection).await?;
            let outcome = inventory.lookup(&barcode).await?;
            print_outcome(&outcome);
            Ok(())
        }
        Job::Update(update) => {
            wait_for_relay(&connection).await?;
            let (barcode, cents) = (update.barcode.clone(), update.cents);
            inventory.update(update).await?;
            println!("saved {barcode} at {cents} cents per unit");
            Ok(())
        }
    };

    running.store(false, Ordering::Relaxed);
    channel.shutdown().await;
    info!("Restock POS client stopped");
    result
}

async fn wait_for_relay(connection: &WsConnection) -> anyhow::Result<()> {
    tokio::time::timeout(CONNECT_WAIT, connection.wait_connected())
        .await
        .with_context(|| format!("relay not reachable within {CONNECT_WAIT:?}"))
}

/// Reads keystrokes from stdin until input ends or Ctrl-C.
async fn run_scan(
    config: &ClientConfig,
    channel: &Channel,
    inventory: &InventoryClient<Channel>,
) -> anyhow::Result<()> {
    let (key_tx, key_rx) = mpsc::channel(256);
    let (scan_tx, mut scan_rx) = mpsc::unbounded_channel();

    // A terminal has no focusable widgets, so keys are never claimed by one.
    let mut listener = ScanListener::with_inactivity_timeout(config.inactivity_timeout(), || false);
    listener.on_barcode_scanned(move |barcode| {
        let _ = scan_tx.send(barcode);
    });
    tokio::spawn(listener.run(key_rx));
    tokio::spawn(async move {
        if let Err(e) = forward_keys(tokio::io::stdin(), key_tx).await {
            error!("failed to read keystrokes: {e}");
        }
    });

    let mut pushes = channel.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    // Each scan is looked up in its own task, so a slow or missing answer
    // never holds back later scans or the shutdown signal.
    let mut lookups = JoinSet::new();
    let mut input_open = true;

    info!("ready; scan a barcode");
    while input_open || !lookups.is_empty() {
        tokio::select! {
            scanned = scan_rx.recv(), if input_open => match scanned {
                Some(barcode) => spawn_lookup(&mut lookups, inventory, barcode),
                None => {
                    info!(pending = lookups.len(), "input closed");
                    input_open = false;
                }
            },
            Some(finished) = lookups.join_next() => report_lookup(finished),
            push = pushes.recv() => match push {
                Ok(envelope) => {
                    info!(kind = envelope.kind(), body = %envelope.body, "message from relay");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed messages from relay");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => {
                info!("shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}

type LookupResult = (Barcode, Result<LookupOutcome, InventoryError>);

/// Starts the lookup for `barcode` as its own task in `lookups`.
fn spawn_lookup<R>(
    lookups: &mut JoinSet<LookupResult>,
    inventory: &InventoryClient<R>,
    barcode: Barcode,
) where
    R: Requester + Clone + 'static,
{
    let inventory = inventory.clone();
    lookups.spawn(async move {
        let outcome = inventory.lookup(&barcode).await;
        (barcode, outcome)
    });
}

fn report_lookup(finished: Result<LookupResult, JoinError>) {
    match finished {
        Ok((_, Ok(outcome))) => print_outcome(&outcome),
        Ok((barcode, Err(e))) => warn!(%barcode, "lookup failed: {e}"),
        Err(e) => error!("lookup task failed: {e}"),
    }
}

fn print_outcome(outcome: &LookupOutcome) {
    match outcome {
        LookupOutcome::Item(item) => {
            println!("{}: {} cents (item {})", item.name, item.cents, item.id);
        }
        LookupOutcome::User(user) => {
            println!(
                "user {}",
                user.name.as_deref().or(user.id.as_deref()).unwrap_or("(unnamed)")
            );
        }
        LookupOutcome::Unknown { barcode } => {
            println!(
                "unknown item {barcode}; create it with: restock update --barcode {barcode} \
                 --name <NAME> --bulk-cost <DOLLARS.CENTS> --bulk-count <UNITS> [--tax]"
            );
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
