//! Typed inventory calls on top of the request channel.
//!
//! The inventory service answers two requests:
//!
//! - **`info_req`** – "what is this barcode?"  The answer is an item, a user
//!   (staff badges carry barcodes too), or an `error` when nothing matches.
//!   A missing item is an ordinary outcome for the POS: the operator is
//!   offered to create it, so it is reported as [`LookupOutcome::Unknown`]
//!   rather than as an error.
//! - **`update_info`** – create or update an item.  Any non-error response
//!   counts as an acknowledgement.

use restock_core::protocol::messages::{
    destinations, info_request, kinds, update_request, ItemInfo, UpdateInfo, UserInfo,
};
use restock_core::{unit_cost_cents, Barcode, BulkCost, Envelope, PricingError};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use super::channel::{ChannelError, Requester};

/// Errors surfaced by [`InventoryClient`].
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The request could not be completed (transport, timeout, shutdown, or a
    /// remote rejection of an update).
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The service answered with a message kind this call does not expect.
    #[error("unexpected {kind:?} response to {request}")]
    UnexpectedResponse { request: &'static str, kind: String },

    /// The response body does not match its declared kind.
    #[error("malformed {kind} body: {source}")]
    MalformedBody {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request body could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of looking up a scanned barcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// A known inventory item.
    Item(ItemInfo),
    /// The barcode belongs to a user badge.
    User(UserInfo),
    /// Nothing matches; the caller may offer to create the item.
    Unknown { barcode: Barcode },
}

/// A create-or-update request for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    /// `None` creates a new item.
    pub id: Option<String>,
    pub name: String,
    /// Unit price in cents.
    pub cents: u64,
    pub barcode: Barcode,
}

impl ItemUpdate {
    /// Builds an update whose unit price is derived from a bulk purchase.
    ///
    /// # Errors
    ///
    /// Propagates [`PricingError`] from [`unit_cost_cents`].
    pub fn priced(
        id: Option<String>,
        name: impl Into<String>,
        barcode: Barcode,
        bulk_cost: BulkCost,
        bulk_count: u32,
        taxed: bool,
    ) -> Result<Self, PricingError> {
        Ok(Self {
            id,
            name: name.into(),
            cents: unit_cost_cents(bulk_cost, bulk_count, taxed)?,
            barcode,
        })
    }
}

impl From<ItemUpdate> for UpdateInfo {
    fn from(update: ItemUpdate) -> Self {
        Self {
            id: update.id,
            name: update.name,
            cents: update.cents,
            barcode: update.barcode,
        }
    }
}

/// Client for the inventory service.
#[derive(Clone)]
pub struct InventoryClient<R> {
    requester: R,
    destination: String,
}

impl<R: Requester> InventoryClient<R> {
    /// Creates a client addressing the standard `inventory` component.
    pub fn new(requester: R) -> Self {
        Self {
            requester,
            destination: destinations::INVENTORY.to_string(),
        }
    }

    /// Overrides the destination component id.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Looks up `barcode`.
    ///
    /// # Errors
    ///
    /// [`InventoryError::Channel`] for transport failures, timeouts and
    /// shutdown; [`InventoryError::UnexpectedResponse`] or
    /// [`InventoryError::MalformedBody`] for responses that make no sense.
    pub async fn lookup(&self, barcode: &Barcode) -> Result<LookupOutcome, InventoryError> {
        let request = self.addressed(info_request(barcode)?);
        debug!(%barcode, "looking up barcode");

        match self.requester.request(request).await {
            Ok(response) => match response.kind() {
                kinds::ITEM_INFO => Ok(LookupOutcome::Item(decode(&response)?)),
                kinds::USER_INFO => Ok(LookupOutcome::User(decode(&response)?)),
                other => Err(InventoryError::UnexpectedResponse {
                    request: kinds::INFO_REQ,
                    kind: other.to_string(),
                }),
            },
            Err(ChannelError::Remote(message)) => {
                info!(%barcode, %message, "barcode unknown to inventory");
                Ok(LookupOutcome::Unknown {
                    barcode: barcode.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates or updates an item.
    ///
    /// # Errors
    ///
    /// [`InventoryError::Channel`], including [`ChannelError::Remote`] when
    /// the service rejects the update.
    pub async fn update(&self, update: ItemUpdate) -> Result<(), InventoryError> {
        let creating = update.id.is_none();
        let barcode = update.barcode.clone();
        let request = self.addressed(update_request(&update.into())?);

        let response = self.requester.request(request).await?;
        info!(
            %barcode,
            creating,
            ack = response.kind(),
            "inventory update acknowledged"
        );
        Ok(())
    }

    fn addressed(&self, mut envelope: Envelope) -> Envelope {
        envelope.header.to.clone_from(&self.destination);
        envelope
    }
}

fn decode<T: DeserializeOwned>(response: &Envelope) -> Result<T, InventoryError> {
    response
        .payload()
        .map_err(|source| InventoryError::MalformedBody {
            kind: response.kind().to_string(),
            source,
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
