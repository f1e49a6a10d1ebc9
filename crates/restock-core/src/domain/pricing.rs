//! Unit price calculation.
//!
//! Stock is bought in bulk (a case of 24 cans for $12.34) but sold per unit.
//! The shelf price of one unit is derived from the bulk purchase:
//!
//! ```text
//! taxed_cost    = bulk_cost × 1.077      (only when the purchase was taxed)
//! overhead_cost = taxed_cost × 1.2
//! unit_cents    = ceil(overhead_cost / bulk_count × 100)
//! ```
//!
//! The result is always rounded *up* to the next whole cent so the store
//! never sells below cost.  All arithmetic is done on integer cents, scaled
//! by 10 000 so that the 1.077 and 1.2 factors are exact.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Sales tax factor in thousandths (7.7 %).
const TAX_RATE_MILLI: u128 = 1077;
/// Untaxed factor in thousandths.
const NO_TAX_RATE_MILLI: u128 = 1000;
/// Overhead factor in tenths (20 %).
const OVERHEAD_TENTHS: u128 = 12;
/// Combined scale of the two factors above.
const SCALE: u128 = 1000 * 10;

/// Errors produced by the pricing rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// The bulk cost is not written as dollars and exactly two cent digits.
    #[error("bulk cost {0:?} must look like 12.34")]
    InvalidBulkCost(String),

    /// A bulk purchase of zero units has no unit price.
    #[error("bulk count must be at least 1")]
    ZeroBulkCount,

    /// The unit price does not fit in 64 bits.
    #[error("unit cost overflows")]
    Overflow,
}

/// The total amount paid for a bulk purchase, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BulkCost {
    cents: u64,
}

impl BulkCost {
    /// Creates a bulk cost from a whole number of cents.
    pub fn from_cents(cents: u64) -> Self {
        Self { cents }
    }

    /// Total cost in cents.
    pub fn cents(self) -> u64 {
        self.cents
    }
}

impl FromStr for BulkCost {
    type Err = PricingError;

    /// Parses the `\d+\.\d\d` form typed into the stock entry form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PricingError::InvalidBulkCost(s.to_string());

        let (dollars, cents) = s.split_once('.').ok_or_else(invalid)?;
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(dollars) || !all_digits(cents) || cents.len() != 2 {
            return Err(invalid());
        }

        let dollars: u64 = dollars.parse().map_err(|_| invalid())?;
        let cents: u64 = cents.parse().map_err(|_| invalid())?;
        dollars
            .checked_mul(100)
            .and_then(|d| d.checked_add(cents))
            .map(Self::from_cents)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for BulkCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

/// Computes the per-unit price in cents for a bulk purchase.
///
/// # Errors
///
/// [`PricingError::ZeroBulkCount`] when `bulk_count` is 0 and
/// [`PricingError::Overflow`] if the result exceeds `u64::MAX`.
///
/// # Example
///
/// ```rust
/// use restock_core::{unit_cost_cents, BulkCost};
///
/// // $10.00 for 10 units, untaxed: 10.00 × 1.2 / 10 = $1.20
/// let cost: BulkCost = "10.00".parse().unwrap();
/// assert_eq!(unit_cost_cents(cost, 10, false).unwrap(), 120);
/// ```
pub fn unit_cost_cents(
    bulk_cost: BulkCost,
    bulk_count: u32,
    taxed: bool,
) -> Result<u64, PricingError> {
    if bulk_count == 0 {
        return Err(PricingError::ZeroBulkCount);
    }

    let rate = if taxed { TAX_RATE_MILLI } else { NO_TAX_RATE_MILLI };
    let numerator = u128::from(bulk_cost.cents) * rate * OVERHEAD_TENTHS;
    let denominator = SCALE * u128::from(bulk_count);
    let unit = numerator.div_ceil(denominator);

    u64::try_from(unit).map_err(|_| PricingError::Overflow)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
