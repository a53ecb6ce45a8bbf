//! Gas estimation module for the on-chain action coordinator.
//!
//! Quotes the fee of a write before the user commits funds. Estimation
//! degrades through three tiers (live units with a fresh price, live units
//! with a cached or default price, static per-method units) and never returns
//! an error to the caller.

mod estimator;
mod price;

pub use estimator::{GasEstimator, QuoteRequest};
pub use price::{CurrentPrice, GasPriceCache, PriceRefreshHandle};

/// Applies a safety margin of `percent` to `units`, rounding down.
pub fn apply_buffer(units: u64, percent: u64) -> u64 {
	let buffered = (units as u128 * percent as u128) / 100;
	u64::try_from(buffered).unwrap_or(u64::MAX)
}
