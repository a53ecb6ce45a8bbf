//! Gas quote types.
//!
//! A quote is an estimate of the fee a write will cost, produced before the
//! user commits funds. It is immutable once built and always satisfies
//! `total_fee == buffered_units * per_unit_price`.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Where the unit count and price of a quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteSource {
	/// Live unit estimate priced with a fresh gas price.
	Live,
	/// Live unit estimate priced with a stale or default gas price.
	CachedPriceLiveUnits,
	/// Units taken from the static per-method table.
	StaticFallback,
	/// Preconditions not met (no account, zero quantity or zero value).
	NotReady,
}

/// Fee estimate for a prospective write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasQuote {
	/// Gas price in wei per unit.
	pub per_unit_price: U256,
	/// Units reported by the estimator or the static table, before buffering.
	pub units_estimated: Option<u64>,
	/// Units after the safety margin.
	pub buffered_units: u64,
	/// `buffered_units * per_unit_price`.
	pub total_fee: U256,
	pub source: QuoteSource,
}

impl GasQuote {
	pub fn new(
		per_unit_price: U256,
		units_estimated: Option<u64>,
		buffered_units: u64,
		source: QuoteSource,
	) -> Self {
		Self {
			per_unit_price,
			units_estimated,
			buffered_units,
			total_fee: U256::from(buffered_units).saturating_mul(per_unit_price),
			source,
		}
	}

	/// Zero-fee quote signalling that the inputs are not ready yet.
	pub fn not_ready() -> Self {
		Self::new(U256::ZERO, None, 0, QuoteSource::NotReady)
	}

	pub fn is_ready(&self) -> bool {
		self.source != QuoteSource::NotReady
	}

	/// True when the unit count came from a live estimate.
	pub fn is_estimated(&self) -> bool {
		matches!(
			self.source,
			QuoteSource::Live | QuoteSource::CachedPriceLiveUnits
		)
	}

	/// Combines this fee with the price of the item being bought.
	pub fn cost_breakdown(&self, product_price: U256) -> CostBreakdown {
		CostBreakdown {
			product_price,
			gas_fee: self.total_fee,
			total: product_price.saturating_add(self.total_fee),
			is_estimated: self.is_estimated(),
		}
	}
}

/// What the user pays in total for a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
	pub product_price: U256,
	pub gas_fee: U256,
	pub total: U256,
	pub is_estimated: bool,
}
