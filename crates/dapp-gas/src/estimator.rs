//! Gas estimator.
//!
//! Produces a fee quote for a prospective write. Units come from a live
//! simulation when the node can answer and from the static per-method table
//! otherwise; the price comes from [`GasPriceCache`]. Quoting never fails.

use crate::apply_buffer;
use crate::price::{CurrentPrice, GasPriceCache, PriceRefreshHandle};
use dapp_chain::ChainClient;
use dapp_config::GasConfig;
use dapp_types::{Address, ContractCall, ErrorKind, GasQuote, QuoteSource, B256, U256};
use moka::future::Cache;
use std::sync::Arc;

/// Upper bound on distinct call shapes kept in the units cache.
const UNITS_CACHE_CAPACITY: u64 = 1_024;

/// A prospective purchase to quote.
#[derive(Debug, Clone)]
pub struct QuoteRequest {
	pub call: ContractCall,
	/// Number of items the call buys.
	pub quantity: u64,
	/// Price of the items being bought, in wei.
	pub value: U256,
}

impl QuoteRequest {
	pub fn new(call: ContractCall, quantity: u64, value: U256) -> Self {
		Self {
			call,
			quantity,
			value,
		}
	}

	/// Request for a call that pays with native value, taking the price from it.
	pub fn for_payable(call: ContractCall, quantity: u64) -> Self {
		let value = call.value;
		Self::new(call, quantity, value)
	}
}

/// Shape of a quote; equal keys share one live estimate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QuoteKey {
	account: Address,
	target: Address,
	method: String,
	fingerprint: B256,
	value: U256,
	quantity: u64,
}

/// Fee estimator with a live tier, a cached-price tier and a static tier.
pub struct GasEstimator {
	chain: Arc<ChainClient>,
	prices: Arc<GasPriceCache>,
	/// `None` records a failed estimate so the fallback is reused for the TTL.
	units: Cache<QuoteKey, Option<u64>>,
	config: GasConfig,
}

impl GasEstimator {
	pub fn new(chain: Arc<ChainClient>, config: GasConfig) -> Self {
		let prices = Arc::new(GasPriceCache::new(chain.clone(), &config));
		let units = Cache::builder()
			.max_capacity(UNITS_CACHE_CAPACITY)
			.time_to_live(config.estimate_ttl())
			.build();
		Self {
			chain,
			prices,
			units,
			config,
		}
	}

	/// Quotes `request` for `account`.
	///
	/// Returns a zero quote with [`QuoteSource::NotReady`] when no account is
	/// connected, nothing is bought or the value is zero. Requests of the same
	/// shape inside the estimate TTL share one simulation, including requests
	/// that are in flight at the same time.
	pub async fn quote(&self, request: &QuoteRequest, account: Option<Address>) -> GasQuote {
		let Some(account) = account else {
			return GasQuote::not_ready();
		};
		if request.quantity == 0 || request.value.is_zero() {
			return GasQuote::not_ready();
		}

		let call = &request.call;
		let key = QuoteKey {
			account,
			target: call.target,
			method: call.method_name().to_string(),
			fingerprint: call.fingerprint(),
			value: request.value,
			quantity: request.quantity,
		};

		let units = self
			.units
			.get_with(key, async { self.estimate_units(call, account).await.ok() })
			.await;

		let current = self.prices.current().await;

		let quote = match units {
			Some(units) => {
				let source = if current.fresh {
					QuoteSource::Live
				} else {
					QuoteSource::CachedPriceLiveUnits
				};
				GasQuote::new(
					current.price,
					Some(units),
					apply_buffer(units, self.config.buffer_percent),
					source,
				)
			},
			None => {
				let units = self
					.config
					.fallback_for(call.method_name())
					.units_for(request.quantity);
				let buffered = if self.config.buffer_static_fallback {
					apply_buffer(units, self.config.buffer_percent)
				} else {
					units
				};
				GasQuote::new(current.price, Some(units), buffered, QuoteSource::StaticFallback)
			},
		};

		tracing::debug!(
			method = call.method_name(),
			quantity = request.quantity,
			units = quote.buffered_units,
			total_fee = %quote.total_fee,
			source = ?quote.source,
			"Quoted gas"
		);
		quote
	}

	/// Asks the node for live units, giving up after the estimate timeout.
	async fn estimate_units(&self, call: &ContractCall, account: Address) -> Result<u64, ErrorKind> {
		let timeout = self.config.estimate_timeout();
		let cause = match tokio::time::timeout(timeout, self.chain.estimate_gas(call, account)).await {
			Ok(Ok(units)) => return Ok(units),
			Ok(Err(e)) => e.to_string(),
			Err(_) => format!("no answer after {} seconds", timeout.as_secs()),
		};
		let error = ErrorKind::EstimationUnavailable;
		tracing::debug!(
			method = call.method_name(),
			error = %error,
			cause = %cause,
			"Using static units"
		);
		Err(error)
	}

	/// Gas price the next quote would use.
	pub async fn current_price(&self) -> CurrentPrice {
		self.prices.current().await
	}

	/// Drops every cached unit estimate, e.g. after state-changing writes.
	pub fn invalidate_estimates(&self) {
		self.units.invalidate_all();
	}

	/// Starts refreshing the gas price every configured refresh interval.
	pub fn spawn_price_refresh(&self) -> PriceRefreshHandle {
		PriceRefreshHandle::spawn(self.prices.clone(), self.config.price_refresh_interval())
	}
}
