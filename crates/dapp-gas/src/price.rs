//! Gas price cache.
//!
//! The price is fetched once, reused while fresh and served stale while a
//! single background refresh runs. A failed fetch never fails the caller: the
//! last known price is kept, or the configured default is used when nothing
//! has been fetched yet.

use dapp_chain::{ChainClient, ChainError};
use dapp_config::GasConfig;
use dapp_types::U256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct PriceEntry {
	price: U256,
	fetched_at: Instant,
	/// False when `price` is the configured default.
	live: bool,
}

/// Gas price as seen by a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentPrice {
	pub price: U256,
	/// True for a live price younger than the stale window.
	pub fresh: bool,
}

/// Cached gas price with stale-while-revalidate refresh.
pub struct GasPriceCache {
	chain: Arc<ChainClient>,
	entry: RwLock<Option<PriceEntry>>,
	fetch_lock: tokio::sync::Mutex<()>,
	refreshing: AtomicBool,
	stale_after: Duration,
	fetch_timeout: Duration,
	default_price: U256,
}

impl GasPriceCache {
	pub fn new(chain: Arc<ChainClient>, config: &GasConfig) -> Self {
		Self {
			chain,
			entry: RwLock::new(None),
			fetch_lock: tokio::sync::Mutex::new(()),
			refreshing: AtomicBool::new(false),
			stale_after: config.price_stale_after(),
			fetch_timeout: config.estimate_timeout(),
			default_price: U256::from(config.default_gas_price_wei),
		}
	}

	fn entry(&self) -> Option<PriceEntry> {
		*self.entry.read().unwrap_or_else(|e| e.into_inner())
	}

	/// Returns the price to quote with.
	///
	/// Only the very first call waits for the network. Later calls answer from
	/// the cache and schedule a background refresh once the entry is stale.
	pub async fn current(self: &Arc<Self>) -> CurrentPrice {
		let entry = match self.entry() {
			Some(entry) => entry,
			None => {
				let _guard = self.fetch_lock.lock().await;
				match self.entry() {
					Some(entry) => entry,
					None => {
						self.refresh().await;
						self.entry().unwrap_or(PriceEntry {
							price: self.default_price,
							fetched_at: Instant::now(),
							live: false,
						})
					},
				}
			},
		};

		let stale = entry.fetched_at.elapsed() >= self.stale_after;
		if stale {
			self.spawn_refresh();
		}

		CurrentPrice {
			price: entry.price,
			fresh: entry.live && !stale,
		}
	}

	fn spawn_refresh(self: &Arc<Self>) {
		if self.refreshing.swap(true, Ordering::SeqCst) {
			return;
		}
		let cache = self.clone();
		tokio::spawn(async move {
			cache.refresh().await;
			cache.refreshing.store(false, Ordering::SeqCst);
		});
	}

	/// Fetches the price now and stores the outcome.
	pub async fn refresh(&self) -> U256 {
		let fetched = match tokio::time::timeout(self.fetch_timeout, self.chain.gas_price()).await {
			Ok(fetched) => fetched,
			Err(_) => Err(ChainError::Network(format!(
				"Gas price request timed out after {} seconds",
				self.fetch_timeout.as_secs()
			))),
		};
		let mut slot = self.entry.write().unwrap_or_else(|e| e.into_inner());
		match fetched {
			Ok(price) => {
				tracing::debug!(gas_price = %price, "Refreshed gas price");
				*slot = Some(PriceEntry {
					price,
					fetched_at: Instant::now(),
					live: true,
				});
				price
			},
			Err(e) => match *slot {
				Some(mut entry) => {
					tracing::warn!(error = %e, "Gas price refresh failed, keeping last known price");
					// Restart the stale window.
					entry.fetched_at = Instant::now();
					*slot = Some(entry);
					entry.price
				},
				None => {
					tracing::warn!(
						error = %e,
						default = %self.default_price,
						"Gas price unavailable, using default"
					);
					*slot = Some(PriceEntry {
						price: self.default_price,
						fetched_at: Instant::now(),
						live: false,
					});
					self.default_price
				},
			},
		}
	}
}

/// Background task refreshing the gas price on a fixed interval.
///
/// The task stops when the handle is stopped or dropped.
#[derive(Debug)]
pub struct PriceRefreshHandle {
	task: JoinHandle<()>,
}

impl PriceRefreshHandle {
	pub(crate) fn spawn(cache: Arc<GasPriceCache>, every: Duration) -> Self {
		let task = tokio::spawn(async move {
			let mut interval = tokio::time::interval(every);
			interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			loop {
				interval.tick().await;
				cache.refresh().await;
			}
		});
		Self { task }
	}

	pub fn stop(&self) {
		self.task.abort();
	}
}

impl Drop for PriceRefreshHandle {
	fn drop(&mut self) {
		self.task.abort();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dapp_chain::implementations::memory::InMemoryChain;

	fn setup() -> (Arc<InMemoryChain>, Arc<GasPriceCache>) {
		let chain = Arc::new(InMemoryChain::new());
		let client = Arc::new(ChainClient::new(Box::new(chain.clone())));
		let cache = Arc::new(GasPriceCache::new(client, &GasConfig::default()));
		(chain, cache)
	}

	async fn settle() {
		for _ in 0..10 {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_fresh_price_is_reused() {
		let (chain, cache) = setup();
		chain.set_gas_price(U256::from(10u64));

		let first = cache.current().await;
		let second = cache.current().await;
		assert_eq!(first, CurrentPrice { price: U256::from(10u64), fresh: true });
		assert_eq!(second, first);
		assert_eq!(chain.gas_price_calls(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stale_price_is_served_while_refreshing() {
		let (chain, cache) = setup();
		chain.set_gas_price(U256::from(10u64));
		cache.current().await;

		chain.set_gas_price(U256::from(12u64));
		tokio::time::advance(Duration::from_secs(31)).await;

		let stale = cache.current().await;
		assert_eq!(stale, CurrentPrice { price: U256::from(10u64), fresh: false });

		settle().await;
		assert_eq!(chain.gas_price_calls(), 2);
		let refreshed = cache.current().await;
		assert_eq!(refreshed, CurrentPrice { price: U256::from(12u64), fresh: true });
	}

	#[tokio::test(start_paused = true)]
	async fn test_failure_uses_default_price() {
		let (chain, cache) = setup();
		chain.fail_gas_price("rpc down");

		let current = cache.current().await;
		assert_eq!(current.price, U256::from(20_000_000_000u64));
		assert!(!current.fresh);

		// The default is not refetched on every quote.
		cache.current().await;
		settle().await;
		assert_eq!(chain.gas_price_calls(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_unresponsive_node_uses_default_price() {
		let (chain, cache) = setup();
		chain.set_gas_price(U256::from(10u64));
		chain.set_latency(Duration::from_secs(86_400));
		let started = tokio::time::Instant::now();

		let current = cache.current().await;
		assert_eq!(current, CurrentPrice { price: U256::from(20_000_000_000u64), fresh: false });
		assert!(started.elapsed() >= Duration::from_secs(10));
		assert!(started.elapsed() < Duration::from_secs(20));
	}

	#[tokio::test(start_paused = true)]
	async fn test_failed_refresh_keeps_last_price() {
		let (chain, cache) = setup();
		chain.set_gas_price(U256::from(10u64));
		cache.current().await;

		chain.fail_gas_price("rpc down");
		assert_eq!(cache.refresh().await, U256::from(10u64));
		assert_eq!(cache.current().await.price, U256::from(10u64));
	}

	#[tokio::test(start_paused = true)]
	async fn test_periodic_refresh_stops_with_handle() {
		let (chain, cache) = setup();
		chain.set_gas_price(U256::from(10u64));

		let handle = PriceRefreshHandle::spawn(cache.clone(), Duration::from_secs(60));
		settle().await;
		assert_eq!(chain.gas_price_calls(), 1);

		tokio::time::advance(Duration::from_secs(60)).await;
		settle().await;
		assert_eq!(chain.gas_price_calls(), 2);

		handle.stop();
		tokio::time::advance(Duration::from_secs(120)).await;
		settle().await;
		assert_eq!(chain.gas_price_calls(), 2);
	}
}
