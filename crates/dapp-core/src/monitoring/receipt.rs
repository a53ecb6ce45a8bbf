//! Receipt polling for submitted transactions.
//!
//! Polls the chain client at a fixed interval until a receipt shows up, the
//! timeout passes or too many polls fail in a row. Missing receipts are normal
//! while the transaction waits to be mined.

use dapp_chain::ChainClient;
use dapp_config::TransactionConfig;
use dapp_types::{truncate_id, ErrorKind, TransactionHash, TransactionReceipt};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub struct ReceiptMonitor {
	chain: Arc<ChainClient>,
	poll_interval: Duration,
	timeout: Duration,
	max_consecutive_errors: u32,
}

impl ReceiptMonitor {
	pub fn new(chain: Arc<ChainClient>, config: &TransactionConfig) -> Self {
		Self {
			chain,
			poll_interval: config.poll_interval(),
			timeout: config.receipt_timeout(),
			max_consecutive_errors: config.max_consecutive_poll_errors.max(1),
		}
	}

	/// Waits until `tx_hash` is mined.
	///
	/// A reverted receipt is [`ErrorKind::RevertedOnChain`]. Giving up, by
	/// timeout or repeated poll failures, is [`ErrorKind::NetworkError`]; the
	/// transaction itself may still be mined later.
	#[instrument(skip_all, fields(tx_hash = %truncate_id(&tx_hash.to_string())))]
	pub async fn wait_for_receipt(
		&self,
		tx_hash: &TransactionHash,
	) -> Result<TransactionReceipt, ErrorKind> {
		let start_time = tokio::time::Instant::now();
		let mut consecutive_errors = 0u32;

		loop {
			if start_time.elapsed() > self.timeout {
				tracing::warn!(
					timeout_secs = self.timeout.as_secs(),
					"Receipt monitoring timeout reached"
				);
				return Err(self.timed_out());
			}

			let remaining = self.timeout.saturating_sub(start_time.elapsed());
			let polled = match tokio::time::timeout(remaining, self.chain.get_receipt(tx_hash)).await {
				Ok(polled) => polled,
				Err(_) => {
					tracing::warn!(
						timeout_secs = self.timeout.as_secs(),
						"Receipt lookup still pending at timeout"
					);
					return Err(self.timed_out());
				},
			};

			match polled {
				Ok(Some(receipt)) if receipt.success => {
					tracing::info!(block = receipt.block_number, "Confirmed");
					return Ok(receipt);
				},
				Ok(Some(receipt)) => {
					tracing::warn!(block = receipt.block_number, "Transaction reverted");
					return Err(ErrorKind::RevertedOnChain);
				},
				Ok(None) => {
					consecutive_errors = 0;
					tracing::debug!(
						elapsed_secs = start_time.elapsed().as_secs(),
						"Waiting for transaction to be mined"
					);
				},
				Err(e) => {
					consecutive_errors += 1;
					tracing::warn!(
						error = %e,
						attempt = consecutive_errors,
						"Failed to fetch receipt"
					);
					if consecutive_errors >= self.max_consecutive_errors {
						return Err(ErrorKind::NetworkError(e.to_string()));
					}
				},
			}

			tokio::time::sleep(self.poll_interval).await;
		}
	}

	fn timed_out(&self) -> ErrorKind {
		ErrorKind::NetworkError(format!("No receipt after {} seconds", self.timeout.as_secs()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dapp_chain::implementations::memory::InMemoryChain;
	use dapp_types::B256;

	fn setup() -> (Arc<InMemoryChain>, ReceiptMonitor) {
		let chain = Arc::new(InMemoryChain::new());
		let client = Arc::new(ChainClient::new(Box::new(chain.clone())));
		(chain, ReceiptMonitor::new(client, &TransactionConfig::default()))
	}

	fn hash() -> TransactionHash {
		TransactionHash(B256::repeat_byte(0x11))
	}

	#[tokio::test(start_paused = true)]
	async fn test_waits_until_mined() {
		let (chain, monitor) = setup();
		let miner = chain.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(10)).await;
			miner.mine(hash(), true);
		});

		let receipt = monitor.wait_for_receipt(&hash()).await.unwrap();
		assert!(receipt.success);
		assert!(chain.receipt_calls() >= 4);
	}

	#[tokio::test(start_paused = true)]
	async fn test_reverted_receipt() {
		let (chain, monitor) = setup();
		chain.mine(hash(), false);
		assert_eq!(
			monitor.wait_for_receipt(&hash()).await,
			Err(ErrorKind::RevertedOnChain)
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_times_out_as_network_error() {
		let (chain, monitor) = setup();
		let started = tokio::time::Instant::now();
		let result = monitor.wait_for_receipt(&hash()).await;
		assert!(matches!(result, Err(ErrorKind::NetworkError(_))));
		assert!(started.elapsed() >= Duration::from_secs(600));
		assert!(chain.receipt_calls() >= 200);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stalled_lookup_is_bounded_by_timeout() {
		let (chain, monitor) = setup();
		chain.set_latency(Duration::from_secs(86_400));
		chain.mine(hash(), true);
		let started = tokio::time::Instant::now();

		let result = monitor.wait_for_receipt(&hash()).await;
		assert!(matches!(result, Err(ErrorKind::NetworkError(msg)) if msg.contains("600 seconds")));
		assert!(started.elapsed() >= Duration::from_secs(600));
		assert!(started.elapsed() < Duration::from_secs(700));
		assert_eq!(chain.receipt_calls(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_transient_poll_errors_are_tolerated() {
		let (chain, monitor) = setup();
		chain.fail_receipt_polls(4);
		chain.mine(hash(), true);
		assert!(monitor.wait_for_receipt(&hash()).await.is_ok());
		assert_eq!(chain.receipt_calls(), 5);
	}

	#[tokio::test(start_paused = true)]
	async fn test_repeated_poll_errors_give_up() {
		let (chain, monitor) = setup();
		chain.fail_receipt_polls(5);
		chain.mine(hash(), true);
		let result = monitor.wait_for_receipt(&hash()).await;
		assert!(matches!(result, Err(ErrorKind::NetworkError(msg)) if msg.contains("connection reset")));
		assert_eq!(chain.receipt_calls(), 5);
	}
}
