//! Batched read module for the on-chain action coordinator.
//!
//! Fetches many independent read-only values in as few round trips as
//! possible. Answers are positionally aligned with the request and every entry
//! succeeds or fails on its own, so one reverting read never hides the others.

use dapp_chain::ChainClient;
use dapp_config::MulticallConfig;
use dapp_types::{Address, ErrorKind, ReadOutcome, ReadSpec};
use dapp_wallet::WalletView;
use std::sync::Arc;

mod watch;

pub use watch::{BatchSnapshot, BatchSubscription};

/// Answers of one batch plus whether every round trip reached the node.
pub(crate) struct BatchAnswer {
	pub outcomes: Vec<ReadOutcome>,
	pub complete: bool,
}

/// Aggregates read-only contract queries into batched round trips.
pub struct MulticallReader {
	chain: Arc<ChainClient>,
	config: MulticallConfig,
}

impl MulticallReader {
	pub fn new(chain: Arc<ChainClient>, config: MulticallConfig) -> Self {
		Self { chain, config }
	}

	/// Executes `reads` and returns one outcome per read, in request order.
	///
	/// Reads against the zero address resolve to [`ErrorKind::Unavailable`]
	/// without being sent. An empty request makes no network call. When a
	/// round trip fails as a whole, each read it carried reports that error.
	pub async fn batch(&self, reads: &[ReadSpec]) -> Vec<ReadOutcome> {
		self.fetch(reads).await.outcomes
	}

	pub(crate) async fn fetch(&self, reads: &[ReadSpec]) -> BatchAnswer {
		let mut outcomes: Vec<ReadOutcome> = vec![Err(ErrorKind::Unavailable); reads.len()];
		let mut complete = true;

		let pending: Vec<usize> = reads
			.iter()
			.enumerate()
			.filter(|(_, spec)| !spec.is_unavailable())
			.map(|(index, _)| index)
			.collect();

		for chunk in pending.chunks(self.config.max_batch_size.max(1)) {
			let specs: Vec<ReadSpec> = chunk.iter().map(|&index| reads[index].clone()).collect();
			match self.chain.read_batch(&specs).await {
				Ok(results) => {
					for (&index, result) in chunk.iter().zip(results) {
						outcomes[index] = result.map_err(ErrorKind::from);
					}
				},
				Err(e) => {
					tracing::warn!(reads = specs.len(), error = %e, "Batch read failed");
					complete = false;
					let kind = ErrorKind::from(e);
					for &index in chunk {
						outcomes[index] = Err(kind.clone());
					}
				},
			}
		}

		BatchAnswer { outcomes, complete }
	}

	/// Reads `balanceOf(account)` on every token for the connected account.
	///
	/// Returns an empty list without touching the network while disconnected.
	pub async fn balances(&self, view: &WalletView, tokens: &[Address]) -> Vec<ReadOutcome> {
		match view.account() {
			Some(owner) => self.batch(&balance_reads(tokens, owner)).await,
			None => Vec::new(),
		}
	}

	/// Re-runs the batch built by `build` every refresh interval.
	///
	/// `build` returns `None` while its prerequisites are missing; such ticks
	/// are skipped. The subscription keeps the last batch whose round trips all
	/// reached the node.
	pub fn watch<F>(self: &Arc<Self>, build: F) -> BatchSubscription
	where
		F: Fn() -> Option<Vec<ReadSpec>> + Send + Sync + 'static,
	{
		BatchSubscription::spawn(self.clone(), build, self.config.refresh_interval())
	}

	/// Watches the connected account's balance of every token.
	pub fn watch_balances(self: &Arc<Self>, view: WalletView, tokens: Vec<Address>) -> BatchSubscription {
		self.watch(move || view.account().map(|owner| balance_reads(&tokens, owner)))
	}
}

fn balance_reads(tokens: &[Address], owner: Address) -> Vec<ReadSpec> {
	tokens
		.iter()
		.map(|&token| ReadSpec::balance_of(token, owner))
		.collect()
}
