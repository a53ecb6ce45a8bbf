//! Periodic batch refresh.

use crate::MulticallReader;
use dapp_types::{current_timestamp, ReadOutcome, ReadSpec};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Last good answer of a watched batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSnapshot {
	pub outcomes: Vec<ReadOutcome>,
	/// Unix timestamp of the refresh that produced these outcomes.
	pub fetched_at: u64,
}

/// Handle to a periodically refreshed batch.
///
/// Refreshing stops when the subscription is stopped or dropped.
pub struct BatchSubscription {
	latest: watch::Receiver<Option<BatchSnapshot>>,
	task: JoinHandle<()>,
}

impl BatchSubscription {
	pub(crate) fn spawn<F>(reader: Arc<MulticallReader>, build: F, every: Duration) -> Self
	where
		F: Fn() -> Option<Vec<ReadSpec>> + Send + Sync + 'static,
	{
		let (tx, latest) = watch::channel(None);
		let task = tokio::spawn(refresh_loop(reader, build, every, tx));
		Self { latest, task }
	}

	/// Most recent good batch, `None` until the first one lands.
	pub fn latest(&self) -> Option<BatchSnapshot> {
		self.latest.borrow().clone()
	}

	/// Waits for the next good batch.
	pub async fn changed(&mut self) -> Option<BatchSnapshot> {
		self.latest.changed().await.ok()?;
		self.latest.borrow_and_update().clone()
	}

	pub fn stop(&self) {
		self.task.abort();
	}
}

impl Drop for BatchSubscription {
	fn drop(&mut self) {
		self.task.abort();
	}
}

#[instrument(skip_all, fields(interval_secs = every.as_secs()))]
async fn refresh_loop<F>(
	reader: Arc<MulticallReader>,
	build: F,
	every: Duration,
	tx: watch::Sender<Option<BatchSnapshot>>,
) where
	F: Fn() -> Option<Vec<ReadSpec>> + Send + Sync + 'static,
{
	let mut interval = tokio::time::interval(every);
	interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

	loop {
		interval.tick().await;

		let reads = match build() {
			Some(reads) if !reads.is_empty() => reads,
			_ => {
				tracing::trace!("Batch prerequisites not ready, skipping refresh");
				continue;
			},
		};

		let answer = reader.fetch(&reads).await;
		if !answer.complete {
			tracing::debug!("Keeping last good batch after failed refresh");
			continue;
		}

		tx.send_replace(Some(BatchSnapshot {
			outcomes: answer.outcomes,
			fetched_at: current_timestamp(),
		}));
	}
}
