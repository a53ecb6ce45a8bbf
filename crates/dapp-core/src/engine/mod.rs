//! Transaction coordinator.
//!
//! Drives each pending action from the wallet prompt to a terminal state in
//! its own task and reports the outcome exactly once. Callers hold a
//! [`PendingActionHandle`] to follow the action, wait for it or stop observing
//! it; dropping the handle leaves the action running to completion.

mod handle;

pub use handle::PendingActionHandle;

use crate::monitoring::ReceiptMonitor;
use crate::notify::{Notifier, NotifyKind, ReportLedger};
use crate::state::PendingAction;
use crate::CoordinatorError;
use dapp_chain::ChainClient;
use dapp_config::TransactionConfig;
use dapp_gas::{GasEstimator, QuoteRequest};
use dapp_types::{
	truncate_id, ActionEvent, ActionState, Address, ContractCall, ErrorKind, EventBus, GasQuote,
	TransactionHash, TransactionReceipt,
};
use dapp_wallet::{WalletProvider, WalletView};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

struct CoordinatorInner {
	wallet: Arc<dyn WalletProvider>,
	view: WalletView,
	monitor: ReceiptMonitor,
	notifier: Arc<dyn Notifier>,
	events: EventBus<ActionEvent>,
	ledger: ReportLedger,
}

/// Owns the submit, poll and report lifecycle of on-chain writes.
#[derive(Clone)]
pub struct TransactionCoordinator {
	inner: Arc<CoordinatorInner>,
}

impl TransactionCoordinator {
	pub fn new(
		wallet: Arc<dyn WalletProvider>,
		view: WalletView,
		chain: Arc<ChainClient>,
		notifier: Arc<dyn Notifier>,
		events: EventBus<ActionEvent>,
		config: &TransactionConfig,
	) -> Self {
		Self {
			inner: Arc::new(CoordinatorInner {
				wallet,
				view,
				monitor: ReceiptMonitor::new(chain, config),
				notifier,
				events,
				ledger: ReportLedger::new(config.success_memory),
			}),
		}
	}

	/// Quotes `request` for the connected account.
	pub async fn preflight(&self, estimator: &GasEstimator, request: &QuoteRequest) -> GasQuote {
		estimator.quote(request, self.inner.view.account()).await
	}

	/// Starts a new pending action for `call`.
	///
	/// Fails with [`CoordinatorError::NotConnected`] before anything is sent
	/// when no account is connected. The account is read once; a later
	/// account change does not affect this action.
	pub fn submit(&self, call: ContractCall) -> Result<PendingActionHandle, CoordinatorError> {
		let account = self
			.inner
			.view
			.account()
			.ok_or(CoordinatorError::NotConnected)?;

		let action = PendingAction::new(call);
		tracing::info!(
			action_id = %truncate_id(&action.id.to_string()),
			method = action.call.method_name(),
			"Submitting action"
		);
		let (state_tx, state_rx) = watch::channel(action.clone());
		let driver = drive_submission(self.inner.clone(), action, account, state_tx);
		Ok(self.spawn(state_rx, driver))
	}

	/// Follows an already submitted transaction until it is mined.
	///
	/// Outcomes are still reported at most once per transaction, so observing
	/// a hash again after it was reported stays silent.
	pub fn observe(&self, call: ContractCall, tx_hash: TransactionHash) -> PendingActionHandle {
		let mut action = PendingAction::new(call);
		if let Err(e) = action.mark_submitted(tx_hash) {
			tracing::error!(error = %e, "Unexpected state for observed action");
		}
		let (state_tx, state_rx) = watch::channel(action.clone());
		let driver = drive_confirmation(self.inner.clone(), action, state_tx);
		self.spawn(state_rx, driver)
	}

	/// Runs dependent calls one after another, stopping at the first failure.
	pub async fn submit_sequence(
		&self,
		calls: Vec<ContractCall>,
	) -> Result<Vec<TransactionReceipt>, CoordinatorError> {
		let mut receipts = Vec::with_capacity(calls.len());
		for call in calls {
			let mut handle = self.submit(call)?;
			let receipt = handle.wait().await.map_err(CoordinatorError::Failed)?;
			receipts.push(receipt);
		}
		Ok(receipts)
	}

	/// Runs `driver` in its own task, racing it against abandonment.
	fn spawn<Fut>(&self, state: watch::Receiver<PendingAction>, driver: Fut) -> PendingActionHandle
	where
		Fut: Future<Output = ()> + Send + 'static,
	{
		let (abandon_tx, mut abandon_rx) = watch::channel(false);
		let events = self.inner.events.clone();
		let observed = state.clone();
		let action_id = observed.borrow().id;

		tokio::spawn(async move {
			// Dropping the handle closes the channel, which is not abandonment.
			let abandoned = async move { abandon_rx.wait_for(|abandoned| *abandoned).await.is_ok() };
			tokio::select! {
				_ = driver => {},
				true = abandoned => {
					let tx_hash = observed.borrow().tx_hash;
					tracing::info!(
						action_id = %truncate_id(&action_id.to_string()),
						"Stopped observing action"
					);
					events
						.publish(ActionEvent::Abandoned { action_id, tx_hash })
						.ok();
				}
			}
		});

		PendingActionHandle::new(action_id, state, abandon_tx)
	}
}

fn publish_state(state: &watch::Sender<PendingAction>, action: &PendingAction) {
	state.send_replace(action.clone());
}

async fn drive_submission(
	inner: Arc<CoordinatorInner>,
	mut action: PendingAction,
	account: Address,
	state: watch::Sender<PendingAction>,
) {
	match inner.wallet.send_transaction(&action.call, account).await {
		Ok(tx_hash) => {
			if let Err(e) = action.mark_submitted(tx_hash) {
				tracing::error!(error = %e, "Invalid action transition");
				return;
			}
			publish_state(&state, &action);
			inner
				.events
				.publish(ActionEvent::Submitted {
					action_id: action.id,
					tx_hash,
				})
				.ok();
			drive_confirmation(inner, action, state).await;
		},
		Err(e) => {
			let error = ErrorKind::from(e);
			tracing::warn!(
				action_id = %truncate_id(&action.id.to_string()),
				error = %error,
				"Wallet declined action"
			);
			finish(&inner, &mut action, &state, Err(error));
		},
	}
}

async fn drive_confirmation(
	inner: Arc<CoordinatorInner>,
	mut action: PendingAction,
	state: watch::Sender<PendingAction>,
) {
	let Some(tx_hash) = action.tx_hash else {
		tracing::error!("Cannot confirm an action without a transaction hash");
		return;
	};
	if let Err(e) = action.transition(ActionState::Confirming) {
		tracing::error!(error = %e, "Invalid action transition");
		return;
	}
	publish_state(&state, &action);

	let outcome = inner.monitor.wait_for_receipt(&tx_hash).await;
	finish(&inner, &mut action, &state, outcome);
}

/// Moves the action to its terminal state and reports the outcome.
fn finish(
	inner: &CoordinatorInner,
	action: &mut PendingAction,
	state: &watch::Sender<PendingAction>,
	outcome: Result<TransactionReceipt, ErrorKind>,
) {
	let transition = match &outcome {
		Ok(receipt) => action.mark_succeeded(receipt.clone()),
		Err(error) => action.mark_failed(error.clone()),
	};
	if let Err(e) = transition {
		tracing::error!(error = %e, "Invalid action transition");
		return;
	}

	// Outcomes of a hash are reported once, however many times it is observed.
	let first = action
		.tx_hash
		.map(|hash| inner.ledger.first_report(&hash))
		.unwrap_or(true);

	match outcome {
		Ok(receipt) => {
			if first {
				inner.notifier.notify(
					NotifyKind::Success,
					"Transaction confirmed",
					&format!(
						"Transaction {} confirmed in block {}",
						receipt.hash, receipt.block_number
					),
				);
			}
			inner
				.events
				.publish(ActionEvent::Confirmed {
					action_id: action.id,
					receipt,
				})
				.ok();
		},
		Err(error) => {
			tracing::warn!(
				action_id = %truncate_id(&action.id.to_string()),
				error = %error,
				retryable = error.is_retryable(),
				"Action failed"
			);
			if first {
				let (title, detail) = failure_message(&error, action.tx_hash);
				inner.notifier.notify(NotifyKind::Error, title, &detail);
			}
			inner
				.events
				.publish(ActionEvent::Failed {
					action_id: action.id,
					tx_hash: action.tx_hash,
					error,
				})
				.ok();
		},
	}

	// Terminal state is published only after the outcome was reported.
	publish_state(state, action);
}

fn failure_message(error: &ErrorKind, tx_hash: Option<TransactionHash>) -> (&'static str, String) {
	let subject = tx_hash
		.map(|hash| format!("Transaction {}", hash))
		.unwrap_or_else(|| "Transaction".to_string());
	if error.is_retryable() {
		return (
			"Transaction status unknown",
			format!("{} could not be confirmed: {}", subject, error),
		);
	}
	match error {
		ErrorKind::Rejected(message) => ("Transaction rejected", message.clone()),
		ErrorKind::RevertedOnChain => ("Transaction failed", format!("{} reverted on chain", subject)),
		ErrorKind::NotConnected => ("Transaction failed", "Wallet not connected".to_string()),
		other => ("Transaction failed", other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dapp_chain::implementations::memory::InMemoryChain;
	use dapp_config::GasConfig;
	use dapp_types::{QuoteSource, WalletEvent, U256};
	use dapp_wallet::implementations::local::LocalWallet;
	use dapp_wallet::AccountObserver;
	use std::sync::Mutex;
	use std::time::Duration;
	use tokio::sync::broadcast;

	#[derive(Default)]
	struct RecordingNotifier {
		messages: Mutex<Vec<(NotifyKind, String, String)>>,
	}

	impl RecordingNotifier {
		fn messages(&self) -> Vec<(NotifyKind, String, String)> {
			self.messages.lock().unwrap().clone()
		}
	}

	impl Notifier for RecordingNotifier {
		fn notify(&self, kind: NotifyKind, title: &str, detail: &str) {
			self.messages
				.lock()
				.unwrap()
				.push((kind, title.to_string(), detail.to_string()));
		}
	}

	struct Harness {
		chain: Arc<InMemoryChain>,
		client: Arc<ChainClient>,
		wallet: Arc<LocalWallet>,
		notifier: Arc<RecordingNotifier>,
		events: EventBus<ActionEvent>,
		coordinator: TransactionCoordinator,
	}

	fn account() -> Address {
		Address::repeat_byte(0xaa)
	}

	fn buy_call() -> ContractCall {
		ContractCall::new(Address::repeat_byte(0x33), "buyBlindBox()").with_value(U256::from(10u64))
	}

	fn setup(connected: bool) -> Harness {
		let chain = Arc::new(InMemoryChain::new());
		let client = Arc::new(ChainClient::new(Box::new(chain.clone())));
		let wallet = Arc::new(LocalWallet::new(client.clone()));
		if connected {
			wallet.connect(account());
		}
		let observer = AccountObserver::new(EventBus::<WalletEvent>::new(16));
		observer.start(wallet.as_ref()).unwrap();

		let notifier = Arc::new(RecordingNotifier::default());
		let events = EventBus::new(64);
		let coordinator = TransactionCoordinator::new(
			wallet.clone(),
			observer.view(),
			client.clone(),
			notifier.clone(),
			events.clone(),
			&TransactionConfig::default(),
		);
		Harness {
			chain,
			client,
			wallet,
			notifier,
			events,
			coordinator,
		}
	}

	async fn next_submitted(events: &mut broadcast::Receiver<ActionEvent>) -> TransactionHash {
		loop {
			if let ActionEvent::Submitted { tx_hash, .. } = events.recv().await.unwrap() {
				return tx_hash;
			}
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_submit_without_account_sends_nothing() {
		let h = setup(false);
		let result = h.coordinator.submit(buy_call());
		assert!(matches!(result, Err(CoordinatorError::NotConnected)));
		assert_eq!(h.chain.submit_calls(), 0);
		assert!(h.notifier.messages().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_success_is_reported_once() {
		let h = setup(true);
		let mut events = h.events.subscribe();
		let mut handle = h.coordinator.submit(buy_call()).unwrap();

		let tx_hash = next_submitted(&mut events).await;
		h.chain.mine(tx_hash, true);
		let receipt = handle.wait().await.unwrap();
		assert_eq!(receipt.hash, tx_hash);
		assert_eq!(handle.current().state, ActionState::Succeeded);

		// Observing the same transaction again stays silent.
		let mut again = h.coordinator.observe(buy_call(), tx_hash);
		assert!(again.wait().await.is_ok());

		let messages = h.notifier.messages();
		assert_eq!(messages.len(), 1);
		assert_eq!(messages[0].0, NotifyKind::Success);
		assert_eq!(messages[0].1, "Transaction confirmed");
	}

	#[tokio::test(start_paused = true)]
	async fn test_wallet_rejection_fails_without_hash() {
		let h = setup(true);
		h.chain.reject_submissions(Some("User denied transaction signature"));
		let mut handle = h.coordinator.submit(buy_call()).unwrap();

		let result = handle.wait().await;
		assert_eq!(
			result,
			Err(ErrorKind::Rejected("User denied transaction signature".into()))
		);
		assert!(handle.current().tx_hash.is_none());
		assert_eq!(h.chain.receipt_calls(), 0);

		let messages = h.notifier.messages();
		assert_eq!(messages.len(), 1);
		assert_eq!(messages[0].0, NotifyKind::Error);
		assert_eq!(messages[0].1, "Transaction rejected");
		assert_eq!(messages[0].2, "User denied transaction signature");
	}

	#[tokio::test(start_paused = true)]
	async fn test_reverted_transaction_fails() {
		let h = setup(true);
		let mut events = h.events.subscribe();
		let mut handle = h.coordinator.submit(buy_call()).unwrap();

		let tx_hash = next_submitted(&mut events).await;
		h.chain.mine(tx_hash, false);
		assert_eq!(handle.wait().await, Err(ErrorKind::RevertedOnChain));

		let messages = h.notifier.messages();
		assert_eq!(messages.len(), 1);
		assert_eq!(messages[0].1, "Transaction failed");
		assert!(messages[0].2.contains("reverted on chain"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_missing_receipt_times_out() {
		let h = setup(true);
		let mut handle = h.coordinator.submit(buy_call()).unwrap();
		let started = tokio::time::Instant::now();

		let result = handle.wait().await;
		assert!(matches!(result, Err(ErrorKind::NetworkError(_))));
		assert!(started.elapsed() >= Duration::from_secs(600));

		let messages = h.notifier.messages();
		assert_eq!(messages.len(), 1);
		assert_eq!(messages[0].1, "Transaction status unknown");
		assert!(messages[0].2.contains("600 seconds"));
	}

	#[test]
	fn test_failure_titles_follow_error_kind() {
		let hash = Some(TransactionHash::from(dapp_types::B256::repeat_byte(7)));
		let (title, _) = failure_message(&ErrorKind::NetworkError("timeout".into()), hash);
		assert_eq!(title, "Transaction status unknown");
		let (title, detail) = failure_message(&ErrorKind::Rejected("User denied".into()), None);
		assert_eq!(title, "Transaction rejected");
		assert_eq!(detail, "User denied");
		let (title, detail) = failure_message(&ErrorKind::RevertedOnChain, hash);
		assert_eq!(title, "Transaction failed");
		assert!(detail.ends_with("reverted on chain"));
		let (title, _) = failure_message(&ErrorKind::EstimationUnavailable, None);
		assert_eq!(title, "Transaction failed");
	}

	#[tokio::test(start_paused = true)]
	async fn test_abandoned_action_reports_nothing() {
		let h = setup(true);
		let mut events = h.events.subscribe();
		let mut handle = h.coordinator.submit(buy_call()).unwrap();
		let tx_hash = next_submitted(&mut events).await;

		handle.abandon();
		loop {
			if let ActionEvent::Abandoned {
				tx_hash: abandoned, ..
			} = events.recv().await.unwrap()
			{
				assert_eq!(abandoned, Some(tx_hash));
				break;
			}
		}

		h.chain.mine(tx_hash, true);
		tokio::time::sleep(Duration::from_secs(30)).await;
		assert!(h.notifier.messages().is_empty());
		assert!(matches!(handle.wait().await, Err(ErrorKind::Unknown(_))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_dropped_handle_still_completes() {
		let h = setup(true);
		let mut events = h.events.subscribe();
		drop(h.coordinator.submit(buy_call()).unwrap());

		let tx_hash = next_submitted(&mut events).await;
		h.chain.mine(tx_hash, true);
		loop {
			if let ActionEvent::Confirmed { receipt, .. } = events.recv().await.unwrap() {
				assert_eq!(receipt.hash, tx_hash);
				break;
			}
		}
		assert_eq!(h.notifier.messages().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_account_change_does_not_affect_submitted_action() {
		let h = setup(true);
		let mut events = h.events.subscribe();
		let mut handle = h.coordinator.submit(buy_call()).unwrap();
		let tx_hash = next_submitted(&mut events).await;

		h.wallet.disconnect();
		h.chain.mine(tx_hash, true);
		assert!(handle.wait().await.is_ok());
		assert_eq!(h.chain.submissions()[0].1, account());
	}

	#[tokio::test(start_paused = true)]
	async fn test_independent_actions_resolve_separately() {
		let h = setup(true);
		let mut events = h.events.subscribe();
		let mut first = h.coordinator.submit(buy_call()).unwrap();
		let first_hash = next_submitted(&mut events).await;
		let mut second = h.coordinator.submit(buy_call()).unwrap();
		let second_hash = next_submitted(&mut events).await;
		assert_ne!(first_hash, second_hash);

		h.chain.mine(second_hash, true);
		h.chain.mine(first_hash, false);
		assert!(second.wait().await.is_ok());
		assert_eq!(first.wait().await, Err(ErrorKind::RevertedOnChain));
		assert_eq!(h.notifier.messages().len(), 2);
	}

	fn spawn_miner(h: &Harness, failing_index: Option<usize>) {
		let chain = h.chain.clone();
		let mut events = h.events.subscribe();
		tokio::spawn(async move {
			let mut index = 0;
			while let Ok(event) = events.recv().await {
				if let ActionEvent::Submitted { tx_hash, .. } = event {
					chain.mine(tx_hash, Some(index) != failing_index);
					index += 1;
				}
			}
		});
	}

	#[tokio::test(start_paused = true)]
	async fn test_sequence_runs_in_order() {
		let h = setup(true);
		spawn_miner(&h, None);
		let token = Address::repeat_byte(0x44);
		let calls = vec![
			ContractCall::erc20_approve(token, Address::repeat_byte(0x33), U256::from(20u64)),
			buy_call(),
		];

		let receipts = h.coordinator.submit_sequence(calls).await.unwrap();
		assert_eq!(receipts.len(), 2);
		let submissions = h.chain.submissions();
		assert_eq!(submissions[0].0.method_name(), "approve");
		assert_eq!(submissions[1].0.method_name(), "buyBlindBox");
	}

	#[tokio::test(start_paused = true)]
	async fn test_sequence_stops_at_first_failure() {
		let h = setup(true);
		spawn_miner(&h, Some(0));
		let calls = vec![buy_call(), buy_call(), buy_call()];

		let result = h.coordinator.submit_sequence(calls).await;
		assert_eq!(
			result,
			Err(CoordinatorError::Failed(ErrorKind::RevertedOnChain))
		);
		assert_eq!(h.chain.submit_calls(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_preflight_quotes_connected_account() {
		let h = setup(true);
		h.chain.set_gas_price(U256::from(1_000_000_000u64));
		h.chain.set_estimate(100_000);
		let estimator = GasEstimator::new(h.client.clone(), GasConfig::default());
		let request = QuoteRequest::for_payable(buy_call(), 1);

		let quote = h.coordinator.preflight(&estimator, &request).await;
		assert_eq!(quote.source, QuoteSource::Live);
		assert_eq!(quote.buffered_units, 120_000);

		h.wallet.disconnect();
		let quote = h.coordinator.preflight(&estimator, &request).await;
		assert!(!quote.is_ready());
	}
}
