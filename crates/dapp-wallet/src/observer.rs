//! Account observer.
//!
//! Subscribes to the wallet provider's account-change notifications for the
//! lifetime of the process and republishes every change into the shared
//! wallet state. It is the only writer of that state.

use crate::state::WalletState;
use crate::{AccountCallback, Unsubscribe, WalletError, WalletProvider, WalletView};
use dapp_types::{truncate_id, Address, EventBus, WalletEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Bridges wallet-provider notifications into the shared wallet state.
pub struct AccountObserver {
	state: Arc<WalletState>,
	events: EventBus<WalletEvent>,
	started: AtomicBool,
}

impl AccountObserver {
	pub fn new(events: EventBus<WalletEvent>) -> Self {
		Self {
			state: Arc::new(WalletState::new()),
			events,
			started: AtomicBool::new(false),
		}
	}

	/// Read-only handle to the state this observer writes.
	pub fn view(&self) -> WalletView {
		self.state.view()
	}

	/// Registers one subscription with `provider`.
	///
	/// The provider's current account is applied first so the shared state
	/// does not wait for the next change. Starting twice registers a second
	/// subscription that delivers duplicate updates.
	pub fn start(&self, provider: &dyn WalletProvider) -> Result<StopHandle, WalletError> {
		if self.started.swap(true, Ordering::SeqCst) {
			tracing::warn!("Account observer started more than once");
		}

		let state = self.state.clone();
		let events = self.events.clone();
		let callback: AccountCallback =
			Arc::new(move |account| apply_account(&state, &events, account));

		let unsubscribe = match provider.on_account_change(callback) {
			Ok(unsubscribe) => unsubscribe,
			Err(e) => {
				self.started.store(false, Ordering::SeqCst);
				tracing::error!(error = %e, "Failed to subscribe to account changes");
				return Err(e);
			},
		};

		if let Some(account) = provider.current_account() {
			apply_account(&self.state, &self.events, Some(account));
		}

		tracing::info!("Account observer started");
		Ok(StopHandle {
			unsubscribe: Mutex::new(Some(unsubscribe)),
		})
	}
}

fn apply_account(state: &WalletState, events: &EventBus<WalletEvent>, account: Option<Address>) {
	let previous = state.set_account(account);
	if previous.account == account {
		return;
	}

	match account {
		Some(address) => {
			tracing::info!(account = %truncate_id(&address.to_string()), "Wallet connected")
		},
		None => tracing::info!("Wallet disconnected"),
	}

	events
		.publish(WalletEvent::AccountChanged {
			previous: previous.account,
			current: account,
		})
		.ok();
}

/// Deregisters the observer's subscription.
///
/// Dropping the handle leaves the subscription in place for the rest of the
/// process.
#[derive(Debug)]
pub struct StopHandle {
	unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl StopHandle {
	/// Deregisters the subscription. Later calls do nothing.
	pub fn stop(&self) {
		let unsubscribe = self
			.unsubscribe
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.take();
		if let Some(unsubscribe) = unsubscribe {
			unsubscribe.unsubscribe();
			tracing::info!("Account observer stopped");
		}
	}

	pub fn is_stopped(&self) -> bool {
		self.unsubscribe
			.lock()
			.map(|guard| guard.is_none())
			.unwrap_or(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::local::LocalWallet;
	use async_trait::async_trait;
	use dapp_chain::{implementations::memory::InMemoryChain, ChainClient};
	use dapp_types::{ContractCall, TransactionHash};

	fn wallet() -> LocalWallet {
		LocalWallet::new(Arc::new(ChainClient::new(Box::new(InMemoryChain::new()))))
	}

	#[test]
	fn test_account_sequence_is_mirrored() {
		let provider = wallet();
		let observer = AccountObserver::new(EventBus::new(16));
		let view = observer.view();
		let _stop = observer.start(&provider).unwrap();

		let addr1 = Address::repeat_byte(1);
		let addr2 = Address::repeat_byte(2);
		let mut seen = Vec::new();
		for event in [Some(addr1), None, Some(addr2)] {
			match event {
				Some(addr) => provider.connect(addr),
				None => provider.disconnect(),
			}
			seen.push(view.account());
		}

		assert_eq!(seen, vec![Some(addr1), None, Some(addr2)]);
	}

	#[test]
	fn test_disconnect_clears_timestamp() {
		let provider = wallet();
		let observer = AccountObserver::new(EventBus::new(16));
		let _stop = observer.start(&provider).unwrap();

		provider.connect(Address::repeat_byte(1));
		assert!(observer.view().snapshot().connected_at.is_some());
		provider.disconnect();
		assert!(observer.view().snapshot().connected_at.is_none());
	}

	#[test]
	fn test_stop_twice_is_harmless() {
		let provider = wallet();
		let observer = AccountObserver::new(EventBus::new(16));
		let stop = observer.start(&provider).unwrap();
		assert_eq!(provider.subscriber_count(), 1);

		stop.stop();
		stop.stop();
		assert!(stop.is_stopped());
		assert_eq!(provider.subscriber_count(), 0);

		provider.connect(Address::repeat_byte(3));
		assert_eq!(observer.view().account(), None);
	}

	#[test]
	fn test_start_applies_current_account() {
		let provider = wallet();
		let addr = Address::repeat_byte(7);
		provider.connect(addr);

		let observer = AccountObserver::new(EventBus::new(16));
		let _stop = observer.start(&provider).unwrap();
		assert_eq!(observer.view().account(), Some(addr));
	}

	#[tokio::test]
	async fn test_changes_are_published() {
		let provider = wallet();
		let events = EventBus::new(16);
		let mut rx = events.subscribe();
		let observer = AccountObserver::new(events);
		let _stop = observer.start(&provider).unwrap();

		let addr = Address::repeat_byte(1);
		provider.connect(addr);
		provider.connect(addr);
		provider.disconnect();

		assert_eq!(
			rx.recv().await.unwrap(),
			WalletEvent::AccountChanged {
				previous: None,
				current: Some(addr)
			}
		);
		assert_eq!(
			rx.recv().await.unwrap(),
			WalletEvent::AccountChanged {
				previous: Some(addr),
				current: None
			}
		);
		assert!(rx.try_recv().is_err());
	}

	struct BrokenProvider;

	#[async_trait]
	impl WalletProvider for BrokenProvider {
		fn current_account(&self) -> Option<Address> {
			None
		}

		fn on_account_change(&self, _callback: AccountCallback) -> Result<Unsubscribe, WalletError> {
			Err(WalletError::Subscription("provider unavailable".into()))
		}

		async fn send_transaction(
			&self,
			_call: &ContractCall,
			_from: Address,
		) -> Result<TransactionHash, WalletError> {
			Err(WalletError::NotConnected)
		}
	}

	#[test]
	fn test_subscription_failure_surfaces_at_start() {
		let observer = AccountObserver::new(EventBus::new(16));
		let result = observer.start(&BrokenProvider);
		assert!(matches!(result, Err(WalletError::Subscription(_))));
	}
}
