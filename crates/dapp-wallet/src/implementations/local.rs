//! Local wallet implementation.
//!
//! Holds the connected account in process and signs through the chain client,
//! which carries the private key. Connection changes are driven explicitly
//! with `connect` and `disconnect` and fanned out to every subscriber.

use crate::{AccountCallback, Unsubscribe, WalletError, WalletProvider};
use async_trait::async_trait;
use dapp_chain::ChainClient;
use dapp_types::{Address, ContractCall, TransactionHash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type Subscribers = Arc<Mutex<Vec<(u64, AccountCallback)>>>;

/// Wallet backed by a locally configured account.
pub struct LocalWallet {
	chain: Arc<ChainClient>,
	account: Mutex<Option<Address>>,
	subscribers: Subscribers,
	next_id: AtomicU64,
}

impl LocalWallet {
	pub fn new(chain: Arc<ChainClient>) -> Self {
		Self {
			chain,
			account: Mutex::new(None),
			subscribers: Arc::new(Mutex::new(Vec::new())),
			next_id: AtomicU64::new(0),
		}
	}

	/// Connects `account` and notifies subscribers.
	pub fn connect(&self, account: Address) {
		self.set_account(Some(account));
	}

	/// Disconnects and notifies subscribers.
	pub fn disconnect(&self) {
		self.set_account(None);
	}

	pub fn subscriber_count(&self) -> usize {
		self.subscribers
			.lock()
			.map(|subscribers| subscribers.len())
			.unwrap_or(0)
	}

	fn set_account(&self, account: Option<Address>) {
		*self.account.lock().unwrap_or_else(|e| e.into_inner()) = account;
		// Callbacks run outside the lock so they may subscribe or unsubscribe.
		let callbacks: Vec<AccountCallback> = self
			.subscribers
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.iter()
			.map(|(_, callback)| callback.clone())
			.collect();
		for callback in callbacks {
			callback(account);
		}
	}
}

#[async_trait]
impl WalletProvider for LocalWallet {
	fn current_account(&self) -> Option<Address> {
		*self.account.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn on_account_change(&self, callback: AccountCallback) -> Result<Unsubscribe, WalletError> {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		self.subscribers
			.lock()
			.map_err(|e| WalletError::Subscription(e.to_string()))?
			.push((id, callback));

		let subscribers = self.subscribers.clone();
		Ok(Unsubscribe::new(move || {
			subscribers
				.lock()
				.unwrap_or_else(|e| e.into_inner())
				.retain(|(entry, _)| *entry != id);
		}))
	}

	async fn send_transaction(
		&self,
		call: &ContractCall,
		from: Address,
	) -> Result<TransactionHash, WalletError> {
		match self.current_account() {
			None => Err(WalletError::NotConnected),
			Some(account) if account != from => Err(WalletError::Rejected(format!(
				"Connected account {} does not match sender {}",
				account, from
			))),
			Some(_) => Ok(self.chain.submit(call, from).await?),
		}
	}
}
