//! Wallet module for the on-chain action coordinator.
//!
//! A wallet provider knows which account is connected, tells subscribers when
//! that changes and signs transactions on the user's behalf. The account
//! observer bridges provider notifications into one shared wallet state that
//! every other component reads through a [`WalletView`].

use async_trait::async_trait;
use dapp_chain::ChainError;
use dapp_types::{Address, ContractCall, ErrorKind, TransactionHash};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

mod observer;
mod state;

pub use observer::{AccountObserver, StopHandle};
pub use state::WalletView;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during wallet operations.
#[derive(Debug, Clone, Error)]
pub enum WalletError {
	/// The user or the wallet declined to sign.
	#[error("Rejected: {0}")]
	Rejected(String),
	/// The wallet could not reach the network.
	#[error("Network error: {0}")]
	Network(String),
	/// Registering for account changes failed.
	#[error("Subscription failed: {0}")]
	Subscription(String),
	/// No account is connected.
	#[error("Wallet not connected")]
	NotConnected,
}

impl From<WalletError> for ErrorKind {
	fn from(err: WalletError) -> Self {
		match err {
			WalletError::Rejected(msg) => ErrorKind::Rejected(msg),
			WalletError::Network(msg) => ErrorKind::NetworkError(msg),
			WalletError::Subscription(msg) => ErrorKind::Unknown(msg),
			WalletError::NotConnected => ErrorKind::NotConnected,
		}
	}
}

impl From<ChainError> for WalletError {
	fn from(err: ChainError) -> Self {
		match err {
			ChainError::Rejected(msg) | ChainError::Reverted(msg) => WalletError::Rejected(msg),
			ChainError::Network(msg) | ChainError::Decode(msg) => WalletError::Network(msg),
		}
	}
}

/// Callback invoked with the new account, `None` on disconnect.
pub type AccountCallback = Arc<dyn Fn(Option<Address>) + Send + Sync>;

/// Deregisters an account-change subscription when called.
pub struct Unsubscribe(Box<dyn FnOnce() + Send + Sync>);

impl Unsubscribe {
	pub fn new<F>(f: F) -> Self
	where
		F: FnOnce() + Send + Sync + 'static,
	{
		Self(Box::new(f))
	}

	pub fn unsubscribe(self) {
		(self.0)()
	}
}

impl fmt::Debug for Unsubscribe {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Unsubscribe")
	}
}

/// Trait defining the interface for wallet providers.
#[async_trait]
pub trait WalletProvider: Send + Sync {
	/// Currently connected account, if any.
	fn current_account(&self) -> Option<Address>;

	/// Registers `callback` for account changes.
	///
	/// The callback runs on the provider's notification path and must not
	/// block.
	fn on_account_change(&self, callback: AccountCallback) -> Result<Unsubscribe, WalletError>;

	/// Asks the wallet to sign and broadcast `call` from `from`.
	async fn send_transaction(
		&self,
		call: &ContractCall,
		from: Address,
	) -> Result<TransactionHash, WalletError>;
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicBool, Ordering};

	#[test]
	fn test_unsubscribe_runs_once() {
		let called = Arc::new(AtomicBool::new(false));
		let flag = called.clone();
		let handle = Unsubscribe::new(move || flag.store(true, Ordering::SeqCst));
		handle.unsubscribe();
		assert!(called.load(Ordering::SeqCst));
	}

	#[test]
	fn test_chain_errors_map_to_wallet_errors() {
		assert!(matches!(
			WalletError::from(ChainError::Reverted("insufficient funds".into())),
			WalletError::Rejected(msg) if msg == "insufficient funds"
		));
		assert!(matches!(
			WalletError::from(ChainError::Network("timeout".into())),
			WalletError::Network(_)
		));
		assert_eq!(ErrorKind::from(WalletError::NotConnected), ErrorKind::NotConnected);
	}
}
