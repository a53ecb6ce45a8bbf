//! Shared wallet state.
//!
//! One writer, many readers. The writer half stays inside this crate and is
//! owned by the account observer; everyone else gets a [`WalletView`].

use arc_swap::ArcSwap;
use dapp_types::{current_timestamp, Address, WalletSnapshot};
use std::sync::Arc;

/// Writer half of the shared wallet state.
pub(crate) struct WalletState {
	cell: Arc<ArcSwap<WalletSnapshot>>,
}

impl WalletState {
	pub(crate) fn new() -> Self {
		Self {
			cell: Arc::new(ArcSwap::from_pointee(WalletSnapshot::default())),
		}
	}

	pub(crate) fn view(&self) -> WalletView {
		WalletView {
			cell: self.cell.clone(),
		}
	}

	/// Replaces the account and returns the previous snapshot.
	///
	/// Reconnecting the same account keeps its original `connected_at`.
	pub(crate) fn set_account(&self, account: Option<Address>) -> WalletSnapshot {
		let previous = **self.cell.load();
		let next = match account {
			None => WalletSnapshot::default(),
			Some(address) if previous.account == Some(address) => previous,
			Some(address) => WalletSnapshot {
				account: Some(address),
				connected_at: Some(current_timestamp()),
			},
		};
		self.cell.store(Arc::new(next));
		previous
	}
}

/// Read-only handle to the shared wallet state.
///
/// Every read is a point-in-time snapshot; an operation should read once and
/// carry the account it saw rather than re-reading mid-flight.
#[derive(Clone)]
pub struct WalletView {
	cell: Arc<ArcSwap<WalletSnapshot>>,
}

impl WalletView {
	pub fn snapshot(&self) -> WalletSnapshot {
		**self.cell.load()
	}

	pub fn account(&self) -> Option<Address> {
		self.snapshot().account
	}

	pub fn is_connected(&self) -> bool {
		self.snapshot().is_connected()
	}
}

impl std::fmt::Debug for WalletView {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("WalletView").field(&self.snapshot()).finish()
	}
}
