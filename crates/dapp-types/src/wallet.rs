//! Shared wallet state.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Point-in-time view of which account is connected.
///
/// Starts as `{ None, None }`. Only the account observer produces new
/// snapshots; everything else reads them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
	pub account: Option<Address>,
	/// Unix timestamp of the last connection, `None` while disconnected.
	pub connected_at: Option<u64>,
}

impl WalletSnapshot {
	pub fn is_connected(&self) -> bool {
		self.account.is_some()
	}
}
