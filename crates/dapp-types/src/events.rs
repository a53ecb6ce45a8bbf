//! Event types for components reacting to each other.
//!
//! Events flow through broadcast buses. Publishing never fails the publisher:
//! with no subscribers an event is simply dropped.

use crate::{ActionId, Address, ErrorKind, TransactionHash, TransactionReceipt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle events of pending actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionEvent {
	/// The wallet accepted the call.
	Submitted {
		action_id: ActionId,
		tx_hash: TransactionHash,
	},
	/// The transaction was mined successfully.
	Confirmed {
		action_id: ActionId,
		receipt: TransactionReceipt,
	},
	/// The action ended without success.
	Failed {
		action_id: ActionId,
		tx_hash: Option<TransactionHash>,
		error: ErrorKind,
	},
	/// The caller stopped observing the action.
	Abandoned {
		action_id: ActionId,
		tx_hash: Option<TransactionHash>,
	},
}

/// Wallet connection events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletEvent {
	AccountChanged {
		previous: Option<Address>,
		current: Option<Address>,
	},
}

/// Broadcast bus for one event type.
#[derive(Debug)]
pub struct EventBus<E> {
	sender: broadcast::Sender<E>,
}

impl<E> Clone for EventBus<E> {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

impl<E: Clone> EventBus<E> {
	/// Creates a bus keeping up to `capacity` events for slow subscribers.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<E> {
		self.sender.subscribe()
	}

	/// Sends `event` to current subscribers. Errors only when there are none.
	pub fn publish(&self, event: E) -> Result<usize, broadcast::error::SendError<E>> {
		self.sender.send(event)
	}
}
