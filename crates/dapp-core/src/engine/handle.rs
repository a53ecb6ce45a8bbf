//! Caller-side handle of a pending action.

use crate::state::PendingAction;
use dapp_types::{ActionId, ErrorKind, TransactionReceipt};
use std::sync::Arc;
use tokio::sync::watch;

/// Follows one pending action.
///
/// Cloning gives another independent observer of the same action.
#[derive(Debug, Clone)]
pub struct PendingActionHandle {
	id: ActionId,
	state: watch::Receiver<PendingAction>,
	abandon: Arc<watch::Sender<bool>>,
}

impl PendingActionHandle {
	pub(crate) fn new(
		id: ActionId,
		state: watch::Receiver<PendingAction>,
		abandon: watch::Sender<bool>,
	) -> Self {
		Self {
			id,
			state,
			abandon: Arc::new(abandon),
		}
	}

	pub fn id(&self) -> ActionId {
		self.id
	}

	/// Snapshot of the action as it stands now.
	pub fn current(&self) -> PendingAction {
		self.state.borrow().clone()
	}

	/// Waits for the terminal state.
	///
	/// Returns the receipt on success and the categorized error otherwise. An
	/// abandoned action never reaches a terminal state and resolves to
	/// [`ErrorKind::Unknown`].
	pub async fn wait(&mut self) -> Result<TransactionReceipt, ErrorKind> {
		let outcome = match self.state.wait_for(|action| action.state.is_terminal()).await {
			Ok(action) => action.outcome(),
			Err(_) => None,
		};
		outcome.unwrap_or_else(|| Err(ErrorKind::Unknown("Observation abandoned".to_string())))
	}

	/// Stops observing the action locally.
	///
	/// The transaction, if already broadcast, is not affected and no outcome
	/// will be reported for this action.
	pub fn abandon(&self) {
		self.abandon.send_replace(true);
	}
}
