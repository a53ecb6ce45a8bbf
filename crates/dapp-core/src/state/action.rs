//! Pending action record and its state machine.
//!
//! Actions only move forward: Building -> Submitted -> Confirming ->
//! Succeeded | Failed, with Building -> Failed when the wallet refuses to
//! sign. Terminal states have no successors.

use crate::CoordinatorError;
use dapp_types::{
	current_timestamp, ActionId, ActionState, ContractCall, ErrorKind, TransactionHash,
	TransactionReceipt,
};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// One user-triggered write and where it stands.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
	pub id: ActionId,
	pub call: ContractCall,
	/// Unix timestamp of when the action was created.
	pub submitted_at: u64,
	pub tx_hash: Option<TransactionHash>,
	pub state: ActionState,
	pub error: Option<ErrorKind>,
	pub receipt: Option<TransactionReceipt>,
}

impl PendingAction {
	pub fn new(call: ContractCall) -> Self {
		Self {
			id: ActionId::new(),
			call,
			submitted_at: current_timestamp(),
			tx_hash: None,
			state: ActionState::Building,
			error: None,
			receipt: None,
		}
	}

	/// Moves to `to`, rejecting transitions the lifecycle does not allow.
	pub fn transition(&mut self, to: ActionState) -> Result<(), CoordinatorError> {
		if !is_valid_transition(self.state, to) {
			return Err(CoordinatorError::InvalidTransition {
				from: self.state,
				to,
			});
		}
		self.state = to;
		Ok(())
	}

	/// Records the hash returned by the wallet and enters Submitted.
	pub fn mark_submitted(&mut self, hash: TransactionHash) -> Result<(), CoordinatorError> {
		self.transition(ActionState::Submitted)?;
		self.tx_hash = Some(hash);
		Ok(())
	}

	pub fn mark_succeeded(&mut self, receipt: TransactionReceipt) -> Result<(), CoordinatorError> {
		self.transition(ActionState::Succeeded)?;
		self.receipt = Some(receipt);
		Ok(())
	}

	pub fn mark_failed(&mut self, error: ErrorKind) -> Result<(), CoordinatorError> {
		self.transition(ActionState::Failed)?;
		self.error = Some(error);
		Ok(())
	}

	/// Terminal outcome, `None` while still in flight.
	pub fn outcome(&self) -> Option<Result<TransactionReceipt, ErrorKind>> {
		match self.state {
			ActionState::Succeeded => Some(self.receipt.clone().ok_or_else(|| {
				ErrorKind::Unknown("Succeeded action without receipt".to_string())
			})),
			ActionState::Failed => Some(Err(self
				.error
				.clone()
				.unwrap_or_else(|| ErrorKind::Unknown("Failed action without error".to_string())))),
			_ => None,
		}
	}
}

fn is_valid_transition(from: ActionState, to: ActionState) -> bool {
	// Static transition table - each state maps to allowed next states
	static TRANSITIONS: Lazy<HashMap<ActionState, HashSet<ActionState>>> = Lazy::new(|| {
		HashMap::from([
			(
				ActionState::Building,
				HashSet::from([ActionState::Submitted, ActionState::Failed]),
			),
			(ActionState::Submitted, HashSet::from([ActionState::Confirming])),
			(
				ActionState::Confirming,
				HashSet::from([ActionState::Succeeded, ActionState::Failed]),
			),
			(ActionState::Succeeded, HashSet::new()),
			(ActionState::Failed, HashSet::new()),
		])
	});

	TRANSITIONS
		.get(&from)
		.is_some_and(|allowed| allowed.contains(&to))
}
