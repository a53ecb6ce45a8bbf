//! Core orchestration for on-chain actions.
//!
//! Ties the wallet, gas and chain layers together into the lifecycle of a
//! user-triggered write: pre-flight quoting, submission through the wallet,
//! receipt polling and a single user-facing report per outcome.

use dapp_types::{ActionState, ErrorKind};
use thiserror::Error;

mod engine;
mod handlers;
mod monitoring;
mod notify;
mod state;

pub use engine::{PendingActionHandle, TransactionCoordinator};
pub use handlers::{ApprovalPlanner, DEFAULT_APPROVAL_HEADROOM_PERCENT};
pub use monitoring::ReceiptMonitor;
pub use notify::{Notifier, NotifyKind, TracingNotifier};
pub use state::PendingAction;

/// Errors returned to callers of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
	/// Nothing was sent because no account is connected.
	#[error("Wallet not connected")]
	NotConnected,
	#[error("Invalid state transition from {from:?} to {to:?}")]
	InvalidTransition { from: ActionState, to: ActionState },
	/// The action reached a terminal failure.
	#[error("{0}")]
	Failed(ErrorKind),
}

impl From<CoordinatorError> for ErrorKind {
	fn from(err: CoordinatorError) -> Self {
		match err {
			CoordinatorError::NotConnected => ErrorKind::NotConnected,
			CoordinatorError::InvalidTransition { .. } => ErrorKind::Unknown(err.to_string()),
			CoordinatorError::Failed(kind) => kind,
		}
	}
}
