//! Pending action types.
//!
//! A pending action is one user-triggered write moving from construction to
//! a terminal state. This module defines its identifier, the states it moves
//! through and the categorized error kinds it can end with.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier of a pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Uuid);

impl ActionId {
	/// Generates a fresh random identifier.
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for ActionId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for ActionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Lifecycle state of a pending action.
///
/// Transitions only move forward:
/// Building -> Submitted -> Confirming -> Succeeded | Failed, plus
/// Building -> Failed when the wallet refuses to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionState {
	/// The call is being handed to the wallet provider.
	Building,
	/// The wallet accepted the call and returned a transaction hash.
	Submitted,
	/// Receipt polling is in progress.
	Confirming,
	/// The receipt reports success.
	Succeeded,
	/// The action ended without success.
	Failed,
}

impl ActionState {
	/// Returns true for Succeeded and Failed.
	pub fn is_terminal(&self) -> bool {
		matches!(self, ActionState::Succeeded | ActionState::Failed)
	}
}

/// Categorized failure of an on-chain action or read.
///
/// Control flow branches on the variant, never on the message text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ErrorKind {
	/// No wallet account is connected.
	#[error("Wallet not connected")]
	NotConnected,
	/// The wallet or node declined the call before it was broadcast.
	#[error("Rejected: {0}")]
	Rejected(String),
	/// The receipt shows the transaction reverted.
	#[error("Transaction reverted on chain")]
	RevertedOnChain,
	/// Transport failure; retrying may succeed.
	#[error("Network error: {0}")]
	NetworkError(String),
	/// Gas estimation failed. Never surfaced outside the gas estimator.
	#[error("Gas estimation unavailable")]
	EstimationUnavailable,
	/// The read target is the zero-address sentinel.
	#[error("Contract unavailable")]
	Unavailable,
	/// Anything else.
	#[error("Unknown error: {0}")]
	Unknown(String),
}

impl ErrorKind {
	/// Whether the caller may offer a retry.
	pub fn is_retryable(&self) -> bool {
		matches!(self, ErrorKind::NetworkError(_))
	}
}
