//! ERC-20 approval sequencing.
//!
//! Token-priced purchases need the marketplace to hold an allowance first.
//! The planner reads the current allowance and prepends an `approve` call
//! only when it falls short.

use crate::CoordinatorError;
use dapp_multicall::MulticallReader;
use dapp_types::{Address, ContractCall, ErrorKind, ReadOutcomeExt, ReadSpec, U256};
use dapp_wallet::WalletView;
use std::sync::Arc;

/// Default approval size in percent of the amount being spent.
pub const DEFAULT_APPROVAL_HEADROOM_PERCENT: u64 = 200;

/// Plans approve-then-spend call sequences.
pub struct ApprovalPlanner {
	reader: Arc<MulticallReader>,
	headroom_percent: u64,
}

impl ApprovalPlanner {
	pub fn new(reader: Arc<MulticallReader>) -> Self {
		Self {
			reader,
			headroom_percent: DEFAULT_APPROVAL_HEADROOM_PERCENT,
		}
	}

	/// Approves `percent` of the spent amount, never less than the amount itself.
	pub fn with_headroom(mut self, percent: u64) -> Self {
		self.headroom_percent = percent.max(100);
		self
	}

	/// Whether `owner` must approve `spender` before spending `amount` of `token`.
	pub async fn needs_approval(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
		amount: U256,
	) -> Result<bool, ErrorKind> {
		let outcomes = self
			.reader
			.batch(&[ReadSpec::allowance(token, owner, spender)])
			.await;
		let allowance = outcomes
			.first()
			.ok_or_else(|| ErrorKind::Unknown("Empty allowance answer".to_string()))?
			.as_u256()?;
		Ok(allowance < amount)
	}

	/// Returns the calls to run for `spend`, approving first when needed.
	pub async fn plan(
		&self,
		view: &WalletView,
		token: Address,
		spender: Address,
		amount: U256,
		spend: ContractCall,
	) -> Result<Vec<ContractCall>, CoordinatorError> {
		let owner = view.account().ok_or(CoordinatorError::NotConnected)?;
		if !self
			.needs_approval(token, owner, spender, amount)
			.await
			.map_err(CoordinatorError::Failed)?
		{
			return Ok(vec![spend]);
		}

		let approve_amount =
			amount.saturating_mul(U256::from(self.headroom_percent)) / U256::from(100u64);
		tracing::debug!(
			token = %token,
			amount = %approve_amount,
			"Allowance too low, approving first"
		);
		Ok(vec![
			ContractCall::erc20_approve(token, spender, approve_amount),
			spend,
		])
	}
}
