//! Batched read types.
//!
//! A batch is an ordered list of read specs; the answer is a list of the same
//! length where entry `i` always answers request `i`. Each entry succeeds or
//! fails on its own.

use crate::{call::encode_calldata, ErrorKind};
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, U256};

/// One read-only contract query.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadSpec {
	pub target: Address,
	/// Solidity function signature, e.g. `balanceOf(address)`.
	pub signature: String,
	pub args: Vec<DynSolValue>,
}

impl ReadSpec {
	pub fn new(target: Address, signature: impl Into<String>) -> Self {
		Self {
			target,
			signature: signature.into(),
			args: Vec::new(),
		}
	}

	pub fn with_arg(mut self, arg: DynSolValue) -> Self {
		self.args.push(arg);
		self
	}

	pub fn calldata(&self) -> Bytes {
		encode_calldata(&self.signature, &self.args)
	}

	/// The zero address stands for a contract that is not deployed or configured.
	pub fn is_unavailable(&self) -> bool {
		self.target == Address::ZERO
	}

	/// ERC-20 `balanceOf(owner)` on `token`.
	pub fn balance_of(token: Address, owner: Address) -> Self {
		Self::new(token, "balanceOf(address)").with_arg(DynSolValue::Address(owner))
	}

	/// ERC-20 `allowance(owner, spender)` on `token`.
	pub fn allowance(token: Address, owner: Address, spender: Address) -> Self {
		Self::new(token, "allowance(address,address)")
			.with_arg(DynSolValue::Address(owner))
			.with_arg(DynSolValue::Address(spender))
	}
}

/// Result of a single read in a batch: raw return data or why it failed.
pub type ReadOutcome = Result<Bytes, ErrorKind>;

/// Decodes the first word of return data as a `uint256`.
pub fn decode_u256(data: &[u8]) -> Result<U256, ErrorKind> {
	if data.len() < 32 {
		return Err(ErrorKind::Unknown(format!(
			"Return data too short for uint256: {} bytes",
			data.len()
		)));
	}
	Ok(U256::from_be_slice(&data[..32]))
}

/// Typed view over a batch answer.
pub trait ReadOutcomeExt {
	/// Decodes a successful entry as `uint256`, keeping the failure otherwise.
	fn as_u256(&self) -> Result<U256, ErrorKind>;
}

impl ReadOutcomeExt for ReadOutcome {
	fn as_u256(&self) -> Result<U256, ErrorKind> {
		match self {
			Ok(data) => decode_u256(data),
			Err(kind) => Err(kind.clone()),
		}
	}
}
