//! Contract call descriptions.
//!
//! A call names its target, a Solidity function signature such as
//! `buyBlindBoxes(uint256)`, the ABI arguments and the native value attached.
//! Calldata is derived from those fields so a call can be hashed into a cache
//! key or handed to any chain client.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};

/// Encodes `signature` and `args` into calldata (selector followed by params).
pub fn encode_calldata(signature: &str, args: &[DynSolValue]) -> Bytes {
	let hash = keccak256(signature.as_bytes());
	let mut data = hash[..4].to_vec();
	if !args.is_empty() {
		data.extend(DynSolValue::Tuple(args.to_vec()).abi_encode_params());
	}
	data.into()
}

/// Returns the function name part of a signature.
fn method_name(signature: &str) -> &str {
	match signature.find('(') {
		Some(idx) => &signature[..idx],
		None => signature,
	}
}

/// A prospective write against a contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
	/// Contract receiving the call.
	pub target: Address,
	/// Solidity function signature, e.g. `approve(address,uint256)`.
	pub signature: String,
	/// ABI arguments in declaration order.
	pub args: Vec<DynSolValue>,
	/// Native value attached to the call in wei.
	pub value: U256,
}

impl ContractCall {
	pub fn new(target: Address, signature: impl Into<String>) -> Self {
		Self {
			target,
			signature: signature.into(),
			args: Vec::new(),
			value: U256::ZERO,
		}
	}

	pub fn with_arg(mut self, arg: DynSolValue) -> Self {
		self.args.push(arg);
		self
	}

	pub fn with_args(mut self, args: Vec<DynSolValue>) -> Self {
		self.args = args;
		self
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	/// Function name without the parameter list.
	pub fn method_name(&self) -> &str {
		method_name(&self.signature)
	}

	pub fn calldata(&self) -> Bytes {
		encode_calldata(&self.signature, &self.args)
	}

	/// Keccak hash of the calldata, used to key caches by argument shape.
	pub fn fingerprint(&self) -> B256 {
		keccak256(self.calldata())
	}

	/// Builds an ERC-20 `approve(spender, amount)` call on `token`.
	pub fn erc20_approve(token: Address, spender: Address, amount: U256) -> Self {
		Self::new(token, "approve(address,uint256)")
			.with_arg(DynSolValue::Address(spender))
			.with_arg(DynSolValue::Uint(amount, 256))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_selector_matches_known_value() {
		let call = ContractCall::new(Address::ZERO, "balanceOf(address)")
			.with_arg(DynSolValue::Address(Address::ZERO));
		let data = call.calldata();
		assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
		assert_eq!(data.len(), 4 + 32);
	}

	#[test]
	fn test_no_args_is_selector_only() {
		let call = ContractCall::new(Address::ZERO, "buyBlindBox()");
		assert_eq!(call.calldata().len(), 4);
		assert_eq!(call.method_name(), "buyBlindBox");
	}

	#[test]
	fn test_approve_encoding() {
		let token = address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
		let spender = address!("Cf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9");
		let call = ContractCall::erc20_approve(token, spender, U256::from(5u64));
		let data = call.calldata();
		assert_eq!(&data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
		assert_eq!(&data[16..36], spender.as_slice());
		assert_eq!(data[67], 5);
	}

	#[test]
	fn test_fingerprint_depends_on_args() {
		let a = ContractCall::new(Address::ZERO, "buyBlindBoxes(uint256)")
			.with_arg(DynSolValue::Uint(U256::from(2u64), 256));
		let b = ContractCall::new(Address::ZERO, "buyBlindBoxes(uint256)")
			.with_arg(DynSolValue::Uint(U256::from(3u64), 256));
		assert_ne!(a.fingerprint(), b.fingerprint());
		assert_eq!(a.fingerprint(), a.clone().fingerprint());
	}
}
