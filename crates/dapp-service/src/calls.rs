//! Contract calls from command-line input.
//!
//! Arguments are given as strings and coerced into the parameter types named
//! by the function signature.

use alloy_dyn_abi::DynSolType;
use dapp_types::{Address, ContractCall, U256};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
	#[error("Invalid signature: {0}")]
	Signature(String),
	#[error("Expected {expected} arguments, got {got}")]
	Arity { expected: usize, got: usize },
	#[error("Invalid argument {index}: {message}")]
	Argument { index: usize, message: String },
}

/// Splits `name(type,...)` into its name and parameter types.
pub fn parse_signature(signature: &str) -> Result<(String, Vec<DynSolType>), CallError> {
	let signature = signature.trim();
	let open = signature
		.find('(')
		.ok_or_else(|| CallError::Signature(format!("missing parameter list in {}", signature)))?;
	if !signature.ends_with(')') {
		return Err(CallError::Signature(format!("unterminated parameter list in {}", signature)));
	}

	let name = signature[..open].trim();
	if name.is_empty() {
		return Err(CallError::Signature("missing function name".to_string()));
	}

	let params = &signature[open + 1..signature.len() - 1];
	if params.trim().is_empty() {
		return Ok((name.to_string(), Vec::new()));
	}
	if params.contains('(') {
		return Err(CallError::Signature("tuple parameters are not supported".to_string()));
	}

	let types = params
		.split(',')
		.map(|ty| {
			DynSolType::parse(ty.trim())
				.map_err(|e| CallError::Signature(format!("{}: {}", ty.trim(), e)))
		})
		.collect::<Result<Vec<_>, _>>()?;
	Ok((name.to_string(), types))
}

/// Builds a call to `target` from a signature and string arguments.
///
/// The signature is normalized to its canonical form so the selector matches
/// whatever spacing the operator typed.
pub fn build_call(
	target: Address,
	signature: &str,
	args: &[String],
	value: U256,
) -> Result<ContractCall, CallError> {
	let (name, types) = parse_signature(signature)?;
	if types.len() != args.len() {
		return Err(CallError::Arity {
			expected: types.len(),
			got: args.len(),
		});
	}

	let values = types
		.iter()
		.zip(args)
		.enumerate()
		.map(|(index, (ty, arg))| {
			ty.coerce_str(arg).map_err(|e| CallError::Argument {
				index,
				message: e.to_string(),
			})
		})
		.collect::<Result<Vec<_>, _>>()?;

	let canonical = format!(
		"{}({})",
		name,
		types
			.iter()
			.map(|ty| ty.sol_type_name().into_owned())
			.collect::<Vec<_>>()
			.join(",")
	);
	Ok(ContractCall::new(target, canonical)
		.with_args(values)
		.with_value(value))
}

pub fn parse_address(s: &str) -> Result<Address, String> {
	Address::from_str(s).map_err(|e| format!("invalid address {}: {}", s, e))
}

pub fn parse_u256(s: &str) -> Result<U256, String> {
	U256::from_str(s).map_err(|e| format!("invalid amount {}: {}", s, e))
}

#[cfg(test)]
mod tests {
	use super::*;
	use dapp_types::DynSolValue;

	fn market() -> Address {
		Address::repeat_byte(0x33)
	}

	#[test]
	fn test_parse_signature() {
		let (name, types) = parse_signature("buyBlindBoxes(uint256, address)").unwrap();
		assert_eq!(name, "buyBlindBoxes");
		assert_eq!(types, vec![DynSolType::Uint(256), DynSolType::Address]);

		let (name, types) = parse_signature("buyBlindBox()").unwrap();
		assert_eq!(name, "buyBlindBox");
		assert!(types.is_empty());
	}

	#[test]
	fn test_parse_signature_rejects_malformed_input() {
		assert!(parse_signature("buyBlindBox").is_err());
		assert!(parse_signature("buyBlindBox(uint256").is_err());
		assert!(parse_signature("(uint256)").is_err());
		assert!(parse_signature("f((uint256,address))").is_err());
		assert!(parse_signature("f(notatype)").is_err());
	}

	#[test]
	fn test_build_call_matches_typed_call() {
		let built = build_call(
			market(),
			"buyBlindBoxes( uint256 )",
			&["3".to_string()],
			U256::from(30u64),
		)
		.unwrap();
		let expected = ContractCall::new(market(), "buyBlindBoxes(uint256)")
			.with_arg(DynSolValue::Uint(U256::from(3u64), 256))
			.with_value(U256::from(30u64));
		assert_eq!(built.calldata(), expected.calldata());
		assert_eq!(built.method_name(), "buyBlindBoxes");
		assert_eq!(built.value, U256::from(30u64));
	}

	#[test]
	fn test_build_call_checks_arguments() {
		let err = build_call(market(), "buyBlindBoxes(uint256)", &[], U256::ZERO).unwrap_err();
		assert!(matches!(err, CallError::Arity { expected: 1, got: 0 }));

		let err = build_call(
			market(),
			"buyBlindBoxes(uint256)",
			&["three".to_string()],
			U256::ZERO,
		)
		.unwrap_err();
		assert!(matches!(err, CallError::Argument { index: 0, .. }));
	}

	#[test]
	fn test_value_parsers() {
		assert_eq!(parse_u256("1000").unwrap(), U256::from(1000u64));
		assert!(parse_u256("-1").is_err());
		assert_eq!(
			parse_address("0x3333333333333333333333333333333333333333").unwrap(),
			market()
		);
		assert!(parse_address("0x12").is_err());
	}
}
