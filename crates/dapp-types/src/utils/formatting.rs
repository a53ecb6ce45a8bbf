//! String formatting utilities.
//!
//! Used for log fields and for rendering balances and fees to users.

use alloy_primitives::U256;

/// Shortens an identifier to its first 8 characters followed by "..".
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

/// Renders a raw on-chain amount with `decimals` fractional digits.
///
/// Trailing zeros of the fractional part are dropped, so one ether with 18
/// decimals renders as "1" and 1.5 ether as "1.5".
pub fn format_units(amount: U256, decimals: u8) -> String {
	let digits = amount.to_string();
	if decimals == 0 {
		return digits;
	}

	let scale = decimals as usize;
	let padded = format!("{:0>width$}", digits, width = scale + 1);
	let (whole, fraction) = padded.split_at(padded.len() - scale);
	let fraction = fraction.trim_end_matches('0');

	if fraction.is_empty() {
		whole.to_string()
	} else {
		format!("{}.{}", whole, fraction)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("0x1234567890abcdef"), "0x123456..");
	}

	#[test]
	fn test_format_units() {
		let wei = |s: &str| U256::from_str_radix(s, 10).unwrap();
		assert_eq!(format_units(wei("1000000000000000000"), 18), "1");
		assert_eq!(format_units(wei("1500000000000000000"), 18), "1.5");
		assert_eq!(format_units(wei("100000000000000000"), 18), "0.1");
		assert_eq!(format_units(wei("6000000"), 18), "0.000000000006");
		assert_eq!(format_units(wei("1500000"), 6), "1.5");
		assert_eq!(format_units(wei("1000"), 0), "1000");
		assert_eq!(format_units(U256::ZERO, 18), "0");
	}
}
