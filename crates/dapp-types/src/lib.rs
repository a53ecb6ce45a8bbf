//! Common types module for the on-chain action coordinator.
//!
//! This module defines the core data types shared by the gas estimator, the
//! transaction coordinator, the multicall reader and the account observer.
//! Keeping them in one crate lets every component speak the same vocabulary
//! without depending on each other.

/// Pending action lifecycle states and the error taxonomy.
pub mod action;
/// Contract call descriptions and calldata encoding.
pub mod call;
/// Transaction hashes and receipts.
pub mod delivery;
/// Component events and the broadcast bus carrying them.
pub mod events;
/// Gas quote types.
pub mod gas;
/// Batched read requests and outcomes.
pub mod multicall;
/// Utility functions for formatting and time.
pub mod utils;
/// Shared wallet snapshot.
pub mod wallet;

pub use action::*;
pub use call::*;
pub use delivery::*;
pub use events::*;
pub use gas::*;
pub use multicall::*;
pub use utils::{current_timestamp, format_units, truncate_id};
pub use wallet::*;

/// Re-exported so downstream crates build calls without naming alloy crates.
pub use alloy_dyn_abi::DynSolValue;
pub use alloy_primitives::{Address, Bytes, B256, U256};
