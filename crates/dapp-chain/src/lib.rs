//! Chain client module for the on-chain action coordinator.
//!
//! This module is the only place that talks to a node. It exposes the small
//! set of operations the coordinator needs (unit estimation, gas price,
//! batched reads, submission and receipt lookup) behind one trait so that the
//! rest of the system can run against a live RPC endpoint or an in-memory
//! chain in tests.

use async_trait::async_trait;
use dapp_types::{
	truncate_id, Address, Bytes, ContractCall, ErrorKind, ReadSpec, TransactionHash,
	TransactionReceipt, U256,
};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod memory;
}

/// Errors that can occur while talking to the chain.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
	/// Transport or RPC failure. Retrying may succeed.
	#[error("Network error: {0}")]
	Network(String),
	/// The node executed the call and it reverted.
	#[error("Execution reverted: {0}")]
	Reverted(String),
	/// The node or signer refused the request before execution.
	#[error("Rejected: {0}")]
	Rejected(String),
	/// The response could not be decoded.
	#[error("Decode error: {0}")]
	Decode(String),
}

impl From<ChainError> for ErrorKind {
	fn from(err: ChainError) -> Self {
		match err {
			ChainError::Network(msg) => ErrorKind::NetworkError(msg),
			ChainError::Reverted(_) => ErrorKind::RevertedOnChain,
			ChainError::Rejected(msg) => ErrorKind::Rejected(msg),
			ChainError::Decode(msg) => ErrorKind::Unknown(msg),
		}
	}
}

/// Result of one entry of a batched read.
pub type ReadResult = Result<Bytes, ChainError>;

/// Trait defining the interface for chain clients.
///
/// Implementations must be safe to call from many tasks at once. None of the
/// read operations may change chain state.
#[async_trait]
pub trait ChainInterface: Send + Sync {
	/// Simulates `call` from `from` and returns the gas units it would use.
	async fn estimate_gas(&self, call: &ContractCall, from: Address) -> Result<u64, ChainError>;

	/// Returns the current suggested gas price in wei.
	async fn gas_price(&self) -> Result<U256, ChainError>;

	/// Executes all reads in one round trip.
	///
	/// The outer error means the round trip itself failed. Otherwise the
	/// returned list has the same length as `reads` and entry `i` answers
	/// `reads[i]`.
	async fn read_batch(&self, reads: &[ReadSpec]) -> Result<Vec<ReadResult>, ChainError>;

	/// Signs and broadcasts `call` from `from`.
	async fn submit(&self, call: &ContractCall, from: Address)
		-> Result<TransactionHash, ChainError>;

	/// Returns the receipt for `hash`, or `None` while it is still pending.
	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, ChainError>;
}

#[async_trait]
impl<T: ChainInterface + ?Sized> ChainInterface for std::sync::Arc<T> {
	async fn estimate_gas(&self, call: &ContractCall, from: Address) -> Result<u64, ChainError> {
		(**self).estimate_gas(call, from).await
	}

	async fn gas_price(&self) -> Result<U256, ChainError> {
		(**self).gas_price().await
	}

	async fn read_batch(&self, reads: &[ReadSpec]) -> Result<Vec<ReadResult>, ChainError> {
		(**self).read_batch(reads).await
	}

	async fn submit(
		&self,
		call: &ContractCall,
		from: Address,
	) -> Result<TransactionHash, ChainError> {
		(**self).submit(call, from).await
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, ChainError> {
		(**self).get_receipt(hash).await
	}
}

/// Service wrapping the configured chain implementation.
pub struct ChainClient {
	implementation: Box<dyn ChainInterface>,
}

impl ChainClient {
	pub fn new(implementation: Box<dyn ChainInterface>) -> Self {
		Self { implementation }
	}

	pub async fn estimate_gas(&self, call: &ContractCall, from: Address) -> Result<u64, ChainError> {
		let result = self.implementation.estimate_gas(call, from).await;
		if let Err(e) = &result {
			tracing::debug!(method = call.method_name(), error = %e, "Gas estimation failed");
		}
		result
	}

	pub async fn gas_price(&self) -> Result<U256, ChainError> {
		self.implementation.gas_price().await
	}

	/// Executes a batch and checks the answer lines up with the request.
	pub async fn read_batch(&self, reads: &[ReadSpec]) -> Result<Vec<ReadResult>, ChainError> {
		if reads.is_empty() {
			return Ok(Vec::new());
		}
		let results = self.implementation.read_batch(reads).await?;
		if results.len() != reads.len() {
			return Err(ChainError::Decode(format!(
				"Batch answered {} of {} reads",
				results.len(),
				reads.len()
			)));
		}
		Ok(results)
	}

	pub async fn submit(
		&self,
		call: &ContractCall,
		from: Address,
	) -> Result<TransactionHash, ChainError> {
		let hash = self.implementation.submit(call, from).await?;
		tracing::info!(
			tx_hash = %truncate_id(&hash.to_string()),
			method = call.method_name(),
			"Submitted transaction"
		);
		Ok(hash)
	}

	pub async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, ChainError> {
		self.implementation.get_receipt(hash).await
	}
}
