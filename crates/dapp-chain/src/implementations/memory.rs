//! In-memory chain implementation.
//!
//! A scriptable chain that keeps everything in process. Reads are answered
//! from a table keyed by target and calldata, submissions are recorded and
//! receipts appear once a transaction is mined explicitly. Every operation is
//! counted so callers can assert how many round trips a component made.

use crate::{ChainError, ChainInterface, ReadResult};
use async_trait::async_trait;
use dapp_types::{
	Address, Bytes, ContractCall, ReadSpec, TransactionHash, TransactionReceipt, B256, U256,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct ChainState {
	gas_price: Option<Result<U256, ChainError>>,
	estimates: HashMap<String, Result<u64, ChainError>>,
	default_estimate: Option<Result<u64, ChainError>>,
	reads: HashMap<(Address, Bytes), ReadResult>,
	batch_failure: Option<ChainError>,
	rejection: Option<String>,
	submissions: Vec<(ContractCall, Address)>,
	receipts: HashMap<TransactionHash, TransactionReceipt>,
	failing_receipt_polls: usize,
	block_number: u64,
	latency: Duration,
}

/// In-memory chain with scripted responses.
#[derive(Default)]
pub struct InMemoryChain {
	state: Mutex<ChainState>,
	estimate_calls: AtomicUsize,
	gas_price_calls: AtomicUsize,
	read_batch_calls: AtomicUsize,
	submit_calls: AtomicUsize,
	receipt_calls: AtomicUsize,
}

impl InMemoryChain {
	pub fn new() -> Self {
		Self::default()
	}

	fn state(&self) -> MutexGuard<'_, ChainState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Delays every operation by `latency`.
	pub fn set_latency(&self, latency: Duration) {
		self.state().latency = latency;
	}

	pub fn set_gas_price(&self, price: U256) {
		self.state().gas_price = Some(Ok(price));
	}

	pub fn fail_gas_price(&self, message: &str) {
		self.state().gas_price = Some(Err(ChainError::Network(message.to_string())));
	}

	/// Answers estimates for every method without a specific entry.
	pub fn set_estimate(&self, units: u64) {
		self.state().default_estimate = Some(Ok(units));
	}

	pub fn set_method_estimate(&self, method: &str, units: u64) {
		self.state().estimates.insert(method.to_string(), Ok(units));
	}

	pub fn fail_estimates(&self, message: &str) {
		let mut state = self.state();
		state.estimates.clear();
		state.default_estimate = Some(Err(ChainError::Reverted(message.to_string())));
	}

	/// Answers `spec` with raw return data.
	pub fn set_read(&self, spec: &ReadSpec, data: Bytes) {
		self.state()
			.reads
			.insert((spec.target, spec.calldata()), Ok(data));
	}

	/// Answers `spec` with a single `uint256` word.
	pub fn set_read_u256(&self, spec: &ReadSpec, value: U256) {
		self.set_read(spec, Bytes::from(value.to_be_bytes::<32>().to_vec()));
	}

	pub fn revert_read(&self, spec: &ReadSpec, reason: &str) {
		self.state().reads.insert(
			(spec.target, spec.calldata()),
			Err(ChainError::Reverted(reason.to_string())),
		);
	}

	/// Makes whole batches fail at the transport level, or clears that.
	pub fn fail_batches(&self, error: Option<ChainError>) {
		self.state().batch_failure = error;
	}

	/// Makes submissions fail with `message`, or accepts them again.
	pub fn reject_submissions(&self, message: Option<&str>) {
		self.state().rejection = message.map(str::to_string);
	}

	/// Fails the next `count` receipt lookups.
	pub fn fail_receipt_polls(&self, count: usize) {
		self.state().failing_receipt_polls = count;
	}

	/// Includes `hash` in a new block.
	pub fn mine(&self, hash: TransactionHash, success: bool) {
		let mut state = self.state();
		state.block_number += 1;
		let block_number = state.block_number;
		state.receipts.insert(
			hash,
			TransactionReceipt {
				hash,
				block_number,
				success,
			},
		);
	}

	pub fn submissions(&self) -> Vec<(ContractCall, Address)> {
		self.state().submissions.clone()
	}

	pub fn estimate_calls(&self) -> usize {
		self.estimate_calls.load(Ordering::SeqCst)
	}

	pub fn gas_price_calls(&self) -> usize {
		self.gas_price_calls.load(Ordering::SeqCst)
	}

	pub fn read_batch_calls(&self) -> usize {
		self.read_batch_calls.load(Ordering::SeqCst)
	}

	pub fn submit_calls(&self) -> usize {
		self.submit_calls.load(Ordering::SeqCst)
	}

	pub fn receipt_calls(&self) -> usize {
		self.receipt_calls.load(Ordering::SeqCst)
	}

	async fn simulate_latency(&self) {
		let latency = self.state().latency;
		if !latency.is_zero() {
			tokio::time::sleep(latency).await;
		}
	}
}

#[async_trait]
impl ChainInterface for InMemoryChain {
	async fn estimate_gas(&self, call: &ContractCall, _from: Address) -> Result<u64, ChainError> {
		self.estimate_calls.fetch_add(1, Ordering::SeqCst);
		self.simulate_latency().await;
		let state = self.state();
		state
			.estimates
			.get(call.method_name())
			.or(state.default_estimate.as_ref())
			.cloned()
			.unwrap_or_else(|| Err(ChainError::Network("No estimate configured".into())))
	}

	async fn gas_price(&self) -> Result<U256, ChainError> {
		self.gas_price_calls.fetch_add(1, Ordering::SeqCst);
		self.simulate_latency().await;
		self.state()
			.gas_price
			.clone()
			.unwrap_or_else(|| Err(ChainError::Network("No gas price configured".into())))
	}

	async fn read_batch(&self, reads: &[ReadSpec]) -> Result<Vec<ReadResult>, ChainError> {
		self.read_batch_calls.fetch_add(1, Ordering::SeqCst);
		self.simulate_latency().await;
		let state = self.state();
		if let Some(error) = &state.batch_failure {
			return Err(error.clone());
		}
		Ok(reads
			.iter()
			.map(|spec| {
				state
					.reads
					.get(&(spec.target, spec.calldata()))
					.cloned()
					.unwrap_or_else(|| Err(ChainError::Reverted("execution reverted".into())))
			})
			.collect())
	}

	async fn submit(
		&self,
		call: &ContractCall,
		from: Address,
	) -> Result<TransactionHash, ChainError> {
		let nonce = self.submit_calls.fetch_add(1, Ordering::SeqCst);
		self.simulate_latency().await;
		let mut state = self.state();
		if let Some(message) = &state.rejection {
			return Err(ChainError::Rejected(message.clone()));
		}
		state.submissions.push((call.clone(), from));
		let mut seed = [0u8; 32];
		seed[..20].copy_from_slice(from.as_slice());
		seed[24..].copy_from_slice(&(nonce as u64).to_be_bytes());
		Ok(TransactionHash(B256::from(seed)))
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, ChainError> {
		self.receipt_calls.fetch_add(1, Ordering::SeqCst);
		self.simulate_latency().await;
		let mut state = self.state();
		if state.failing_receipt_polls > 0 {
			state.failing_receipt_polls -= 1;
			return Err(ChainError::Network("connection reset".into()));
		}
		Ok(state.receipts.get(hash).cloned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_reads_are_answered_in_order() {
		let chain = InMemoryChain::new();
		let owner = Address::repeat_byte(9);
		let a = ReadSpec::balance_of(Address::repeat_byte(1), owner);
		let b = ReadSpec::balance_of(Address::repeat_byte(2), owner);
		chain.set_read_u256(&a, U256::from(7u64));

		let results = chain.read_batch(&[b, a]).await.unwrap();
		assert!(matches!(results[0], Err(ChainError::Reverted(_))));
		assert_eq!(results[1].as_ref().unwrap()[31], 7);
	}

	#[tokio::test]
	async fn test_receipt_poll_failures_are_consumed() {
		let chain = InMemoryChain::new();
		let hash = chain
			.submit(&ContractCall::new(Address::ZERO, "f()"), Address::repeat_byte(1))
			.await
			.unwrap();
		chain.fail_receipt_polls(1);
		assert!(chain.get_receipt(&hash).await.is_err());
		assert!(chain.get_receipt(&hash).await.unwrap().is_none());
		assert_eq!(chain.receipt_calls(), 2);
	}

	#[tokio::test]
	async fn test_method_estimate_overrides_default() {
		let chain = InMemoryChain::new();
		chain.set_estimate(21_000);
		chain.set_method_estimate("buyBlindBoxes", 180_000);
		let from = Address::repeat_byte(1);
		let buy = ContractCall::new(Address::ZERO, "buyBlindBoxes(uint256)");
		let other = ContractCall::new(Address::ZERO, "stake(uint256)");
		assert_eq!(chain.estimate_gas(&buy, from).await.unwrap(), 180_000);
		assert_eq!(chain.estimate_gas(&other, from).await.unwrap(), 21_000);
	}
}
