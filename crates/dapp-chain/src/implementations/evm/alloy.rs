//! Alloy-based EVM chain client.
//!
//! Talks to a single EVM network over HTTP JSON-RPC. Batched reads go through
//! the Multicall3 `aggregate3` entry point with `allowFailure` set, so one
//! reverting read never fails its neighbours. Submissions are signed locally
//! by the provider's wallet filler when a private key is configured.

use crate::{ChainError, ChainInterface, ReadResult};
use alloy_network::EthereumWallet;
use alloy_primitives::{address, Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, SolCall};
use alloy_transport::{RpcError, TransportError};
use alloy_transport_http::Http;
use async_trait::async_trait;
use dapp_config::{AccountConfig, NetworkConfig};
use dapp_types::{truncate_id, ContractCall, ReadSpec, TransactionHash, TransactionReceipt};
use std::sync::Arc;

/// Canonical Multicall3 deployment, identical on most EVM chains.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
	/// One read in an `aggregate3` batch.
	struct Call3 {
		address target;
		bool allowFailure;
		bytes callData;
	}

	/// Outcome of one read in an `aggregate3` batch.
	struct Call3Result {
		bool success;
		bytes returnData;
	}

	function aggregate3(Call3[] calldata calls) external payable returns (Call3Result[] memory returnData);
}

/// Maps a transport error, treating node-side error responses with `on_response`.
fn classify(err: TransportError, context: &str, on_response: fn(String) -> ChainError) -> ChainError {
	match err {
		RpcError::ErrorResp(payload) => on_response(payload.message.to_string()),
		other => ChainError::Network(format!("{}: {}", context, other)),
	}
}

/// Alloy-based EVM chain client.
pub struct AlloyChain {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	/// Address of the local signer, if one is configured.
	signer: Option<Address>,
	multicall: Address,
}

impl AlloyChain {
	/// Creates a client for `network`, signing with `account` when it carries a key.
	pub fn new(network: &NetworkConfig, account: &AccountConfig) -> Result<Self, ChainError> {
		let url = network.rpc_url.parse().map_err(|e| {
			ChainError::Network(format!("Invalid RPC URL {}: {}", network.rpc_url, e))
		})?;

		let signer: Option<PrivateKeySigner> = match &account.private_key {
			Some(key) => Some(key.with_exposed(|k| {
				k.parse::<PrivateKeySigner>()
					.map_err(|_| ChainError::Rejected("Invalid private key format".to_string()))
			})?),
			None => None,
		};

		let (provider, signer_address) = match signer {
			Some(signer) => {
				let signer = signer.with_chain_id(Some(network.chain_id));
				let signer_address = signer.address();
				let provider = ProviderBuilder::new()
					.with_recommended_fillers()
					.wallet(EthereumWallet::from(signer))
					.on_http(url);
				(
					Arc::new(provider) as Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
					Some(signer_address),
				)
			},
			None => {
				let provider = ProviderBuilder::new().with_recommended_fillers().on_http(url);
				(
					Arc::new(provider) as Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
					None,
				)
			},
		};

		tracing::info!(
			chain_id = network.chain_id,
			signer = ?signer_address.map(|a| truncate_id(&a.to_string())),
			"Chain client ready"
		);

		Ok(Self {
			provider,
			signer: signer_address,
			multicall: network.multicall_address.unwrap_or(MULTICALL3_ADDRESS),
		})
	}

	/// Address transactions are signed with, if any.
	pub fn signer_address(&self) -> Option<Address> {
		self.signer
	}

	fn request(call: &ContractCall, from: Address) -> TransactionRequest {
		TransactionRequest::default()
			.from(from)
			.to(call.target)
			.value(call.value)
			.input(call.calldata().into())
	}
}

#[async_trait]
impl ChainInterface for AlloyChain {
	async fn estimate_gas(&self, call: &ContractCall, from: Address) -> Result<u64, ChainError> {
		self.provider
			.estimate_gas(&Self::request(call, from))
			.await
			.map_err(|e| classify(e, "Failed to estimate gas", ChainError::Reverted))
	}

	async fn gas_price(&self) -> Result<U256, ChainError> {
		let price = self
			.provider
			.get_gas_price()
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get gas price: {}", e)))?;
		Ok(U256::from(price))
	}

	async fn read_batch(&self, reads: &[ReadSpec]) -> Result<Vec<ReadResult>, ChainError> {
		let calls = reads
			.iter()
			.map(|spec| Call3 {
				target: spec.target,
				allowFailure: true,
				callData: spec.calldata(),
			})
			.collect();
		let data = aggregate3Call { calls }.abi_encode();

		let response = self
			.provider
			.call(
				&TransactionRequest::default()
					.to(self.multicall)
					.input(Bytes::from(data).into()),
			)
			.await
			.map_err(|e| classify(e, "Failed to call multicall", ChainError::Reverted))?;

		let decoded = aggregate3Call::abi_decode_returns(&response, true)
			.map_err(|e| ChainError::Decode(format!("Invalid aggregate3 response: {}", e)))?;

		Ok(decoded
			.returnData
			.into_iter()
			.map(|result| {
				if result.success {
					Ok(result.returnData)
				} else {
					Err(ChainError::Reverted(format!("0x{}", alloy_primitives::hex::encode(&result.returnData))))
				}
			})
			.collect())
	}

	async fn submit(
		&self,
		call: &ContractCall,
		from: Address,
	) -> Result<TransactionHash, ChainError> {
		match self.signer {
			None => {
				return Err(ChainError::Rejected(
					"No signing key configured".to_string(),
				))
			},
			Some(signer) if signer != from => {
				return Err(ChainError::Rejected(format!(
					"Signer {} cannot send from {}",
					signer, from
				)))
			},
			Some(_) => {},
		}

		let pending = self
			.provider
			.send_transaction(Self::request(call, from))
			.await
			.map_err(|e| classify(e, "Failed to send transaction", ChainError::Rejected))?;

		Ok(TransactionHash(*pending.tx_hash()))
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, ChainError> {
		let receipt = self
			.provider
			.get_transaction_receipt(hash.0)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get receipt: {}", e)))?;

		Ok(receipt.map(|receipt| TransactionReceipt {
			hash: TransactionHash(receipt.transaction_hash),
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
		}))
	}
}

/// Builds the chain client for the configured network.
pub fn create_alloy_chain(
	network: &NetworkConfig,
	account: &AccountConfig,
) -> Result<Box<dyn ChainInterface>, ChainError> {
	Ok(Box::new(AlloyChain::new(network, account)?))
}
