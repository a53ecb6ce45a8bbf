//! Configuration module for the on-chain action coordinator.
//!
//! Configuration is a single TOML file. Values may reference environment
//! variables with `${VAR}` or `${VAR:-default}`; they are substituted before
//! parsing. Every section except `[network]` has defaults, and the parsed
//! configuration is validated before it is handed out.

mod secret;

pub use secret::SecretString;

use alloy_primitives::Address;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Chain the coordinator talks to.
	pub network: NetworkConfig,
	/// Local signing key, only needed to submit transactions.
	#[serde(default)]
	pub account: AccountConfig,
	/// Gas estimation settings.
	#[serde(default)]
	pub gas: GasConfig,
	/// Transaction submission and confirmation settings.
	#[serde(default)]
	pub transactions: TransactionConfig,
	/// Batched read settings.
	#[serde(default)]
	pub multicall: MulticallConfig,
}

/// Chain connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
	/// HTTP(S) JSON-RPC endpoint.
	pub rpc_url: String,
	pub chain_id: u64,
	/// Multicall3 deployment. Defaults to the canonical cross-chain address.
	#[serde(default)]
	pub multicall_address: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountConfig {
	/// Hex-encoded private key of the local wallet.
	#[serde(default)]
	pub private_key: Option<SecretString>,
}

/// Static gas cost of one method, used when live estimation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FallbackGas {
	/// Units for a single item.
	pub base_units: u64,
	/// Units added for every item after the first.
	#[serde(default)]
	pub per_additional_unit: u64,
}

impl FallbackGas {
	/// Units for a call buying `quantity` items.
	pub fn units_for(&self, quantity: u64) -> u64 {
		self.base_units
			.saturating_add(self.per_additional_unit.saturating_mul(quantity.saturating_sub(1)))
	}
}

/// Gas estimation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
	/// How often the gas price is refreshed in the background.
	pub price_refresh_seconds: u64,
	/// Age after which a cached gas price is served stale and refreshed.
	pub price_stale_seconds: u64,
	/// How long a live unit estimate is reused for the same call shape.
	pub estimate_ttl_seconds: u64,
	/// Longest wait for the node to answer an estimate or price request.
	pub estimate_timeout_seconds: u64,
	/// Price used when the node cannot be asked.
	pub default_gas_price_wei: u64,
	/// Safety margin applied to unit estimates, in percent.
	pub buffer_percent: u64,
	/// Whether the safety margin also applies to static fallback units.
	pub buffer_static_fallback: bool,
	/// Static unit costs keyed by method name.
	pub fallback: HashMap<String, FallbackGas>,
	/// Static unit cost for methods missing from `fallback`.
	pub default_fallback: FallbackGas,
}

impl Default for GasConfig {
	fn default() -> Self {
		let fallback = HashMap::from([
			(
				"buyBlindBox".to_string(),
				FallbackGas {
					base_units: 150_000,
					per_additional_unit: 0,
				},
			),
			(
				"buyBlindBoxes".to_string(),
				FallbackGas {
					base_units: 200_000,
					per_additional_unit: 50_000,
				},
			),
		]);

		Self {
			price_refresh_seconds: 60,
			price_stale_seconds: 30,
			estimate_ttl_seconds: 60,
			estimate_timeout_seconds: 10,
			default_gas_price_wei: 20_000_000_000,
			buffer_percent: 120,
			buffer_static_fallback: true,
			fallback,
			default_fallback: FallbackGas {
				base_units: 150_000,
				per_additional_unit: 50_000,
			},
		}
	}
}

impl GasConfig {
	/// Static cost entry for `method`, falling back to the default entry.
	pub fn fallback_for(&self, method: &str) -> FallbackGas {
		self.fallback
			.get(method)
			.copied()
			.unwrap_or(self.default_fallback)
	}

	pub fn price_refresh_interval(&self) -> Duration {
		Duration::from_secs(self.price_refresh_seconds)
	}

	pub fn price_stale_after(&self) -> Duration {
		Duration::from_secs(self.price_stale_seconds)
	}

	pub fn estimate_ttl(&self) -> Duration {
		Duration::from_secs(self.estimate_ttl_seconds)
	}

	pub fn estimate_timeout(&self) -> Duration {
		Duration::from_secs(self.estimate_timeout_seconds)
	}
}

/// Transaction submission and confirmation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
	/// Delay between receipt polls.
	pub poll_interval_seconds: u64,
	/// Receipt polling gives up after this long and reports a network error.
	pub receipt_timeout_seconds: u64,
	/// Consecutive failed polls tolerated before giving up.
	pub max_consecutive_poll_errors: u32,
	/// How many transaction hashes are remembered for success de-duplication.
	pub success_memory: usize,
}

impl Default for TransactionConfig {
	fn default() -> Self {
		Self {
			poll_interval_seconds: 3,
			receipt_timeout_seconds: 600,
			max_consecutive_poll_errors: 5,
			success_memory: 64,
		}
	}
}

impl TransactionConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_seconds)
	}

	pub fn receipt_timeout(&self) -> Duration {
		Duration::from_secs(self.receipt_timeout_seconds)
	}
}

/// Batched read settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MulticallConfig {
	/// Period of watched batch refreshes.
	pub refresh_interval_seconds: u64,
	/// Largest number of reads sent in one round trip.
	pub max_batch_size: usize,
}

impl Default for MulticallConfig {
	fn default() -> Self {
		Self {
			refresh_interval_seconds: 15,
			max_batch_size: 100,
		}
	}
}

impl MulticallConfig {
	pub fn refresh_interval(&self) -> Duration {
		Duration::from_secs(self.refresh_interval_seconds)
	}
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Reads, resolves and validates a configuration file.
	pub async fn from_file_async(path: &str) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path).await?;
		content.parse()
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.network.rpc_url.trim().is_empty() {
			return Err(ConfigError::Validation("network.rpc_url cannot be empty".into()));
		}
		if self.network.chain_id == 0 {
			return Err(ConfigError::Validation("network.chain_id must be greater than 0".into()));
		}

		let gas = &self.gas;
		if gas.price_refresh_seconds == 0
			|| gas.estimate_ttl_seconds == 0
			|| gas.estimate_timeout_seconds == 0
		{
			return Err(ConfigError::Validation(
				"gas refresh, estimate and timeout intervals must be greater than 0".into(),
			));
		}
		if gas.price_stale_seconds > gas.price_refresh_seconds {
			return Err(ConfigError::Validation(format!(
				"gas.price_stale_seconds ({}) cannot exceed gas.price_refresh_seconds ({})",
				gas.price_stale_seconds, gas.price_refresh_seconds
			)));
		}
		if gas.buffer_percent < 100 {
			return Err(ConfigError::Validation(format!(
				"gas.buffer_percent must be at least 100, got {}",
				gas.buffer_percent
			)));
		}
		if gas.default_gas_price_wei == 0 {
			return Err(ConfigError::Validation(
				"gas.default_gas_price_wei must be greater than 0".into(),
			));
		}

		let tx = &self.transactions;
		if tx.poll_interval_seconds == 0 || tx.receipt_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"transaction poll interval and receipt timeout must be greater than 0".into(),
			));
		}
		if tx.receipt_timeout_seconds < tx.poll_interval_seconds {
			return Err(ConfigError::Validation(
				"transactions.receipt_timeout_seconds must cover at least one poll".into(),
			));
		}
		if tx.success_memory == 0 {
			return Err(ConfigError::Validation(
				"transactions.success_memory must be at least 1".into(),
			));
		}

		if self.multicall.refresh_interval_seconds == 0 || self.multicall.max_batch_size == 0 {
			return Err(ConfigError::Validation(
				"multicall refresh interval and batch size must be greater than 0".into(),
			));
		}

		if let Some(key) = &self.account.private_key {
			if key.is_empty() {
				return Err(ConfigError::Validation(
					"account.private_key cannot be empty when present".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses TOML after environment substitution and validates the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
