//! Operator binary for the on-chain action coordinator.
//!
//! Wires the gas estimator, batched reader, account observer and transaction
//! coordinator against a live RPC endpoint so their behavior can be exercised
//! from a terminal.

use clap::{Args as ClapArgs, Parser, Subcommand};
use dapp_chain::implementations::evm::alloy::AlloyChain;
use dapp_chain::ChainClient;
use dapp_config::Config;
use dapp_core::{TracingNotifier, TransactionCoordinator};
use dapp_gas::GasEstimator;
use dapp_multicall::MulticallReader;
use dapp_types::{truncate_id, ActionEvent, Address, EventBus, WalletEvent, U256};
use dapp_wallet::implementations::local::LocalWallet;
use dapp_wallet::{AccountObserver, StopHandle, WalletView};
use std::path::PathBuf;
use std::sync::Arc;

mod calls;
mod commands;

use calls::{parse_address, parse_u256};

/// Command-line arguments for the operator binary.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Quote the fee of a call without sending it
	Quote {
		#[command(flatten)]
		call: CallArgs,
		/// Number of items the call buys
		#[arg(long, default_value_t = 1)]
		quantity: u64,
		/// Price of the items in wei, defaults to the attached value
		#[arg(long, value_parser = parse_u256)]
		price: Option<U256>,
	},
	/// Read token balances in one batch
	Balances {
		/// ERC-20 token addresses
		#[arg(long = "token", required = true, value_parser = parse_address)]
		tokens: Vec<Address>,
		/// Account to read, defaults to the configured signer
		#[arg(long, value_parser = parse_address)]
		owner: Option<Address>,
		#[arg(long, default_value_t = 18)]
		decimals: u8,
	},
	/// Send a call and wait for its receipt
	Send {
		#[command(flatten)]
		call: CallArgs,
		/// Token to approve for the call target first, when the allowance is short
		#[arg(long, value_parser = parse_address, requires = "approve_amount")]
		approve_token: Option<Address>,
		/// Amount the call spends from `approve_token`
		#[arg(long, value_parser = parse_u256)]
		approve_amount: Option<U256>,
	},
	/// Follow token balances of the configured signer until interrupted
	Watch {
		#[arg(long = "token", required = true, value_parser = parse_address)]
		tokens: Vec<Address>,
		#[arg(long, default_value_t = 18)]
		decimals: u8,
	},
}

/// A contract call described on the command line.
#[derive(ClapArgs, Debug)]
struct CallArgs {
	/// Contract receiving the call
	#[arg(long, value_parser = parse_address)]
	to: Address,
	/// Function signature, e.g. "buyBlindBoxes(uint256)"
	#[arg(long)]
	signature: String,
	/// Function arguments in declaration order
	#[arg(long = "arg")]
	args: Vec<String>,
	/// Native value to attach, in wei
	#[arg(long, value_parser = parse_u256, default_value = "0")]
	value: U256,
}

/// Components shared by every command.
pub struct App {
	pub config: Config,
	pub view: WalletView,
	pub estimator: GasEstimator,
	pub reader: Arc<MulticallReader>,
	pub coordinator: TransactionCoordinator,
	pub actions: EventBus<ActionEvent>,
	observer: StopHandle,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file_async(config_path).await?;
	tracing::info!(chain_id = config.network.chain_id, "Loaded configuration");

	let app = build_app(config)?;
	let result = match args.command {
		Command::Quote {
			call,
			quantity,
			price,
		} => {
			let call = calls::build_call(call.to, &call.signature, &call.args, call.value)?;
			commands::quote(&app, call, quantity, price).await
		},
		Command::Balances {
			tokens,
			owner,
			decimals,
		} => commands::balances(&app, &tokens, owner, decimals).await,
		Command::Send {
			call,
			approve_token,
			approve_amount,
		} => {
			let target = call.to;
			let call = calls::build_call(target, &call.signature, &call.args, call.value)?;
			let approval = approve_token.zip(approve_amount);
			commands::send(&app, call, approval).await
		},
		Command::Watch { tokens, decimals } => commands::watch(&app, tokens, decimals).await,
	};

	app.observer.stop();
	result
}

/// Builds every component against the configured network.
fn build_app(config: Config) -> Result<App, Box<dyn std::error::Error>> {
	let chain = AlloyChain::new(&config.network, &config.account)?;
	let signer = chain.signer_address();
	let client = Arc::new(ChainClient::new(Box::new(chain)));

	let wallet = Arc::new(LocalWallet::new(client.clone()));
	if let Some(account) = signer {
		wallet.connect(account);
	}

	let wallet_events = EventBus::<WalletEvent>::new(16);
	spawn_wallet_log(&wallet_events);
	let account_observer = AccountObserver::new(wallet_events);
	let observer = account_observer.start(wallet.as_ref())?;
	let view = account_observer.view();

	let actions = EventBus::new(64);
	let coordinator = TransactionCoordinator::new(
		wallet,
		view.clone(),
		client.clone(),
		Arc::new(TracingNotifier),
		actions.clone(),
		&config.transactions,
	);

	Ok(App {
		estimator: GasEstimator::new(client.clone(), config.gas.clone()),
		reader: Arc::new(MulticallReader::new(client, config.multicall.clone())),
		config,
		view,
		coordinator,
		actions,
		observer,
	})
}

fn spawn_wallet_log(events: &EventBus<WalletEvent>) {
	let mut events = events.subscribe();
	tokio::spawn(async move {
		while let Ok(WalletEvent::AccountChanged { previous, current }) = events.recv().await {
			tracing::debug!(
				previous = ?previous.map(|a| truncate_id(&a.to_string())),
				current = ?current.map(|a| truncate_id(&a.to_string())),
				"Account changed"
			);
		}
	});
}
