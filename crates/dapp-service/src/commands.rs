//! Command handlers.
//!
//! Results go to stdout as JSON so they can be piped; logs go to stderr.

use crate::App;
use dapp_core::ApprovalPlanner;
use dapp_gas::QuoteRequest;
use dapp_multicall::BatchSnapshot;
use dapp_types::{
	format_units, ActionEvent, Address, ContractCall, ReadOutcome, ReadOutcomeExt, ReadSpec, U256,
};
use serde_json::{json, Value};
use std::error::Error;

type CommandResult = Result<(), Box<dyn Error>>;

pub async fn quote(app: &App, call: ContractCall, quantity: u64, price: Option<U256>) -> CommandResult {
	let request = match price {
		Some(price) => QuoteRequest::new(call, quantity, price),
		None => QuoteRequest::for_payable(call, quantity),
	};
	let quote = app.coordinator.preflight(&app.estimator, &request).await;
	if !quote.is_ready() {
		tracing::warn!("Quote not ready: needs a configured account, a quantity and a price");
	}

	let breakdown = quote.cost_breakdown(request.value);
	print_json(&json!({
		"quote": quote,
		"breakdown": breakdown,
	}))
}

pub async fn balances(
	app: &App,
	tokens: &[Address],
	owner: Option<Address>,
	decimals: u8,
) -> CommandResult {
	let outcomes = match owner {
		Some(owner) => {
			let reads: Vec<ReadSpec> = tokens
				.iter()
				.map(|token| ReadSpec::balance_of(*token, owner))
				.collect();
			app.reader.batch(&reads).await
		},
		None => {
			if !app.view.is_connected() {
				return Err("No account configured; pass --owner".into());
			}
			app.reader.balances(&app.view, tokens).await
		},
	};
	print_json(&balances_json(tokens, &outcomes, decimals))
}

pub async fn send(
	app: &App,
	call: ContractCall,
	approval: Option<(Address, U256)>,
) -> CommandResult {
	let calls = match approval {
		Some((token, amount)) => {
			let planner = ApprovalPlanner::new(app.reader.clone());
			let target = call.target;
			planner.plan(&app.view, token, target, amount, call).await?
		},
		None => vec![call],
	};

	for call in &calls {
		let quote = app
			.coordinator
			.preflight(&app.estimator, &QuoteRequest::for_payable(call.clone(), 1))
			.await;
		if !quote.is_ready() {
			continue;
		}
		tracing::info!(
			method = call.method_name(),
			fee = %format_units(quote.total_fee, 18),
			source = ?quote.source,
			"Estimated fee"
		);
	}

	let mut events = app.actions.subscribe();
	tokio::spawn(async move {
		while let Ok(event) = events.recv().await {
			if let ActionEvent::Submitted { tx_hash, .. } = event {
				tracing::info!(tx_hash = %tx_hash, "Transaction broadcast");
			}
		}
	});

	let receipts = app.coordinator.submit_sequence(calls).await?;
	print_json(&json!({ "receipts": receipts }))
}

pub async fn watch(app: &App, tokens: Vec<Address>, decimals: u8) -> CommandResult {
	if !app.view.is_connected() {
		return Err("No account configured".into());
	}
	tracing::info!(
		every_secs = app.config.multicall.refresh_interval_seconds,
		"Watching balances"
	);

	let price_refresh = app.estimator.spawn_price_refresh();
	let mut subscription = app.reader.watch_balances(app.view.clone(), tokens.clone());
	loop {
		tokio::select! {
			snapshot = subscription.changed() => match snapshot {
				Some(BatchSnapshot { outcomes, fetched_at }) => {
					let gas_price = app.estimator.current_price().await;
					let mut line = balances_json(&tokens, &outcomes, decimals);
					line["fetched_at"] = json!(fetched_at);
					line["gas_price"] = json!(gas_price.price);
					print_json(&line)?;
				},
				None => break,
			},
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Interrupted");
				break;
			},
		}
	}
	subscription.stop();
	price_refresh.stop();
	Ok(())
}

fn balances_json(tokens: &[Address], outcomes: &[ReadOutcome], decimals: u8) -> Value {
	let entries: Vec<Value> = tokens
		.iter()
		.zip(outcomes)
		.map(|(token, outcome)| match outcome.as_u256() {
			Ok(amount) => json!({
				"token": token,
				"balance": format_units(amount, decimals),
			}),
			Err(e) => json!({
				"token": token,
				"error": e.to_string(),
			}),
		})
		.collect();
	json!({ "balances": entries })
}

fn print_json(value: &Value) -> CommandResult {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use dapp_types::{Bytes, ErrorKind};

	#[test]
	fn test_balances_json_keeps_entries_apart() {
		let tokens = [Address::repeat_byte(1), Address::ZERO];
		let outcomes: Vec<ReadOutcome> = vec![
			Ok(Bytes::from(U256::from(1_500_000u64).to_be_bytes::<32>().to_vec())),
			Err(ErrorKind::Unavailable),
		];

		let value = balances_json(&tokens, &outcomes, 6);
		let entries = value["balances"].as_array().unwrap();
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[0]["balance"], "1.5");
		assert_eq!(entries[1]["error"], "Contract unavailable");
	}
}
