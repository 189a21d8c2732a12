//! Scores one address from the command line and prints the JSON response.
//!
//! Usage: `score_address <address> [--etherscan] [--debank]`
//!
//! With neither flag both providers are queried.

use chain_credit_api::config::Config;
use chain_credit_api::fetch_client::{FetchClient, FetchSettings};
use chain_credit_api::handlers::AppState;
use chain_credit_api::models::{CalculateScoreRequest, SelectedApis};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chain_credit_api=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut address = None;
    let mut selected = SelectedApis::default();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--etherscan" => selected.etherscan = true,
            "--debank" => selected.debank = true,
            flag if flag.starts_with("--") => anyhow::bail!("Unknown flag: {}", flag),
            value => address = Some(value.to_string()),
        }
    }
    if !selected.etherscan && !selected.debank {
        selected = SelectedApis {
            etherscan: true,
            debank: true,
        };
    }

    let Some(address) = address else {
        anyhow::bail!("Usage: score_address <address> [--etherscan] [--debank]");
    };

    let config = Config::from_env()?;
    let fetch = FetchClient::new(FetchSettings::from(&config))?;
    let state = AppState::new(config, fetch);

    let response = state
        .scorer
        .calculate(CalculateScoreRequest {
            address: Some(address),
            selected_apis: selected,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.data_used.failed_slices.is_empty() {
        eprintln!(
            "warning: scored without {}",
            response.data_used.failed_slices.join(", ")
        );
    }

    Ok(())
}
