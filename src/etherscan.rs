//! Etherscan v2 multichain account API.

use crate::chains::ChainId;
use crate::circuit_breaker::{
    breaker_error, create_provider_circuit_breaker, is_provider_failure, ProviderCircuitBreaker,
};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::fetch_client::{FetchClient, RequestOptions};
use crate::models::*;
use failsafe::futures::CircuitBreaker;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Messages Etherscan sends with `status: "0"` when a list is simply empty.
const EMPTY_RESULT_MESSAGES: &[&str] = &["No transactions found", "No records found"];

#[derive(Clone)]
pub struct EtherscanClient {
    fetch: FetchClient,
    base_url: String,
    api_key: String,
    breaker: ProviderCircuitBreaker,
}

impl EtherscanClient {
    pub fn new(fetch: FetchClient, config: &Config) -> Self {
        Self::with_base_url(
            fetch,
            config.etherscan_base_url.clone(),
            config.etherscan_api_key.clone(),
        )
    }

    pub fn with_base_url(
        fetch: FetchClient,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
            api_key: api_key.into(),
            breaker: create_provider_circuit_breaker(),
        }
    }

    /// Ether balance in wei, as the decimal string Etherscan returns.
    pub async fn ether_balance(
        &self,
        address: &str,
        tag: BalanceTag,
        chain: ChainId,
    ) -> Result<String, AppError> {
        self.call(
            "balance",
            chain,
            vec![
                ("address", address.to_string()),
                ("tag", tag.as_str().to_string()),
            ],
        )
        .await
    }

    pub async fn normal_transactions(
        &self,
        address: &str,
        query: &TxQuery,
        chain: ChainId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.call("txlist", chain, list_params(address, query)).await
    }

    pub async fn internal_transactions(
        &self,
        address: &str,
        query: &TxQuery,
        chain: ChainId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.call("txlistinternal", chain, list_params(address, query))
            .await
    }

    /// Transfer events of one token standard, optionally limited to a single contract.
    pub async fn token_transfers(
        &self,
        address: &str,
        standard: TokenStandard,
        contract: Option<&str>,
        query: &TxQuery,
        chain: ChainId,
    ) -> Result<Vec<TokenTransfer>, AppError> {
        let mut params = list_params(address, query);
        if let Some(contract) = contract.filter(|c| !c.is_empty()) {
            params.push(("contractaddress", contract.to_string()));
        }
        self.call(standard.action(), chain, params).await
    }

    pub async fn bridge_transactions(
        &self,
        address: &str,
        page: u32,
        offset: u32,
        chain: ChainId,
    ) -> Result<Vec<BridgeTransaction>, AppError> {
        self.call("txnbridge", chain, page_params(address, page, offset))
            .await
    }

    /// Plasma bridge deposits; only meaningful on Polygon.
    pub async fn plasma_deposits(
        &self,
        address: &str,
        page: u32,
        offset: u32,
        chain: ChainId,
    ) -> Result<Vec<PlasmaDeposit>, AppError> {
        self.call("txnbridge", chain, page_params(address, page, offset))
            .await
    }

    pub async fn deposit_transactions(
        &self,
        address: &str,
        page: u32,
        offset: u32,
        sort: SortOrder,
        chain: ChainId,
    ) -> Result<Vec<L2DepositTransaction>, AppError> {
        let mut params = page_params(address, page, offset);
        params.push(("sort", sort.as_str().to_string()));
        self.call("getdeposittxs", chain, params).await
    }

    pub async fn withdrawal_transactions(
        &self,
        address: &str,
        page: u32,
        offset: u32,
        sort: SortOrder,
        chain: ChainId,
    ) -> Result<Vec<L2WithdrawalTransaction>, AppError> {
        let mut params = page_params(address, page, offset);
        params.push(("sort", sort.as_str().to_string()));
        self.call("getwithdrawaltxs", chain, params).await
    }

    fn build_url(
        &self,
        action: &str,
        chain: ChainId,
        params: Vec<(&'static str, String)>,
    ) -> Result<String, AppError> {
        let mut pairs = vec![
            ("chainid", chain.to_string()),
            ("module", "account".to_string()),
            ("action", action.to_string()),
        ];
        pairs.extend(params);
        pairs.push(("apikey", self.api_key.clone()));

        reqwest::Url::parse_with_params(&self.base_url, &pairs)
            .map(|url| url.to_string())
            .map_err(|e| AppError::InternalError(format!("Failed to build Etherscan URL: {}", e)))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        chain: ChainId,
        params: Vec<(&'static str, String)>,
    ) -> Result<T, AppError> {
        let url = self.build_url(action, chain, params)?;
        let options = RequestOptions::default();

        tracing::info!("Etherscan {} on chain {} ({})", action, chain, chain.name());

        let envelope: EtherscanEnvelope = self
            .breaker
            .call_with(
                is_provider_failure,
                self.fetch.get::<EtherscanEnvelope>(&url, &options),
            )
            .await
            .map_err(|e| breaker_error("Etherscan", e))
            .with_context(|| format!("Etherscan {} request failed", action))?;

        let result = decode_envelope(envelope, action);
        if result.is_err() {
            // 200 responses are cached; an error envelope must not be served again
            self.fetch.clear_cache(Some(&url)).await;
        }
        result
    }
}

/// Unwraps `result` from an Etherscan envelope.
///
/// `status` other than `"1"` is an upstream error unless the message says the
/// list is empty, in which case `T` is decoded from an empty array.
pub fn decode_envelope<T: DeserializeOwned>(
    envelope: EtherscanEnvelope,
    action: &str,
) -> Result<T, AppError> {
    let payload = if envelope.status == "1" {
        envelope.result
    } else if EMPTY_RESULT_MESSAGES.contains(&envelope.message.as_str()) {
        tracing::debug!("Etherscan {}: {}", action, envelope.message);
        Value::Array(Vec::new())
    } else {
        let detail = match &envelope.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        tracing::warn!(
            "Etherscan {} returned status {}: {} ({})",
            action,
            envelope.status,
            envelope.message,
            detail
        );
        return Err(AppError::ExternalApiError(format!(
            "Etherscan {} error: {} ({})",
            action, envelope.message, detail
        )));
    };

    serde_json::from_value(payload).map_err(|e| {
        AppError::ExternalApiError(format!("Failed to parse Etherscan {} result: {}", action, e))
    })
}

fn list_params(address: &str, query: &TxQuery) -> Vec<(&'static str, String)> {
    vec![
        ("address", address.to_string()),
        ("startblock", query.start_block.to_string()),
        ("endblock", query.end_block.to_string()),
        ("page", query.page.to_string()),
        ("offset", query.offset.to_string()),
        ("sort", query.sort.as_str().to_string()),
    ]
}

fn page_params(address: &str, page: u32, offset: u32) -> Vec<(&'static str, String)> {
    vec![
        ("address", address.to_string()),
        ("page", page.to_string()),
        ("offset", offset.to_string()),
    ]
}
