//! DeBank Pro OpenAPI user endpoints.

use crate::circuit_breaker::{
    breaker_error, create_provider_circuit_breaker, is_provider_failure, ProviderCircuitBreaker,
};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::fetch_client::{FetchClient, RequestOptions};
use crate::models::*;
use failsafe::futures::CircuitBreaker;
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct DebankClient {
    fetch: FetchClient,
    base_url: String,
    access_key: String,
    breaker: ProviderCircuitBreaker,
}

impl DebankClient {
    pub fn new(fetch: FetchClient, config: &Config) -> Self {
        Self::with_base_url(
            fetch,
            config.debank_base_url.clone(),
            config.debank_api_key.clone(),
        )
    }

    pub fn with_base_url(
        fetch: FetchClient,
        base_url: impl Into<String>,
        access_key: impl Into<String>,
    ) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
            access_key: access_key.into(),
            breaker: create_provider_circuit_breaker(),
        }
    }

    pub async fn used_chains(&self, address: &str) -> Result<Vec<DebankUsedChain>, AppError> {
        self.call("/user/used_chain_list", address, vec![]).await
    }

    pub async fn chain_balance(
        &self,
        address: &str,
        chain_id: &str,
    ) -> Result<DebankChainBalance, AppError> {
        self.call(
            "/user/chain_balance",
            address,
            vec![("chain_id", chain_id.to_string())],
        )
        .await
    }

    pub async fn total_balance(&self, address: &str) -> Result<DebankTotalBalance, AppError> {
        self.call("/user/total_balance", address, vec![]).await
    }

    /// Positions held in one protocol.
    pub async fn protocol(
        &self,
        address: &str,
        protocol_id: &str,
    ) -> Result<DebankProtocol, AppError> {
        self.call(
            "/user/protocol",
            address,
            vec![("protocol_id", protocol_id.to_string())],
        )
        .await
    }

    pub async fn complex_protocol_list(
        &self,
        address: &str,
        chain_id: &str,
    ) -> Result<Vec<DebankProtocol>, AppError> {
        self.call(
            "/user/complex_protocol_list",
            address,
            vec![("chain_id", chain_id.to_string())],
        )
        .await
    }

    pub async fn all_complex_protocol_list(
        &self,
        address: &str,
    ) -> Result<Vec<DebankProtocol>, AppError> {
        self.call("/user/all_complex_protocol_list", address, vec![])
            .await
    }

    pub async fn token_balance(
        &self,
        address: &str,
        chain_id: &str,
        token_id: &str,
    ) -> Result<DebankToken, AppError> {
        self.call(
            "/user/token",
            address,
            vec![
                ("chain_id", chain_id.to_string()),
                ("token_id", token_id.to_string()),
            ],
        )
        .await
    }

    pub async fn token_list(
        &self,
        address: &str,
        chain_id: &str,
    ) -> Result<Vec<DebankToken>, AppError> {
        self.call(
            "/user/token_list",
            address,
            vec![("chain_id", chain_id.to_string())],
        )
        .await
    }

    pub async fn all_token_list(&self, address: &str) -> Result<Vec<DebankToken>, AppError> {
        self.call("/user/all_token_list", address, vec![]).await
    }

    pub async fn all_nft_list(&self, address: &str) -> Result<Vec<DebankNft>, AppError> {
        self.call("/user/all_nft_list", address, vec![]).await
    }

    /// Transaction history, on one chain when `chain_id` is given, otherwise on all.
    pub async fn history_list(
        &self,
        address: &str,
        chain_id: Option<&str>,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> Result<DebankHistory, AppError> {
        let mut params = Vec::new();
        if let Some(start) = start_time {
            params.push(("start_time", start.to_string()));
        }
        if let Some(end) = end_time {
            params.push(("end_time", end.to_string()));
        }

        match chain_id {
            Some(chain) => {
                params.insert(0, ("chain_id", chain.to_string()));
                self.call("/user/history_list", address, params).await
            }
            None => self.call("/user/all_history_list", address, params).await,
        }
    }

    /// 24h USD value curve on one chain.
    pub async fn chain_net_curve(
        &self,
        address: &str,
        chain_id: &str,
    ) -> Result<Vec<DebankNetCurvePoint>, AppError> {
        self.call(
            "/user/chain_net_curve",
            address,
            vec![("chain_id", chain_id.to_string())],
        )
        .await
    }

    /// 24h USD value curve across `chain_ids`, or every chain when empty.
    pub async fn total_net_curve(
        &self,
        address: &str,
        chain_ids: &[String],
    ) -> Result<Vec<DebankNetCurvePoint>, AppError> {
        let params = if chain_ids.is_empty() {
            vec![]
        } else {
            vec![("chain_ids", chain_ids.join(","))]
        };
        self.call("/user/total_net_curve", address, params).await
    }

    pub async fn token_authorized_list(
        &self,
        address: &str,
        chain_id: Option<&str>,
    ) -> Result<Vec<DebankAuthorizedToken>, AppError> {
        self.call("/user/token_authorized_list", address, chain_param(chain_id))
            .await
    }

    pub async fn nft_authorized_list(
        &self,
        address: &str,
        chain_id: Option<&str>,
    ) -> Result<DebankAuthorizedNfts, AppError> {
        self.call("/user/nft_authorized_list", address, chain_param(chain_id))
            .await
    }

    fn build_url(
        &self,
        endpoint: &str,
        address: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<String, AppError> {
        let mut pairs = vec![("id", address.to_string())];
        pairs.extend(params);

        reqwest::Url::parse_with_params(&format!("{}{}", self.base_url, endpoint), &pairs)
            .map(|url| url.to_string())
            .map_err(|e| AppError::InternalError(format!("Failed to build DeBank URL: {}", e)))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        address: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<T, AppError> {
        let url = self.build_url(endpoint, address, params)?;
        let options = RequestOptions::default().with_header("AccessKey", self.access_key.clone());

        tracing::info!("DeBank {} for {}", endpoint, address);

        self.breaker
            .call_with(is_provider_failure, self.fetch.get::<T>(&url, &options))
            .await
            .map_err(|e| breaker_error("DeBank", e))
            .with_context(|| format!("DeBank {} request failed", endpoint))
    }
}

fn chain_param(chain_id: Option<&str>) -> Vec<(&'static str, String)> {
    chain_id
        .filter(|c| !c.is_empty())
        .map(|c| vec![("chain_id", c.to_string())])
        .unwrap_or_default()
}
