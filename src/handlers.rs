use crate::aggregator::CreditScoreService;
use crate::chains::ChainId;
use crate::config::Config;
use crate::debank::DebankClient;
use crate::errors::AppError;
use crate::etherscan::EtherscanClient;
use crate::fetch_client::FetchClient;
use crate::models::*;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Caching fetch client shared by both providers.
    pub fetch: FetchClient,
    pub etherscan: EtherscanClient,
    pub debank: DebankClient,
    /// Credit score aggregator.
    pub scorer: CreditScoreService,
}

impl AppState {
    /// Wires both provider clients and the aggregator onto one fetch client.
    pub fn new(config: Config, fetch: FetchClient) -> Self {
        let etherscan = EtherscanClient::new(fetch.clone(), &config);
        let debank = DebankClient::new(fetch.clone(), &config);
        let scorer = CreditScoreService::new(etherscan.clone(), debank.clone());
        Self {
            config,
            fetch,
            etherscan,
            debank,
            scorer,
        }
    }
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "chain-credit-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::missing_parameter(name))
}

fn chain_or(chain_id: Option<u64>, default: ChainId) -> Result<ChainId, AppError> {
    match chain_id {
        Some(id) => ChainId::try_from(id).map_err(AppError::BadRequest),
        None => Ok(default),
    }
}

// ============ Credit score ============

/// POST /api/credit-score/calculate
///
/// Scores an address from the providers selected in the JSON body.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - `{address, selectedApis: {etherscan, debank}}`.
///
/// # Returns
///
/// * `Result<Json<CalculateScoreResponse>, AppError>` - Score, interpretation and data summary.
pub async fn calculate_score_post(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CalculateScoreRequest>,
) -> Result<Json<CalculateScoreResponse>, AppError> {
    tracing::info!("POST /credit-score/calculate - address: {:?}", payload.address);
    let response = state.scorer.calculate(payload).await?;
    Ok(Json(response))
}

/// GET /api/credit-score/calculate?address&etherscan&debank
///
/// Query form of the POST route. A provider flag is on only when it is exactly `true`.
pub async fn calculate_score_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CalculateScoreQuery>,
) -> Result<Json<CalculateScoreResponse>, AppError> {
    tracing::info!("GET /credit-score/calculate - params: {:?}", params);
    let response = state.scorer.calculate(params.into()).await?;
    Ok(Json(response))
}

// ============ Etherscan ============

/// GET /api/etherscan/balance
pub async fn etherscan_balance(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BalanceParams>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let tag = params.tag.unwrap_or_default();
    let chain = chain_or(params.chain_id, ChainId::ETHEREUM)?;

    let balance = state.etherscan.ether_balance(address, tag, chain).await?;

    Ok(Json(json!({
        "address": address,
        "balance": balance,
        "chainId": chain,
        "tag": tag,
    })))
}

/// GET /api/etherscan/transactions
///
/// Normal transactions with block range and pagination.
pub async fn etherscan_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TxListParams>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let chain = chain_or(params.chain_id, ChainId::ETHEREUM)?;
    let query = params.tx_query();

    let transactions = state
        .etherscan
        .normal_transactions(address, &query, chain)
        .await?;

    Ok(Json(list_response(address, "transactions", json!(transactions), &query, chain)))
}

/// GET /api/etherscan/internal-transactions
pub async fn etherscan_internal_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TxListParams>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let chain = chain_or(params.chain_id, ChainId::ETHEREUM)?;
    let query = params.tx_query();

    let transactions = state
        .etherscan
        .internal_transactions(address, &query, chain)
        .await?;

    Ok(Json(list_response(address, "transactions", json!(transactions), &query, chain)))
}

/// GET /api/etherscan/token-transfers
///
/// `tokenType` selects erc20 (default), erc721 or erc1155; `contractAddress` narrows to one token.
pub async fn etherscan_token_transfers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenTransferParams>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let chain = chain_or(params.chain_id, ChainId::ETHEREUM)?;
    let standard = params.token_type.unwrap_or_default();
    let query = params.tx_query();

    let transfers = state
        .etherscan
        .token_transfers(
            address,
            standard,
            params.contract_address.as_deref(),
            &query,
            chain,
        )
        .await?;

    let mut body = list_response(address, "transfers", json!(transfers), &query, chain);
    body["tokenType"] = json!(standard);
    Ok(Json(body))
}

/// GET /api/etherscan/bridge-transactions
///
/// Defaults to Polygon, 100 per page.
pub async fn etherscan_bridge_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BridgeParams>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let chain = chain_or(params.chain_id, ChainId::POLYGON)?;
    let page = params.page.unwrap_or(1);
    let offset = params.offset.unwrap_or(100);

    let transactions = state
        .etherscan
        .bridge_transactions(address, page, offset, chain)
        .await?;

    Ok(Json(json!({
        "address": address,
        "transactions": transactions,
        "pagination": { "page": page, "offset": offset },
        "chainId": chain,
    })))
}

/// GET /api/etherscan/plasma-deposits
///
/// Defaults to Polygon, 100 per page.
pub async fn etherscan_plasma_deposits(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BridgeParams>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let chain = chain_or(params.chain_id, ChainId::POLYGON)?;
    let page = params.page.unwrap_or(1);
    let offset = params.offset.unwrap_or(100);

    let deposits = state
        .etherscan
        .plasma_deposits(address, page, offset, chain)
        .await?;

    Ok(Json(json!({
        "address": address,
        "deposits": deposits,
        "pagination": { "page": page, "offset": offset },
        "chainId": chain,
    })))
}

/// GET /api/etherscan/l2-transactions
///
/// `type` is deposit (default) or withdrawal. Defaults to Optimism, 1000 per page.
pub async fn etherscan_l2_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<L2Params>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let chain = chain_or(params.chain_id, ChainId::OPTIMISM)?;
    let direction = params.direction.unwrap_or_default();
    let page = params.page.unwrap_or(1);
    let offset = params.offset.unwrap_or(1000);
    let sort = params.sort.unwrap_or_default();

    let transactions = match direction {
        L2Direction::Deposit => json!(
            state
                .etherscan
                .deposit_transactions(address, page, offset, sort, chain)
                .await?
        ),
        L2Direction::Withdrawal => json!(
            state
                .etherscan
                .withdrawal_transactions(address, page, offset, sort, chain)
                .await?
        ),
    };

    Ok(Json(json!({
        "address": address,
        "transactions": transactions,
        "transactionType": direction,
        "pagination": { "page": page, "offset": offset, "sort": sort },
        "chainId": chain,
    })))
}

fn list_response(address: &str, field: &str, items: Value, query: &TxQuery, chain: ChainId) -> Value {
    let mut body = json!({
        "address": address,
        "pagination": { "page": query.page, "offset": query.offset, "sort": query.sort },
        "blockRange": { "startBlock": query.start_block, "endBlock": query.end_block },
        "chainId": chain,
    });
    body[field] = items;
    body
}

// ============ DeBank ============

/// GET /api/debank/chains
///
/// `type=used` (default) lists chains the address has touched; `type=balance`
/// returns the total balance with its per-chain split.
pub async fn debank_chains(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebankParams<ChainsView>>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;

    let body = match params.view.unwrap_or_default() {
        ChainsView::Used => {
            let chains = state.debank.used_chains(address).await?;
            json!({ "address": address, "chains": chains, "type": "used" })
        }
        ChainsView::Balance => {
            let balances = state.debank.total_balance(address).await?;
            json!({ "address": address, "balances": balances, "type": "balance" })
        }
    };
    Ok(Json(body))
}

/// GET /api/debank/chain-balance
pub async fn debank_chain_balance(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebankParams<String>>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let chain_id = required(&params.chain_id, "ChainId")?;

    let balance = state.debank.chain_balance(address, chain_id).await?;

    Ok(Json(json!({
        "address": address,
        "chainId": chain_id,
        "balance": balance,
    })))
}

/// GET /api/debank/tokens
///
/// `type=list` (default, needs `chainId`), `type=balance` (needs `chainId` and
/// `tokenId`) or `type=all`.
pub async fn debank_tokens(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebankParams<TokensView>>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;

    let body = match params.view.unwrap_or_default() {
        TokensView::Balance => {
            let (Ok(chain_id), Ok(token_id)) = (
                required(&params.chain_id, "ChainId"),
                required(&params.token_id, "TokenId"),
            ) else {
                return Err(AppError::BadRequest(
                    "ChainId and TokenId parameters are required for token balance".to_string(),
                ));
            };
            let token = state
                .debank
                .token_balance(address, chain_id, token_id)
                .await?;
            json!({
                "address": address,
                "chainId": chain_id,
                "tokenId": token_id,
                "token": token,
                "type": "balance",
            })
        }
        TokensView::List => {
            let chain_id = required(&params.chain_id, "ChainId")?;
            let tokens = state.debank.token_list(address, chain_id).await?;
            json!({
                "address": address,
                "chainId": chain_id,
                "tokens": tokens,
                "type": "list",
            })
        }
        TokensView::All => {
            let tokens = state.debank.all_token_list(address).await?;
            json!({ "address": address, "tokens": tokens, "type": "all" })
        }
    };
    Ok(Json(body))
}

/// GET /api/debank/protocols
///
/// `type=single` (default, needs `protocolId`), `type=complex` (needs `chainId`)
/// or `type=complex-all`.
pub async fn debank_protocols(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebankParams<ProtocolsView>>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;

    let body = match params.view.unwrap_or_default() {
        ProtocolsView::Single => {
            let protocol_id = required(&params.protocol_id, "ProtocolId")?;
            let protocol = state.debank.protocol(address, protocol_id).await?;
            json!({ "address": address, "protocol": protocol, "type": "single" })
        }
        ProtocolsView::Complex => {
            let chain_id = required(&params.chain_id, "ChainId")?;
            let protocols = state
                .debank
                .complex_protocol_list(address, chain_id)
                .await?;
            json!({
                "address": address,
                "protocols": protocols,
                "chainId": chain_id,
                "type": "complex",
            })
        }
        ProtocolsView::ComplexAll => {
            let protocols = state.debank.all_complex_protocol_list(address).await?;
            json!({ "address": address, "protocols": protocols, "type": "complex-all" })
        }
    };
    Ok(Json(body))
}

/// GET /api/debank/nfts
pub async fn debank_nfts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebankParams<String>>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let nfts = state.debank.all_nft_list(address).await?;
    Ok(Json(json!({ "address": address, "nfts": nfts })))
}

/// GET /api/debank/history
///
/// `type=all` (default) or `type=chain` (needs `chainId`), with optional
/// `startTime` / `endTime` in unix seconds.
pub async fn debank_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebankParams<HistoryView>>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let view = params.view.unwrap_or_default();

    let chain_id = match view {
        HistoryView::Chain => Some(required(&params.chain_id, "ChainId")?),
        HistoryView::All => None,
    };

    let history = state
        .debank
        .history_list(address, chain_id, params.start_time, params.end_time)
        .await?;

    let mut body = json!({ "address": address, "history": history, "type": view });
    if let Some(chain_id) = chain_id {
        body["chainId"] = json!(chain_id);
    }
    if let (Some(start), Some(end)) = (params.start_time, params.end_time) {
        body["timeRange"] = json!({ "startTime": start, "endTime": end });
    }
    Ok(Json(body))
}

/// GET /api/debank/net-curve
///
/// `type=total` (default, optional comma-separated `chainIds`) or `type=chain`
/// (needs `chainId`).
pub async fn debank_net_curve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebankParams<NetCurveView>>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let view = params.view.unwrap_or_default();

    let body = match view {
        NetCurveView::Chain => {
            let chain_id = required(&params.chain_id, "ChainId")?;
            let net_curve = state.debank.chain_net_curve(address, chain_id).await?;
            json!({
                "address": address,
                "netCurve": net_curve,
                "type": view,
                "chainId": chain_id,
            })
        }
        NetCurveView::Total => {
            let chain_ids: Vec<String> = params
                .chain_ids
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
            let net_curve = state.debank.total_net_curve(address, &chain_ids).await?;
            let mut body = json!({ "address": address, "netCurve": net_curve, "type": view });
            if let Some(chain_ids) = &params.chain_ids {
                body["chainIds"] = json!(chain_ids);
            }
            body
        }
    };
    Ok(Json(body))
}

/// GET /api/debank/authorized
///
/// Token (default) or NFT approvals, optionally narrowed by `chainId`.
pub async fn debank_authorized(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebankParams<AuthorizedView>>,
) -> Result<Json<Value>, AppError> {
    let address = required(&params.address, "Address")?;
    let view = params.view.unwrap_or_default();
    let chain_id = params.chain_id.as_deref();

    let authorized = match view {
        AuthorizedView::Tokens => json!(
            state
                .debank
                .token_authorized_list(address, chain_id)
                .await?
        ),
        AuthorizedView::Nfts => json!(state.debank.nft_authorized_list(address, chain_id).await?),
    };

    Ok(Json(json!({
        "address": address,
        "authorized": authorized,
        "type": view,
    })))
}

// ============ Cache ============

/// DELETE /api/cache?pattern=
///
/// Drops cached provider responses, all of them or only keys containing `pattern`.
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClearCacheParams>,
) -> Json<Value> {
    let pattern = params.pattern.as_deref().filter(|p| !p.is_empty());
    state.fetch.clear_cache(pattern).await;

    Json(json!({
        "cleared": true,
        "pattern": pattern,
    }))
}
