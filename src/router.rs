use crate::handlers::{self, AppState};
use anyhow::Context;
use axum::{
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Request body cap for the `/api` routes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the full application router.
///
/// `/api/*` routes sit behind a per-IP rate limiter and a body size limit;
/// `/health` bypasses both. The limiter keys on the client IP, so the router
/// must be served with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let per_second = state.config.rate_limit_per_second.max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            // one token replenished every 1000/n ms gives n requests per second
            .per_millisecond((1000 / per_second).max(1))
            .burst_size(state.config.rate_limit_burst.max(1))
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .context("Invalid rate limiter configuration")?,
    );

    let api_routes = Router::new()
        // Credit score
        .route(
            "/api/credit-score/calculate",
            get(handlers::calculate_score_get).post(handlers::calculate_score_post),
        )
        // Etherscan pass-through
        .route("/api/etherscan/balance", get(handlers::etherscan_balance))
        .route(
            "/api/etherscan/transactions",
            get(handlers::etherscan_transactions),
        )
        .route(
            "/api/etherscan/internal-transactions",
            get(handlers::etherscan_internal_transactions),
        )
        .route(
            "/api/etherscan/token-transfers",
            get(handlers::etherscan_token_transfers),
        )
        .route(
            "/api/etherscan/bridge-transactions",
            get(handlers::etherscan_bridge_transactions),
        )
        .route(
            "/api/etherscan/plasma-deposits",
            get(handlers::etherscan_plasma_deposits),
        )
        .route(
            "/api/etherscan/l2-transactions",
            get(handlers::etherscan_l2_transactions),
        )
        // DeBank pass-through
        .route("/api/debank/chains", get(handlers::debank_chains))
        .route(
            "/api/debank/chain-balance",
            get(handlers::debank_chain_balance),
        )
        .route("/api/debank/tokens", get(handlers::debank_tokens))
        .route("/api/debank/protocols", get(handlers::debank_protocols))
        .route("/api/debank/nfts", get(handlers::debank_nfts))
        .route("/api/debank/history", get(handlers::debank_history))
        .route("/api/debank/net-curve", get(handlers::debank_net_curve))
        .route("/api/debank/authorized", get(handlers::debank_authorized))
        // Cache administration
        .route("/api/cache", delete(handlers::clear_cache))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
