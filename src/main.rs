use chain_credit_api::config::Config;
use chain_credit_api::fetch_client::{FetchClient, FetchSettings};
use chain_credit_api::handlers::AppState;
use chain_credit_api::router::build_router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - The shared fetch client and its optional cache sweeper.
/// - Provider clients and the credit score aggregator.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chain_credit_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let fetch = FetchClient::new(FetchSettings::from(&config))?;
    tracing::info!(
        "Fetch client initialized ({}s TTL, {} retries, {:?} timeout)",
        config.cache_ttl_secs,
        config.fetch_retries,
        config.fetch_timeout()
    );

    if let Some(interval) = config.cache_sweep_interval() {
        fetch.spawn_sweeper(interval);
        tracing::info!("Cache sweeper running every {:?}", interval);
    }

    // Build application state
    let app_state = Arc::new(AppState::new(config.clone(), fetch));
    let app = build_router(app_state)?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
