use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ETHERSCAN_BASE_URL: &str = "https://api.etherscan.io/v2/api";
pub const DEFAULT_DEBANK_BASE_URL: &str = "https://pro-openapi.debank.com/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub etherscan_base_url: String,
    pub etherscan_api_key: String,
    pub debank_base_url: String,
    pub debank_api_key: String,
    pub fetch_timeout_ms: u64,
    pub fetch_retries: u32,
    pub fetch_backoff_base_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: Option<u64>, // None keeps the cache unbounded
    pub cache_sweep_secs: Option<u64>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            etherscan_base_url: DEFAULT_ETHERSCAN_BASE_URL.to_string(),
            etherscan_api_key: String::new(),
            debank_base_url: DEFAULT_DEBANK_BASE_URL.to_string(),
            debank_api_key: String::new(),
            fetch_timeout_ms: 10_000,
            fetch_retries: 2,
            fetch_backoff_base_ms: 100,
            cache_ttl_secs: 30,
            cache_max_entries: None,
            cache_sweep_secs: None,
            rate_limit_per_second: 10,
            rate_limit_burst: 20,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        _ => Ok(default),
    }
}

fn parse_optional_var<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        _ => Ok(None),
    }
}

fn base_url_var(name: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            etherscan_base_url: base_url_var("ETHERSCAN_BASE_URL", DEFAULT_ETHERSCAN_BASE_URL)?,
            // Providers accept anonymous calls at a lower rate, so an empty key is allowed
            etherscan_api_key: std::env::var("ETHERSCAN_API_KEY").unwrap_or_default(),
            debank_base_url: base_url_var("DEBANK_BASE_URL", DEFAULT_DEBANK_BASE_URL)?,
            debank_api_key: std::env::var("DEBANK_API_KEY").unwrap_or_default(),
            fetch_timeout_ms: parse_var("FETCH_TIMEOUT_MS", defaults.fetch_timeout_ms)?,
            fetch_retries: parse_var("FETCH_RETRIES", defaults.fetch_retries)?,
            fetch_backoff_base_ms: parse_var(
                "FETCH_BACKOFF_BASE_MS",
                defaults.fetch_backoff_base_ms,
            )?,
            cache_ttl_secs: parse_var("CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            cache_max_entries: parse_optional_var("CACHE_MAX_ENTRIES")?,
            cache_sweep_secs: parse_optional_var("CACHE_SWEEP_SECS")?,
            rate_limit_per_second: parse_var(
                "RATE_LIMIT_PER_SECOND",
                defaults.rate_limit_per_second,
            )?,
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", defaults.rate_limit_burst)?,
        };

        if config.fetch_timeout_ms == 0 {
            anyhow::bail!("FETCH_TIMEOUT_MS cannot be zero");
        }
        if config.rate_limit_per_second == 0 || config.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be positive");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Etherscan Base URL: {}", config.etherscan_base_url);
        tracing::debug!("DeBank Base URL: {}", config.debank_base_url);
        if config.etherscan_api_key.is_empty() {
            tracing::warn!("ETHERSCAN_API_KEY not set, Etherscan calls will be rate limited");
        }
        if config.debank_api_key.is_empty() {
            tracing::warn!("DEBANK_API_KEY not set, DeBank calls will be rejected upstream");
        }
        tracing::debug!(
            "Fetch: timeout={}ms retries={} backoff_base={}ms cache_ttl={}s",
            config.fetch_timeout_ms,
            config.fetch_retries,
            config.fetch_backoff_base_ms,
            config.cache_ttl_secs
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.fetch_backoff_base_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_sweep_interval(&self) -> Option<Duration> {
        self.cache_sweep_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
