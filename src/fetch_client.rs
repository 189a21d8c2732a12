//! Caching, coalescing, retrying HTTP GET client used for every provider call.
//!
//! A `FetchClient` is built once per process and shared by handle. It owns
//! two pieces of state:
//!
//! - a TTL cache of raw JSON payloads keyed by URL plus serialized options,
//! - a map of in-flight requests so that concurrent identical calls share a
//!   single network round trip.
//!
//! Failed requests are retried with exponential backoff, except timeouts,
//! which fail immediately. Failures are never cached.
//!
//! Each network request runs on its own task, so it completes and clears its
//! in-flight marker even when every caller waiting on it has gone away.

use crate::cache_validator::ValidatedCacheEntry;
use crate::config::Config;
use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Errors surfaced by [`FetchClient::get`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid JSON payload: {0}")]
    Decode(String),
}

impl FetchError {
    /// Non-2xx status or transport failure.
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Status { .. } | FetchError::Transport(_))
    }

    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Per-call overrides. Unset fields fall back to the client's [`FetchSettings`].
///
/// The whole struct is serialized into the cache key, so two calls to the
/// same URL with different headers are cached separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub cache: bool,
    pub cache_ttl: Option<Duration>,
    pub headers: BTreeMap<String, String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            retries: None,
            cache: true,
            cache_ttl: None,
            headers: BTreeMap::new(),
        }
    }
}

impl RequestOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Client-wide defaults.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff_base: Duration,
    pub cache_ttl: Duration,
    /// Upper bound on cached entries; `None` leaves the cache unbounded.
    pub max_entries: Option<u64>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 2,
            backoff_base: Duration::from_millis(100),
            cache_ttl: Duration::from_secs(30),
            max_entries: None,
        }
    }
}

impl From<&Config> for FetchSettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.fetch_timeout(),
            retries: config.fetch_retries,
            backoff_base: config.backoff_base(),
            cache_ttl: config.cache_ttl(),
            max_entries: config.cache_max_entries,
        }
    }
}

type PendingFetch = Shared<BoxFuture<'static, Result<Arc<String>, FetchError>>>;

struct Inner {
    http: reqwest::Client,
    settings: FetchSettings,
    cache: Cache<String, ValidatedCacheEntry>,
    in_flight: Mutex<HashMap<String, PendingFetch>>,
}

#[derive(Clone)]
pub struct FetchClient {
    inner: Arc<Inner>,
}

impl FetchClient {
    /// Creates a new `FetchClient` with its own connection pool.
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_http_client(http, settings))
    }

    pub fn with_http_client(http: reqwest::Client, settings: FetchSettings) -> Self {
        let mut builder = Cache::builder();
        if let Some(max) = settings.max_entries {
            builder = builder.max_capacity(max);
        }

        Self {
            inner: Arc::new(Inner {
                http,
                settings,
                cache: builder.build(),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.inner.settings
    }

    /// GETs `url` and decodes the JSON body into `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<T, FetchError> {
        let body = self.get_raw(url, options).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// GETs `url` and returns the raw JSON body, going through cache and coalescing.
    pub async fn get_raw(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Arc<String>, FetchError> {
        let key = cache_key(url, options);

        if options.cache {
            if let Some(body) = self.cached(&key).await {
                tracing::debug!("Fetch cache HIT: {}", redact_url(url));
                return Ok(body);
            }
        }

        let pending = {
            let mut in_flight = self.inner.in_flight.lock().await;

            // A request may have completed between the first lookup and taking the lock
            if options.cache {
                if let Some(body) = self.cached(&key).await {
                    return Ok(body);
                }
            }

            match in_flight.get(&key) {
                Some(pending) => {
                    tracing::debug!("Joining in-flight request: {}", redact_url(url));
                    pending.clone()
                }
                None => {
                    tracing::debug!("Fetch cache MISS: {}", redact_url(url));
                    let task = tokio::spawn(Inner::execute(
                        self.inner.clone(),
                        key.clone(),
                        url.to_string(),
                        options.clone(),
                    ));
                    let pending = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(FetchError::Transport(format!("Fetch task failed: {}", e)))
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    async fn cached(&self, key: &str) -> Option<Arc<String>> {
        let entry = self.inner.cache.get(key).await?;
        match entry.live_body() {
            Some(body) => Some(body),
            None => {
                self.inner.evict_if_stale(key).await;
                None
            }
        }
    }

    /// Drops every cached entry, or only those whose key contains `pattern`.
    ///
    /// Requests already in flight are left alone.
    pub async fn clear_cache(&self, pattern: Option<&str>) {
        match pattern {
            None => {
                self.inner.cache.invalidate_all();
                tracing::info!("Fetch cache cleared");
            }
            Some(pattern) => {
                let keys: Vec<Arc<String>> = self
                    .inner
                    .cache
                    .iter()
                    .filter(|(key, _)| key.contains(pattern))
                    .map(|(key, _)| key)
                    .collect();
                for key in &keys {
                    self.inner.cache.invalidate(key.as_str()).await;
                }
                tracing::info!(
                    "Fetch cache cleared {} entries matching '{}'",
                    keys.len(),
                    pattern
                );
            }
        }
    }

    /// Removes entries whose TTL has elapsed. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let expired: Vec<Arc<String>> = self
            .inner
            .cache
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key)
            .collect();
        let mut removed = 0;
        for key in &expired {
            if self.inner.evict_if_stale(key.as_str()).await {
                removed += 1;
            }
        }
        removed
    }

    /// Runs [`sweep_expired`](Self::sweep_expired) every `interval` until the client is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    tracing::debug!("Fetch client dropped, stopping cache sweeper");
                    break;
                };
                let removed = FetchClient { inner }.sweep_expired().await;
                if removed > 0 {
                    tracing::debug!("Cache sweeper removed {} expired entries", removed);
                }
            }
        })
    }

    /// Number of stored entries, including expired ones not yet read or swept.
    pub async fn cached_entries(&self) -> u64 {
        self.inner.cache.run_pending_tasks().await;
        self.inner.cache.entry_count()
    }

    pub async fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().await.len()
    }
}

impl Inner {
    /// Body of a shared in-flight request. Stores successes in the cache before
    /// clearing the in-flight marker so late callers always find one or the other.
    async fn execute(
        inner: Arc<Inner>,
        key: String,
        url: String,
        options: RequestOptions,
    ) -> Result<Arc<String>, FetchError> {
        let result = inner.fetch_with_retries(&url, &options).await;

        if let Ok(body) = &result {
            if options.cache {
                let ttl = options.cache_ttl.unwrap_or(inner.settings.cache_ttl);
                let fresh = ValidatedCacheEntry::new(body.clone(), ttl);
                inner
                    .cache
                    .entry(key.clone())
                    .and_compute_with(|_| std::future::ready(Op::Put(fresh)))
                    .await;
            }
        }

        inner.in_flight.lock().await.remove(&key);
        result
    }

    /// Removes the entry under `key` only if the stored entry is not live.
    ///
    /// Runs under moka's per-key compute lock, so an entry written by a
    /// concurrent `execute` is never dropped by a stale read.
    async fn evict_if_stale(&self, key: &str) -> bool {
        let result = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().live_body().is_none() => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        matches!(result, CompResult::Removed(_))
    }

    async fn fetch_with_retries(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Arc<String>, FetchError> {
        let retries = options.retries.unwrap_or(self.settings.retries);
        let timeout = options.timeout.unwrap_or(self.settings.timeout);
        let mut last_error = None;

        for attempt in 0..=retries {
            match self.attempt(url, options, timeout).await {
                Ok(body) => {
                    if attempt > 0 {
                        tracing::info!(
                            "✓ {} succeeded on attempt {}",
                            redact_url(url),
                            attempt + 1
                        );
                    }
                    return Ok(Arc::new(body));
                }
                Err(FetchError::Timeout(after)) => {
                    tracing::warn!("{} timed out after {:?}, not retrying", redact_url(url), after);
                    return Err(FetchError::Timeout(after));
                }
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        retries + 1,
                        redact_url(url),
                        e
                    );
                    if attempt < retries {
                        tokio::time::sleep(backoff_delay(self.settings.backoff_base, attempt))
                            .await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Transport("Request failed".to_string())))
    }

    async fn attempt(
        &self,
        url: &str,
        options: &RequestOptions,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "max-age=30");
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let call = async move {
            let response = request
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(e, timeout))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    message: error_text.chars().take(200).collect(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(e, timeout))?;
            serde_json::from_str::<IgnoredAny>(&body)
                .map_err(|e| FetchError::Decode(e.to_string()))?;
            Ok(body)
        };

        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
    }
}

/// Cache and coalescing key: URL plus the serialized option set.
pub fn cache_key(url: &str, options: &RequestOptions) -> String {
    format!(
        "{}:{}",
        url,
        serde_json::to_string(options).unwrap_or_default()
    )
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Replaces the `apikey` query value so URLs can be logged.
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.query_pairs().any(|(k, _)| k.eq_ignore_ascii_case("apikey")) {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let value = if k.eq_ignore_ascii_case("apikey") {
                "REDACTED".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}
