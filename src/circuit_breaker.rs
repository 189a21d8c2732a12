use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

use crate::errors::AppError;
use crate::fetch_client::FetchError;

/// Circuit breaker guarding one upstream provider.
pub type ProviderCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Consecutive failed calls (after the fetch client's own retries) that open the circuit.
pub const PROVIDER_FAILURE_THRESHOLD: u32 = 5;

/// Creates a circuit breaker for a provider client to stop hammering an upstream that is down.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast.
/// - **HALF_OPEN**: Testing if service recovered.
///
/// The breaker is `Clone`; clones share state, so every handle of a provider
/// client sees the same circuit.
pub fn create_provider_circuit_breaker() -> ProviderCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy =
        failure_policy::consecutive_failures(PROVIDER_FAILURE_THRESHOLD, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// Whether a fetch error says something about the provider's health.
///
/// 4xx responses and undecodable bodies come from the request or the payload
/// shape, so they pass through without moving the breaker toward OPEN.
pub fn is_provider_failure(err: &FetchError) -> bool {
    match err {
        FetchError::Status { status, .. } => *status >= 500,
        FetchError::Transport(_) | FetchError::Timeout(_) => true,
        FetchError::Decode(_) => false,
    }
}

/// Maps the outcome of a guarded fetch to an `AppError`, naming the provider when the circuit is open.
pub fn breaker_error(provider: &str, err: failsafe::Error<FetchError>) -> AppError {
    match err {
        failsafe::Error::Inner(e) => AppError::from(e),
        failsafe::Error::Rejected => {
            tracing::warn!("{} circuit open, failing fast", provider);
            AppError::ExternalApiError(format!("{} temporarily unavailable (circuit open)", provider))
        }
    }
}
