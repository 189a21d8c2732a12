//! Chain Credit API Library
//!
//! Scores blockchain addresses on a 300-850 credit scale from Etherscan and
//! DeBank data, and exposes both providers through a cached HTTP API.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `domain`: Scoring and aggregation.
//! - `integrations`: Upstream provider clients.
//! - `aggregator`: Credit score fan-out and degradation.
//! - `cache_validator`: Checksummed cache entries.
//! - `chains`: Supported chain ids.
//! - `circuit_breaker`: Per-provider circuit breakers.
//! - `config`: Configuration management.
//! - `debank`: DeBank Pro OpenAPI client.
//! - `errors`: Error handling types.
//! - `etherscan`: Etherscan v2 client.
//! - `fetch_client`: Caching, coalescing, retrying HTTP client.
//! - `handlers`: HTTP request handlers.
//! - `models`: Provider payloads and API DTOs.
//! - `router`: Route table and middleware.
//! - `scoring`: Credit score engine.

pub mod api;
pub mod domain;
pub mod integrations;

pub mod aggregator;
pub mod cache_validator;
pub mod chains;
pub mod circuit_breaker;
pub mod config;
pub mod debank;
pub mod errors;
pub mod etherscan;
pub mod fetch_client;
pub mod handlers;
pub mod models;
pub mod router;
pub mod scoring;
