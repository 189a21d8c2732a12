//! Blockchain credit score engine.
//!
//! Maps on-chain activity to five 0-100 sub-scores, a weighted 0-100 overall
//! score and a final score on the familiar 300-850 credit scale:
//!
//! | sub-score  | input                        | full marks at |
//! |------------|------------------------------|---------------|
//! | activity   | transaction count            | 100           |
//! | diversity  | distinct tokens held         | 50            |
//! | longevity  | account age in days          | 365           |
//! | value      | portfolio value in USD       | 100 000       |
//! | protocol   | DeFi protocol positions      | 20            |
//!
//! Everything here is pure and total: missing data is zero, and every input
//! produces a fully populated [`CreditScore`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::models::{DebankNft, DebankProtocol, DebankToken, DebankUsedChain, Transaction};

const ACTIVITY_FULL_MARKS: f64 = 100.0;
const DIVERSITY_FULL_MARKS: f64 = 50.0;
const LONGEVITY_FULL_MARKS: f64 = 365.0;
const VALUE_FULL_MARKS: f64 = 100_000.0;
const PROTOCOL_FULL_MARKS: f64 = 20.0;

const ACTIVITY_WEIGHT: f64 = 0.25;
const DIVERSITY_WEIGHT: f64 = 0.20;
const LONGEVITY_WEIGHT: f64 = 0.15;
const VALUE_WEIGHT: f64 = 0.25;
const PROTOCOL_WEIGHT: f64 = 0.15;

pub const MIN_CREDIT_SCORE: u32 = 300;
pub const MAX_CREDIT_SCORE: u32 = 850;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Aggregated activity for one address, built from normalized provider data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityMetrics {
    pub transaction_count: usize,
    /// Distinct lowercased token contract identifiers across holdings, all chains combined.
    pub token_ids: HashSet<String>,
    pub chain_count: usize,
    pub protocol_count: usize,
    pub nft_count: usize,
    /// Unix seconds of the oldest known transaction.
    pub oldest_transaction_at: Option<i64>,
    pub total_usd_value: f64,
}

impl ActivityMetrics {
    pub fn from_sources(
        holdings: &[DebankToken],
        transactions: &[Transaction],
        protocols: &[DebankProtocol],
        chains: &[DebankUsedChain],
        nfts: &[DebankNft],
    ) -> Self {
        let token_ids = holdings
            .iter()
            .filter(|token| !token.id.is_empty())
            .map(|token| token.id.to_lowercase())
            .collect();

        let total_usd_value = holdings
            .iter()
            .map(DebankToken::usd_value)
            .filter(|value| value.is_finite() && *value > 0.0)
            .sum();

        // Unparseable timestamps are skipped rather than poisoning the minimum
        let oldest_transaction_at = transactions
            .iter()
            .filter_map(|tx| tx.time_stamp.trim().parse::<i64>().ok())
            .min();

        Self {
            transaction_count: transactions.len(),
            token_ids,
            chain_count: chains.len(),
            protocol_count: protocols.len(),
            nft_count: nfts.len(),
            oldest_transaction_at,
            total_usd_value,
        }
    }

    /// Whole days between the oldest transaction and `now`; 0 without transactions.
    pub fn account_age_days(&self, now: DateTime<Utc>) -> u64 {
        match self.oldest_transaction_at {
            Some(oldest) => {
                let elapsed = now.timestamp().saturating_sub(oldest);
                if elapsed <= 0 {
                    0
                } else {
                    (elapsed / SECONDS_PER_DAY) as u64
                }
            }
            None => 0,
        }
    }

    /// Snapshot of the scalar factors as of `now`.
    pub fn factors_at(&self, now: DateTime<Utc>) -> ScoreFactors {
        ScoreFactors {
            total_transactions: self.transaction_count,
            unique_tokens: self.token_ids.len(),
            active_chains: self.chain_count,
            protocol_interactions: self.protocol_count,
            nft_count: self.nft_count,
            account_age_days: self.account_age_days(now),
            total_value: self.total_usd_value,
        }
    }
}

/// The scalar inputs of [`calculate_score`], echoed back in the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactors {
    pub total_transactions: usize,
    pub unique_tokens: usize,
    pub active_chains: usize,
    pub protocol_interactions: usize,
    pub nft_count: usize,
    #[serde(rename = "accountAge")]
    pub account_age_days: u64,
    pub total_value: f64,
}

/// Rounded 0-100 sub-scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub activity: u32,
    pub diversity: u32,
    pub longevity: u32,
    pub value: u32,
    pub protocol: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditScore {
    /// Weighted 0-100 score.
    pub overall: u32,
    pub breakdown: ScoreBreakdown,
    pub factors: ScoreFactors,
    /// Final 300-850 score.
    pub credit_score: u32,
}

impl CreditScore {
    pub fn interpretation(&self) -> Interpretation {
        interpret_score(self.credit_score)
    }
}

/// `min(100, value / full_marks * 100)`, rounded. Negative and NaN inputs score 0.
fn sub_score(value: f64, full_marks: f64) -> u32 {
    let raw = value / full_marks * 100.0;
    if raw.is_nan() || raw <= 0.0 {
        0
    } else {
        raw.min(100.0).round() as u32
    }
}

/// Scores a set of factors. Pure and total.
pub fn calculate_score(factors: &ScoreFactors) -> CreditScore {
    let breakdown = ScoreBreakdown {
        activity: sub_score(factors.total_transactions as f64, ACTIVITY_FULL_MARKS),
        diversity: sub_score(factors.unique_tokens as f64, DIVERSITY_FULL_MARKS),
        longevity: sub_score(factors.account_age_days as f64, LONGEVITY_FULL_MARKS),
        value: sub_score(factors.total_value, VALUE_FULL_MARKS),
        protocol: sub_score(factors.protocol_interactions as f64, PROTOCOL_FULL_MARKS),
    };

    let weighted = breakdown.activity as f64 * ACTIVITY_WEIGHT
        + breakdown.diversity as f64 * DIVERSITY_WEIGHT
        + breakdown.longevity as f64 * LONGEVITY_WEIGHT
        + breakdown.value as f64 * VALUE_WEIGHT
        + breakdown.protocol as f64 * PROTOCOL_WEIGHT;
    let overall = (weighted.round() as u32).min(100);

    let span = (MAX_CREDIT_SCORE - MIN_CREDIT_SCORE) as f64;
    let credit_score = (MIN_CREDIT_SCORE as f64 + overall as f64 / 100.0 * span).round() as u32;

    CreditScore {
        overall,
        breakdown,
        factors: *factors,
        credit_score,
    }
}

/// Five ordered tiers, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ScoreLevel {
    Poor,
    Fair,
    Good,
    #[serde(rename = "Very Good")]
    VeryGood,
    Excellent,
}

impl ScoreLevel {
    /// Inclusive lower bound of the tier.
    pub fn threshold(self) -> u32 {
        match self {
            ScoreLevel::Excellent => 750,
            ScoreLevel::VeryGood => 700,
            ScoreLevel::Good => 650,
            ScoreLevel::Fair => 600,
            ScoreLevel::Poor => MIN_CREDIT_SCORE,
        }
    }

    pub fn for_score(score: u32) -> Self {
        [
            ScoreLevel::Excellent,
            ScoreLevel::VeryGood,
            ScoreLevel::Good,
            ScoreLevel::Fair,
        ]
        .into_iter()
        .find(|level| score >= level.threshold())
        .unwrap_or(ScoreLevel::Poor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreLevel::Poor => "Poor",
            ScoreLevel::Fair => "Fair",
            ScoreLevel::Good => "Good",
            ScoreLevel::VeryGood => "Very Good",
            ScoreLevel::Excellent => "Excellent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interpretation {
    pub level: ScoreLevel,
    pub description: &'static str,
    pub characteristics: &'static [&'static str],
    pub recommendations: &'static [&'static str],
}

pub fn interpret_score(score: u32) -> Interpretation {
    let level = ScoreLevel::for_score(score);
    match level {
        ScoreLevel::Excellent => Interpretation {
            level,
            description: "Exceptional blockchain creditworthiness with extensive DeFi experience",
            characteristics: &[
                "Multiple protocol interactions",
                "High transaction volume",
                "Diverse token portfolio",
                "Cross-chain activity",
                "Long account history",
                "Significant portfolio value",
            ],
            recommendations: &[
                "Consider advanced DeFi strategies",
                "Explore institutional DeFi products",
                "Monitor portfolio diversification",
                "Review security practices",
                "Consider lending protocols",
            ],
        },
        ScoreLevel::VeryGood => Interpretation {
            level,
            description: "Strong blockchain creditworthiness with solid DeFi participation",
            characteristics: &[
                "Regular DeFi interactions",
                "Moderate to high transaction activity",
                "Good token diversity",
                "Established account history",
                "Decent portfolio value",
            ],
            recommendations: &[
                "Continue exploring DeFi",
                "Consider yield farming",
                "Monitor gas costs",
                "Stay updated on new protocols",
                "Consider automated strategies",
            ],
        },
        ScoreLevel::Good => Interpretation {
            level,
            description: "Good blockchain creditworthiness with growing DeFi presence",
            characteristics: &[
                "Some DeFi interactions",
                "Basic transaction patterns",
                "Limited token diversity",
                "Recent account activity",
                "Moderate portfolio value",
            ],
            recommendations: &[
                "Explore more DeFi protocols",
                "Diversify token holdings",
                "Learn about yield farming",
                "Consider automated strategies",
                "Monitor portfolio performance",
            ],
        },
        ScoreLevel::Fair => Interpretation {
            level,
            description: "Fair blockchain creditworthiness with basic DeFi activity",
            characteristics: &[
                "Limited DeFi interactions",
                "Basic transaction patterns",
                "Minimal token diversity",
                "Short account history",
                "Small portfolio value",
            ],
            recommendations: &[
                "Start with basic DeFi protocols",
                "Learn about DEX trading",
                "Explore educational resources",
                "Consider staking opportunities",
                "Build transaction history",
            ],
        },
        ScoreLevel::Poor => Interpretation {
            level,
            description: "Poor blockchain creditworthiness with minimal DeFi activity",
            characteristics: &[
                "Very limited transactions",
                "Basic token holdings",
                "Minimal protocol interactions",
                "New account or inactive",
                "Very small portfolio",
            ],
            recommendations: &[
                "Start with basic DeFi protocols",
                "Learn about yield farming basics",
                "Consider DEX trading",
                "Explore educational resources",
                "Build consistent transaction history",
            ],
        },
    }
}
