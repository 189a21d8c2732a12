//! Credit score calculation: fans out to the selected providers, degrades
//! failed slices to empty data and scores whatever came back.

use crate::chains::ChainId;
use crate::debank::DebankClient;
use crate::errors::AppError;
use crate::etherscan::EtherscanClient;
use crate::models::*;
use crate::scoring::{calculate_score, ActivityMetrics};
use chrono::Utc;
use futures::future::join_all;
use regex::Regex;
use std::sync::OnceLock;

pub const CALCULATION_FAILED: &str = "Failed to calculate blockchain credit score";

/// Page size for the Etherscan lists that feed a score.
const SCORE_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Etherscan,
    Debank,
}

/// One provider call contributing to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSlice {
    EtherBalance,
    Transactions,
    TokenTransfers,
    UsedChains,
    TokenHoldings,
    Protocols,
    Nfts,
}

impl DataSlice {
    pub const ALL: [DataSlice; 7] = [
        DataSlice::EtherBalance,
        DataSlice::Transactions,
        DataSlice::TokenTransfers,
        DataSlice::UsedChains,
        DataSlice::TokenHoldings,
        DataSlice::Protocols,
        DataSlice::Nfts,
    ];

    pub fn provider(self) -> Provider {
        match self {
            DataSlice::EtherBalance | DataSlice::Transactions | DataSlice::TokenTransfers => {
                Provider::Etherscan
            }
            DataSlice::UsedChains
            | DataSlice::TokenHoldings
            | DataSlice::Protocols
            | DataSlice::Nfts => Provider::Debank,
        }
    }

    /// Name reported in `dataUsed.failedSlices`.
    pub fn name(self) -> &'static str {
        match self {
            DataSlice::EtherBalance => "etherBalance",
            DataSlice::Transactions => "transactions",
            DataSlice::TokenTransfers => "tokenTransfers",
            DataSlice::UsedChains => "chains",
            DataSlice::TokenHoldings => "tokens",
            DataSlice::Protocols => "protocols",
            DataSlice::Nfts => "nfts",
        }
    }
}

/// Slices to issue for a provider selection, in a fixed order.
pub fn planned_slices(selected: SelectedApis) -> Vec<DataSlice> {
    DataSlice::ALL
        .into_iter()
        .filter(|slice| match slice.provider() {
            Provider::Etherscan => selected.etherscan,
            Provider::Debank => selected.debank,
        })
        .collect()
}

enum SliceData {
    EtherBalance(String),
    Transactions(Vec<Transaction>),
    TokenTransfers(Vec<TokenTransfer>),
    UsedChains(Vec<DebankUsedChain>),
    TokenHoldings(Vec<DebankToken>),
    Protocols(Vec<DebankProtocol>),
    Nfts(Vec<DebankNft>),
}

/// Everything gathered for one address; failed slices stay at their defaults.
#[derive(Default)]
struct CollectedData {
    ether_balance: Option<String>,
    transactions: Vec<Transaction>,
    token_transfers: Vec<TokenTransfer>,
    chains: Vec<DebankUsedChain>,
    holdings: Vec<DebankToken>,
    protocols: Vec<DebankProtocol>,
    nfts: Vec<DebankNft>,
    failed: Vec<String>,
}

impl CollectedData {
    fn absorb(&mut self, data: SliceData) {
        match data {
            SliceData::EtherBalance(wei) => self.ether_balance = Some(wei),
            SliceData::Transactions(txs) => self.transactions = txs,
            SliceData::TokenTransfers(transfers) => self.token_transfers = transfers,
            SliceData::UsedChains(chains) => self.chains = chains,
            SliceData::TokenHoldings(tokens) => self.holdings = tokens,
            SliceData::Protocols(protocols) => self.protocols = protocols,
            SliceData::Nfts(nfts) => self.nfts = nfts,
        }
    }
}

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap())
}

/// Trims and checks an EVM address (`0x` + 40 hex digits).
pub fn validate_address(address: Option<&str>) -> Result<String, AppError> {
    let address = address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AppError::missing_parameter("Address"))?;

    if !address_pattern().is_match(address) {
        return Err(AppError::BadRequest(format!(
            "Invalid address '{}': expected 0x followed by 40 hex characters",
            address
        )));
    }

    Ok(address.to_string())
}

#[derive(Clone)]
pub struct CreditScoreService {
    etherscan: EtherscanClient,
    debank: DebankClient,
}

impl CreditScoreService {
    pub fn new(etherscan: EtherscanClient, debank: DebankClient) -> Self {
        Self { etherscan, debank }
    }

    /// Scores `request.address` from the selected providers.
    ///
    /// Slices run concurrently and a failed slice counts as empty data. The
    /// call only fails when there was something to fetch and nothing succeeded.
    pub async fn calculate(
        &self,
        request: CalculateScoreRequest,
    ) -> Result<CalculateScoreResponse, AppError> {
        let address = validate_address(request.address.as_deref())?;
        let selected = request.selected_apis;
        let slices = planned_slices(selected);

        tracing::info!(
            "Calculating credit score for {} (etherscan: {}, debank: {}, {} slices)",
            address,
            selected.etherscan,
            selected.debank,
            slices.len()
        );

        let results = join_all(slices.iter().map(|slice| self.fetch_slice(*slice, &address))).await;

        let mut collected = CollectedData::default();
        for (slice, result) in slices.iter().zip(results) {
            match result {
                Ok(data) => collected.absorb(data),
                Err(e) => {
                    tracing::warn!("Slice {} failed for {}: {}", slice.name(), address, e);
                    collected.failed.push(slice.name().to_string());
                }
            }
        }

        if !slices.is_empty() && collected.failed.len() == slices.len() {
            tracing::error!("Every provider call failed for {}", address);
            return Err(AppError::InternalError(CALCULATION_FAILED.to_string()));
        }

        let metrics = ActivityMetrics::from_sources(
            &collected.holdings,
            &collected.transactions,
            &collected.protocols,
            &collected.chains,
            &collected.nfts,
        );
        let credit_score = calculate_score(&metrics.factors_at(Utc::now()));
        let interpretation = credit_score.interpretation();

        tracing::info!(
            "✓ Credit score for {}: {} ({})",
            address,
            credit_score.credit_score,
            interpretation.level.as_str()
        );

        Ok(CalculateScoreResponse {
            data_used: DataUsed {
                etherscan: selected.etherscan,
                debank: selected.debank,
                transaction_count: collected.transactions.len(),
                token_count: collected.holdings.len(),
                protocol_count: collected.protocols.len(),
                chain_count: collected.chains.len(),
                nft_count: collected.nfts.len(),
                token_transfer_count: collected.token_transfers.len(),
                ether_balance_wei: collected.ether_balance,
                failed_slices: collected.failed,
            },
            address,
            credit_score,
            interpretation,
        })
    }

    async fn fetch_slice(&self, slice: DataSlice, address: &str) -> Result<SliceData, AppError> {
        let list = TxQuery {
            offset: SCORE_PAGE_SIZE,
            ..TxQuery::default()
        };
        let chain = ChainId::ETHEREUM;

        let data = match slice {
            DataSlice::EtherBalance => SliceData::EtherBalance(
                self.etherscan
                    .ether_balance(address, BalanceTag::Latest, chain)
                    .await?,
            ),
            DataSlice::Transactions => SliceData::Transactions(
                self.etherscan
                    .normal_transactions(address, &list, chain)
                    .await?,
            ),
            DataSlice::TokenTransfers => SliceData::TokenTransfers(
                self.etherscan
                    .token_transfers(address, TokenStandard::Erc20, None, &list, chain)
                    .await?,
            ),
            DataSlice::UsedChains => SliceData::UsedChains(self.debank.used_chains(address).await?),
            DataSlice::TokenHoldings => {
                SliceData::TokenHoldings(self.debank.all_token_list(address).await?)
            }
            DataSlice::Protocols => {
                SliceData::Protocols(self.debank.all_complex_protocol_list(address).await?)
            }
            DataSlice::Nfts => SliceData::Nfts(self.debank.all_nft_list(address).await?),
        };
        Ok(data)
    }
}
