use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::{CreditScore, Interpretation};

// ============ Etherscan Models ============

/// Envelope wrapping every Etherscan response.
///
/// `result` is kept as raw JSON because Etherscan puts an error string there
/// when `status` is `"0"`.
#[derive(Debug, Clone, Deserialize)]
pub struct EtherscanEnvelope {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

/// A normal or internal transaction as listed by `txlist` / `txlistinternal`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub block_number: String,
    /// Unix seconds, as a decimal string.
    pub time_stamp: String,
    pub hash: String,
    pub nonce: String,
    pub block_hash: String,
    pub transaction_index: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub gas_used: String,
    pub cumulative_gas_used: String,
    pub input: String,
    pub contract_address: String,
    pub confirmations: String,
    pub is_error: String,
    #[serde(rename = "txreceipt_status")]
    pub txreceipt_status: String,
    /// Internal transactions only.
    #[serde(rename = "type")]
    pub call_type: String,
    pub trace_id: String,
}

/// An ERC-20 / ERC-721 / ERC-1155 transfer event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenTransfer {
    pub block_number: String,
    pub time_stamp: String,
    pub hash: String,
    pub nonce: String,
    pub block_hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub contract_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub token_decimal: String,
    #[serde(rename = "tokenID")]
    pub token_id: String,
    pub token_value: String,
    pub gas: String,
    pub gas_price: String,
    pub gas_used: String,
    pub confirmations: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeTransaction {
    pub hash: String,
    pub block_number: String,
    pub time_stamp: String,
    pub from: String,
    pub address: String,
    pub amount: String,
    pub token_name: String,
    pub symbol: String,
    pub contract_address: String,
    pub divisor: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlasmaDeposit {
    pub block_number: String,
    pub time_stamp: String,
    pub block_reward: String,
}

/// Deposit from Ethereum to an L2 (Arbitrum and Optimism stacks).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct L2DepositTransaction {
    pub block_number: String,
    pub time_stamp: String,
    pub block_hash: String,
    pub hash: String,
    pub nonce: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub input: String,
    pub gas_used: String,
    pub is_error: String,
    pub err_description: String,
    #[serde(rename = "txreceipt_status")]
    pub txreceipt_status: String,
    pub queue_index: String,
    #[serde(rename = "L1transactionhash")]
    pub l1_transaction_hash: String,
    #[serde(rename = "L1TxOrigin")]
    pub l1_tx_origin: String,
    pub token_address: String,
    pub token_sent_from: String,
    pub token_sent_to: String,
    pub token_value: String,
}

/// Withdrawal from an L2 back to Ethereum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct L2WithdrawalTransaction {
    pub block_number: String,
    pub time_stamp: String,
    pub block_hash: String,
    pub hash: String,
    pub nonce: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub input: String,
    pub gas_used: String,
    pub is_error: String,
    pub err_description: String,
    #[serde(rename = "txreceipt_status")]
    pub txreceipt_status: String,
    pub message: String,
    pub message_nonce: String,
    pub status: String,
    #[serde(rename = "L1transactionhash")]
    pub l1_transaction_hash: String,
    pub token_address: String,
    pub withdrawal_type: String,
    pub token_value: String,
    #[serde(rename = "L1transactionhashProve")]
    pub l1_transaction_hash_prove: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceTag {
    Earliest,
    Pending,
    #[default]
    Latest,
}

impl BalanceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            BalanceTag::Earliest => "earliest",
            BalanceTag::Pending => "pending",
            BalanceTag::Latest => "latest",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStandard {
    #[default]
    Erc20,
    Erc721,
    Erc1155,
}

impl TokenStandard {
    /// Etherscan `action` for this standard's transfer events.
    pub fn action(self) -> &'static str {
        match self {
            TokenStandard::Erc20 => "tokentx",
            TokenStandard::Erc721 => "tokennfttx",
            TokenStandard::Erc1155 => "token1155tx",
        }
    }
}

/// Block range, pagination and ordering for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxQuery {
    pub start_block: u64,
    pub end_block: u64,
    pub page: u32,
    pub offset: u32,
    pub sort: SortOrder,
}

impl Default for TxQuery {
    fn default() -> Self {
        Self {
            start_block: 0,
            end_block: 99_999_999,
            page: 1,
            offset: 10,
            sort: SortOrder::Asc,
        }
    }
}

// ============ DeBank Models ============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankUsedChain {
    pub id: String,
    pub community_id: Option<u64>,
    pub name: String,
    pub logo_url: Option<String>,
    pub native_token_id: String,
    pub wrapped_token_id: String,
    pub born_at: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankChainBalance {
    pub usd_value: f64,
}

/// `/user/total_balance` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankTotalBalance {
    pub total_usd_value: f64,
    pub chain_list: Vec<DebankChainEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankChainEntry {
    pub id: String,
    pub name: String,
    pub usd_value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankToken {
    /// Contract address, or the chain's native symbol for gas tokens.
    pub id: String,
    pub chain: String,
    pub name: String,
    pub symbol: String,
    pub display_symbol: Option<String>,
    pub optimized_symbol: Option<String>,
    pub decimals: Option<u32>,
    pub logo_url: Option<String>,
    pub protocol_id: Option<String>,
    pub price: Option<f64>,
    pub is_verified: Option<bool>,
    pub is_core: Option<bool>,
    pub is_wallet: Option<bool>,
    pub time_at: Option<f64>,
    pub amount: Option<f64>,
    pub raw_amount: Option<f64>,
}

impl DebankToken {
    /// `price * amount`, zero when either is missing.
    pub fn usd_value(&self) -> f64 {
        match (self.price, self.amount) {
            (Some(price), Some(amount)) => price * amount,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankProtocol {
    pub id: String,
    pub chain: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub site_url: Option<String>,
    pub has_supported_portfolio: bool,
    pub tvl: Option<f64>,
    pub portfolio_item_list: Vec<DebankPortfolioItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankPortfolioItem {
    pub stats: DebankPortfolioStats,
    pub update_at: Option<f64>,
    pub name: String,
    pub detail_types: Vec<String>,
    pub detail: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankPortfolioStats {
    pub asset_usd_value: f64,
    pub debt_usd_value: f64,
    pub net_usd_value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankNft {
    pub id: String,
    pub contract_id: String,
    pub inner_id: String,
    pub chain: String,
    pub name: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub content: Option<String>,
    pub thumbnail_url: Option<String>,
    pub collection_id: Option<String>,
    pub amount: Option<f64>,
    pub usd_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankHistoryItem {
    pub id: String,
    pub chain: String,
    pub cate_id: Option<String>,
    pub project_id: Option<String>,
    pub time_at: Option<f64>,
    pub is_scam: bool,
    pub tx: Option<Value>,
    pub sends: Vec<Value>,
    pub receives: Vec<Value>,
}

/// `/user/history_list` wraps the items with lookup tables we pass through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankHistory {
    pub history_list: Vec<DebankHistoryItem>,
    pub project_dict: Value,
    pub token_dict: Value,
    pub cate_dict: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankNetCurvePoint {
    pub timestamp: f64,
    pub usd_value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankAuthorizedToken {
    pub id: String,
    pub chain: String,
    pub name: String,
    pub symbol: String,
    pub logo_url: Option<String>,
    pub price: Option<f64>,
    pub balance: Option<f64>,
    pub sum_exposure_usd: Option<f64>,
    pub spenders: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankAuthorizedNftContract {
    pub chain: String,
    pub contract_id: String,
    pub contract_name: Option<String>,
    pub is_erc721: Option<bool>,
    pub amount: Option<f64>,
    pub spender: Option<Value>,
}

/// `/user/nft_authorized_list` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebankAuthorizedNfts {
    pub total: Option<u64>,
    pub contracts: Vec<DebankAuthorizedNftContract>,
    pub tokens: Vec<Value>,
}

// ============ API Request/Response Models ============

/// Which providers a score calculation may query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectedApis {
    pub etherscan: bool,
    pub debank: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalculateScoreRequest {
    pub address: Option<String>,
    pub selected_apis: SelectedApis,
}

/// Query form of the calculate endpoint; flags are on only when exactly `"true"`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalculateScoreQuery {
    pub address: Option<String>,
    pub etherscan: Option<String>,
    pub debank: Option<String>,
}

impl From<CalculateScoreQuery> for CalculateScoreRequest {
    fn from(query: CalculateScoreQuery) -> Self {
        Self {
            address: query.address,
            selected_apis: SelectedApis {
                etherscan: query.etherscan.as_deref() == Some("true"),
                debank: query.debank.as_deref() == Some("true"),
            },
        }
    }
}

/// Summary of the data that fed a score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUsed {
    pub etherscan: bool,
    pub debank: bool,
    pub transaction_count: usize,
    pub token_count: usize,
    pub protocol_count: usize,
    pub chain_count: usize,
    pub nft_count: usize,
    pub token_transfer_count: usize,
    pub ether_balance_wei: Option<String>,
    /// Slices that failed upstream and were scored as empty.
    pub failed_slices: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateScoreResponse {
    pub address: String,
    pub credit_score: CreditScore,
    pub interpretation: Interpretation,
    pub data_used: DataUsed,
}

// ============ Query Parameters ============

/// `?address&tag&chainId` for the balance route.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceParams {
    pub address: Option<String>,
    pub tag: Option<BalanceTag>,
    pub chain_id: Option<u64>,
}

/// Block range, pagination and chain for the normal and internal transaction routes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxListParams {
    pub address: Option<String>,
    pub start_block: Option<u64>,
    pub end_block: Option<u64>,
    pub page: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<SortOrder>,
    pub chain_id: Option<u64>,
}

impl TxListParams {
    pub fn tx_query(&self) -> TxQuery {
        let defaults = TxQuery::default();
        TxQuery {
            start_block: self.start_block.unwrap_or(defaults.start_block),
            end_block: self.end_block.unwrap_or(defaults.end_block),
            page: self.page.unwrap_or(defaults.page),
            offset: self.offset.unwrap_or(defaults.offset),
            sort: self.sort.unwrap_or(defaults.sort),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransferParams {
    pub address: Option<String>,
    pub token_type: Option<TokenStandard>,
    pub contract_address: Option<String>,
    pub start_block: Option<u64>,
    pub end_block: Option<u64>,
    pub page: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<SortOrder>,
    pub chain_id: Option<u64>,
}

impl TokenTransferParams {
    pub fn tx_query(&self) -> TxQuery {
        TxListParams {
            address: None,
            start_block: self.start_block,
            end_block: self.end_block,
            page: self.page,
            offset: self.offset,
            sort: self.sort,
            chain_id: None,
        }
        .tx_query()
    }
}

/// Pagination and chain for the bridge and plasma routes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeParams {
    pub address: Option<String>,
    pub page: Option<u32>,
    pub offset: Option<u32>,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum L2Direction {
    #[default]
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Params {
    pub address: Option<String>,
    #[serde(rename = "type")]
    pub direction: Option<L2Direction>,
    pub page: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<SortOrder>,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainsView {
    #[default]
    Used,
    Balance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokensView {
    Balance,
    #[default]
    List,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolsView {
    #[default]
    Single,
    Complex,
    ComplexAll,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryView {
    Chain,
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetCurveView {
    Chain,
    #[default]
    Total,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizedView {
    #[default]
    Tokens,
    Nfts,
}

/// Query shared by the DeBank routes. Each route reads the fields it needs;
/// `type` is parsed per route into its own view enum.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebankParams<V> {
    pub address: Option<String>,
    pub chain_id: Option<String>,
    pub chain_ids: Option<String>,
    pub token_id: Option<String>,
    pub protocol_id: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    #[serde(rename = "type")]
    pub view: Option<V>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearCacheParams {
    pub pattern: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transaction_parses_etherscan_field_names() {
        let tx: Transaction = serde_json::from_value(json!({
            "blockNumber": "14923678",
            "timeStamp": "1654646411",
            "hash": "0xabc",
            "from": "0x1",
            "to": "0x2",
            "value": "0",
            "txreceipt_status": "1",
            "isError": "0"
        }))
        .unwrap();

        assert_eq!(tx.time_stamp, "1654646411");
        assert_eq!(tx.txreceipt_status, "1");
        assert_eq!(tx.is_error, "0");
        assert!(tx.gas.is_empty());
    }

    #[test]
    fn test_token_transfer_token_id_rename() {
        let transfer: TokenTransfer = serde_json::from_value(json!({
            "contractAddress": "0xdac17f958d2ee523a2206206994597c13d831ec7",
            "tokenSymbol": "USDT",
            "tokenID": "7"
        }))
        .unwrap();
        assert_eq!(transfer.token_id, "7");
        assert_eq!(transfer.token_symbol, "USDT");
    }

    #[test]
    fn test_debank_token_value_defaults_to_zero() {
        let token: DebankToken = serde_json::from_value(json!({
            "id": "0xa0b8",
            "chain": "eth",
            "price": 1.0
        }))
        .unwrap();
        assert_eq!(token.usd_value(), 0.0);

        let token: DebankToken = serde_json::from_value(json!({
            "id": "eth",
            "chain": "eth",
            "price": 2000.0,
            "amount": 1.5
        }))
        .unwrap();
        assert_eq!(token.usd_value(), 3000.0);
    }

    #[test]
    fn test_query_flags_require_literal_true() {
        let request: CalculateScoreRequest = CalculateScoreQuery {
            address: Some("0x1".into()),
            etherscan: Some("true".into()),
            debank: Some("1".into()),
        }
        .into();
        assert!(request.selected_apis.etherscan);
        assert!(!request.selected_apis.debank);
    }

    #[test]
    fn test_tx_list_params_fill_defaults() {
        let params: TxListParams = serde_json::from_value(json!({
            "address": "0xabc",
            "offset": 100,
            "sort": "desc"
        }))
        .unwrap();
        let query = params.tx_query();
        assert_eq!(query.offset, 100);
        assert_eq!(query.sort, SortOrder::Desc);
        assert_eq!(query.end_block, 99_999_999);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_view_selectors_use_route_spelling() {
        let view: ProtocolsView = serde_json::from_value(json!("complex-all")).unwrap();
        assert_eq!(view, ProtocolsView::ComplexAll);
        assert_eq!(TokensView::default(), TokensView::List);
        assert_eq!(HistoryView::default(), HistoryView::All);
        assert!(serde_json::from_value::<NetCurveView>(json!("weekly")).is_err());
    }

    #[test]
    fn test_request_body_camel_case() {
        let request: CalculateScoreRequest = serde_json::from_value(json!({
            "address": "0xabc",
            "selectedApis": {"etherscan": true}
        }))
        .unwrap();
        assert_eq!(request.address.as_deref(), Some("0xabc"));
        assert!(request.selected_apis.etherscan);
        assert!(!request.selected_apis.debank);
    }
}
