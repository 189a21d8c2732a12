//! Chains accepted by the Etherscan v2 multichain API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported chains as `(name, chain id)`. Volta and EWC testnet share an id.
pub const SUPPORTED_CHAINS: &[(&str, u64)] = &[
    ("ETHEREUM", 1),
    ("POLYGON", 137),
    ("BSC", 56),
    ("ARBITRUM", 42161),
    ("OPTIMISM", 10),
    ("AVALANCHE", 43114),
    ("FANTOM", 250),
    ("GNOSIS", 100),
    ("MOONBEAM", 1284),
    ("MOONRIVER", 1285),
    ("HARMONY", 1666600000),
    ("CRONOS", 25),
    ("BTTC", 199),
    ("CELO", 42220),
    ("AURORA", 1313161554),
    ("EVMOS", 9001),
    ("METIS", 1088),
    ("BOBA", 288),
    ("RSK", 30),
    ("HECO", 128),
    ("OKC", 66),
    ("KLAYTN", 8217),
    ("IOTEX", 4689),
    ("SMARTBCH", 10000),
    ("ENERGYWEB", 246),
    ("VOLTA", 73799),
    ("EWCTEST", 73799),
    ("THUNDERCORE", 108),
    ("POLYGON_ZKEVM", 1101),
    ("BASE", 8453),
    ("LINEA", 59144),
    ("SCROLL", 534352),
    ("MANTLE", 5000),
    ("ZKSYNC_ERA", 324),
    ("POLYGON_ZKEVM_TESTNET", 1442),
    ("BASE_TESTNET", 84531),
    ("LINEA_TESTNET", 59140),
    ("SCROLL_TESTNET", 534353),
    ("MANTLE_TESTNET", 5001),
    ("ZKSYNC_ERA_TESTNET", 280),
];

/// A chain id known to be in [`SUPPORTED_CHAINS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ChainId(u64);

impl ChainId {
    pub const ETHEREUM: ChainId = ChainId(1);
    pub const POLYGON: ChainId = ChainId(137);
    pub const OPTIMISM: ChainId = ChainId(10);

    pub fn id(self) -> u64 {
        self.0
    }

    /// First registered name for this id.
    pub fn name(self) -> &'static str {
        SUPPORTED_CHAINS
            .iter()
            .find(|(_, id)| *id == self.0)
            .map(|(name, _)| *name)
            .unwrap_or("UNKNOWN")
    }
}

impl Default for ChainId {
    fn default() -> Self {
        ChainId::ETHEREUM
    }
}

impl TryFrom<u64> for ChainId {
    type Error = String;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        if SUPPORTED_CHAINS.iter().any(|(_, known)| *known == id) {
            Ok(ChainId(id))
        } else {
            Err(format!("Unsupported chain id: {}", id))
        }
    }
}

impl From<ChainId> for u64 {
    fn from(chain: ChainId) -> Self {
        chain.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
