//! Core domain types and constants shared across TokenVault

use bitcoin::Network;
use serde::{Deserialize, Serialize};

/// Minimum value of any uncolored output
pub const DUST_LIMIT: u64 = 600;

/// Default fee rate in base units per kilobyte
pub const DEFAULT_FEE_RATE: u64 = 1_000;

/// Value moved from the collateral pool by a funding transaction
pub const FUNDING_TX_AMOUNT: u64 = 10_000;

/// Well-known wallet identifier of the collateral pool
pub const DEFAULT_POOL_WALLET_ID: &str = "collateral-pool";

/// Target number of UTXOs kept in the collateral pool
pub const DEFAULT_POOL_SIZE: usize = 20;

/// Value of each collateral pool UTXO
pub const DEFAULT_POOL_UTXO_VALUE: u64 = 1_000;

/// Largest number of colored outputs a single issuance may create
pub const MAX_SPLIT: u32 = 1_000;

/// Label of UTXOs reserved for internal contract tracking
pub const TRACKING_LABEL: &str = "contract-tracking";

/// Check whether an uncolored amount is below the dust limit
pub fn is_dust(amount: u64, dust_limit: u64) -> bool {
    amount < dust_limit
}

/// Parse a network name as written in configuration files
pub fn parse_network(name: &str) -> Option<Network> {
    match name {
        "Bitcoin" => Some(Network::Bitcoin),
        "Testnet" => Some(Network::Testnet),
        "Signet" => Some(Network::Signet),
        "Regtest" => Some(Network::Regtest),
        _ => None,
    }
}

/// Destination of a colored transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    /// Address string, parsed against the configured network
    pub address: String,
    /// Token quantity to send
    pub amount: u64,
}

impl Receiver {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}
