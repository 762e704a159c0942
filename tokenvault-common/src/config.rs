//! Configuration management for TokenVault.
//!
//! Settings are stored in TOML. Every field has a default, so a partial file
//! (or none at all) yields a usable configuration. The contract engine never
//! reads these values from globals; the core builds an explicit context from
//! a loaded [`Config`].
//!
//! ```toml
//! [contract]
//! network = "Regtest"
//! fee_rate = 1000
//! use_only_finalized_utxo = true
//! dust_limit = 600
//!
//! [utxo_provider]
//! enabled = true
//! wallet_id = "collateral-pool"
//! funding_amount = 10000
//! ```

use anyhow::{anyhow, Result};
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::{
    parse_network, DEFAULT_FEE_RATE, DEFAULT_POOL_SIZE, DEFAULT_POOL_UTXO_VALUE,
    DEFAULT_POOL_WALLET_ID, DUST_LIMIT, FUNDING_TX_AMOUNT,
};

/// Main configuration structure for TokenVault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub contract: ContractSettings,

    #[serde(default)]
    pub utxo_provider: UtxoProviderConfig,
}

/// Settings applied to every lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSettings {
    #[serde(default = "default_network")]
    pub network: String,

    /// Fee rate in base units per kilobyte
    #[serde(default = "default_fee_rate")]
    pub fee_rate: u64,

    /// Only spend and count outputs the ledger has confirmed
    #[serde(default = "default_true")]
    pub use_only_finalized_utxo: bool,

    /// Minimum value of any uncolored output
    #[serde(default = "default_dust_limit")]
    pub dust_limit: u64,
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            network: default_network(),
            fee_rate: default_fee_rate(),
            use_only_finalized_utxo: default_true(),
            dust_limit: default_dust_limit(),
        }
    }
}

impl ContractSettings {
    /// The configured network, if its name is recognized
    pub fn network(&self) -> Result<Network> {
        parse_network(&self.network).ok_or_else(|| anyhow!("Invalid network type: {}", self.network))
    }
}

/// Shared collateral pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoProviderConfig {
    /// Fund fees from the pool instead of the caller's wallet
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_pool_wallet_id")]
    pub wallet_id: String,

    /// Value moved by each funding transaction
    #[serde(default = "default_funding_amount")]
    pub funding_amount: u64,

    /// Number of UTXOs a refill keeps in the pool
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Value of each pool UTXO created by a refill
    #[serde(default = "default_pool_utxo_value")]
    pub pool_utxo_value: u64,
}

impl Default for UtxoProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            wallet_id: default_pool_wallet_id(),
            funding_amount: default_funding_amount(),
            pool_size: default_pool_size(),
            pool_utxo_value: default_pool_utxo_value(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        fs::write(path, content).map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.contract.network()?;

        if self.contract.dust_limit == 0 {
            return Err(anyhow!("Invalid dust limit: must be greater than 0"));
        }

        if self.utxo_provider.enabled {
            if self.utxo_provider.wallet_id.is_empty() {
                return Err(anyhow!("Invalid utxo provider: wallet_id must not be empty"));
            }
            if self.utxo_provider.funding_amount < self.contract.dust_limit {
                anyhow::bail!(
                    "Invalid funding amount {}: must be at least the dust limit {}",
                    self.utxo_provider.funding_amount,
                    self.contract.dust_limit
                );
            }
            if self.utxo_provider.pool_utxo_value < self.contract.dust_limit {
                anyhow::bail!(
                    "Invalid pool utxo value {}: must be at least the dust limit {}",
                    self.utxo_provider.pool_utxo_value,
                    self.contract.dust_limit
                );
            }
        }

        Ok(())
    }
}

/// Ensure a configuration file exists at the specified path
/// If it doesn't exist, create it with default values
pub fn ensure_config_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        let default_config = Config::default();
        let content = toml::to_string_pretty(&default_config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| anyhow!("Failed to create config directory: {}", e))?;
            }
        }

        fs::write(path, content)
            .map_err(|e| anyhow!("Failed to write default config file: {}", e))?;
    }

    Ok(())
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_network() -> String {
    "Bitcoin".to_string()
}

fn default_fee_rate() -> u64 {
    DEFAULT_FEE_RATE
}

fn default_dust_limit() -> u64 {
    DUST_LIMIT
}

fn default_pool_wallet_id() -> String {
    DEFAULT_POOL_WALLET_ID.to_string()
}

fn default_funding_amount() -> u64 {
    FUNDING_TX_AMOUNT
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_pool_utxo_value() -> u64 {
    DEFAULT_POOL_UTXO_VALUE
}
