//! Explicit configuration shared by every lifecycle call
//!
//! Fee rate, finalized toggle, dust limit and collateral pool identity all
//! live here instead of in process-wide globals. A per-call override is a
//! modified clone:
//!
//! ```ignore
//! let urgent = ctx.clone().with_fee_rate(5_000);
//! token.transfer(&urgent, "alice", &address, 100)?;
//! ```

use bitcoin::Network;
use std::fmt;
use std::sync::Arc;

use tokenvault_common::config::{Config, UtxoProviderConfig};
use tokenvault_common::error::{ContractError, ContractResult};
use tokenvault_common::fee_estimation::{AutoFeeEstimator, FeeEstimator};
use tokenvault_common::types::DUST_LIMIT;
use tokenvault_common::utxo_selection::UtxoSelector;

use crate::token_store::ReissuableTokenStore;
use crate::wallet::WalletAdapter;

/// Everything a lifecycle call needs besides its own arguments
#[derive(Clone)]
pub struct ContractContext<'a> {
    wallet: &'a dyn WalletAdapter,
    token_store: &'a dyn ReissuableTokenStore,
    fee_estimator: Arc<dyn FeeEstimator>,
    only_finalized: bool,
    dust_limit: u64,
    utxo_provider: Option<UtxoProviderConfig>,
}

impl<'a> ContractContext<'a> {
    /// Context with default fee rate, finalized-only selection and no pool
    pub fn new(wallet: &'a dyn WalletAdapter, token_store: &'a dyn ReissuableTokenStore) -> Self {
        Self {
            wallet,
            token_store,
            fee_estimator: Arc::new(AutoFeeEstimator::default()),
            only_finalized: true,
            dust_limit: DUST_LIMIT,
            utxo_provider: None,
        }
    }

    /// Build a context from loaded configuration
    ///
    /// The wallet must be encoded for the configured network.
    pub fn from_config(
        config: &Config,
        wallet: &'a dyn WalletAdapter,
        token_store: &'a dyn ReissuableTokenStore,
    ) -> ContractResult<Self> {
        config
            .validate()
            .map_err(|e| ContractError::invalid_argument(e.to_string()))?;
        let network = config
            .contract
            .network()
            .map_err(|e| ContractError::invalid_argument(e.to_string()))?;
        if network != wallet.network() {
            return Err(ContractError::invalid_argument(format!(
                "wallet network {} does not match configured network {}",
                wallet.network(),
                network
            )));
        }

        let mut ctx = Self::new(wallet, token_store)
            .with_fee_rate(config.contract.fee_rate)
            .with_only_finalized(config.contract.use_only_finalized_utxo)
            .with_dust_limit(config.contract.dust_limit);
        if config.utxo_provider.enabled {
            ctx = ctx.with_utxo_provider(config.utxo_provider.clone());
        }
        Ok(ctx)
    }

    pub fn with_fee_estimator(mut self, estimator: impl FeeEstimator + 'static) -> Self {
        self.fee_estimator = Arc::new(estimator);
        self
    }

    pub fn with_fee_rate(self, fee_rate: u64) -> Self {
        self.with_fee_estimator(AutoFeeEstimator::new(fee_rate))
    }

    pub fn with_only_finalized(mut self, only_finalized: bool) -> Self {
        self.only_finalized = only_finalized;
        self
    }

    pub fn with_dust_limit(mut self, dust_limit: u64) -> Self {
        self.dust_limit = dust_limit;
        self
    }

    /// Fund fees from the collateral pool described by `provider`
    pub fn with_utxo_provider(mut self, provider: UtxoProviderConfig) -> Self {
        self.utxo_provider = Some(provider);
        self
    }

    pub fn without_utxo_provider(mut self) -> Self {
        self.utxo_provider = None;
        self
    }

    pub fn wallet(&self) -> &'a dyn WalletAdapter {
        self.wallet
    }

    pub fn token_store(&self) -> &'a dyn ReissuableTokenStore {
        self.token_store
    }

    pub fn fee_estimator(&self) -> &dyn FeeEstimator {
        self.fee_estimator.as_ref()
    }

    pub fn only_finalized(&self) -> bool {
        self.only_finalized
    }

    pub fn dust_limit(&self) -> u64 {
        self.dust_limit
    }

    pub fn network(&self) -> Network {
        self.wallet.network()
    }

    pub fn utxo_provider(&self) -> Option<&UtxoProviderConfig> {
        self.utxo_provider.as_ref()
    }

    /// Selector honoring the finalized toggle
    pub fn selector(&self) -> UtxoSelector {
        UtxoSelector::new(self.only_finalized)
    }
}

impl fmt::Debug for ContractContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractContext")
            .field("fee_estimator", &self.fee_estimator)
            .field("only_finalized", &self.only_finalized)
            .field("dust_limit", &self.dust_limit)
            .field("utxo_provider", &self.utxo_provider)
            .finish()
    }
}
