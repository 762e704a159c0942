//! Wallet capability consumed by the contract engine
//!
//! The engine never touches keys, storage or the ledger directly. Everything
//! it needs (UTXO snapshots, fresh addresses, signing and broadcast) goes
//! through [`WalletAdapter`], chosen once when the context is built.

use bitcoin::address::NetworkUnchecked;
use bitcoin::blockdata::script::{Script, ScriptBuf};
use bitcoin::{Address, Network, Transaction};
use std::collections::BTreeMap;
use std::str::FromStr;

use tokenvault_common::color::uncolored_script;
use tokenvault_common::error::{ContractError, ContractResult};
use tokenvault_common::utxo_selection::{LabelFilter, Utxo};

/// Callback observing a transaction right before it is sent
pub type OnSent<'a> = &'a dyn Fn(&Transaction);

/// Capability the engine uses to reach wallets and the ledger
pub trait WalletAdapter: Send + Sync {
    /// Network addresses are encoded for
    fn network(&self) -> Network;

    /// Unspent outputs owned by `wallet_id`, sorted by txid and output index
    fn list_unspent(
        &self,
        wallet_id: &str,
        only_finalized: bool,
        label: &LabelFilter,
    ) -> ContractResult<Vec<Utxo>>;

    /// Fresh receive address, optionally labeled
    fn receive_address(&self, wallet_id: &str, label: Option<&str>) -> ContractResult<String>;

    /// Fresh change address
    fn change_address(&self, wallet_id: &str) -> ContractResult<String>;

    /// Addresses issued so far; `None` returns every address
    fn get_addresses(&self, wallet_id: &str, label: Option<&str>) -> ContractResult<Vec<String>>;

    /// Sign the inputs of `tx` this wallet controls
    ///
    /// `prevouts` describes the outputs spent by `tx`. Inputs the wallet does
    /// not control are left untouched.
    fn sign_tx(
        &self,
        wallet_id: &str,
        tx: &Transaction,
        prevouts: &[Utxo],
    ) -> ContractResult<Transaction>;

    /// Submit a signed transaction to the ledger
    fn broadcast(
        &self,
        wallet_id: &str,
        tx: &Transaction,
        on_sent: Option<OnSent<'_>>,
    ) -> ContractResult<Transaction>;

    /// Balance per color; the uncolored balance is keyed by `""`
    fn balances(&self, wallet_id: &str, only_finalized: bool) -> ContractResult<BTreeMap<String, u64>> {
        let utxos = self.list_unspent(wallet_id, only_finalized, &LabelFilter::Unlabeled)?;
        let mut balances = BTreeMap::new();
        for utxo in utxos {
            let key = utxo.color_id.as_ref().map(|c| c.to_hex()).unwrap_or_default();
            *balances.entry(key).or_insert(0u64) += utxo.amount;
        }
        Ok(balances)
    }

    /// Whether `script` (colored or not) pays to one of the wallet's addresses
    fn owns_script(&self, wallet_id: &str, script: &Script) -> ContractResult<bool> {
        let base = uncolored_script(script);
        let address = match Address::from_script(&base, self.network()) {
            Ok(address) => address.to_string(),
            Err(_) => return Ok(false),
        };
        Ok(self.get_addresses(wallet_id, None)?.contains(&address))
    }

    /// Locking script of a fresh receive address
    fn receive_script(&self, wallet_id: &str, label: Option<&str>) -> ContractResult<ScriptBuf> {
        let address = self.receive_address(wallet_id, label)?;
        script_for_address(&address, self.network())
    }

    /// Locking script of a fresh change address
    fn change_script(&self, wallet_id: &str) -> ContractResult<ScriptBuf> {
        let address = self.change_address(wallet_id)?;
        script_for_address(&address, self.network())
    }
}

/// Parse an address string and check it belongs to `network`
pub fn parse_address(address: &str, network: Network) -> ContractResult<Address> {
    let unchecked = Address::<NetworkUnchecked>::from_str(address)
        .map_err(|e| ContractError::InvalidAddress(format!("{}: {}", address, e)))?;
    unchecked
        .require_network(network)
        .map_err(|e| ContractError::InvalidAddress(format!("{}: {}", address, e)))
}

/// Locking script paying to `address`
pub fn script_for_address(address: &str, network: Network) -> ContractResult<ScriptBuf> {
    Ok(parse_address(address, network)?.script_pubkey())
}
