//! Self-contained wallet and ledger kept in memory
//!
//! Keys are derived deterministically from the wallet id and a counter, so
//! the same sequence of calls always produces the same addresses. Every key
//! controls a P2PKH script; colored outputs wrap that script with the color
//! prefix and are signed with the full colored script as script code.
//!
//! The adapter also plays the ledger: broadcasting validates inputs, spends
//! them and records the outputs that pay to any known wallet as unfinalized
//! UTXOs. [`MemoryWalletAdapter::finalize_transaction`] confirms them.

use bitcoin::blockdata::script::{Builder, PushBytesBuf, Script, ScriptBuf};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{All, Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Address, Network, OutPoint, PrivateKey, PublicKey, Transaction, Txid};
use log::debug;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokenvault_common::color::{colored_script, uncolored_script, ColorIdentifier};
use tokenvault_common::error::{ContractError, ContractResult};
use tokenvault_common::ledger::malleability_fixed_txid;
use tokenvault_common::logging::{log_transaction, log_wallet, LogLevel};
use tokenvault_common::utxo_selection::{LabelFilter, Utxo};

use crate::wallet::{OnSent, WalletAdapter};

/// A key owned by one wallet
#[derive(Debug, Clone)]
struct KeyEntry {
    private_key: PrivateKey,
    public_key: PublicKey,
    script_pubkey: ScriptBuf,
    address: String,
    label: Option<String>,
}

#[derive(Debug, Default)]
struct WalletState {
    keys: Vec<KeyEntry>,
    next_index: u32,
}

#[derive(Debug, Default)]
struct LedgerState {
    wallets: HashMap<String, WalletState>,
    /// Uncolored script to (wallet id, key index)
    owners: HashMap<ScriptBuf, (String, usize)>,
    /// Unspent outputs and the wallet owning them
    utxos: BTreeMap<OutPoint, (String, Utxo)>,
    transactions: HashMap<Txid, Transaction>,
    broadcast_log: Vec<Transaction>,
    seed_counter: u64,
}

/// In-memory wallet adapter and ledger
pub struct MemoryWalletAdapter {
    network: Network,
    secp: Secp256k1<All>,
    state: RwLock<LedgerState>,
}

impl MemoryWalletAdapter {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            secp: Secp256k1::new(),
            state: RwLock::new(LedgerState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a wallet; registering an existing id is a no-op
    pub fn create_wallet(&self, wallet_id: &str) {
        let mut state = self.write();
        if !state.wallets.contains_key(wallet_id) {
            state.wallets.insert(wallet_id.to_string(), WalletState::default());
            log_wallet(LogLevel::Debug, "wallet created", Some(json!({ "wallet_id": wallet_id })));
        }
    }

    pub fn has_wallet(&self, wallet_id: &str) -> bool {
        self.read().wallets.contains_key(wallet_id)
    }

    fn derive_key(&self, wallet_id: &str, index: u32) -> ContractResult<(PrivateKey, PublicKey)> {
        let seed = Sha256::digest(format!("tokenvault/{}/{}", wallet_id, index).as_bytes());
        let secret = SecretKey::from_slice(&seed)
            .map_err(|e| ContractError::Signing(format!("key derivation failed: {}", e)))?;
        let private_key = PrivateKey::new(secret, self.network);
        let public_key = private_key.public_key(&self.secp);
        Ok((private_key, public_key))
    }

    /// Create a new key for `wallet_id` and return its index
    fn new_key(
        &self,
        state: &mut LedgerState,
        wallet_id: &str,
        label: Option<&str>,
    ) -> ContractResult<usize> {
        let index = state
            .wallets
            .get(wallet_id)
            .map(|w| w.next_index)
            .ok_or_else(|| ContractError::WalletNotFound(wallet_id.to_string()))?;
        let (private_key, public_key) = self.derive_key(wallet_id, index)?;
        let script_pubkey = ScriptBuf::new_p2pkh(&public_key.pubkey_hash());
        let address = Address::p2pkh(&public_key, self.network).to_string();

        let wallet = state
            .wallets
            .get_mut(wallet_id)
            .ok_or_else(|| ContractError::WalletNotFound(wallet_id.to_string()))?;
        wallet.next_index += 1;
        wallet.keys.push(KeyEntry {
            private_key,
            public_key,
            script_pubkey: script_pubkey.clone(),
            address,
            label: label.map(str::to_string),
        });
        let key_index = wallet.keys.len() - 1;
        state
            .owners
            .insert(script_pubkey, (wallet_id.to_string(), key_index));
        Ok(key_index)
    }

    fn key_address(state: &LedgerState, wallet_id: &str, key_index: usize) -> ContractResult<String> {
        state
            .wallets
            .get(wallet_id)
            .and_then(|w| w.keys.get(key_index))
            .map(|k| k.address.clone())
            .ok_or_else(|| ContractError::WalletNotFound(wallet_id.to_string()))
    }

    /// Seed an output paying to a fresh key of `wallet_id`
    ///
    /// The output is colored with `color` when given.
    pub fn add_utxo(
        &self,
        wallet_id: &str,
        outpoint: OutPoint,
        amount: u64,
        color: Option<&ColorIdentifier>,
        finalized: bool,
    ) -> ContractResult<Utxo> {
        let mut state = self.write();
        let key_index = self.new_key(&mut state, wallet_id, None)?;
        let base = state.wallets[wallet_id].keys[key_index].script_pubkey.clone();
        let script = match color {
            Some(color) => colored_script(color, &base),
            None => base,
        };
        let utxo = Utxo::new(outpoint, script, amount).with_finalized(finalized);
        state
            .utxos
            .insert(outpoint, (wallet_id.to_string(), utxo.clone()));
        Ok(utxo)
    }

    /// Seed an output locked by `script`, which must belong to `wallet_id`
    pub fn add_utxo_at_script(
        &self,
        wallet_id: &str,
        outpoint: OutPoint,
        script: ScriptBuf,
        amount: u64,
        finalized: bool,
    ) -> ContractResult<Utxo> {
        let mut state = self.write();
        let base = uncolored_script(&script);
        let (owner, key_index) = state
            .owners
            .get(&base)
            .cloned()
            .ok_or_else(|| ContractError::UnknownScriptPubkey(hex::encode(script.as_bytes())))?;
        if owner != wallet_id {
            return Err(ContractError::UnknownScriptPubkey(hex::encode(script.as_bytes())));
        }
        let label = state.wallets[&owner].keys[key_index].label.clone();
        let mut utxo = Utxo::new(outpoint, script, amount).with_finalized(finalized);
        utxo.label = label;
        state.utxos.insert(outpoint, (owner, utxo.clone()));
        Ok(utxo)
    }

    /// Seed `amount` of finalized uncolored value under a synthetic txid
    pub fn fund(&self, wallet_id: &str, amount: u64) -> ContractResult<Utxo> {
        let txid = {
            let mut state = self.write();
            state.seed_counter += 1;
            Txid::hash(format!("tokenvault-seed/{}", state.seed_counter).as_bytes())
        };
        self.add_utxo(wallet_id, OutPoint::new(txid, 0), amount, None, true)
    }

    /// Mark every output of `txid` as finalized; returns how many changed
    pub fn finalize_transaction(&self, txid: &Txid) -> usize {
        let mut state = self.write();
        let mut count = 0;
        for (outpoint, (_, utxo)) in state.utxos.iter_mut() {
            if outpoint.txid == *txid && !utxo.finalized {
                utxo.finalized = true;
                count += 1;
            }
        }
        count
    }

    /// Mark every known output as finalized
    pub fn finalize_all(&self) {
        let mut state = self.write();
        for (_, utxo) in state.utxos.values_mut() {
            utxo.finalized = true;
        }
    }

    /// A broadcast transaction by id
    pub fn transaction(&self, txid: &Txid) -> Option<Transaction> {
        self.read().transactions.get(txid).cloned()
    }

    /// Every broadcast transaction, oldest first
    pub fn broadcast_log(&self) -> Vec<Transaction> {
        self.read().broadcast_log.clone()
    }

    /// An unspent output by outpoint, regardless of owner
    pub fn utxo(&self, outpoint: &OutPoint) -> Option<Utxo> {
        self.read().utxos.get(outpoint).map(|(_, u)| u.clone())
    }

    fn sign_input(
        &self,
        cache: &SighashCache<&Transaction>,
        index: usize,
        prevout: &Utxo,
        key: &KeyEntry,
    ) -> ContractResult<ScriptBuf> {
        let sighash = cache
            .legacy_signature_hash(index, &prevout.script_pubkey, EcdsaSighashType::All.to_u32())
            .map_err(|e| ContractError::Signing(format!("input {}: {}", index, e)))?;
        let message = Message::from_slice(&sighash.to_byte_array())
            .map_err(|e| ContractError::Signing(format!("input {}: {}", index, e)))?;
        let signature = bitcoin::ecdsa::Signature {
            sig: self.secp.sign_ecdsa(&message, &key.private_key.inner),
            hash_ty: EcdsaSighashType::All,
        };
        let push = PushBytesBuf::try_from(signature.to_vec())
            .map_err(|e| ContractError::Signing(format!("input {}: {}", index, e)))?;
        Ok(Builder::new()
            .push_slice(push)
            .push_key(&key.public_key)
            .into_script())
    }
}

impl WalletAdapter for MemoryWalletAdapter {
    fn network(&self) -> Network {
        self.network
    }

    fn list_unspent(
        &self,
        wallet_id: &str,
        only_finalized: bool,
        label: &LabelFilter,
    ) -> ContractResult<Vec<Utxo>> {
        let state = self.read();
        if !state.wallets.contains_key(wallet_id) {
            return Err(ContractError::WalletNotFound(wallet_id.to_string()));
        }
        let mut utxos: Vec<Utxo> = state
            .utxos
            .values()
            .filter(|(owner, _)| owner == wallet_id)
            .map(|(_, utxo)| utxo)
            .filter(|u| !only_finalized || u.finalized)
            .filter(|u| label.matches(u.label.as_deref()))
            .cloned()
            .collect();
        utxos.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(utxos)
    }

    fn receive_address(&self, wallet_id: &str, label: Option<&str>) -> ContractResult<String> {
        let mut state = self.write();
        let key_index = self.new_key(&mut state, wallet_id, label)?;
        Self::key_address(&state, wallet_id, key_index)
    }

    fn change_address(&self, wallet_id: &str) -> ContractResult<String> {
        self.receive_address(wallet_id, None)
    }

    fn get_addresses(&self, wallet_id: &str, label: Option<&str>) -> ContractResult<Vec<String>> {
        let state = self.read();
        let wallet = state
            .wallets
            .get(wallet_id)
            .ok_or_else(|| ContractError::WalletNotFound(wallet_id.to_string()))?;
        Ok(wallet
            .keys
            .iter()
            .filter(|k| label.is_none() || k.label.as_deref() == label)
            .map(|k| k.address.clone())
            .collect())
    }

    fn owns_script(&self, wallet_id: &str, script: &Script) -> ContractResult<bool> {
        let state = self.read();
        if !state.wallets.contains_key(wallet_id) {
            return Err(ContractError::WalletNotFound(wallet_id.to_string()));
        }
        let base = uncolored_script(script);
        Ok(matches!(state.owners.get(&base), Some((owner, _)) if owner == wallet_id))
    }

    fn sign_tx(
        &self,
        wallet_id: &str,
        tx: &Transaction,
        prevouts: &[Utxo],
    ) -> ContractResult<Transaction> {
        let state = self.read();
        let wallet = state
            .wallets
            .get(wallet_id)
            .ok_or_else(|| ContractError::WalletNotFound(wallet_id.to_string()))?;

        let cache = SighashCache::new(tx);
        let mut signed = tx.clone();
        let mut signed_count = 0;
        for (index, input) in tx.input.iter().enumerate() {
            let prevout = prevouts
                .iter()
                .find(|u| u.outpoint == input.previous_output)
                .or_else(|| state.utxos.get(&input.previous_output).map(|(_, u)| u));
            let prevout = match prevout {
                Some(prevout) => prevout,
                None => continue,
            };
            let base = uncolored_script(&prevout.script_pubkey);
            let key = match wallet.keys.iter().find(|k| k.script_pubkey == base) {
                Some(key) => key,
                None => continue,
            };
            signed.input[index].script_sig = self.sign_input(&cache, index, prevout, key)?;
            signed_count += 1;
        }

        debug!("Signed {} of {} inputs for {}", signed_count, tx.input.len(), wallet_id);
        Ok(signed)
    }

    fn broadcast(
        &self,
        wallet_id: &str,
        tx: &Transaction,
        on_sent: Option<OnSent<'_>>,
    ) -> ContractResult<Transaction> {
        let txid = malleability_fixed_txid(tx);
        {
            let state = self.read();
            if !state.wallets.contains_key(wallet_id) {
                return Err(ContractError::WalletNotFound(wallet_id.to_string()));
            }
            if state.transactions.contains_key(&txid) {
                return Err(ContractError::TxAlreadyBroadcasted(txid.to_string()));
            }
            let mut seen = HashSet::new();
            for input in &tx.input {
                if !seen.insert(input.previous_output) {
                    return Err(ContractError::FailedToBroadcast(format!(
                        "input {} spent twice",
                        input.previous_output
                    )));
                }
                if !state.utxos.contains_key(&input.previous_output) {
                    return Err(ContractError::FailedToBroadcast(format!(
                        "input {} is unknown or already spent",
                        input.previous_output
                    )));
                }
                if input.script_sig.is_empty() {
                    return Err(ContractError::FailedToBroadcast(format!(
                        "input {} is not signed",
                        input.previous_output
                    )));
                }
            }
        }

        if let Some(callback) = on_sent {
            callback(tx);
        }

        let mut state = self.write();
        for input in &tx.input {
            state.utxos.remove(&input.previous_output);
        }
        for (vout, output) in tx.output.iter().enumerate() {
            let base = uncolored_script(&output.script_pubkey);
            let owner = state.owners.get(&base).cloned();
            if let Some((owner, key_index)) = owner {
                let label = state.wallets[&owner].keys[key_index].label.clone();
                let outpoint = OutPoint::new(txid, vout as u32);
                let mut utxo = Utxo::new(outpoint, output.script_pubkey.clone(), output.value);
                utxo.label = label;
                state.utxos.insert(outpoint, (owner, utxo));
            }
        }
        state.transactions.insert(txid, tx.clone());
        state.broadcast_log.push(tx.clone());

        log_transaction(
            LogLevel::Info,
            "transaction broadcast",
            Some(json!({
                "txid": txid.to_string(),
                "inputs": tx.input.len(),
                "outputs": tx.output.len(),
            })),
        );
        Ok(tx.clone())
    }
}
