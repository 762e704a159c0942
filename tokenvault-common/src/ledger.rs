//! Ledger-level helpers for building and identifying transactions
//!
//! Transaction ids on the colored ledger are malleability-fixed: they hash
//! the transaction with every input script emptied. A plan can therefore
//! reference the outputs of a funding transaction before anything is signed.

use bitcoin::blockdata::locktime::absolute::LockTime;
use bitcoin::blockdata::script::ScriptBuf;
use bitcoin::consensus::encode::serialize;
use bitcoin::{OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

/// Transaction version used for every planned transaction
pub const TX_VERSION: i32 = 1;

/// Create an empty transaction ready to receive inputs and outputs
pub fn new_transaction() -> Transaction {
    Transaction {
        version: TX_VERSION,
        lock_time: LockTime::ZERO,
        input: Vec::new(),
        output: Vec::new(),
    }
}

/// Create an unsigned input spending `outpoint`
pub fn unsigned_input(outpoint: OutPoint) -> TxIn {
    TxIn {
        previous_output: outpoint,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::default(),
    }
}

/// Create an output paying `value` to `script_pubkey`
pub fn output(value: u64, script_pubkey: ScriptBuf) -> TxOut {
    TxOut {
        value,
        script_pubkey,
    }
}

/// Compute the malleability-fixed id of a transaction
pub fn malleability_fixed_txid(tx: &Transaction) -> Txid {
    let mut stripped = tx.clone();
    for input in stripped.input.iter_mut() {
        input.script_sig = ScriptBuf::new();
        input.witness = Witness::default();
    }
    stripped.txid()
}

/// Serialized size of a transaction in bytes
pub fn serialized_size(tx: &Transaction) -> usize {
    serialize(tx).len()
}

/// Sum of all output values
pub fn total_output_value(tx: &Transaction) -> u64 {
    tx.output.iter().map(|o| o.value).sum()
}
