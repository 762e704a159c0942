//! Ordered transaction plans and their execution
//!
//! A plan holds one or two unsigned transactions. With a collateral pool the
//! first one is a funding transaction and the second spends its output; the
//! edge between them is recorded explicitly as a [`Dependency`]. Because
//! transaction ids are malleability-fixed, the dependent transaction can
//! reference the funding output before either is signed.
//!
//! Execution signs every node first and only then broadcasts them in order.
//! A broadcast failure after the first node leaves the funding transaction
//! committed; reconciling that is left to the caller.

use bitcoin::{Transaction, Txid};
use serde_json::json;
use std::collections::BTreeMap;

use tokenvault_common::color::{color_of, ColorIdentifier};
use tokenvault_common::error::{ContractError, ContractResult};
use tokenvault_common::ledger::malleability_fixed_txid;
use tokenvault_common::logging::{log_transaction, LogLevel};
use tokenvault_common::utxo_selection::Utxo;

use crate::wallet::{OnSent, WalletAdapter};

/// Purpose of a planned transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxRole {
    /// Moves collateral to an output the dependent transaction spends
    Funding,
    Issue,
    Reissue,
    Transfer,
    Burn,
    /// Splits collateral pool funds into pool-sized outputs
    PoolRefill,
}

/// An unsigned transaction together with what is needed to sign it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransaction {
    pub role: TxRole,
    pub tx: Transaction,
    /// Wallet whose keys sign the inputs
    pub signer: String,
    /// Outputs spent by `tx`
    pub prevouts: Vec<Utxo>,
}

/// `child.input[input]` spends `parent.output[output]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub parent: usize,
    pub output: u32,
    pub child: usize,
    pub input: usize,
}

impl PlannedTransaction {
    pub fn new(role: TxRole, tx: Transaction, signer: impl Into<String>, prevouts: Vec<Utxo>) -> Self {
        Self {
            role,
            tx,
            signer: signer.into(),
            prevouts,
        }
    }

    /// Malleability-fixed id, identical before and after signing
    pub fn txid(&self) -> Txid {
        malleability_fixed_txid(&self.tx)
    }

    fn prevout(&self, index: usize) -> ContractResult<&Utxo> {
        let outpoint = self.tx.input[index].previous_output;
        self.prevouts
            .iter()
            .find(|u| u.outpoint == outpoint)
            .ok_or_else(|| {
                ContractError::InvariantViolation(format!("no prevout for input {}", outpoint))
            })
    }

    /// Check value conservation and dust rules for this transaction
    pub fn check_balance(&self, dust_limit: u64) -> ContractResult<()> {
        let mut uncolored_in: u64 = 0;
        let mut colored_in: BTreeMap<ColorIdentifier, u64> = BTreeMap::new();
        for index in 0..self.tx.input.len() {
            let prevout = self.prevout(index)?;
            match &prevout.color_id {
                Some(color) => *colored_in.entry(color.clone()).or_insert(0) += prevout.amount,
                None => uncolored_in += prevout.amount,
            }
        }

        let mut uncolored_out: u64 = 0;
        let mut uncolored_outputs = 0;
        let mut colored_out: BTreeMap<ColorIdentifier, u64> = BTreeMap::new();
        for output in &self.tx.output {
            match color_of(&output.script_pubkey) {
                Some(color) => {
                    if output.value == 0 {
                        return Err(ContractError::InvariantViolation(
                            "colored output with zero value".to_string(),
                        ));
                    }
                    *colored_out.entry(color).or_insert(0) += output.value;
                }
                None => {
                    if output.value < dust_limit {
                        return Err(ContractError::InvariantViolation(format!(
                            "uncolored output of {} is below the dust limit {}",
                            output.value, dust_limit
                        )));
                    }
                    uncolored_out += output.value;
                    uncolored_outputs += 1;
                }
            }
        }

        if uncolored_in < uncolored_out {
            return Err(ContractError::InvariantViolation(format!(
                "uncolored outputs {} exceed inputs {}",
                uncolored_out, uncolored_in
            )));
        }

        match self.role {
            TxRole::Transfer => {
                if colored_in != colored_out {
                    return Err(ContractError::InvariantViolation(
                        "transfer does not conserve colored supply".to_string(),
                    ));
                }
            }
            TxRole::Burn => {
                for (color, amount) in &colored_out {
                    if colored_in.get(color).copied().unwrap_or(0) < *amount {
                        return Err(ContractError::InvariantViolation(format!(
                            "burn creates tokens of {}",
                            color
                        )));
                    }
                }
                if uncolored_outputs == 0 {
                    return Err(ContractError::InvariantViolation(
                        "burn leaves no uncolored output".to_string(),
                    ));
                }
            }
            TxRole::Issue | TxRole::Reissue => {
                if !colored_in.is_empty() {
                    return Err(ContractError::InvariantViolation(
                        "issuance spends colored inputs".to_string(),
                    ));
                }
            }
            TxRole::Funding | TxRole::PoolRefill => {
                if !colored_in.is_empty() || !colored_out.is_empty() {
                    return Err(ContractError::InvariantViolation(
                        "collateral transaction touches colored outputs".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// One or two transactions to sign and broadcast in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPlan {
    nodes: Vec<PlannedTransaction>,
    dependency: Option<Dependency>,
}

impl TransactionPlan {
    /// Plan consisting of a single transaction
    pub fn single(node: PlannedTransaction) -> Self {
        Self {
            nodes: vec![node],
            dependency: None,
        }
    }

    /// Plan where `dependent` spends an output of `funding`
    pub fn funded(funding: PlannedTransaction, dependent: PlannedTransaction) -> ContractResult<Self> {
        let funding_txid = funding.txid();
        let (input, outpoint) = dependent
            .tx
            .input
            .iter()
            .enumerate()
            .find(|(_, i)| i.previous_output.txid == funding_txid)
            .map(|(index, i)| (index, i.previous_output))
            .ok_or_else(|| {
                ContractError::InvariantViolation(
                    "dependent transaction does not spend the funding output".to_string(),
                )
            })?;
        if outpoint.vout as usize >= funding.tx.output.len() {
            return Err(ContractError::InvariantViolation(format!(
                "funding transaction has no output {}",
                outpoint.vout
            )));
        }
        Ok(Self {
            nodes: vec![funding, dependent],
            dependency: Some(Dependency {
                parent: 0,
                output: outpoint.vout,
                child: 1,
                input,
            }),
        })
    }

    pub fn nodes(&self) -> &[PlannedTransaction] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dependency(&self) -> Option<Dependency> {
        self.dependency
    }

    /// The funding transaction, when the plan has one
    pub fn funding(&self) -> Option<&PlannedTransaction> {
        self.dependency.map(|d| &self.nodes[d.parent])
    }

    /// The transaction carrying the requested operation
    pub fn primary(&self) -> &PlannedTransaction {
        &self.nodes[self.nodes.len() - 1]
    }

    /// Unsigned transactions in plan order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.nodes.iter().map(|n| n.tx.clone()).collect()
    }

    /// Check every node against the conservation rules
    pub fn validate(&self, dust_limit: u64) -> ContractResult<()> {
        for node in &self.nodes {
            node.check_balance(dust_limit)?;
        }
        Ok(())
    }

    /// Sign every node, then broadcast them in plan order
    pub fn execute(
        &self,
        wallet: &dyn WalletAdapter,
        on_sent: Option<OnSent<'_>>,
    ) -> ContractResult<Vec<Transaction>> {
        let mut signed = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            signed.push(wallet.sign_tx(&node.signer, &node.tx, &node.prevouts)?);
        }

        if let Some(dep) = self.dependency {
            let parent = malleability_fixed_txid(&signed[dep.parent]);
            let spent = signed[dep.child].input[dep.input].previous_output;
            if spent.txid != parent || spent.vout != dep.output {
                return Err(ContractError::InvariantViolation(
                    "signing changed the funding transaction id".to_string(),
                ));
            }
        }

        let mut broadcast = Vec::with_capacity(signed.len());
        for (node, tx) in self.nodes.iter().zip(signed) {
            let sent = wallet.broadcast(&node.signer, &tx, on_sent)?;
            log_transaction(
                LogLevel::Debug,
                "plan step broadcast",
                Some(json!({
                    "role": format!("{:?}", node.role),
                    "txid": malleability_fixed_txid(&sent).to_string(),
                })),
            );
            broadcast.push(sent);
        }
        Ok(broadcast)
    }
}
