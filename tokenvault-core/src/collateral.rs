//! Uncolored collateral: fee funding and the shared collateral pool
//!
//! Every planned transaction pays its fee from uncolored inputs. The funding
//! loop estimates the fee of the draft with a change output, selects
//! uncolored UTXOs covering it, and repeats with the larger input set until
//! the selection covers its own estimate. Change below the dust limit is
//! folded into the fee unless the transaction must keep an uncolored output.

use bitcoin::blockdata::script::Script;
use bitcoin::{OutPoint, Transaction};
use log::debug;
use serde_json::json;

use tokenvault_common::color::color_of;
use tokenvault_common::error::ContractResult;
use tokenvault_common::ledger::{malleability_fixed_txid, new_transaction, output, unsigned_input};
use tokenvault_common::logging::{log_contract, LogLevel};
use tokenvault_common::utxo_selection::{total_value, LabelFilter, Selection, Utxo, UtxoSelector};

use crate::context::ContractContext;
use crate::plan::{PlannedTransaction, TransactionPlan, TxRole};

/// A draft completed with uncolored inputs and change
#[derive(Debug, Clone)]
pub struct Funded {
    pub tx: Transaction,
    /// Uncolored inputs added to the draft, mandatory ones first
    pub inputs: Vec<Utxo>,
    /// Fee paid, including any change folded into it
    pub fee: u64,
    /// Value of the change output, zero when none was added
    pub change: u64,
}

/// Complete `draft` with uncolored inputs paying for its fee
///
/// `mandatory` inputs are always spent, ahead of anything chosen from
/// `candidates`. With `keep_uncolored_output` the result always ends with an
/// uncolored change output of at least the dust limit.
pub fn fund_draft(
    ctx: &ContractContext<'_>,
    draft: &Transaction,
    mandatory: &[Utxo],
    candidates: &[Utxo],
    selector: &UtxoSelector,
    change_script: &Script,
    keep_uncolored_output: bool,
) -> ContractResult<Funded> {
    let dust = ctx.dust_limit();
    let reserve = if keep_uncolored_output { dust } else { 0 };
    let draft_out: u64 = draft
        .output
        .iter()
        .filter(|o| color_of(&o.script_pubkey).is_none())
        .map(|o| o.value)
        .sum();
    let mandatory_total = total_value(mandatory);
    let mut selection = Selection {
        selected: Vec::new(),
        total: 0,
    };

    loop {
        let inputs: Vec<Utxo> = mandatory
            .iter()
            .chain(selection.selected.iter())
            .cloned()
            .collect();
        let mut tx = draft.clone();
        tx.input.extend(inputs.iter().map(|u| unsigned_input(u.outpoint)));

        let mut with_change = tx.clone();
        with_change.output.push(output(0, change_script.to_owned()));
        let fee = ctx.fee_estimator().estimate(&with_change);

        let inputs_total = mandatory_total + selection.total;
        let required = draft_out + fee + reserve;
        if inputs_total >= required && !inputs.is_empty() {
            let change = inputs_total - draft_out - fee;
            if change >= dust {
                if let Some(last) = with_change.output.last_mut() {
                    last.value = change;
                }
                debug!("Funded draft: {} inputs, fee {}, change {}", inputs.len(), fee, change);
                return Ok(Funded {
                    tx: with_change,
                    inputs,
                    fee,
                    change,
                });
            }
            debug!("Funded draft: {} inputs, fee {} (dust change {} absorbed)", inputs.len(), fee, change);
            return Ok(Funded {
                tx,
                inputs,
                fee: fee + change,
                change: 0,
            });
        }

        let floor = if mandatory.is_empty() { 1 } else { 0 };
        let target = required.saturating_sub(mandatory_total).max(floor);
        selection = selector.select(candidates, target, None)?;
    }
}

/// Plan a transaction moving `amount` from `funder` to `target_script`
///
/// Returns the funding node and the output it creates, which is always the
/// first output.
pub fn plan_funding(
    ctx: &ContractContext<'_>,
    funder: &str,
    target_script: &Script,
    amount: u64,
) -> ContractResult<(PlannedTransaction, Utxo)> {
    let wallet = ctx.wallet();
    let candidates = wallet.list_unspent(funder, ctx.only_finalized(), &LabelFilter::Unlabeled)?;
    let change_script = wallet.change_script(funder)?;

    let mut draft = new_transaction();
    draft.output.push(output(amount, target_script.to_owned()));
    let funded = fund_draft(
        ctx,
        &draft,
        &[],
        &candidates,
        &ctx.selector(),
        &change_script,
        false,
    )?;

    let txid = malleability_fixed_txid(&funded.tx);
    let funding_output = Utxo::new(OutPoint::new(txid, 0), target_script.to_owned(), amount);
    let node = PlannedTransaction::new(TxRole::Funding, funded.tx, funder, funded.inputs);
    Ok((node, funding_output))
}

/// Number and total value of the UTXOs held by the collateral pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub count: usize,
    pub total: u64,
    /// UTXOs whose value equals the configured pool UTXO value
    pub pool_sized: usize,
}

/// Shared wallet supplying uncolored collateral
pub struct CollateralPool<'c, 'a> {
    ctx: &'c ContractContext<'a>,
    wallet_id: String,
    funding_amount: u64,
    pool_size: usize,
    pool_utxo_value: u64,
}

impl<'c, 'a> CollateralPool<'c, 'a> {
    /// The pool configured on `ctx`, if any
    pub fn from_context(ctx: &'c ContractContext<'a>) -> Option<Self> {
        ctx.utxo_provider().map(|provider| Self {
            ctx,
            wallet_id: provider.wallet_id.clone(),
            funding_amount: provider.funding_amount,
            pool_size: provider.pool_size,
            pool_utxo_value: provider.pool_utxo_value,
        })
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn funding_amount(&self) -> u64 {
        self.funding_amount
    }

    /// Funding transaction paying the collateral amount to `target_script`
    pub fn plan_funding(&self, target_script: &Script) -> ContractResult<(PlannedTransaction, Utxo)> {
        let (node, funding_output) =
            plan_funding(self.ctx, &self.wallet_id, target_script, self.funding_amount)?;
        log_contract(
            LogLevel::Debug,
            "collateral funding planned",
            Some(json!({
                "pool": self.wallet_id,
                "amount": self.funding_amount,
                "inputs": node.tx.input.len(),
            })),
        );
        Ok((node, funding_output))
    }

    /// Complete a dependent draft that spends `funding_output`
    ///
    /// The remainder after fees returns to the pool.
    pub fn fund_dependent(
        &self,
        draft: &Transaction,
        funding_output: &Utxo,
        keep_uncolored_output: bool,
    ) -> ContractResult<Funded> {
        let change_script = self.ctx.wallet().change_script(&self.wallet_id)?;
        fund_draft(
            self.ctx,
            draft,
            std::slice::from_ref(funding_output),
            &[],
            &UtxoSelector::new(false),
            &change_script,
            keep_uncolored_output,
        )
    }

    pub fn status(&self) -> ContractResult<PoolStatus> {
        let utxos = self.ctx.wallet().list_unspent(
            &self.wallet_id,
            self.ctx.only_finalized(),
            &LabelFilter::Unlabeled,
        )?;
        let uncolored: Vec<&Utxo> = utxos.iter().filter(|u| !u.is_colored()).collect();
        Ok(PoolStatus {
            count: uncolored.len(),
            total: uncolored.iter().map(|u| u.amount).sum(),
            pool_sized: uncolored
                .iter()
                .filter(|u| u.amount == self.pool_utxo_value)
                .count(),
        })
    }

    /// Plan a transaction topping the pool up to its configured size
    ///
    /// Spends pool UTXOs that are not already pool-sized and creates one
    /// output of the pool UTXO value per missing slot. Returns `None` when the
    /// pool is already full.
    pub fn plan_refill(&self) -> ContractResult<Option<TransactionPlan>> {
        let wallet = self.ctx.wallet();
        let utxos = wallet.list_unspent(
            &self.wallet_id,
            self.ctx.only_finalized(),
            &LabelFilter::Unlabeled,
        )?;
        let pool_sized = utxos
            .iter()
            .filter(|u| !u.is_colored() && u.amount == self.pool_utxo_value)
            .count();
        if pool_sized >= self.pool_size {
            return Ok(None);
        }
        let missing = self.pool_size - pool_sized;

        let candidates: Vec<Utxo> = utxos
            .into_iter()
            .filter(|u| u.amount != self.pool_utxo_value)
            .collect();
        let mut draft = new_transaction();
        for _ in 0..missing {
            let script = wallet.receive_script(&self.wallet_id, None)?;
            draft.output.push(output(self.pool_utxo_value, script));
        }
        let change_script = wallet.change_script(&self.wallet_id)?;
        let funded = fund_draft(
            self.ctx,
            &draft,
            &[],
            &candidates,
            &self.ctx.selector(),
            &change_script,
            false,
        )?;

        log_contract(
            LogLevel::Info,
            "collateral pool refill planned",
            Some(json!({ "pool": self.wallet_id, "outputs": missing, "fee": funded.fee })),
        );
        let node = PlannedTransaction::new(TxRole::PoolRefill, funded.tx, &self.wallet_id, funded.inputs);
        let plan = TransactionPlan::single(node);
        plan.validate(self.ctx.dust_limit())?;
        Ok(Some(plan))
    }
}
