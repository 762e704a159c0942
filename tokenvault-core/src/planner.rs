//! Token lifecycle planning
//!
//! The planner turns a lifecycle request into a validated [`TransactionPlan`]
//! without signing or broadcasting anything. Each call reads a fresh UTXO
//! snapshot from the wallet and is otherwise stateless; any validation
//! failure returns before a transaction is built.
//!
//! Collateral comes from the caller's wallet by default. When the context
//! carries a collateral pool, a funding transaction first moves a fixed
//! amount from the pool to an output the caller controls, and the operation
//! spends that output. The remainder after fees returns to the pool.

use bitcoin::blockdata::script::{Script, ScriptBuf};
use bitcoin::TxOut;
use serde_json::json;

use tokenvault_common::color::{
    colored_script, ColorIdentifier, ColorSource, TokenKind, COLOR_PAYLOAD_LEN,
};
use tokenvault_common::error::{ContractError, ContractResult};
use tokenvault_common::ledger::{new_transaction, output, unsigned_input};
use tokenvault_common::logging::{log_contract, LogLevel};
use tokenvault_common::types::{Receiver, FUNDING_TX_AMOUNT, MAX_SPLIT};
use tokenvault_common::utxo_selection::{LabelFilter, Utxo, UtxoSelector};

use crate::collateral::{fund_draft, plan_funding, CollateralPool, Funded};
use crate::context::ContractContext;
use crate::plan::{PlannedTransaction, TransactionPlan, TxRole};
use crate::token::Token;
use crate::wallet::script_for_address;

/// Split `amount` into `split` outputs, the remainder going to the first
///
/// When `split` exceeds `amount`, every output carries one unit.
pub fn split_amounts(amount: u64, split: u32) -> Vec<u64> {
    let split = u64::from(split.max(1));
    if split > amount {
        return vec![1; amount as usize];
    }
    let base = amount / split;
    let mut amounts = vec![base; split as usize];
    amounts[0] += amount % split;
    amounts
}

fn validate_amount(amount: u64) -> ContractResult<()> {
    if amount == 0 {
        return Err(ContractError::invalid_amount("amount must be positive"));
    }
    Ok(())
}

fn validate_split(kind: TokenKind, split: u32) -> ContractResult<()> {
    if split == 0 {
        return Err(ContractError::InvalidSplit("split must be positive".to_string()));
    }
    if split > MAX_SPLIT {
        return Err(ContractError::InvalidSplit(format!(
            "split {} exceeds the maximum of {}",
            split, MAX_SPLIT
        )));
    }
    if kind == TokenKind::Nft && split != 1 {
        return Err(ContractError::InvalidSplit(
            "an NFT cannot be split".to_string(),
        ));
    }
    Ok(())
}

fn colored_outputs(color: &ColorIdentifier, base: &Script, amounts: &[u64]) -> Vec<TxOut> {
    amounts
        .iter()
        .map(|amount| output(*amount, colored_script(color, base)))
        .collect()
}

/// Plans issue, reissue, transfer and burn transactions
pub struct TransactionPlanner<'c, 'a> {
    ctx: &'c ContractContext<'a>,
}

impl<'c, 'a> TransactionPlanner<'c, 'a> {
    pub fn new(ctx: &'c ContractContext<'a>) -> Self {
        Self { ctx }
    }

    /// Plan the issuance of a new token of kind `token_type`
    ///
    /// An NFT always issues a single unit regardless of `amount`.
    pub fn issue(
        &self,
        issuer: &str,
        token_type: impl Into<u8>,
        amount: u64,
        split: u32,
    ) -> ContractResult<(Token, TransactionPlan)> {
        validate_amount(amount)?;
        let kind = TokenKind::from_tag(token_type.into())?;
        validate_split(kind, split)?;
        let amount = if kind == TokenKind::Nft { 1 } else { amount };
        let amounts = split_amounts(amount, split);

        let wallet = self.ctx.wallet();
        let receiver = wallet.receive_script(issuer, None)?;

        let (token, plan) = match CollateralPool::from_context(self.ctx) {
            Some(pool) => {
                let funding_script = wallet.receive_script(issuer, None)?;
                let (funding, funding_output) = pool.plan_funding(&funding_script)?;
                let color = match kind {
                    TokenKind::Reissuable => ColorIdentifier::reissuable(&funding_script),
                    _ => ColorIdentifier::derive(kind, ColorSource::OutPoint(&funding_output.outpoint))?,
                };

                let mut draft = new_transaction();
                draft.output = colored_outputs(&color, &receiver, &amounts);
                let funded = pool.fund_dependent(&draft, &funding_output, false)?;
                let issuance = PlannedTransaction::new(TxRole::Issue, funded.tx, issuer, funded.inputs);

                let token_script = match kind {
                    TokenKind::Reissuable => funding_script,
                    _ => receiver,
                };
                (
                    Token::new(color, Some(token_script)),
                    TransactionPlan::funded(funding, issuance)?,
                )
            }
            None => {
                let candidates =
                    wallet.list_unspent(issuer, self.ctx.only_finalized(), &LabelFilter::Unlabeled)?;
                let change = wallet.change_script(issuer)?;

                // Colored scripts have a fixed size, so the fee does not depend on the color
                let placeholder = ColorIdentifier::from_parts(kind.tag(), vec![0u8; COLOR_PAYLOAD_LEN]);
                let mut draft = new_transaction();
                draft.output = colored_outputs(&placeholder, &receiver, &amounts);
                let mut funded = fund_draft(
                    self.ctx,
                    &draft,
                    &[],
                    &candidates,
                    &self.ctx.selector(),
                    &change,
                    false,
                )?;

                let first = funded.inputs.first().cloned().ok_or_else(|| {
                    ContractError::InvariantViolation("issuance has no collateral input".to_string())
                })?;
                let color = match kind {
                    TokenKind::Reissuable => ColorIdentifier::reissuable(&first.script_pubkey),
                    _ => ColorIdentifier::derive(kind, ColorSource::OutPoint(&first.outpoint))?,
                };
                for out in funded.tx.output.iter_mut().take(amounts.len()) {
                    out.script_pubkey = colored_script(&color, &receiver);
                }

                let token_script = match kind {
                    TokenKind::Reissuable => first.script_pubkey.clone(),
                    _ => receiver,
                };
                let issuance = PlannedTransaction::new(TxRole::Issue, funded.tx, issuer, funded.inputs);
                (Token::new(color, Some(token_script)), TransactionPlan::single(issuance))
            }
        };

        plan.validate(self.ctx.dust_limit())?;
        log_contract(
            LogLevel::Info,
            "issue planned",
            Some(json!({
                "color_id": token.color_id().to_hex(),
                "kind": kind.to_string(),
                "amount": amount,
                "split": amounts.len(),
                "transactions": plan.len(),
            })),
        );
        Ok((token, plan))
    }

    /// Plan the issuance of more units of a reissuable token
    pub fn reissue(
        &self,
        token: &Token,
        issuer: &str,
        amount: u64,
        split: u32,
    ) -> ContractResult<(Token, TransactionPlan)> {
        validate_amount(amount)?;
        let kind = token.color_id().kind()?;
        if kind != TokenKind::Reissuable {
            return Err(ContractError::InvalidTokenType(format!(
                "reissue requires a reissuable token, got {}",
                kind
            )));
        }
        validate_split(kind, split)?;

        let color = token.color_id().clone();
        let script = self.controlling_script(token)?;
        let wallet = self.ctx.wallet();
        if !wallet.owns_script(issuer, &script)? {
            return Err(ContractError::UnknownScriptPubkey(hex::encode(script.as_bytes())));
        }

        let amounts = split_amounts(amount, split);
        let receiver = wallet.receive_script(issuer, None)?;
        let mut draft = new_transaction();
        draft.output = colored_outputs(&color, &receiver, &amounts);

        let selector = self.ctx.selector();
        let candidates =
            wallet.list_unspent(issuer, self.ctx.only_finalized(), &LabelFilter::Unlabeled)?;
        let anchor = selector
            .eligible(&candidates, None)
            .into_iter()
            .find(|u| u.script_pubkey == script)
            .cloned();

        let plan = match (anchor, CollateralPool::from_context(self.ctx)) {
            (Some(anchor), _) => {
                let rest: Vec<Utxo> = candidates
                    .iter()
                    .filter(|u| u.outpoint != anchor.outpoint)
                    .cloned()
                    .collect();
                let change = wallet.change_script(issuer)?;
                let funded = fund_draft(self.ctx, &draft, &[anchor], &rest, &selector, &change, false)?;
                TransactionPlan::single(PlannedTransaction::new(
                    TxRole::Reissue,
                    funded.tx,
                    issuer,
                    funded.inputs,
                ))
            }
            (None, Some(pool)) => {
                let (funding, funding_output) = pool.plan_funding(&script)?;
                let funded = pool.fund_dependent(&draft, &funding_output, false)?;
                TransactionPlan::funded(
                    funding,
                    PlannedTransaction::new(TxRole::Reissue, funded.tx, issuer, funded.inputs),
                )?
            }
            (None, None) => {
                let (funding, funding_output) =
                    plan_funding(self.ctx, issuer, &script, FUNDING_TX_AMOUNT)?;
                let change = wallet.change_script(issuer)?;
                let funded = fund_draft(
                    self.ctx,
                    &draft,
                    std::slice::from_ref(&funding_output),
                    &[],
                    &UtxoSelector::new(false),
                    &change,
                    false,
                )?;
                TransactionPlan::funded(
                    funding,
                    PlannedTransaction::new(TxRole::Reissue, funded.tx, issuer, funded.inputs),
                )?
            }
        };

        plan.validate(self.ctx.dust_limit())?;
        log_contract(
            LogLevel::Info,
            "reissue planned",
            Some(json!({
                "color_id": color.to_hex(),
                "amount": amount,
                "transactions": plan.len(),
            })),
        );
        Ok((Token::new(color, Some(script)), plan))
    }

    /// Plan a transfer of `amount` to a single receiver
    pub fn transfer(
        &self,
        token: &Token,
        sender: &str,
        receiver_address: &str,
        amount: u64,
    ) -> ContractResult<(Token, TransactionPlan)> {
        self.multi_transfer(token, sender, &[Receiver::new(receiver_address, amount)])
    }

    /// Plan a transfer to several receivers in one transaction
    pub fn multi_transfer(
        &self,
        token: &Token,
        sender: &str,
        receivers: &[Receiver],
    ) -> ContractResult<(Token, TransactionPlan)> {
        if receivers.is_empty() {
            return Err(ContractError::invalid_amount("at least one receiver is required"));
        }
        let mut total: u64 = 0;
        for receiver in receivers {
            validate_amount(receiver.amount)?;
            total = total
                .checked_add(receiver.amount)
                .ok_or_else(|| ContractError::invalid_amount("total amount overflows"))?;
        }
        let network = self.ctx.network();
        let receiver_scripts = receivers
            .iter()
            .map(|r| script_for_address(&r.address, network))
            .collect::<ContractResult<Vec<ScriptBuf>>>()?;

        let color = token.color_id();
        let mut outputs: Vec<TxOut> = receivers
            .iter()
            .zip(&receiver_scripts)
            .map(|(r, script)| output(r.amount, colored_script(color, script)))
            .collect();

        let plan = self.plan_colored_spend(TxRole::Transfer, color, sender, total, &mut outputs)?;
        log_contract(
            LogLevel::Info,
            "transfer planned",
            Some(json!({
                "color_id": color.to_hex(),
                "amount": total,
                "receivers": receivers.len(),
                "transactions": plan.len(),
            })),
        );
        Ok((token.clone(), plan))
    }

    /// Plan the destruction of `amount` units held by `sender`
    pub fn burn(&self, token: &Token, sender: &str, amount: u64) -> ContractResult<TransactionPlan> {
        validate_amount(amount)?;
        let color = token.color_id();
        let plan = self.plan_colored_spend(TxRole::Burn, color, sender, amount, &mut Vec::new())?;
        log_contract(
            LogLevel::Info,
            "burn planned",
            Some(json!({
                "color_id": color.to_hex(),
                "amount": amount,
                "transactions": plan.len(),
            })),
        );
        Ok(plan)
    }

    /// Spend `amount` of `color` from `sender` into `outputs`, adding colored
    /// change and fee funding
    fn plan_colored_spend(
        &self,
        role: TxRole,
        color: &ColorIdentifier,
        sender: &str,
        amount: u64,
        outputs: &mut Vec<TxOut>,
    ) -> ContractResult<TransactionPlan> {
        let wallet = self.ctx.wallet();
        let selector = self.ctx.selector();
        let utxos = wallet.list_unspent(sender, self.ctx.only_finalized(), &LabelFilter::Unlabeled)?;

        let balance = selector.balance(&utxos, Some(color));
        if balance < amount {
            return Err(ContractError::InsufficientTokens {
                color_id: color.to_hex(),
                needed: amount,
                available: balance,
            });
        }
        let colored = selector.select(&utxos, amount, Some(color))?;

        let mut draft = new_transaction();
        draft
            .input
            .extend(colored.selected.iter().map(|u| unsigned_input(u.outpoint)));
        draft.output.append(outputs);
        if colored.total > amount {
            let change = wallet.change_script(sender)?;
            draft
                .output
                .push(output(colored.total - amount, colored_script(color, &change)));
        }

        let keep_uncolored_output = role == TxRole::Burn;
        let plan = match CollateralPool::from_context(self.ctx) {
            Some(pool) => {
                let funding_script = wallet.receive_script(sender, None)?;
                let (funding, funding_output) = pool.plan_funding(&funding_script)?;
                let funded = pool.fund_dependent(&draft, &funding_output, keep_uncolored_output)?;
                let node = Self::spend_node(role, sender, colored.selected, funded);
                TransactionPlan::funded(funding, node)?
            }
            None => {
                let change = wallet.change_script(sender)?;
                let funded = fund_draft(
                    self.ctx,
                    &draft,
                    &[],
                    &utxos,
                    &selector,
                    &change,
                    keep_uncolored_output,
                )?;
                TransactionPlan::single(Self::spend_node(role, sender, colored.selected, funded))
            }
        };
        plan.validate(self.ctx.dust_limit())?;
        Ok(plan)
    }

    fn spend_node(role: TxRole, sender: &str, colored: Vec<Utxo>, funded: Funded) -> PlannedTransaction {
        let mut prevouts = colored;
        prevouts.extend(funded.inputs);
        PlannedTransaction::new(role, funded.tx, sender, prevouts)
    }

    /// Script controlling a reissuable token, preferring the persisted record
    fn controlling_script(&self, token: &Token) -> ContractResult<ScriptBuf> {
        let color = token.color_id();
        let script = match self.ctx.token_store().script_pubkey(color)? {
            Some(script) => script,
            None => token
                .script_pubkey()
                .map(|s| s.to_owned())
                .map_err(|_| ContractError::UnknownScriptPubkey(color.to_hex()))?,
        };
        if ColorIdentifier::reissuable(&script) != *color {
            return Err(ContractError::UnknownScriptPubkey(format!(
                "{} does not control {}",
                hex::encode(script.as_bytes()),
                color
            )));
        }
        Ok(script)
    }
}
