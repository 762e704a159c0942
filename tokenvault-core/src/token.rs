//! Token façade
//!
//! A [`Token`] is a color identifier plus, when known, the script it was
//! issued to. Lifecycle methods plan through [`TransactionPlanner`], then sign
//! and broadcast the plan through the context's wallet and return the
//! broadcast transactions in plan order.
//!
//! # Binary payload
//!
//! ```text
//! tag (1 byte) | color payload (32 bytes) | script_pubkey (0..n bytes)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (token, txs) = Token::issue(&ctx, "alice", TokenKind::Reissuable, 1_000, 1)?;
//! let payload = token.to_payload()?;
//! assert_eq!(Token::parse_from_payload(&payload)?, token);
//! ```

use bitcoin::blockdata::script::ScriptBuf;
use bitcoin::Transaction;
use serde_json::json;

use tokenvault_common::color::{ColorIdentifier, TokenKind, COLOR_ID_LEN};
use tokenvault_common::error::{ContractError, ContractResult};
use tokenvault_common::logging::{log_contract, LogLevel};
use tokenvault_common::types::Receiver;
use tokenvault_common::utxo_selection::LabelFilter;

use crate::context::ContractContext;
use crate::plan::TransactionPlan;
use crate::planner::TransactionPlanner;

/// A colored token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    color_id: ColorIdentifier,
    script_pubkey: Option<ScriptBuf>,
}

impl Token {
    pub fn new(color_id: ColorIdentifier, script_pubkey: Option<ScriptBuf>) -> Self {
        Self {
            color_id,
            script_pubkey,
        }
    }

    pub fn color_id(&self) -> &ColorIdentifier {
        &self.color_id
    }

    /// Kind of this token, failing for unrecognized tags
    pub fn kind(&self) -> ContractResult<TokenKind> {
        self.color_id.kind()
    }

    /// The script this token was issued to
    pub fn script_pubkey(&self) -> ContractResult<&ScriptBuf> {
        self.script_pubkey
            .as_ref()
            .ok_or_else(|| ContractError::invalid_argument("script_pubkey should not be empty"))
    }

    /// Serialize as color identifier followed by the script
    pub fn to_payload(&self) -> ContractResult<Vec<u8>> {
        let script = self.script_pubkey()?;
        let mut payload = self.color_id.to_payload();
        payload.extend_from_slice(script.as_bytes());
        Ok(payload)
    }

    /// Inverse of [`Token::to_payload`]
    ///
    /// A payload holding only the color identifier yields a token without a
    /// script.
    pub fn parse_from_payload(payload: &[u8]) -> ContractResult<Self> {
        if payload.len() < COLOR_ID_LEN {
            return Err(ContractError::invalid_argument(format!(
                "token payload must be at least {} bytes, got {}",
                COLOR_ID_LEN,
                payload.len()
            )));
        }
        let (color, script) = payload.split_at(COLOR_ID_LEN);
        let script_pubkey = if script.is_empty() {
            None
        } else {
            Some(ScriptBuf::from_bytes(script.to_vec()))
        };
        Ok(Self::new(ColorIdentifier::parse_from_payload(color)?, script_pubkey))
    }

    /// Issue a new token and broadcast the issuance
    ///
    /// A reissuable token's controlling script is recorded once the plan has
    /// been broadcast.
    pub fn issue(
        ctx: &ContractContext<'_>,
        issuer: &str,
        token_type: impl Into<u8>,
        amount: u64,
        split: u32,
    ) -> ContractResult<(Token, Vec<Transaction>)> {
        let (token, plan) = TransactionPlanner::new(ctx).issue(issuer, token_type, amount, split)?;
        let txs = execute(ctx, issuer, &plan)?;
        if token.kind()? == TokenKind::Reissuable {
            ctx.token_store()
                .save(token.color_id(), token.script_pubkey()?)?;
        }
        Ok((token, txs))
    }

    /// Issue more units of this reissuable token
    pub fn reissue(
        &self,
        ctx: &ContractContext<'_>,
        issuer: &str,
        amount: u64,
        split: u32,
    ) -> ContractResult<(Token, Vec<Transaction>)> {
        let (token, plan) = TransactionPlanner::new(ctx).reissue(self, issuer, amount, split)?;
        let txs = execute(ctx, issuer, &plan)?;
        Ok((token, txs))
    }

    /// Send `amount` units to `receiver_address`
    pub fn transfer(
        &self,
        ctx: &ContractContext<'_>,
        sender: &str,
        receiver_address: &str,
        amount: u64,
    ) -> ContractResult<(Token, Vec<Transaction>)> {
        let (token, plan) =
            TransactionPlanner::new(ctx).transfer(self, sender, receiver_address, amount)?;
        let txs = execute(ctx, sender, &plan)?;
        Ok((token, txs))
    }

    /// Send units to several receivers in one transaction
    pub fn multi_transfer(
        &self,
        ctx: &ContractContext<'_>,
        sender: &str,
        receivers: &[Receiver],
    ) -> ContractResult<(Token, Vec<Transaction>)> {
        let (token, plan) = TransactionPlanner::new(ctx).multi_transfer(self, sender, receivers)?;
        let txs = execute(ctx, sender, &plan)?;
        Ok((token, txs))
    }

    /// Destroy `amount` units held by `sender`
    pub fn burn(
        &self,
        ctx: &ContractContext<'_>,
        sender: &str,
        amount: u64,
    ) -> ContractResult<Vec<Transaction>> {
        let plan = TransactionPlanner::new(ctx).burn(self, sender, amount)?;
        execute(ctx, sender, &plan)
    }

    /// Units of this token held by `wallet_id`
    ///
    /// Unfinalized outputs count only when the context allows spending them.
    pub fn amount(&self, ctx: &ContractContext<'_>, wallet_id: &str) -> ContractResult<u64> {
        let utxos = ctx
            .wallet()
            .list_unspent(wallet_id, ctx.only_finalized(), &LabelFilter::Unlabeled)?;
        Ok(ctx.selector().balance(&utxos, Some(&self.color_id)))
    }
}

fn execute(
    ctx: &ContractContext<'_>,
    caller: &str,
    plan: &TransactionPlan,
) -> ContractResult<Vec<Transaction>> {
    let txs = plan.execute(ctx.wallet(), None)?;
    log_contract(
        LogLevel::Debug,
        "plan executed",
        Some(json!({ "caller": caller, "transactions": txs.len() })),
    );
    Ok(txs)
}
