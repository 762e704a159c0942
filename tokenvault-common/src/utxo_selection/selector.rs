//! Deterministic forward-greedy UTXO selector
//!
//! Candidates are filtered (finalized flag, color, label) and visited in a
//! stable order by txid hex and output index. Outputs are accumulated until
//! the running sum covers the target. The same UTXO snapshot therefore always
//! yields the same selection, and the first eligible candidate is always the
//! first selected one.
//!
//! # Usage
//!
//! ```ignore
//! use tokenvault_common::utxo_selection::UtxoSelector;
//!
//! let selector = UtxoSelector::new(true);
//! let selection = selector.select(&utxos, 5_000, None)?;
//! ```

use log::debug;

use crate::color::ColorIdentifier;
use crate::error::{ContractError, ContractResult};
use crate::utxo_selection::types::{LabelFilter, Selection, Utxo};

/// Selector over a snapshot of UTXOs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoSelector {
    /// Skip unfinalized outputs
    only_finalized: bool,
    /// Labels eligible for selection
    label_filter: LabelFilter,
}

impl Default for UtxoSelector {
    fn default() -> Self {
        Self::new(true)
    }
}

impl UtxoSelector {
    pub fn new(only_finalized: bool) -> Self {
        Self {
            only_finalized,
            label_filter: LabelFilter::Unlabeled,
        }
    }

    /// Select among outputs matching `filter` instead of unlabeled ones only
    pub fn with_label_filter(mut self, filter: LabelFilter) -> Self {
        self.label_filter = filter;
        self
    }

    pub fn only_finalized(&self) -> bool {
        self.only_finalized
    }

    /// Eligible candidates for `color` in selection order
    pub fn eligible<'a>(&self, utxos: &'a [Utxo], color: Option<&ColorIdentifier>) -> Vec<&'a Utxo> {
        let mut candidates: Vec<&Utxo> = utxos
            .iter()
            .filter(|u| !self.only_finalized || u.finalized)
            .filter(|u| u.has_color(color))
            .filter(|u| self.label_filter.matches(u.label.as_deref()))
            .collect();
        candidates.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        candidates
    }

    /// Total amount available for `color`
    pub fn balance(&self, utxos: &[Utxo], color: Option<&ColorIdentifier>) -> u64 {
        self.eligible(utxos, color).iter().map(|u| u.amount).sum()
    }

    /// Select UTXOs of `color` whose sum covers `target`
    ///
    /// Fails with `InsufficientFunds` for uncolored requests and
    /// `InsufficientTokens` for colored ones.
    pub fn select(
        &self,
        utxos: &[Utxo],
        target: u64,
        color: Option<&ColorIdentifier>,
    ) -> ContractResult<Selection> {
        let mut selected = Vec::new();
        let mut total: u64 = 0;

        for utxo in self.eligible(utxos, color) {
            if total >= target {
                break;
            }
            selected.push(utxo.clone());
            total = total.saturating_add(utxo.amount);
        }

        if total < target {
            debug!(
                "Selection short: target {}, available {}, color {:?}",
                target, total, color
            );
            return Err(match color {
                None => ContractError::InsufficientFunds {
                    needed: target,
                    available: total,
                },
                Some(color) => ContractError::InsufficientTokens {
                    color_id: color.to_hex(),
                    needed: target,
                    available: total,
                },
            });
        }

        debug!("Selected {} UTXOs totaling {} for target {}", selected.len(), total, target);
        Ok(Selection { selected, total })
    }
}

/// Select with an explicit finalized toggle, using the default label filter
pub fn select_utxos(
    utxos: &[Utxo],
    target: u64,
    color: Option<&ColorIdentifier>,
    only_finalized: bool,
) -> ContractResult<Selection> {
    UtxoSelector::new(only_finalized).select(utxos, target, color)
}
