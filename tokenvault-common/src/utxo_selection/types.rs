//! Core types for UTXO selection
//!
//! # Key Types
//!
//! - [`Utxo`]: A single unspent output, colored or uncolored
//! - [`LabelFilter`]: Which labeled outputs a listing or selection may see
//! - [`Selection`]: The covering set returned by the selector
//!
//! # Example
//!
//! ```no_run
//! use tokenvault_common::utxo_selection::types::Utxo;
//! use bitcoin::blockdata::script::ScriptBuf;
//! use bitcoin::{OutPoint, Txid};
//! use std::str::FromStr;
//!
//! let utxo = Utxo::new(
//!     OutPoint::new(
//!         Txid::from_str("7967a5185e907a25225574544c31f7b059c1a191d65b53dcc1554d339c4f9efc").unwrap(),
//!         0,
//!     ),
//!     ScriptBuf::new(),
//!     10_000,
//! )
//! .with_finalized(true)
//! .with_label("contract-tracking".to_string());
//!
//! assert!(!utxo.is_colored());
//! ```

use bitcoin::blockdata::script::ScriptBuf;
use bitcoin::OutPoint;
use serde::{Deserialize, Serialize};

use crate::color::{color_of, ColorIdentifier};

/// Unspent transaction output owned by a wallet key
///
/// For colored outputs `amount` is the token quantity; the color is read from
/// the script when the UTXO is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Reference to the transaction output (txid and vout)
    pub outpoint: OutPoint,

    /// Locking script of the output
    pub script_pubkey: ScriptBuf,

    /// Output value, or token quantity when colored
    pub amount: u64,

    /// Color carried by the script, if any
    pub color_id: Option<ColorIdentifier>,

    /// Whether the ledger has confirmed the output
    pub finalized: bool,

    /// Optional label reserving the output for a specific use
    pub label: Option<String>,
}

impl Utxo {
    /// Create a new unfinalized, unlabeled UTXO
    pub fn new(outpoint: OutPoint, script_pubkey: ScriptBuf, amount: u64) -> Self {
        let color_id = color_of(&script_pubkey);
        Self {
            outpoint,
            script_pubkey,
            amount,
            color_id,
            finalized: false,
            label: None,
        }
    }

    /// Set the finalized flag
    pub fn with_finalized(mut self, finalized: bool) -> Self {
        self.finalized = finalized;
        self
    }

    /// Add label information to this UTXO
    pub fn with_label(mut self, label: String) -> Self {
        self.label = Some(label);
        self
    }

    pub fn is_colored(&self) -> bool {
        self.color_id.is_some()
    }

    /// Check whether this UTXO carries exactly `color`, or is uncolored when `None`
    pub fn has_color(&self, color: Option<&ColorIdentifier>) -> bool {
        self.color_id.as_ref() == color
    }

    /// Get a unique identifier for this UTXO
    pub fn id(&self) -> String {
        format!("{}:{}", self.outpoint.txid, self.outpoint.vout)
    }

    /// Stable ordering key: txid hex, then output index
    pub fn sort_key(&self) -> (String, u32) {
        (self.outpoint.txid.to_string(), self.outpoint.vout)
    }
}

/// Label filter applied when listing or selecting UTXOs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LabelFilter {
    /// Only outputs without a label
    #[default]
    Unlabeled,
    /// Every output regardless of label
    All,
    /// Only outputs carrying this label
    Named(String),
}

impl LabelFilter {
    pub fn matches(&self, label: Option<&str>) -> bool {
        match self {
            LabelFilter::Unlabeled => label.is_none(),
            LabelFilter::All => true,
            LabelFilter::Named(name) => label == Some(name.as_str()),
        }
    }
}

/// Covering set returned by a successful selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Selected UTXOs, in selection order
    pub selected: Vec<Utxo>,
    /// Exact sum of the selected amounts
    pub total: u64,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.selected.iter().map(|u| u.outpoint).collect()
    }
}

/// Calculate total amount of UTXOs
pub fn total_value(utxos: &[Utxo]) -> u64 {
    utxos.iter().map(|utxo| utxo.amount).sum()
}
