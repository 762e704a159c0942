//! TokenVault Common Library
//!
//! Shared building blocks for the colored-token contract engine.
//!
//! # Modules
//!
//! - `types`: Constants and small domain types
//! - `error`: The contract error taxonomy
//! - `logging`: Structured logging on top of `env_logger`
//! - `config`: TOML configuration
//! - `ledger`: Transaction construction and malleability-fixed ids
//! - `color`: Color identifiers and colored scripts
//! - `fee_estimation`: Fee estimation strategies
//! - `utxo_selection`: Deterministic UTXO selection

/// Core domain types and constants
pub mod types;

/// Contract error taxonomy
pub mod error;

/// Structured logging functionality
pub mod logging;

/// Configuration management
pub mod config;

/// Transaction construction helpers
pub mod ledger;

/// Color identifiers and colored scripts
pub mod color;

/// Fee estimation strategies
pub mod fee_estimation;

/// UTXO selection
pub mod utxo_selection;

pub use color::{ColorIdentifier, TokenKind};
pub use error::{ContractError, ContractResult, ErrorCategory};
pub use fee_estimation::{AutoFeeEstimator, FeeEstimator, FixedFeeEstimator};
pub use types::{Receiver, DUST_LIMIT, FUNDING_TX_AMOUNT};
pub use utxo_selection::{LabelFilter, Selection, Utxo, UtxoSelector};
