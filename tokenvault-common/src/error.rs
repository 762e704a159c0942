//! Standardized error handling for TokenVault
//!
//! Every lifecycle operation reports failure through [`ContractError`]. Errors
//! are raised before any transaction is signed or broadcast, with the
//! exception of the broadcast errors themselves which surface verbatim from
//! the wallet.
//!
//! # Usage
//!
//! ```
//! use tokenvault_common::error::{ContractError, ContractResult, ErrorCategory};
//!
//! fn check_amount(amount: u64) -> ContractResult<u64> {
//!     if amount == 0 {
//!         return Err(ContractError::invalid_amount("amount must be positive"));
//!     }
//!     Ok(amount)
//! }
//!
//! let err = check_amount(0).unwrap_err();
//! assert_eq!(err.category(), ErrorCategory::Value);
//! ```

use thiserror::Error;

/// The error type for every token contract operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// A token amount was zero or otherwise unusable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The requested split cannot be honored for this token kind
    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    /// The operation requires a different token kind
    #[error("Invalid token type: {0}")]
    InvalidTokenType(String),

    /// The kind tag is not one of the recognized values
    #[error("Unsupported token type: 0x{0:02x}")]
    UnsupportedTokenType(u8),

    /// Not enough uncolored value to cover collateral and fees
    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// Not enough colored value of the requested color
    #[error("Insufficient tokens of {color_id}: needed {needed}, available {available}")]
    InsufficientTokens {
        color_id: String,
        needed: u64,
        available: u64,
    },

    /// The wallet does not control the persisted script of a reissuable token
    #[error("Unknown script pubkey: {0}")]
    UnknownScriptPubkey(String),

    /// No wallet is registered under the given identifier
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// The transaction id is already known to the ledger
    #[error("Transaction already broadcasted: {0}")]
    TxAlreadyBroadcasted(String),

    /// The ledger rejected the transaction
    #[error("Failed to broadcast: {0}")]
    FailedToBroadcast(String),

    /// A caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An address could not be parsed for the configured network
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Signing an input failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// A planned transaction broke a conservation rule
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Type alias for a Result with ContractError
pub type ContractResult<T> = Result<T, ContractError>;

/// Error category for logging purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad numeric input (amounts, splits)
    Value,
    /// Wrong or unknown token kind
    Type,
    /// Not enough funds or tokens
    Resource,
    /// Missing script or wallet
    Lookup,
    /// Ledger state conflicts
    State,
    /// Ledger communication failures
    Io,
    /// Malformed caller arguments
    Argument,
    /// Signing and internal consistency failures
    Internal,
}

impl ErrorCategory {
    /// Convert the error category to a string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Value => "Value",
            ErrorCategory::Type => "Type",
            ErrorCategory::Resource => "Resource",
            ErrorCategory::Lookup => "Lookup",
            ErrorCategory::State => "State",
            ErrorCategory::Io => "Io",
            ErrorCategory::Argument => "Argument",
            ErrorCategory::Internal => "Internal",
        }
    }
}

impl ContractError {
    /// Get the category of this error for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            ContractError::InvalidAmount(_) | ContractError::InvalidSplit(_) => ErrorCategory::Value,
            ContractError::InvalidTokenType(_) | ContractError::UnsupportedTokenType(_) => {
                ErrorCategory::Type
            }
            ContractError::InsufficientFunds { .. } | ContractError::InsufficientTokens { .. } => {
                ErrorCategory::Resource
            }
            ContractError::UnknownScriptPubkey(_) | ContractError::WalletNotFound(_) => {
                ErrorCategory::Lookup
            }
            ContractError::TxAlreadyBroadcasted(_) => ErrorCategory::State,
            ContractError::FailedToBroadcast(_) => ErrorCategory::Io,
            ContractError::InvalidArgument(_) | ContractError::InvalidAddress(_) => {
                ErrorCategory::Argument
            }
            ContractError::Signing(_) | ContractError::InvariantViolation(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Create a new invalid amount error
    pub fn invalid_amount<S: Into<String>>(message: S) -> Self {
        ContractError::InvalidAmount(message.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        ContractError::InvalidArgument(message.into())
    }
}

impl From<bitcoin::address::Error> for ContractError {
    fn from(err: bitcoin::address::Error) -> Self {
        ContractError::InvalidAddress(err.to_string())
    }
}

impl From<hex::FromHexError> for ContractError {
    fn from(err: hex::FromHexError) -> Self {
        ContractError::InvalidArgument(format!("Invalid hex: {}", err))
    }
}
