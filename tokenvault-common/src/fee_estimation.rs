//! Fee estimation for colored-ledger transactions
//!
//! Fees are computed from the serialized size of an unsigned transaction.
//! Signature bytes are not part of the estimate; the planner evaluates the
//! estimator after outputs are final and before anything is signed.
//!
//! # Fee Estimation Strategy
//!
//! - [`AutoFeeEstimator`] charges `ceil(size / 1000 * fee_rate)`, with the rate
//!   expressed in base units per kilobyte
//! - [`FixedFeeEstimator`] charges a constant, which keeps tests deterministic

use bitcoin::Transaction;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt::Debug;

use crate::ledger::serialized_size;
use crate::types::DEFAULT_FEE_RATE;

/// Strategy computing the fee a transaction must pay
pub trait FeeEstimator: Debug + Send + Sync {
    /// Fee required by `tx`, in base units
    fn estimate(&self, tx: &Transaction) -> u64;
}

/// Size-based estimator using a per-kilobyte fee rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoFeeEstimator {
    fee_rate: u64,
}

impl AutoFeeEstimator {
    /// Create an estimator charging `fee_rate` base units per kilobyte
    pub fn new(fee_rate: u64) -> Self {
        Self { fee_rate }
    }

    pub fn fee_rate(&self) -> u64 {
        self.fee_rate
    }
}

impl Default for AutoFeeEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_RATE)
    }
}

impl FeeEstimator for AutoFeeEstimator {
    fn estimate(&self, tx: &Transaction) -> u64 {
        calculate_total_fee(self.fee_rate, serialized_size(tx))
    }
}

/// Estimator that always charges the same fee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFeeEstimator {
    fixed_fee: u64,
}

impl FixedFeeEstimator {
    pub fn new(fixed_fee: u64) -> Self {
        Self { fixed_fee }
    }
}

impl FeeEstimator for FixedFeeEstimator {
    fn estimate(&self, _tx: &Transaction) -> u64 {
        self.fixed_fee
    }
}

/// Calculate the fee for `tx_size` bytes at `fee_rate` per kilobyte, rounding up
pub fn calculate_total_fee(fee_rate: u64, tx_size: usize) -> u64 {
    let kilobytes = Decimal::from(tx_size) / dec!(1000);
    (kilobytes * Decimal::from(fee_rate))
        .ceil()
        .to_u64()
        .unwrap_or(u64::MAX)
}
