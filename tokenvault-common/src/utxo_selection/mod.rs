//! UTXO selection module
//!
//! Selection decides which unspent outputs fund a transaction. For colored
//! tokens it runs twice per transaction: once over outputs of the token's
//! color to cover the transferred quantity, and once over uncolored outputs
//! to cover the fee.
//!
//! # Module Structure
//!
//! - `types.rs` - UTXO, label filter and selection result types
//! - `selector.rs` - Deterministic forward-greedy selector
//!
//! Global optimality is not a goal; reproducibility is. Given the same UTXO
//! snapshot, the selector returns the same set.

pub mod selector;
pub mod types;

pub use selector::{select_utxos, UtxoSelector};
pub use types::{total_value, LabelFilter, Selection, Utxo};
