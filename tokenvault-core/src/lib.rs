//! TokenVault Core
//!
//! Colored-token contract engine: issue, reissue, transfer and burn tokens on
//! a UTXO ledger extended with a coloring opcode.
//!
//! # Modules
//!
//! - `wallet`: The wallet capability the engine consumes
//! - `memory_wallet`: Self-contained in-memory wallet and ledger
//! - `token_store`: Persisted scripts of reissuable tokens
//! - `context`: Explicit settings shared by every lifecycle call
//! - `plan`: Ordered transaction plans and their execution
//! - `collateral`: Fee funding and the shared collateral pool
//! - `planner`: The lifecycle state machine
//! - `token`: The token façade

pub mod collateral;
pub mod context;
pub mod memory_wallet;
pub mod plan;
pub mod planner;
pub mod token;
pub mod token_store;
pub mod wallet;

pub use context::ContractContext;
pub use memory_wallet::MemoryWalletAdapter;
pub use plan::{PlannedTransaction, TransactionPlan, TxRole};
pub use planner::TransactionPlanner;
pub use token::Token;
pub use token_store::{JsonFileTokenStore, MemoryTokenStore, ReissuableTokenStore};
pub use wallet::WalletAdapter;
