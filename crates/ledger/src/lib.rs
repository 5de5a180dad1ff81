//! Statechain ledger module
//!
//! Atomic balance transfers between accounts on top of the commit multistore:
//! - an account-keeper abstraction as the sole path to persisted balances
//! - View / Send / Base keeper tiers with non-negativity enforcement
//! - a bounded per-address transaction-history index for audit queries
//!
//! The keepers never roll back state themselves. Every mutating call runs
//! inside a buffered [`statechain_store::TxContext`]; on error the caller
//! discards the context and with it every partial effect.

pub mod account;
pub mod codec;
pub mod errors;
pub mod history;
pub mod keeper;

pub use account::{Account, AccountKeeper, StoreAccountKeeper, ACCOUNT_KEY_PREFIX};
pub use codec::{JsonCodec, LedgerCodec};
pub use errors::LedgerError;
pub use history::{HistoryKeeper, HISTORY_KEY_PREFIX, MAX_HISTORY_ENTRIES};
pub use keeper::{BaseKeeper, Input, Output, SendKeeper, ViewKeeper};

/// Module version for API introspection
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
