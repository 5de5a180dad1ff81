use statechain_store::StoreError;
use statechain_types::Coins;
use thiserror::Error;

/// Errors raised by the ledger keepers.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A subtraction would drive some denomination negative. Recoverable:
    /// aborts the current transaction's buffered writes only.
    #[error("insufficient funds: {available} < {attempted}")]
    InsufficientFunds { available: Coins, attempted: Coins },

    /// Account or history blob failed to encode/decode. This implies
    /// corrupted state and is fatal; callers must abort instead of retrying.
    #[error("state serialization failure: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Whether the error may be handled by rejecting the current transaction,
    /// as opposed to a process-level fault.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LedgerError::InsufficientFunds { .. })
    }
}
