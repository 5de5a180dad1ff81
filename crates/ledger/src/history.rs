//! Per-address transaction-history index.
//!
//! Every balance mutation appends the enclosing transaction's content hash to
//! a bounded, most-recent-first list stored under `0x01 || address` in the
//! keeper's bound sub-store. The index is best-effort relative to the balance
//! write itself, but a serialization failure is fatal: history is never
//! silently dropped.

use crate::codec::LedgerCodec;
use crate::errors::LedgerError;
use statechain_store::{KVStore, TxContext};
use statechain_types::{tx_hash, Address};
use std::sync::Arc;

/// Key prefix for history blobs within the bound sub-store.
pub const HISTORY_KEY_PREFIX: u8 = 0x01;

/// Maximum number of persisted entries per address.
pub const MAX_HISTORY_ENTRIES: usize = 300;

/// Keeper-owned index from address to recent transaction hashes.
pub struct HistoryKeeper {
    store: String,
    codec: Arc<dyn LedgerCodec>,
}

impl HistoryKeeper {
    pub fn new(store: impl Into<String>, codec: Arc<dyn LedgerCodec>) -> Self {
        Self {
            store: store.into(),
            codec,
        }
    }

    fn key(addr: &Address) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + addr.as_bytes().len());
        key.push(HISTORY_KEY_PREFIX);
        key.extend_from_slice(addr.as_bytes());
        key
    }

    /// Prepend the current transaction's hash to `addr`'s history and
    /// truncate the list back to [`MAX_HISTORY_ENTRIES`].
    pub fn record(&self, ctx: &mut TxContext<'_>, addr: &Address) -> Result<(), LedgerError> {
        let key = Self::key(addr);
        let hash = tx_hash(ctx.tx_bytes());

        let store = ctx.kv_store(&self.store)?;
        let mut entries = match store.get(&key)? {
            Some(raw) => self.codec.decode_history(&raw)?,
            None => Vec::new(),
        };

        entries.insert(0, hash);
        if entries.len() > MAX_HISTORY_ENTRIES {
            entries.truncate(MAX_HISTORY_ENTRIES);
        }

        let raw = self.codec.encode_history(&entries)?;
        ctx.kv_store(&self.store)?.set(&key, &raw);
        Ok(())
    }

    /// Transaction hashes recorded for `addr`, most recent first. Empty if
    /// the address has no history.
    pub fn history(
        &self,
        ctx: &mut TxContext<'_>,
        addr: &Address,
    ) -> Result<Vec<String>, LedgerError> {
        let store = ctx.kv_store(&self.store)?;
        match store.get(&Self::key(addr))? {
            Some(raw) => Ok(self.codec.decode_history(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}
