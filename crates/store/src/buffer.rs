//! Buffered transaction views.
//!
//! A [`TxContext`] gives one transaction a private copy-on-write overlay over
//! every sub-store's current generation. On success the overlay is written
//! back with [`TxContext::write`]; dropping the context instead discards the
//! whole write set, which is the only rollback mechanism the ledger layer
//! relies on.

use crate::substore::{overlay_range, MergeIter, Overlay, Substore};
use crate::{KVStore, StoreError};
use std::collections::BTreeMap;

/// Copy-on-write overlay over a single sub-store.
pub struct BufferedStore<'a> {
    base: &'a mut Substore,
    overlay: Overlay,
}

impl<'a> BufferedStore<'a> {
    fn new(base: &'a mut Substore) -> Self {
        Self {
            base,
            overlay: Overlay::new(),
        }
    }

    fn write_through(self) {
        for (key, value) in self.overlay {
            match value {
                Some(value) => self.base.set(&key, &value),
                None => self.base.delete(&key),
            }
        }
    }
}

impl KVStore for BufferedStore<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(buffered) = self.overlay.get(key) {
            return Ok(buffered.clone());
        }
        self.base.get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.overlay.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.overlay.insert(key.to_vec(), None);
    }

    fn iterate<'b>(
        &'b self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'b> {
        let buffered: Vec<_> = overlay_range(&self.overlay, prefix).collect();
        Box::new(MergeIter::new(self.base.iterate(prefix), buffered.into_iter()))
    }
}

/// Per-transaction execution context: one buffered store per sub-store plus
/// the raw transaction bytes used for history hashing.
pub struct TxContext<'a> {
    buffers: BTreeMap<String, BufferedStore<'a>>,
    tx_bytes: Vec<u8>,
}

impl<'a> TxContext<'a> {
    pub(crate) fn new(
        stores: impl Iterator<Item = (&'a String, &'a mut Substore)>,
        tx_bytes: &[u8],
    ) -> Self {
        let buffers = stores
            .map(|(name, store)| (name.clone(), BufferedStore::new(store)))
            .collect();
        Self {
            buffers,
            tx_bytes: tx_bytes.to_vec(),
        }
    }

    /// Raw bytes of the transaction this context executes.
    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    /// Buffered handle to the named sub-store.
    pub fn kv_store(&mut self, name: &str) -> Result<&mut BufferedStore<'a>, StoreError> {
        self.buffers
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }

    /// Merge every buffered write into the underlying sub-stores' uncommitted
    /// generation. Without this call the whole write set is discarded when
    /// the context drops.
    pub fn write(self) {
        for (_, buffer) in self.buffers {
            buffer.write_through();
        }
    }
}
