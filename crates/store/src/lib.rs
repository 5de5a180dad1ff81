//! Versioned commit-oriented key/value storage.
//!
//! A [`CommitMultiStore`] owns a fixed set of named [`Substore`]s that commit
//! together: every commit advances one monotonically increasing version across
//! all sub-stores and binds their per-store roots into a single [`CommitId`].
//! Historical versions stay readable through [`CommitMultiStore::load_version`]
//! until the configured [`PruningStrategy`] discards them.
//!
//! Transaction execution runs against a [`TxContext`], a buffered
//! copy-on-write view whose writes only reach the canonical uncommitted state
//! when the context is explicitly written back.

pub mod buffer;
pub mod multistore;
pub mod pruning;
pub mod substore;

pub use buffer::{BufferedStore, TxContext};
pub use multistore::{CommitMultiStore, MultiStoreView};
pub use pruning::{PruningConfig, PruningStrategy};
pub use substore::{Substore, VersionedView};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unknown store '{0}'")]
    UnknownStore(String),
    #[error("version {version} is not available (pruned or never committed)")]
    VersionUnavailable { version: u64 },
    #[error("multistore commit failed: {0}")]
    CommitFailure(String),
}

/// Identifier of one committed state snapshot: the version number together
/// with the combined root over every sub-store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitId {
    pub version: u64,
    pub root: [u8; 32],
}

impl CommitId {
    /// Sentinel for a store that has never committed.
    pub fn zero() -> Self {
        Self {
            version: 0,
            root: [0u8; 32],
        }
    }
}

impl Default for CommitId {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.version, hex::encode(self.root))
    }
}

/// Ordered key/value access shared by the canonical sub-stores and the
/// buffered transaction views layered on top of them.
pub trait KVStore {
    /// Look up a single key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Set a key. Visible to subsequent reads in the same generation, durable
    /// only after the owning store commits.
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Remove a key.
    fn delete(&mut self, key: &[u8]);

    /// Lazy iteration over all pairs whose key starts with `prefix`, in
    /// ascending key order. Dropping the iterator releases its resources, so
    /// early termination is always safe.
    fn iterate<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a>;
}
