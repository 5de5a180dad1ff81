//! Commit multistore: named sub-stores committed together.

use crate::buffer::TxContext;
use crate::pruning::PruningStrategy;
use crate::substore::{Substore, VersionedView};
use crate::{CommitId, StoreError};
use anyhow::Context;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Metadata persisted after every commit.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CommitMeta {
    last_commit: CommitId,
    retained: Vec<u64>,
    /// Per-store roots of the last commit, hex encoded. Diagnostic only; the
    /// binding root lives in `last_commit`.
    store_roots: BTreeMap<String, String>,
}

/// Container of named versioned sub-stores with one atomic commit per block.
///
/// The store set is fixed at construction. Mutations take `&mut self`, so a
/// commit is a barrier: no read of the current generation can interleave with
/// it. Historical views returned by [`CommitMultiStore::load_version`] hold
/// their own tree handles over immutable committed snapshots and may be used
/// concurrently with the write path.
pub struct CommitMultiStore {
    db: sled::Db,
    meta: sled::Tree,
    stores: BTreeMap<String, Substore>,
    strategy: PruningStrategy,
    last_commit: CommitId,
    retained: Arc<RwLock<BTreeSet<u64>>>,
}

const META_KEY: &[u8] = b"commit_meta";

impl CommitMultiStore {
    /// Open (or create) a multistore with the given fixed set of sub-store
    /// names and a pruning strategy.
    pub fn open<P: AsRef<Path>>(
        path: P,
        store_names: &[&str],
        strategy: PruningStrategy,
    ) -> anyhow::Result<Self> {
        let db = sled::open(path.as_ref()).context("open multistore database")?;
        let meta = db
            .open_tree("multistore_meta")
            .context("open metadata tree")?;

        let commit_meta: CommitMeta = match meta.get(META_KEY)? {
            Some(raw) => serde_json::from_slice(&raw).context("decode commit metadata")?,
            None => CommitMeta::default(),
        };

        let mut stores = BTreeMap::new();
        for name in store_names {
            let tree = db
                .open_tree(format!("store_{name}"))
                .with_context(|| format!("open sub-store '{name}'"))?;
            let previous = stores.insert(
                name.to_string(),
                Substore::new(*name, tree, commit_meta.last_commit.version),
            );
            anyhow::ensure!(previous.is_none(), "duplicate sub-store name '{name}'");
        }

        // a crash between apply and metadata persistence leaves snapshot keys
        // above the recovered version; drop them before serving reads
        let retained: BTreeSet<u64> = commit_meta.retained.iter().copied().collect();
        for store in stores.values() {
            let removed = store
                .retain_versions(&retained)
                .with_context(|| format!("reconcile sub-store '{}'", store.name()))?;
            if removed > 0 {
                tracing::warn!(
                    store = store.name(),
                    removed,
                    "discarded snapshot keys from an interrupted commit"
                );
            }
        }

        tracing::info!(
            stores = stores.len(),
            version = commit_meta.last_commit.version,
            ?strategy,
            "opened commit multistore"
        );

        Ok(Self {
            db,
            meta,
            stores,
            strategy,
            last_commit: commit_meta.last_commit,
            retained: Arc::new(RwLock::new(retained)),
        })
    }

    /// Names of the sub-stores, in commit order.
    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    /// Identifier of the last committed snapshot.
    pub fn last_commit_id(&self) -> CommitId {
        self.last_commit
    }

    /// Mutable handle to the named sub-store's current generation.
    pub fn kv_store(&mut self, name: &str) -> Result<&mut Substore, StoreError> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }

    /// Open a buffered transaction context over every sub-store.
    pub fn tx_context(&mut self, tx_bytes: &[u8]) -> TxContext<'_> {
        TxContext::new(self.stores.iter_mut(), tx_bytes)
    }

    /// Commit every sub-store atomically, producing the next version.
    ///
    /// Runs a prepare phase across all sub-stores first; if any of them fails
    /// to prepare, nothing is applied and no version advances. The combined
    /// root binds every per-store root keyed by store name, in name order.
    ///
    /// An error out of the apply phase means a torn commit and must be
    /// treated as fatal by the caller; the node cannot proceed on it.
    pub fn commit_all(&mut self) -> Result<CommitId, StoreError> {
        let next_version = self.last_commit.version + 1;

        let mut prepared = Vec::with_capacity(self.stores.len());
        for store in self.stores.values() {
            let snapshot = store.prepare(next_version).map_err(|err| {
                StoreError::CommitFailure(format!("store '{}': {err}", store.name()))
            })?;
            prepared.push(snapshot);
        }

        let mut hasher = blake3::Hasher::new();
        let mut store_roots = BTreeMap::new();
        for (store, snapshot) in self.stores.values_mut().zip(prepared) {
            let root = store.apply(snapshot)?;
            hasher.update(&(store.name().len() as u64).to_le_bytes());
            hasher.update(store.name().as_bytes());
            hasher.update(&root);
            store_roots.insert(store.name().to_string(), hex::encode(root));
        }

        let commit_id = CommitId {
            version: next_version,
            root: hasher.finalize().into(),
        };
        self.last_commit = commit_id;
        self.retained.write().insert(next_version);

        self.prune_after_commit(next_version)?;
        self.persist_meta(store_roots)?;

        tracing::info!(
            version = commit_id.version,
            root = %hex::encode(commit_id.root),
            "committed multistore"
        );
        Ok(commit_id)
    }

    fn prune_after_commit(&mut self, current: u64) -> Result<(), StoreError> {
        let doomed: Vec<u64> = self
            .retained
            .read()
            .iter()
            .copied()
            .filter(|candidate| !self.strategy.retains(*candidate, current))
            .collect();

        for version in &doomed {
            // drop the version from the retained table first; concurrent
            // historical views must fail fast, never read a half-deleted
            // snapshot as key-not-found
            self.retained.write().remove(version);
            for store in self.stores.values() {
                store.prune(*version)?;
            }
        }

        if !doomed.is_empty() {
            tracing::debug!(pruned = ?doomed, current, "pruned historical versions");
        }
        Ok(())
    }

    fn persist_meta(&self, store_roots: BTreeMap<String, String>) -> Result<(), StoreError> {
        let meta = CommitMeta {
            last_commit: self.last_commit,
            retained: self.retained.read().iter().copied().collect(),
            store_roots,
        };
        self.meta.insert(META_KEY, serde_json::to_vec(&meta)?)?;
        Ok(())
    }

    /// Read-only views into every sub-store at a committed version.
    ///
    /// Fails with [`StoreError::VersionUnavailable`] if the version was
    /// pruned or never committed; it never silently substitutes a nearby
    /// version.
    pub fn load_version(&self, version: u64) -> Result<MultiStoreView, StoreError> {
        if !self.retained.read().contains(&version) {
            return Err(StoreError::VersionUnavailable { version });
        }
        let views = self
            .stores
            .values()
            .map(|store| {
                (
                    store.name().to_string(),
                    store.view_at(version, Arc::clone(&self.retained)),
                )
            })
            .collect();
        Ok(MultiStoreView { version, views })
    }

    /// Block until all dirty buffers hit disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

/// Read-only handles into every sub-store at one committed version.
#[derive(Debug)]
pub struct MultiStoreView {
    version: u64,
    views: BTreeMap<String, VersionedView>,
}

impl MultiStoreView {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn kv_view(&self, name: &str) -> Result<&VersionedView, StoreError> {
        self.views
            .get(name)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }
}
