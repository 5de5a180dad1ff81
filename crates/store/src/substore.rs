//! A single named, versioned key/value space.
//!
//! Committed snapshots live in one sled tree, keyed by an 8-byte big-endian
//! version prefix followed by the user key. Writes of the current generation
//! accumulate in an in-memory overlay until the owning multistore commits,
//! which materializes the next full snapshot through a two-phase
//! prepare/apply discipline.

use crate::{KVStore, StoreError};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Peekable;
use std::sync::Arc;

/// Pending writes of the current uncommitted generation. `None` marks a
/// deletion of a committed key.
pub(crate) type Overlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

pub(crate) const VERSION_PREFIX_LEN: usize = 8;

pub(crate) fn versioned_key(version: u64, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(VERSION_PREFIX_LEN + key.len());
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(key);
    out
}

/// Ordered merge of a committed snapshot iterator with an overlay of pending
/// writes. Overlay entries shadow snapshot entries; tombstones drop them.
pub(crate) struct MergeIter<B, O>
where
    B: Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>>,
    O: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    base: Peekable<B>,
    overlay: Peekable<O>,
}

impl<B, O> MergeIter<B, O>
where
    B: Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>>,
    O: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    pub(crate) fn new(base: B, overlay: O) -> Self {
        Self {
            base: base.peekable(),
            overlay: overlay.peekable(),
        }
    }
}

enum Source {
    Base,
    Overlay,
    Both,
}

impl<B, O> Iterator for MergeIter<B, O>
where
    B: Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>>,
    O: Iterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
{
    type Item = Result<(Vec<u8>, Vec<u8>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let source = match (self.base.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(Err(_)), _) => Source::Base,
                (Some(Ok(_)), None) => Source::Base,
                (None, Some(_)) => Source::Overlay,
                (Some(Ok((base_key, _))), Some((overlay_key, _))) => {
                    match overlay_key.cmp(base_key) {
                        Ordering::Less => Source::Overlay,
                        Ordering::Equal => Source::Both,
                        Ordering::Greater => Source::Base,
                    }
                }
            };

            match source {
                Source::Base => return self.base.next(),
                Source::Overlay | Source::Both => {
                    if matches!(source, Source::Both) {
                        let _ = self.base.next();
                    }
                    let (key, value) = self.overlay.next()?;
                    match value {
                        Some(value) => return Some(Ok((key, value))),
                        // tombstone: the key is gone from this generation
                        None => continue,
                    }
                }
            }
        }
    }
}

pub(crate) fn overlay_range<'a>(
    overlay: &'a Overlay,
    prefix: &'a [u8],
) -> impl Iterator<Item = (Vec<u8>, Option<Vec<u8>>)> + 'a {
    overlay
        .range(prefix.to_vec()..)
        .take_while(move |(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
}

/// Snapshot batch produced by [`Substore::prepare`]; applying it advances the
/// store to `version` with root `root`.
pub struct PreparedCommit {
    pub(crate) version: u64,
    pub(crate) root: [u8; 32],
    pub(crate) batch: sled::Batch,
    pub(crate) entries: usize,
}

impl PreparedCommit {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root(&self) -> [u8; 32] {
        self.root
    }
}

/// One named versioned key/value space within a multistore.
pub struct Substore {
    name: String,
    tree: sled::Tree,
    version: u64,
    pending: Overlay,
    #[cfg(test)]
    pub(crate) fail_next_prepare: bool,
}

impl Substore {
    pub(crate) fn new(name: impl Into<String>, tree: sled::Tree, version: u64) -> Self {
        Self {
            name: name.into(),
            tree,
            version,
            pending: Overlay::new(),
            #[cfg(test)]
            fail_next_prepare: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last committed version; `0` before the first commit.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the current generation carries uncommitted writes.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    fn snapshot_iter<'a>(
        &'a self,
        version: u64,
        prefix: &[u8],
    ) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a {
        self.tree
            .scan_prefix(versioned_key(version, prefix))
            .map(|item| {
                item.map(|(key, value)| (key[VERSION_PREFIX_LEN..].to_vec(), value.to_vec()))
                    .map_err(StoreError::from)
            })
    }

    /// First phase of a commit: materialize the next snapshot batch and its
    /// root without touching the tree. Nothing is durable until
    /// [`Substore::apply`] runs.
    pub fn prepare(&self, next_version: u64) -> Result<PreparedCommit, StoreError> {
        #[cfg(test)]
        if self.fail_next_prepare {
            return Err(StoreError::CommitFailure(format!(
                "store '{}': injected prepare failure",
                self.name
            )));
        }

        let mut batch = sled::Batch::default();
        let mut hasher = blake3::Hasher::new();
        let mut entries = 0usize;

        let merged = MergeIter::new(
            self.snapshot_iter(self.version, &[]),
            overlay_range(&self.pending, &[]),
        );
        for item in merged {
            let (key, value) = item?;
            hasher.update(&(key.len() as u64).to_le_bytes());
            hasher.update(&key);
            hasher.update(&(value.len() as u64).to_le_bytes());
            hasher.update(&value);
            batch.insert(versioned_key(next_version, &key), value);
            entries += 1;
        }

        Ok(PreparedCommit {
            version: next_version,
            root: hasher.finalize().into(),
            batch,
            entries,
        })
    }

    /// Second phase of a commit: apply a prepared snapshot, advance the
    /// version and drop the overlay.
    pub fn apply(&mut self, prepared: PreparedCommit) -> Result<[u8; 32], StoreError> {
        let root = prepared.root;
        let entries = prepared.entries;
        self.tree.apply_batch(prepared.batch)?;
        self.version = prepared.version;
        self.pending.clear();
        tracing::debug!(store = %self.name, version = self.version, entries, "applied snapshot");
        Ok(root)
    }

    /// Delete the snapshot stored for `version`. Returns the number of
    /// removed entries.
    pub fn prune(&self, version: u64) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        let keys: Vec<_> = self
            .tree
            .scan_prefix(version.to_be_bytes())
            .keys()
            .collect::<Result<_, _>>()?;
        for key in keys {
            self.tree.remove(key)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Delete every snapshot key whose version is not in `retained`. Run on
    /// open to discard leftovers of a commit interrupted between apply and
    /// metadata persistence; such keys would otherwise resurface in the next
    /// snapshot with a root that no longer covers them. Returns the number of
    /// removed entries.
    pub(crate) fn retain_versions(&self, retained: &BTreeSet<u64>) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        let keys: Vec<_> = self.tree.iter().keys().collect::<Result<_, _>>()?;
        for key in keys {
            if key.len() < VERSION_PREFIX_LEN {
                continue;
            }
            let mut prefix = [0u8; VERSION_PREFIX_LEN];
            prefix.copy_from_slice(&key[..VERSION_PREFIX_LEN]);
            if !retained.contains(&u64::from_be_bytes(prefix)) {
                self.tree.remove(key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub(crate) fn view_at(
        &self,
        version: u64,
        retained: Arc<RwLock<BTreeSet<u64>>>,
    ) -> VersionedView {
        VersionedView {
            name: self.name.clone(),
            tree: self.tree.clone(),
            version,
            retained,
        }
    }
}

impl KVStore for Substore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(pending) = self.pending.get(key) {
            return Ok(pending.clone());
        }
        Ok(self
            .tree
            .get(versioned_key(self.version, key))?
            .map(|value| value.to_vec()))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), None);
    }

    fn iterate<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a> {
        let base = self.snapshot_iter(self.version, prefix);
        let overlay: Vec<_> = overlay_range(&self.pending, prefix).collect();
        Box::new(MergeIter::new(base, overlay.into_iter()))
    }
}

/// Read-only handle into one sub-store at a committed historical version.
///
/// Views stay valid while their version is retained; a read against a version
/// pruned in the meantime fails with [`StoreError::VersionUnavailable`]
/// instead of returning partial data.
#[derive(Debug)]
pub struct VersionedView {
    name: String,
    tree: sled::Tree,
    version: u64,
    retained: Arc<RwLock<BTreeSet<u64>>>,
}

impl VersionedView {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn check_retained(&self) -> Result<(), StoreError> {
        if self.retained.read().contains(&self.version) {
            Ok(())
        } else {
            Err(StoreError::VersionUnavailable {
                version: self.version,
            })
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_retained()?;
        Ok(self
            .tree
            .get(versioned_key(self.version, key))?
            .map(|value| value.to_vec()))
    }

    pub fn iterate(
        &self,
        prefix: &[u8],
    ) -> Result<impl Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + '_, StoreError>
    {
        self.check_retained()?;
        Ok(self
            .tree
            .scan_prefix(versioned_key(self.version, prefix))
            .map(|item| {
                item.map(|(key, value)| (key[VERSION_PREFIX_LEN..].to_vec(), value.to_vec()))
                    .map_err(StoreError::from)
            }))
    }
}
