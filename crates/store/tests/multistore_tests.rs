//! Integration tests for the commit multistore: versioned reads, pruning
//! behavior, buffered transaction contexts and historical views.

use statechain_store::{CommitMultiStore, KVStore, PruningStrategy, StoreError};
use tempfile::TempDir;

const STORES: [&str; 2] = ["acc", "bank"];

fn open(dir: &TempDir, strategy: PruningStrategy) -> CommitMultiStore {
    CommitMultiStore::open(dir.path().join("db"), &STORES, strategy).expect("open multistore")
}

#[test]
fn writes_are_visible_before_commit_and_durable_after() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Nothing);

    let store = ms.kv_store("acc").unwrap();
    store.set(b"alice", b"100");
    assert_eq!(store.get(b"alice").unwrap(), Some(b"100".to_vec()));
    assert!(store.is_dirty());

    let commit = ms.commit_all().unwrap();
    assert_eq!(commit.version, 1);
    assert_ne!(commit.root, [0u8; 32]);

    let store = ms.kv_store("acc").unwrap();
    assert!(!store.is_dirty());
    assert_eq!(store.get(b"alice").unwrap(), Some(b"100".to_vec()));
}

#[test]
fn delete_masks_committed_value() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Nothing);

    ms.kv_store("acc").unwrap().set(b"k", b"v");
    ms.commit_all().unwrap();

    let store = ms.kv_store("acc").unwrap();
    store.delete(b"k");
    assert_eq!(store.get(b"k").unwrap(), None);

    ms.commit_all().unwrap();
    assert_eq!(ms.kv_store("acc").unwrap().get(b"k").unwrap(), None);
    // version 1 still serves the old value
    let v1 = ms.load_version(1).unwrap();
    assert_eq!(
        v1.kv_view("acc").unwrap().get(b"k").unwrap(),
        Some(b"v".to_vec())
    );
}

#[test]
fn iteration_merges_overlay_in_key_order() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Nothing);

    let store = ms.kv_store("acc").unwrap();
    store.set(b"p/a", b"1");
    store.set(b"p/c", b"3");
    store.set(b"q/x", b"9");
    ms.commit_all().unwrap();

    let store = ms.kv_store("acc").unwrap();
    store.set(b"p/b", b"2");
    store.set(b"p/c", b"30");
    store.delete(b"p/a");

    let pairs: Vec<(Vec<u8>, Vec<u8>)> = store
        .iterate(b"p/")
        .collect::<Result<_, _>>()
        .expect("iterate");
    assert_eq!(
        pairs,
        vec![
            (b"p/b".to_vec(), b"2".to_vec()),
            (b"p/c".to_vec(), b"30".to_vec()),
        ]
    );

    // early termination just drops the iterator
    let first = store.iterate(b"p/").next().unwrap().unwrap();
    assert_eq!(first.0, b"p/b".to_vec());
}

#[test]
fn commit_version_is_monotonic_and_root_tracks_content() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Nothing);

    ms.kv_store("acc").unwrap().set(b"k", b"1");
    let c1 = ms.commit_all().unwrap();
    let c2 = ms.commit_all().unwrap();
    assert_eq!(c2.version, c1.version + 1);
    // same content, same combined root
    assert_eq!(c1.root, c2.root);

    ms.kv_store("bank").unwrap().set(b"k", b"2");
    let c3 = ms.commit_all().unwrap();
    assert_ne!(c3.root, c2.root);
}

#[test]
fn prune_everything_keeps_only_latest() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Everything);

    for i in 0..5u8 {
        ms.kv_store("acc").unwrap().set(b"k", &[i]);
        ms.commit_all().unwrap();
    }

    assert!(ms.load_version(5).is_ok());
    for v in 1..5 {
        let err = ms.load_version(v).expect_err("pruned version");
        assert!(matches!(err, StoreError::VersionUnavailable { version } if version == v));
    }
}

#[test]
fn prune_nothing_keeps_every_version() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Nothing);

    for i in 0..5u8 {
        ms.kv_store("acc").unwrap().set(b"k", &[i]);
        ms.commit_all().unwrap();
    }

    for v in 1..=5u64 {
        let view = ms.load_version(v).unwrap();
        assert_eq!(
            view.kv_view("acc").unwrap().get(b"k").unwrap(),
            Some(vec![(v - 1) as u8])
        );
    }
}

#[test]
fn syncable_prunes_outside_window_but_keeps_checkpoints() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(
        &dir,
        PruningStrategy::Syncable {
            keep_recent: 2,
            keep_every: 3,
        },
    );

    for i in 0..7u8 {
        ms.kv_store("acc").unwrap().set(b"k", &[i]);
        ms.commit_all().unwrap();
    }

    // window: 6, 7; checkpoints: 3, 6
    for v in [3, 6, 7] {
        assert!(ms.load_version(v).is_ok(), "version {v} should be retained");
    }
    for v in [1, 2, 4, 5] {
        assert!(
            matches!(
                ms.load_version(v),
                Err(StoreError::VersionUnavailable { .. })
            ),
            "version {v} should be pruned"
        );
    }
}

#[test]
fn load_version_never_committed_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Nothing);
    ms.commit_all().unwrap();

    assert!(matches!(
        ms.load_version(9),
        Err(StoreError::VersionUnavailable { version: 9 })
    ));
    assert!(matches!(
        ms.load_version(0),
        Err(StoreError::VersionUnavailable { version: 0 })
    ));
}

#[test]
fn historical_view_fails_once_its_version_is_pruned() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Everything);

    ms.kv_store("acc").unwrap().set(b"k", b"old");
    ms.commit_all().unwrap();
    let view = ms.load_version(1).unwrap();
    assert_eq!(
        view.kv_view("acc").unwrap().get(b"k").unwrap(),
        Some(b"old".to_vec())
    );

    ms.kv_store("acc").unwrap().set(b"k", b"new");
    ms.commit_all().unwrap(); // prunes version 1

    let err = view.kv_view("acc").unwrap().get(b"k").unwrap_err();
    assert!(matches!(err, StoreError::VersionUnavailable { version: 1 }));
}

#[test]
fn tx_context_write_merges_and_drop_discards() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Nothing);

    ms.kv_store("acc").unwrap().set(b"balance", b"100");

    // discarded context leaves no trace
    {
        let mut ctx = ms.tx_context(b"tx-1");
        let store = ctx.kv_store("acc").unwrap();
        store.set(b"balance", b"40");
        assert_eq!(store.get(b"balance").unwrap(), Some(b"40".to_vec()));
    }
    assert_eq!(
        ms.kv_store("acc").unwrap().get(b"balance").unwrap(),
        Some(b"100".to_vec())
    );

    // written context lands in the uncommitted generation
    let mut ctx = ms.tx_context(b"tx-2");
    ctx.kv_store("acc").unwrap().set(b"balance", b"60");
    ctx.write();
    assert_eq!(
        ms.kv_store("acc").unwrap().get(b"balance").unwrap(),
        Some(b"60".to_vec())
    );

    assert!(matches!(
        ms.tx_context(b"tx-3").kv_store("nope"),
        Err(StoreError::UnknownStore(_))
    ));
}

#[test]
fn unknown_store_name_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut ms = open(&dir, PruningStrategy::Nothing);
    assert!(matches!(
        ms.kv_store("gov"),
        Err(StoreError::UnknownStore(_))
    ));
}
