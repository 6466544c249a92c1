//! Concurrent writers against a single dedup store.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;

use uuid::Uuid;

use seenkey_store::{DedupStore, ExistsCode, StoreOptions};

fn test_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("seenkey-concurrency-{}", Uuid::new_v4()))
}

fn open_fast(dir: &PathBuf) -> Arc<DedupStore> {
    let options = StoreOptions {
        sync_writes: false,
        ..StoreOptions::default()
    };
    Arc::new(DedupStore::open_with(dir, options).unwrap())
}

#[test]
fn concurrent_sets_on_same_key_lose_no_ids() {
    const WRITERS: usize = 32;
    let dir = test_data_dir();
    let store = open_fast(&dir);
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.set("http://contended.example/", &format!("id-{i}")).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let stored: HashSet<String> = store
        .get("http://contended.example/")
        .unwrap()
        .into_iter()
        .collect();
    let expected: HashSet<String> = (0..WRITERS).map(|i| format!("id-{i}")).collect();
    assert_eq!(stored, expected);
    assert_eq!(store.get("http://contended.example/").unwrap().len(), WRITERS);

    // Exactly one writer saw the key first.
    let new_keys = outcomes.iter().filter(|o| o.code == ExistsCode::NewKey).count();
    let new_ids = outcomes.iter().filter(|o| o.code == ExistsCode::NewId).count();
    assert_eq!(new_keys, 1);
    assert_eq!(new_ids, WRITERS - 1);

    store.close().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn concurrent_identical_sets_record_the_pair_once() {
    const WRITERS: usize = 16;
    let dir = test_data_dir();
    let store = open_fast(&dir);
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.set("k", "same-id").unwrap().code
            })
        })
        .collect();

    let codes: Vec<ExistsCode> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(codes.iter().filter(|c| **c == ExistsCode::NewKey).count(), 1);
    assert_eq!(codes.iter().filter(|c| **c == ExistsCode::Exists).count(), WRITERS - 1);
    assert_eq!(store.get("k").unwrap(), vec!["same-id".to_string()]);

    store.close().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn concurrent_writers_on_many_keys() {
    const WRITERS: usize = 8;
    const KEYS: usize = 50;
    let dir = test_data_dir();
    let store = open_fast(&dir);

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for k in 0..KEYS {
                    store.set(&format!("key-{k}"), &format!("writer-{w}")).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.keys, KEYS as u64);
    assert_eq!(stats.ids, (KEYS * WRITERS) as u64);
    assert_eq!(stats.duplicate_keys, KEYS as u64);

    store.close().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}
