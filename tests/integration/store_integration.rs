//! Versioning and persistence across both store backends

use handoff::document::{ContextDocument, SummaryOverflow};
use handoff::error::ContextError;
use handoff::store::{ContextStore, MemoryContextStore, SledContextStore, StoreOptions};
use std::sync::Arc;
use tempfile::TempDir;

fn doc(producer: &str, version: u64) -> ContextDocument {
    ContextDocument::builder(producer, version)
        .summary(format!("{producer} v{version}"))
        .finding("n", version as f64)
        .build()
}

fn check_monotonic_versioning(store: &dyn ContextStore) {
    store.put(doc("P1", 1)).unwrap();
    store.put(doc("P1", 3)).unwrap();
    for stale in [0, 1, 2, 3] {
        assert!(matches!(
            store.put(doc("P1", stale)),
            Err(ContextError::StaleVersion { current: 3, .. })
        ));
    }
    assert_eq!(store.get("P1", None).unwrap().unwrap().version, 3);
    assert_eq!(store.latest_version("P1").unwrap(), Some(3));

    // Other producers are unaffected
    store.put(doc("P2", 1)).unwrap();
    assert_eq!(store.producers().unwrap(), vec!["P1", "P2"]);

    assert!(store.get("P1", Some(4)).unwrap().is_none());
    assert!(store.get("P1", Some(3)).unwrap().is_some());
    assert!(store.get("nobody", None).unwrap().is_none());
}

#[test]
fn test_memory_store_versioning() {
    check_monotonic_versioning(&MemoryContextStore::new());
}

#[test]
fn test_sled_store_versioning() {
    let dir = TempDir::new().unwrap();
    let store = SledContextStore::open(dir.path(), StoreOptions::default()).unwrap();
    check_monotonic_versioning(&store);
}

#[test]
fn test_sled_store_survives_reopen_with_detail_ref() {
    let dir = TempDir::new().unwrap();
    let reference = {
        let store = SledContextStore::open(dir.path(), StoreOptions::default()).unwrap();
        let reference = store.put_full_detail("full body").unwrap();
        store
            .put(
                ContextDocument::builder("P1", 1)
                    .summary("first")
                    .full_detail_ref(reference.clone())
                    .build(),
            )
            .unwrap();
        store.put(doc("P1", 2)).unwrap();
        store.flush().unwrap();
        reference
    };

    let store = SledContextStore::open(dir.path(), StoreOptions::default()).unwrap();
    assert_eq!(store.latest_version("P1").unwrap(), Some(2));
    assert_eq!(store.last_full_detail_ref("P1").unwrap(), Some(reference.clone()));
    assert_eq!(store.get_full_detail(&reference).unwrap(), "full body");
    assert!(matches!(
        store.put(doc("P1", 2)),
        Err(ContextError::StaleVersion { .. })
    ));
}

#[test]
fn test_unknown_full_detail_is_not_found() {
    let store = MemoryContextStore::new();
    assert!(matches!(
        store.get_full_detail(&"missing".into()),
        Err(ContextError::NotFound(_))
    ));
}

#[test]
fn test_truncate_policy_flags_summary() {
    let dir = TempDir::new().unwrap();
    let options = StoreOptions {
        max_summary_chars: 5,
        summary_overflow: SummaryOverflow::Truncate,
    };
    let store = SledContextStore::open(dir.path(), options).unwrap();
    let stored = store
        .put(ContextDocument::builder("P1", 1).summary("truncated!").build())
        .unwrap();
    assert_eq!(stored.summary, "trunc");
    assert!(stored.summary_truncated);
    assert_eq!(store.get("P1", None).unwrap().unwrap(), stored);
}

#[test]
fn test_parallel_producers_publish_independently() {
    let store = Arc::new(MemoryContextStore::new());
    let handles: Vec<_> = (0..4)
        .map(|p| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let producer = format!("P{p}");
                for version in 1..=25 {
                    store.put(doc(&producer, version)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    for p in 0..4 {
        assert_eq!(
            store.latest_version(&format!("P{p}")).unwrap(),
            Some(25)
        );
        assert_eq!(store.history(&format!("P{p}")), (1..=25).collect::<Vec<_>>());
    }
}
