//! Fan-out loading, lookup timeouts, and concurrent requests

use super::test_utils::Harness;
use handoff::budget::{Budget, BudgetAllocator, CostUnit, SharedBudget, ValueHeuristic};
use handoff::classify::FieldClassifier;
use handoff::document::ContextDocument;
use handoff::error::{ContextError, StorageError};
use handoff::loader::{ContextLoader, LoadRequest, Source};
use handoff::store::{ContextStore, MemoryContextStore};
use handoff::types::{FullDetailRef, Version};
use std::sync::Arc;
use std::time::Duration;

/// Store whose lookups for one producer take `delay`.
struct SlowStore {
    inner: MemoryContextStore,
    slow_producer: String,
    delay: Duration,
}

impl ContextStore for SlowStore {
    fn put(&self, document: ContextDocument) -> Result<ContextDocument, ContextError> {
        self.inner.put(document)
    }

    fn get(
        &self,
        producer_id: &str,
        min_version: Option<Version>,
    ) -> Result<Option<ContextDocument>, StorageError> {
        if producer_id == self.slow_producer {
            std::thread::sleep(self.delay);
        }
        self.inner.get(producer_id, min_version)
    }

    fn get_full_detail(&self, reference: &FullDetailRef) -> Result<String, ContextError> {
        self.inner.get_full_detail(reference)
    }

    fn put_full_detail(&self, body: &str) -> Result<FullDetailRef, StorageError> {
        self.inner.put_full_detail(body)
    }

    fn last_full_detail_ref(&self, producer_id: &str) -> Result<Option<FullDetailRef>, StorageError> {
        self.inner.last_full_detail_ref(producer_id)
    }

    fn latest_version(&self, producer_id: &str) -> Result<Option<Version>, StorageError> {
        self.inner.latest_version(producer_id)
    }

    fn producers(&self) -> Result<Vec<String>, StorageError> {
        self.inner.producers()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_lookup_times_out_to_absent() {
    let store = Arc::new(SlowStore {
        inner: MemoryContextStore::new(),
        slow_producer: "slow".to_string(),
        delay: Duration::from_millis(400),
    });
    for producer in ["slow", "fast"] {
        store
            .put(ContextDocument::builder(producer, 1).summary("ok").build())
            .unwrap();
    }
    let loader = ContextLoader::new(
        store as Arc<dyn ContextStore>,
        FieldClassifier::new(),
        BudgetAllocator::new(CostUnit::Chars, ValueHeuristic::DocumentOrder),
    )
    .with_lookup_timeout(Duration::from_millis(50));

    let budget = SharedBudget::new(Budget::new(100));
    let bundle = loader
        .load_concurrent(&LoadRequest::new("C1", ["slow", "fast"]), &budget)
        .await
        .unwrap();

    let slow = bundle.get("slow").unwrap();
    assert_eq!(slow.source, Source::Absent);
    assert!(slow.warning.as_deref().unwrap().contains("timed out"));
    assert_eq!(bundle.get("fast").unwrap().source, Source::Structured);
    assert_eq!(budget.snapshot().spent(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_keep_independent_budgets() {
    let harness = Harness::new(CostUnit::Chars);
    for i in 0..3 {
        harness
            .store
            .put(
                ContextDocument::builder(format!("P{i}"), 1)
                    .summary("summary")
                    .finding("detail", "0123456789")
                    .build(),
            )
            .unwrap();
    }
    let producers: Vec<String> = (0..3).map(|i| format!("P{i}")).collect();
    let loader = Arc::new(harness.loader);

    let mut handles = Vec::new();
    for consumer in 0..8 {
        let loader = Arc::clone(&loader);
        let request = LoadRequest::new(format!("C{consumer}"), producers.clone());
        handles.push(tokio::spawn(async move {
            let budget = SharedBudget::new(Budget::new(45));
            let bundle = loader.load_concurrent(&request, &budget).await.unwrap();
            (bundle, budget.snapshot())
        }));
    }

    for handle in handles {
        let (bundle, budget) = handle.await.unwrap();
        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.total_cost(), budget.spent());
        assert!(budget.spent() <= budget.ceiling());
        // 17 + 17 leaves 11: the third producer's detail no longer fits
        assert_eq!(bundle.results[0].fields_included, vec!["summary", "detail"]);
        assert_eq!(bundle.results[1].fields_included, vec!["summary", "detail"]);
        assert_eq!(bundle.results[2].fields_included, vec!["summary"]);
    }
    assert_eq!(harness.events.len(), 24);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publishes_during_loads_never_break_monotonicity() {
    let store = Arc::new(MemoryContextStore::new());
    store
        .put(ContextDocument::builder("P1", 1).summary("v1").build())
        .unwrap();
    let loader = ContextLoader::new(
        store.clone() as Arc<dyn ContextStore>,
        FieldClassifier::new(),
        BudgetAllocator::default(),
    );

    let writer = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || {
            for version in 2..=50 {
                store
                    .put(
                        ContextDocument::builder("P1", version)
                            .summary(format!("v{version}"))
                            .build(),
                    )
                    .unwrap();
            }
        })
    };

    let mut last_seen = 0;
    for _ in 0..20 {
        let budget = SharedBudget::new(Budget::new(100));
        let bundle = loader
            .load_concurrent(&LoadRequest::new("C1", ["P1"]), &budget)
            .await
            .unwrap();
        let version = bundle.get("P1").unwrap().version.unwrap();
        assert!(version >= last_seen);
        last_seen = version;
    }
    writer.await.unwrap();
    assert_eq!(store.latest_version("P1").unwrap(), Some(50));
}
