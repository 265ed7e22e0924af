//! Degradation from structured context to full detail to nothing

use super::test_utils::Harness;
use handoff::budget::{Budget, BudgetAllocator, CostUnit, ValueHeuristic};
use handoff::classify::{FieldClassifier, RuleOrigin};
use handoff::document::ContextDocument;
use handoff::events::{MemoryEventLog, Outcome};
use handoff::loader::{ContextLoader, LoadRequest, Source};
use handoff::store::{ContextStore, SledContextStore, StoreOptions};
use std::sync::Arc;
use tempfile::TempDir;

const DETAIL: &str = "Overview text\n# Security Review\nno blocking issues\n# Open Risks\ntoken expiry";

#[test]
fn test_stale_summary_served_from_full_detail() {
    let harness = Harness::new(CostUnit::Chars);
    let reference = harness.store.put_full_detail(DETAIL).unwrap();
    harness
        .store
        .put(
            ContextDocument::builder("security", 3)
                .summary("reviewed")
                .full_detail_ref(reference)
                .build(),
        )
        .unwrap();

    let request = LoadRequest::new("deployer", ["security"]).min_version("security", 4);
    let mut budget = Budget::new(100);
    let bundle = harness.loader.load_request(&request, &mut budget).unwrap();
    let result = bundle.get("security").unwrap();

    assert_eq!(result.source, Source::FullDetail);
    assert!(result.degraded);
    assert_eq!(result.version, None);
    assert_eq!(
        result.fields_included,
        vec!["body", "security_review", "open_risks"]
    );
    assert!(result.warning.as_deref().unwrap().contains("full detail"));

    let record = &harness.events.records()[0];
    assert_eq!(record.outcome, Outcome::Fallback);
    assert_eq!(record.rule_origin, RuleOrigin::Unclassified);
}

#[test]
fn test_full_detail_fields_respect_budget() {
    let harness = Harness::new(CostUnit::Chars);
    let reference = harness.store.put_full_detail(DETAIL).unwrap();
    harness
        .store
        .put(
            ContextDocument::builder("security", 1)
                .summary("reviewed")
                .full_detail_ref(reference)
                .build(),
        )
        .unwrap();

    // body (13) and security_review (18) skipped, open_risks (12) fits
    let request = LoadRequest::new("deployer", ["security"]).min_version("security", 2);
    let mut budget = Budget::new(12);
    let bundle = harness.loader.load_request(&request, &mut budget).unwrap();
    let result = bundle.get("security").unwrap();
    assert_eq!(result.fields_included, vec!["open_risks"]);
    assert_eq!(result.fields_omitted, vec!["body", "security_review"]);
    assert_eq!(budget.spent(), 12);
}

#[test]
fn test_stale_without_full_detail_is_absent() {
    let harness = Harness::new(CostUnit::Chars);
    harness
        .store
        .put(ContextDocument::builder("P1", 1).summary("ok").build())
        .unwrap();
    let request = LoadRequest::new("C1", ["P1"]).min_version("P1", 2);
    let mut budget = Budget::new(100);
    let bundle = harness.loader.load_request(&request, &mut budget).unwrap();
    assert_eq!(bundle.get("P1").unwrap().source, Source::Absent);
    assert_eq!(budget.spent(), 0);
}

#[test]
fn test_corrupted_record_falls_back_to_cached_ref() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledContextStore::open(dir.path(), StoreOptions::default()).unwrap());
    let reference = store.put_full_detail("the complete analysis").unwrap();
    store
        .put(
            ContextDocument::builder("P1", 1)
                .summary("ok")
                .finding("a", 1)
                .full_detail_ref(reference)
                .build(),
        )
        .unwrap();

    // Forge the stored record so its digest no longer matches
    let tree = store.db().open_tree("ctx_documents").unwrap();
    let key = SledContextStore::document_key("P1", 1);
    let raw = tree.get(key.as_bytes()).unwrap().unwrap();
    let mut record: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    record["document"]["summary"] = serde_json::Value::from("forged");
    tree.insert(key.as_bytes(), serde_json::to_vec(&record).unwrap())
        .unwrap();

    let events = MemoryEventLog::shared();
    let loader = ContextLoader::new(
        store.clone() as Arc<dyn ContextStore>,
        FieldClassifier::new(),
        BudgetAllocator::new(CostUnit::Chars, ValueHeuristic::DocumentOrder),
    )
    .with_events(events.clone());

    let mut budget = Budget::new(100);
    let bundle = loader.load("C1", ["P1"], &mut budget).unwrap();
    let result = bundle.get("P1").unwrap();
    assert_eq!(result.source, Source::FullDetail);
    assert_eq!(result.fields_included, vec!["body"]);
    assert!(result
        .warning
        .as_deref()
        .unwrap()
        .contains("structured lookup failed"));
}

#[test]
fn test_mixed_sources_share_one_budget() {
    let harness = Harness::new(CostUnit::Chars);
    let reference = harness.store.put_full_detail("abcdefghij").unwrap();
    harness
        .store
        .put(
            ContextDocument::builder("old", 1)
                .summary("x")
                .full_detail_ref(reference)
                .build(),
        )
        .unwrap();
    harness
        .store
        .put(
            ContextDocument::builder("fresh", 1)
                .summary("12345")
                .finding("extra", "123456")
                .build(),
        )
        .unwrap();

    let request = LoadRequest::new("C1", ["old", "fresh", "never"]).min_version("old", 5);
    let mut budget = Budget::new(16);
    let bundle = harness.loader.load_request(&request, &mut budget).unwrap();

    assert_eq!(bundle.get("old").unwrap().cost_spent, 10);
    assert_eq!(bundle.get("fresh").unwrap().fields_included, vec!["summary"]);
    assert_eq!(bundle.get("never").unwrap().source, Source::Absent);
    assert_eq!(bundle.total_cost(), 15);
    assert!(bundle.total_cost() <= budget.ceiling());
    assert!(bundle.is_degraded());
}
