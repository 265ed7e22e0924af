//! End-to-end publish and load scenarios

use super::test_utils::Harness;
use handoff::budget::{Budget, CostUnit};
use handoff::document::ContextDocument;
use handoff::error::ContextError;
use handoff::events::Outcome;
use handoff::loader::Source;
use handoff::store::ContextStore;

fn publish_p1(harness: &Harness) {
    harness
        .store
        .put(
            ContextDocument::builder("P1", 1)
                .summary("ok")
                .finding("a", 1)
                .finding("b", 2)
                .needs("C1", ["a"])
                .build(),
        )
        .unwrap();
}

#[test]
fn test_consumer_needs_select_only_named_field() {
    let harness = Harness::new(CostUnit::Tokens);
    publish_p1(&harness);

    // cost(a) is one token
    let mut budget = Budget::new(1);
    let bundle = harness.loader.load("C1", ["P1"], &mut budget).unwrap();
    let result = bundle.get("P1").unwrap();

    assert_eq!(result.fields_included, vec!["a"]);
    assert_eq!(result.fields_omitted, vec!["summary", "b"]);
    assert!(result.degraded);
    assert_eq!(result.source, Source::Structured);
    assert_eq!(result.field("a").unwrap().value.render(), "1");
}

#[test]
fn test_unpublished_producer_is_absent() {
    let harness = Harness::new(CostUnit::Tokens);
    let mut budget = Budget::new(100);
    let bundle = harness.loader.load("C1", ["P2"], &mut budget).unwrap();
    let result = bundle.get("P2").unwrap();

    assert_eq!(result.source, Source::Absent);
    assert!(result.fields_included.is_empty());
    assert!(result.degraded);
    assert_eq!(harness.events.records()[0].outcome, Outcome::Miss);
}

#[test]
fn test_republish_same_version_is_stale() {
    let harness = Harness::new(CostUnit::Tokens);
    publish_p1(&harness);

    let err = harness
        .store
        .put(ContextDocument::builder("P1", 1).summary("changed").build())
        .unwrap_err();
    assert!(matches!(
        err,
        ContextError::StaleVersion {
            attempted: 1,
            current: 1,
            ..
        }
    ));
    let stored = harness.store.get("P1", None).unwrap().unwrap();
    assert_eq!(stored.summary, "ok");
    assert_eq!(stored.key_findings.len(), 2);
}

#[test]
fn test_default_classification_without_needs() {
    let harness = Harness::new(CostUnit::Chars);
    harness
        .store
        .put(
            ContextDocument::builder("architect", 1)
                .summary("split services")
                .finding("services", vec!["api", "worker"])
                .decision("database", "postgres", "team familiarity")
                .build(),
        )
        .unwrap();

    // summary (14) + services (10) fit; the decision map does not
    let mut budget = Budget::new(30);
    let bundle = harness
        .loader
        .load("reviewer", ["architect"], &mut budget)
        .unwrap();
    let result = bundle.get("architect").unwrap();
    assert_eq!(result.fields_included, vec!["summary", "services"]);
    assert_eq!(result.fields_omitted, vec!["database"]);
    assert_eq!(result.cost_spent, 24);
    assert_eq!(budget.spent(), 24);
}

#[test]
fn test_critical_overflow_surfaces_to_caller() {
    let harness = Harness::new(CostUnit::Chars);
    harness
        .store
        .put(
            ContextDocument::builder("P1", 1)
                .summary("a summary that is too long")
                .build(),
        )
        .unwrap();
    let mut budget = Budget::new(5);
    let err = harness.loader.load("C1", ["P1"], &mut budget).unwrap_err();
    assert!(err.is_actionable());
    assert!(matches!(err, ContextError::BudgetExceeded { required: 26, available: 5, .. }));
    assert_eq!(budget.spent(), 0);
    assert!(harness.events.is_empty());
}

#[test]
fn test_one_event_per_producer_in_request_order() {
    let harness = Harness::new(CostUnit::Chars);
    publish_p1(&harness);
    let mut budget = Budget::new(100);
    let bundle = harness
        .loader
        .load("C1", ["P3", "P1", "P2"], &mut budget)
        .unwrap();

    let records = harness.events.records();
    let producers: Vec<&str> = records.iter().map(|r| r.producer_id.as_str()).collect();
    assert_eq!(producers, vec!["P3", "P1", "P2"]);
    assert!(records.iter().all(|r| r.request_id == bundle.request_id));
    assert!(records.iter().all(|r| r.consumer_id == "C1"));
    assert_eq!(records[1].cost_spent, bundle.get("P1").unwrap().cost_spent);
}
