//! Critical-field inviolability and budget conservation

use handoff::budget::{Budget, BudgetAllocator, CostUnit, ValueHeuristic};
use handoff::classify::{FieldClassifier, FieldRule};
use handoff::document::ContextDocument;
use handoff::error::ContextError;
use handoff::loader::ContextLoader;
use handoff::store::{ContextStore, MemoryContextStore};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn document(summary: &str, findings: &[String]) -> ContextDocument {
    let mut builder = ContextDocument::builder("P1", 1).summary(summary);
    for (i, value) in findings.iter().enumerate() {
        builder = builder.finding(format!("f{i}"), value.as_str());
    }
    builder.build()
}

fn heuristic() -> impl Strategy<Value = ValueHeuristic> {
    prop_oneof![
        Just(ValueHeuristic::DocumentOrder),
        Just(ValueHeuristic::RuleOrder)
    ]
}

fn cost_unit() -> impl Strategy<Value = CostUnit> {
    prop_oneof![
        Just(CostUnit::Bytes),
        Just(CostUnit::Chars),
        Just(CostUnit::Tokens)
    ]
}

proptest! {
    #[test]
    fn critical_fields_all_or_nothing(
        summary in "[a-z]{1,12}",
        findings in prop::collection::vec("[a-z ]{0,20}", 0..6),
        critical_mask in prop::collection::vec(any::<bool>(), 6),
        ceiling in 0u64..80,
        unit in cost_unit(),
        order in heuristic(),
    ) {
        let doc = document(&summary, &findings);
        let critical: Vec<String> = (0..findings.len())
            .filter(|i| critical_mask[*i])
            .map(|i| format!("f{i}"))
            .collect();
        let optional: Vec<String> = (0..findings.len())
            .filter(|i| !critical_mask[*i])
            .map(|i| format!("f{i}"))
            .rev()
            .collect();
        let mut classifier = FieldClassifier::new();
        classifier.register("P1", "C1", FieldRule::new(critical.clone(), optional).unwrap());
        let classification = classifier.classify("P1", "C1", Some(&doc));

        let allocator = BudgetAllocator::new(unit, order);
        let required: u64 = critical
            .iter()
            .map(|name| allocator.cost_of(&doc.field(name).unwrap()))
            .sum();

        let mut budget = Budget::new(ceiling);
        match allocator.allocate(&doc, &classification, &mut budget) {
            Ok(allocation) => {
                let included: HashSet<String> = allocation.included_names().into_iter().collect();
                for name in &critical {
                    prop_assert!(included.contains(name));
                }
                prop_assert!(required <= ceiling);
                prop_assert_eq!(allocation.cost, budget.spent());
                prop_assert!(budget.spent() <= ceiling);
                prop_assert_eq!(
                    allocation.included.len() + allocation.omitted.len(),
                    doc.fields().len()
                );
            }
            Err(ContextError::BudgetExceeded { required: r, .. }) => {
                prop_assert_eq!(r, required);
                prop_assert!(required > ceiling);
                prop_assert_eq!(budget.spent(), 0);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn allocation_is_reproducible(
        summary in "[a-z]{1,12}",
        findings in prop::collection::vec("[a-z]{0,15}", 0..6),
        ceiling in 0u64..60,
    ) {
        let doc = document(&summary, &findings);
        let classification = FieldClassifier::new().classify("P1", "C1", Some(&doc));
        let allocator = BudgetAllocator::new(CostUnit::Chars, ValueHeuristic::DocumentOrder);
        let mut a = Budget::new(ceiling);
        let mut b = Budget::new(ceiling);
        let first = allocator.allocate(&doc, &classification, &mut a).ok();
        let second = allocator.allocate(&doc, &classification, &mut b).ok();
        prop_assert_eq!(first, second);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn multi_producer_load_never_overspends(
        summaries in prop::collection::vec("[a-z]{1,6}", 1..6),
        extra in prop::collection::vec("[a-z]{0,12}", 6),
        ceiling in 0u64..60,
    ) {
        let store = Arc::new(MemoryContextStore::new());
        let producers: Vec<String> = (0..summaries.len()).map(|i| format!("P{i}")).collect();
        for (i, summary) in summaries.iter().enumerate() {
            store
                .put(
                    ContextDocument::builder(producers[i].clone(), 1)
                        .summary(summary.as_str())
                        .finding("extra", extra[i].as_str())
                        .build(),
                )
                .unwrap();
        }
        let loader = ContextLoader::new(
            store as Arc<dyn ContextStore>,
            FieldClassifier::new(),
            BudgetAllocator::new(CostUnit::Chars, ValueHeuristic::DocumentOrder),
        );

        let mut budget = Budget::new(ceiling);
        match loader.load("C1", producers.clone(), &mut budget) {
            Ok(bundle) => {
                let total: u64 = bundle
                    .results
                    .iter()
                    .flat_map(|r| r.content.iter().map(|f| f.cost))
                    .sum();
                prop_assert!(total <= ceiling);
                prop_assert_eq!(total, budget.spent());
                for result in &bundle.results {
                    prop_assert!(result.fields_included.contains(&"summary".to_string()));
                }
            }
            Err(e) => {
                prop_assert!(e.is_actionable());
                prop_assert_eq!(budget.spent(), 0);
            }
        }
    }
}
