//! Shared fixtures for integration tests

use handoff::budget::{BudgetAllocator, CostUnit, ValueHeuristic};
use handoff::classify::FieldClassifier;
use handoff::events::MemoryEventLog;
use handoff::loader::ContextLoader;
use handoff::store::{ContextStore, MemoryContextStore};
use std::sync::Arc;

/// Loader over an in-memory store, counting costs in chars, with events
/// captured in memory.
pub struct Harness {
    pub store: Arc<MemoryContextStore>,
    pub events: Arc<MemoryEventLog>,
    pub loader: ContextLoader,
}

impl Harness {
    pub fn new(cost_unit: CostUnit) -> Self {
        Self::with_classifier(cost_unit, FieldClassifier::new())
    }

    pub fn with_classifier(cost_unit: CostUnit, classifier: FieldClassifier) -> Self {
        let store = Arc::new(MemoryContextStore::new());
        let events = MemoryEventLog::shared();
        let loader = ContextLoader::new(
            store.clone() as Arc<dyn ContextStore>,
            classifier,
            BudgetAllocator::new(cost_unit, ValueHeuristic::DocumentOrder),
        )
        .with_events(events.clone());
        Self {
            store,
            events,
            loader,
        }
    }
}
