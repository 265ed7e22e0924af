//! Context Loader
//!
//! Orchestrates one consumer request: for each producer, in caller order, the
//! fallback-guarded store lookup, classification, and budget allocation run
//! against a single budget shared by the whole request. One event record is
//! emitted per producer processed.

use crate::budget::{Allocation, Budget, BudgetAllocator, LoadedField, SharedBudget};
use crate::classify::{FieldClassifier, FieldRule, RuleOrigin};
use crate::document::DEFAULT_MAX_SUMMARY_CHARS;
use crate::error::ContextError;
use crate::events::{EventRecord, EventSink, TracingEventLog};
use crate::fallback::{FallbackResolver, Resolution};
use crate::store::ContextStore;
use crate::types::{new_request_id, Version};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default bound on a single store lookup in `load_concurrent`
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(2000);

/// Where a load result's content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Structured,
    FullDetail,
    Absent,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Structured => "structured",
            Source::FullDetail => "full_detail",
            Source::Absent => "absent",
        }
    }
}

/// Context delivered from one producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub producer_id: String,
    pub source: Source,
    /// Document version, for structured results
    pub version: Option<Version>,
    pub fields_included: Vec<String>,
    pub fields_omitted: Vec<String>,
    pub content: Vec<LoadedField>,
    pub cost_spent: u64,
    pub degraded: bool,
    /// Why the result is degraded
    pub warning: Option<String>,
}

impl LoadResult {
    fn absent(producer_id: &str, reason: String) -> Self {
        Self {
            producer_id: producer_id.to_string(),
            source: Source::Absent,
            version: None,
            fields_included: Vec::new(),
            fields_omitted: Vec::new(),
            content: Vec::new(),
            cost_spent: 0,
            degraded: true,
            warning: Some(reason),
        }
    }

    fn from_allocation(
        producer_id: &str,
        source: Source,
        version: Option<Version>,
        allocation: Allocation,
    ) -> Self {
        Self {
            producer_id: producer_id.to_string(),
            source,
            version,
            fields_included: allocation.included_names(),
            fields_omitted: allocation.omitted,
            content: allocation.included,
            cost_spent: allocation.cost,
            degraded: source != Source::Structured,
            warning: None,
        }
    }

    /// Value of an included field.
    pub fn field(&self, name: &str) -> Option<&LoadedField> {
        self.content.iter().find(|f| f.name == name)
    }
}

/// A consumer's request for context from several producers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub consumer_id: String,
    /// Processing order; earlier producers are favored under a shrinking budget
    pub producers: Vec<String>,
    /// Per-producer minimum acceptable versions
    pub min_versions: HashMap<String, Version>,
}

impl LoadRequest {
    pub fn new<I, S>(consumer_id: impl Into<String>, producers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            consumer_id: consumer_id.into(),
            producers: producers.into_iter().map(Into::into).collect(),
            min_versions: HashMap::new(),
        }
    }

    pub fn min_version(mut self, producer_id: impl Into<String>, version: Version) -> Self {
        self.min_versions.insert(producer_id.into(), version);
        self
    }

    fn min_version_for(&self, producer_id: &str) -> Option<Version> {
        self.min_versions.get(producer_id).copied()
    }

    /// Producers in request order, each at most once.
    fn unique_producers(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(self.producers.len());
        for producer_id in &self.producers {
            if seen.insert(producer_id.as_str()) {
                unique.push(producer_id.clone());
            } else {
                warn!(
                    consumer_id = %self.consumer_id,
                    producer_id = %producer_id,
                    "Duplicate producer in load request; keeping first position"
                );
            }
        }
        unique
    }
}

/// Everything one `load` call delivered
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBundle {
    pub request_id: String,
    pub consumer_id: String,
    /// Results in request order
    pub results: Vec<LoadResult>,
    /// Budget state after the request
    pub budget: Budget,
}

impl ContextBundle {
    pub fn get(&self, producer_id: &str) -> Option<&LoadResult> {
        self.results.iter().find(|r| r.producer_id == producer_id)
    }

    /// Results keyed by producer id.
    pub fn by_producer(&self) -> HashMap<&str, &LoadResult> {
        self.results
            .iter()
            .map(|r| (r.producer_id.as_str(), r))
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.results.iter().any(|r| r.degraded)
    }

    pub fn total_cost(&self) -> u64 {
        self.results.iter().map(|r| r.cost_spent).sum()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Entry point consumers call to load context
#[derive(Clone)]
pub struct ContextLoader {
    store: Arc<dyn ContextStore>,
    classifier: Arc<RwLock<FieldClassifier>>,
    allocator: BudgetAllocator,
    resolver: FallbackResolver,
    events: Arc<dyn EventSink>,
    lookup_timeout: Duration,
}

impl ContextLoader {
    pub fn new(
        store: Arc<dyn ContextStore>,
        classifier: FieldClassifier,
        allocator: BudgetAllocator,
    ) -> Self {
        let resolver = FallbackResolver::new(Arc::clone(&store), DEFAULT_MAX_SUMMARY_CHARS);
        Self {
            store,
            classifier: Arc::new(RwLock::new(classifier)),
            allocator,
            resolver,
            events: Arc::new(TracingEventLog),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Summary bound applied by the load-side integrity check.
    pub fn with_max_summary_chars(mut self, max_summary_chars: usize) -> Self {
        self.resolver = FallbackResolver::new(Arc::clone(&self.store), max_summary_chars);
        self
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    pub fn allocator(&self) -> BudgetAllocator {
        self.allocator
    }

    pub fn classifier(&self) -> Arc<RwLock<FieldClassifier>> {
        Arc::clone(&self.classifier)
    }

    /// Register or replace the rule for a pair; takes effect on the next load.
    pub fn register_rule(
        &self,
        producer_id: &str,
        consumer_id: &str,
        rule: FieldRule,
    ) -> Option<FieldRule> {
        self.classifier.write().register(producer_id, consumer_id, rule)
    }

    /// Load context for `consumer_id` from `producers`, in the given order.
    pub fn load<I, S>(
        &self,
        consumer_id: &str,
        producers: I,
        budget: &mut Budget,
    ) -> Result<ContextBundle, ContextError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load_request(&LoadRequest::new(consumer_id, producers), budget)
    }

    /// Load a request against `budget`.
    ///
    /// Fails only with `BudgetExceeded`. On failure `budget` is left as it was
    /// and no event records are appended, not even for producers processed
    /// before the one that did not fit. The rejection is logged at `warn`
    /// with the request id and the producer that did not fit.
    pub fn load_request(
        &self,
        request: &LoadRequest,
        budget: &mut Budget,
    ) -> Result<ContextBundle, ContextError> {
        let producers = request.unique_producers();
        let resolutions = producers
            .iter()
            .map(|producer_id| {
                self.resolver
                    .resolve(producer_id, request.min_version_for(producer_id))
            })
            .collect();
        self.assemble(request, producers, resolutions, budget)
    }

    /// Like `load_request`, with store lookups fanned out on blocking tasks.
    ///
    /// Each lookup is bounded by the loader's lookup timeout; a lookup that
    /// times out resolves to `Absent`. Allocation runs afterwards in request
    /// order under the shared budget's lock, so the selection matches `load`.
    pub async fn load_concurrent(
        &self,
        request: &LoadRequest,
        budget: &SharedBudget,
    ) -> Result<ContextBundle, ContextError> {
        let producers = request.unique_producers();
        let lookups = producers.iter().map(|producer_id| {
            let resolver = self.resolver.clone();
            let producer_id = producer_id.clone();
            let min_version = request.min_version_for(&producer_id);
            let timeout = self.lookup_timeout;
            async move {
                let task = tokio::task::spawn_blocking(move || {
                    resolver.resolve(&producer_id, min_version)
                });
                match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(resolution)) => resolution,
                    Ok(Err(e)) => Resolution::Absent {
                        reason: format!("lookup task failed: {}", e),
                    },
                    Err(_) => Resolution::Absent {
                        reason: format!("lookup timed out after {} ms", timeout.as_millis()),
                    },
                }
            }
        });
        let resolutions = futures::future::join_all(lookups).await;

        budget.with_lock(|shared| self.assemble(request, producers, resolutions, shared))
    }

    fn assemble(
        &self,
        request: &LoadRequest,
        producers: Vec<String>,
        resolutions: Vec<Resolution>,
        budget: &mut Budget,
    ) -> Result<ContextBundle, ContextError> {
        let request_id = new_request_id();
        let consumer_id = request.consumer_id.as_str();
        let mut working = *budget;
        let mut results = Vec::with_capacity(producers.len());
        let mut records = Vec::with_capacity(producers.len());

        for (producer_id, resolution) in producers.iter().zip(resolutions) {
            let (result, origin) =
                match self.allocate(consumer_id, producer_id, resolution, &mut working) {
                    Ok(loaded) => loaded,
                    Err(e) => {
                        warn!(
                            request_id = %request_id,
                            consumer_id,
                            producer_id = %producer_id,
                            error = %e,
                            "Load failed"
                        );
                        return Err(e);
                    }
                };
            records.push(EventRecord::from_result(
                &request_id,
                consumer_id,
                &result,
                origin,
            ));
            results.push(result);
        }

        *budget = working;
        for record in &records {
            if let Err(e) = self.events.append(record) {
                warn!(
                    request_id = %request_id,
                    producer_id = %record.producer_id,
                    error = %e,
                    "Failed to append event record"
                );
            }
        }

        let bundle = ContextBundle {
            request_id,
            consumer_id: consumer_id.to_string(),
            results,
            budget: working,
        };
        info!(
            request_id = %bundle.request_id,
            consumer_id,
            producers = bundle.len(),
            spent = bundle.budget.spent(),
            ceiling = bundle.budget.ceiling(),
            degraded = bundle.is_degraded(),
            "Context loaded"
        );
        Ok(bundle)
    }

    fn allocate(
        &self,
        consumer_id: &str,
        producer_id: &str,
        resolution: Resolution,
        budget: &mut Budget,
    ) -> Result<(LoadResult, RuleOrigin), ContextError> {
        match resolution {
            Resolution::Structured(document) => {
                let classification =
                    self.classifier
                        .read()
                        .classify(producer_id, consumer_id, Some(&document));
                let allocation = self.allocator.allocate(&document, &classification, budget)?;
                let missing = allocation.missing_critical.clone();
                let mut result = LoadResult::from_allocation(
                    producer_id,
                    Source::Structured,
                    Some(document.version),
                    allocation,
                );
                result.degraded = !result.fields_omitted.is_empty();
                if !missing.is_empty() {
                    result.warning = Some(format!(
                        "critical fields not published: {}",
                        missing.join(", ")
                    ));
                } else if result.degraded {
                    result.warning = Some(format!(
                        "{} optional field(s) omitted to fit budget",
                        result.fields_omitted.len()
                    ));
                }
                Ok((result, classification.origin))
            }
            Resolution::FullDetail {
                reference,
                fields,
                reason,
            } => {
                let allocation = self.allocator.allocate_unclassified(fields, budget);
                let mut result =
                    LoadResult::from_allocation(producer_id, Source::FullDetail, None, allocation);
                result.warning = Some(format!("{}; served from full detail {}", reason, reference));
                Ok((result, RuleOrigin::Unclassified))
            }
            Resolution::Absent { reason } => Ok((
                LoadResult::absent(producer_id, reason),
                RuleOrigin::Unclassified,
            )),
        }
    }
}
