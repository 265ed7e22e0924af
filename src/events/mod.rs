//! Event Log
//!
//! Append-only records of load attempts. The loader writes one record per
//! producer processed; records are never mutated. Sinks must accept
//! concurrent appends from many loader invocations.

pub mod bus;
pub mod store;

pub use bus::EventBus;
pub use store::SledEventLog;

use crate::classify::RuleOrigin;
use crate::error::StorageError;
use crate::loader::{LoadResult, Source};
use crate::types::{now_rfc3339, Version};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Outcome of one producer lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Structured document, every field delivered
    Hit,
    /// Structured document, some fields omitted
    Partial,
    /// Served from full detail
    Fallback,
    /// Nothing served
    Miss,
}

impl Outcome {
    pub fn for_result(result: &LoadResult) -> Self {
        match result.source {
            Source::Structured if result.fields_omitted.is_empty() && !result.degraded => {
                Outcome::Hit
            }
            Source::Structured => Outcome::Partial,
            Source::FullDetail => Outcome::Fallback,
            Source::Absent => Outcome::Miss,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Partial => "partial",
            Outcome::Fallback => "fallback",
            Outcome::Miss => "miss",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: String,
    pub request_id: String,
    pub consumer_id: String,
    pub producer_id: String,
    pub outcome: Outcome,
    pub source: Source,
    pub version: Option<Version>,
    pub rule_origin: RuleOrigin,
    pub cost_spent: u64,
    pub fields_omitted_count: usize,
}

impl EventRecord {
    pub fn from_result(
        request_id: &str,
        consumer_id: &str,
        result: &LoadResult,
        rule_origin: RuleOrigin,
    ) -> Self {
        Self {
            timestamp: now_rfc3339(),
            request_id: request_id.to_string(),
            consumer_id: consumer_id.to_string(),
            producer_id: result.producer_id.clone(),
            outcome: Outcome::for_result(result),
            source: result.source,
            version: result.version,
            rule_origin,
            cost_spent: result.cost_spent,
            fields_omitted_count: result.fields_omitted.len(),
        }
    }
}

/// Append-only destination for event records
pub trait EventSink: Send + Sync {
    fn append(&self, record: &EventRecord) -> Result<(), StorageError>;
}

/// In-memory event log
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    records: Mutex<Vec<EventRecord>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Copy of every record appended so far, in append order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl EventSink for MemoryEventLog {
    fn append(&self, record: &EventRecord) -> Result<(), StorageError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Sink that writes each record to the `tracing` stream
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLog;

impl EventSink for TracingEventLog {
    fn append(&self, record: &EventRecord) -> Result<(), StorageError> {
        info!(
            target: "handoff::events",
            request_id = %record.request_id,
            consumer_id = %record.consumer_id,
            producer_id = %record.producer_id,
            outcome = record.outcome.as_str(),
            version = ?record.version,
            rule_origin = record.rule_origin.as_str(),
            cost_spent = record.cost_spent,
            fields_omitted = record.fields_omitted_count,
            "context load"
        );
        Ok(())
    }
}
