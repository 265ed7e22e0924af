//! Context Store
//!
//! Persists and indexes context documents and their full-detail counterparts.
//! The store owns versioning: a publish is accepted only when its version is
//! strictly greater than the latest stored version for that producer. It does
//! no prioritization or trimming.

pub mod detail;
pub mod heads;
pub mod memory;
pub mod persistence;

pub use detail::DetailStorage;
pub use heads::{HeadEntry, HeadIndex};
pub use memory::MemoryContextStore;
pub use persistence::SledContextStore;

use crate::document::{ContextDocument, SummaryOverflow, DEFAULT_MAX_SUMMARY_CHARS};
use crate::error::{ContextError, StorageError};
use crate::types::{FullDetailRef, Version};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Context Store interface
///
/// Reads are point-in-time and never block on a producer. Writes are
/// serialized per producer id; writes for different producers are independent.
pub trait ContextStore: Send + Sync {
    /// Publish a new document version.
    ///
    /// Fails with `StaleVersion` when `document.version` is not strictly
    /// greater than the stored maximum for its producer; stored state is left
    /// untouched. Returns the document as stored (the summary bound may have
    /// truncated it).
    fn put(&self, document: ContextDocument) -> Result<ContextDocument, ContextError>;

    /// Latest document for a producer, or `None` if it never published or its
    /// latest version is below `min_version`.
    fn get(
        &self,
        producer_id: &str,
        min_version: Option<Version>,
    ) -> Result<Option<ContextDocument>, StorageError>;

    /// Full underlying document for a reference. Fails with `NotFound`.
    fn get_full_detail(&self, reference: &FullDetailRef) -> Result<String, ContextError>;

    /// Store a full-detail body and return its content-addressed reference.
    fn put_full_detail(&self, body: &str) -> Result<FullDetailRef, StorageError>;

    /// Most recent full-detail reference any version of the producer declared.
    fn last_full_detail_ref(&self, producer_id: &str)
        -> Result<Option<FullDetailRef>, StorageError>;

    /// Latest stored version for a producer.
    fn latest_version(&self, producer_id: &str) -> Result<Option<Version>, StorageError>;

    /// Every producer that has published at least once, sorted.
    fn producers(&self) -> Result<Vec<String>, StorageError>;
}

/// Publish-time document policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub max_summary_chars: usize,
    pub summary_overflow: SummaryOverflow,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_summary_chars: DEFAULT_MAX_SUMMARY_CHARS,
            summary_overflow: SummaryOverflow::Reject,
        }
    }
}

impl StoreOptions {
    /// Bound the summary and run the integrity check before a document is
    /// written.
    pub fn prepare(&self, mut document: ContextDocument) -> Result<ContextDocument, ContextError> {
        document.bound_summary(self.max_summary_chars, self.summary_overflow)?;
        document.check_integrity(self.max_summary_chars)?;
        Ok(document)
    }
}

/// Reject a publish whose version does not advance the stored head.
pub(crate) fn ensure_fresh(
    producer_id: &str,
    attempted: Version,
    current: Option<Version>,
) -> Result<(), ContextError> {
    match current {
        Some(current) if attempted <= current => Err(ContextError::StaleVersion {
            producer_id: producer_id.to_string(),
            attempted,
            current,
        }),
        _ => Ok(()),
    }
}

/// Per-producer write locks
///
/// Lock entries are created on first publish and kept for the life of the
/// store.
#[derive(Default)]
pub struct ProducerLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProducerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock serializing writes for `producer_id`.
    pub fn lock_for(&self, producer_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(producer_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
