//! In-memory context store

use crate::document::ContextDocument;
use crate::error::{ContextError, StorageError};
use crate::store::{ensure_fresh, ContextStore, HeadIndex, ProducerLocks, StoreOptions};
use crate::types::{FullDetailRef, Version};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

/// Context store backed by process memory
///
/// Keeps the full version history of every producer. Intended for tests and
/// single-process agent hosts.
#[derive(Default)]
pub struct MemoryContextStore {
    options: StoreOptions,
    documents: RwLock<HashMap<String, Vec<ContextDocument>>>,
    heads: RwLock<HeadIndex>,
    details: RwLock<HashMap<FullDetailRef, String>>,
    locks: ProducerLocks,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Every stored version of a producer, oldest first.
    pub fn history(&self, producer_id: &str) -> Vec<Version> {
        self.documents
            .read()
            .get(producer_id)
            .map(|docs| docs.iter().map(|d| d.version).collect())
            .unwrap_or_default()
    }
}

impl ContextStore for MemoryContextStore {
    fn put(&self, document: ContextDocument) -> Result<ContextDocument, ContextError> {
        let lock = self.locks.lock_for(&document.producer_id);
        let _guard = lock.lock();

        let current = self.heads.read().latest_version(&document.producer_id);
        ensure_fresh(&document.producer_id, document.version, current)?;
        let document = self.options.prepare(document)?;

        self.documents
            .write()
            .entry(document.producer_id.clone())
            .or_default()
            .push(document.clone());
        self.heads.write().update_head(
            &document.producer_id,
            document.version,
            document.full_detail_ref.as_ref(),
        );

        info!(
            producer_id = %document.producer_id,
            version = document.version,
            "Published context document"
        );
        Ok(document)
    }

    fn get(
        &self,
        producer_id: &str,
        min_version: Option<Version>,
    ) -> Result<Option<ContextDocument>, StorageError> {
        let documents = self.documents.read();
        let latest = documents.get(producer_id).and_then(|docs| docs.last());
        Ok(latest
            .filter(|doc| min_version.map_or(true, |min| doc.version >= min))
            .cloned())
    }

    fn get_full_detail(&self, reference: &FullDetailRef) -> Result<String, ContextError> {
        self.details
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| ContextError::NotFound(reference.to_string()))
    }

    fn put_full_detail(&self, body: &str) -> Result<FullDetailRef, StorageError> {
        let reference = FullDetailRef::for_content(body);
        self.details
            .write()
            .entry(reference.clone())
            .or_insert_with(|| body.to_string());
        Ok(reference)
    }

    fn last_full_detail_ref(
        &self,
        producer_id: &str,
    ) -> Result<Option<FullDetailRef>, StorageError> {
        Ok(self
            .heads
            .read()
            .get_head(producer_id)
            .and_then(|head| head.full_detail_ref.clone()))
    }

    fn latest_version(&self, producer_id: &str) -> Result<Option<Version>, StorageError> {
        Ok(self.heads.read().latest_version(producer_id))
    }

    fn producers(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.heads.read().producers())
    }
}
