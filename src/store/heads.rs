//! Producer Heads
//!
//! O(1) access to the latest published version of each producer, plus the
//! most recent full-detail reference that producer ever declared.

use crate::types::{FullDetailRef, Version};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Head entry for one producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadEntry {
    pub version: Version,
    /// Survives later versions that omit a ref, and corrupted latest records.
    pub full_detail_ref: Option<FullDetailRef>,
}

impl HeadEntry {
    /// Advance to `version`, keeping the previous ref unless a new one is given.
    pub fn advanced(&self, version: Version, full_detail_ref: Option<&FullDetailRef>) -> Self {
        HeadEntry {
            version,
            full_detail_ref: full_detail_ref
                .cloned()
                .or_else(|| self.full_detail_ref.clone()),
        }
    }
}

/// Head index: producer_id -> HeadEntry
#[derive(Debug, Default)]
pub struct HeadIndex {
    heads: HashMap<String, HeadEntry>,
}

impl HeadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_head(&self, producer_id: &str) -> Option<&HeadEntry> {
        self.heads.get(producer_id)
    }

    pub fn latest_version(&self, producer_id: &str) -> Option<Version> {
        self.heads.get(producer_id).map(|e| e.version)
    }

    pub fn update_head(
        &mut self,
        producer_id: &str,
        version: Version,
        full_detail_ref: Option<&FullDetailRef>,
    ) {
        let entry = match self.heads.get(producer_id) {
            Some(existing) => existing.advanced(version, full_detail_ref),
            None => HeadEntry {
                version,
                full_detail_ref: full_detail_ref.cloned(),
            },
        };
        self.heads.insert(producer_id.to_string(), entry);
    }

    /// All producers with a head, sorted.
    pub fn producers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.heads.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}
