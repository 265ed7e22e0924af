//! Fallback Resolver
//!
//! Absorbs missing-data faults for a single producer lookup by walking a
//! finite degradation chain:
//!
//! ```text
//! Structured --(missing / stale / malformed / unreadable)--> FullDetail --(no ref / not found)--> Absent
//! ```
//!
//! Every transition moves forward and `Absent` is terminal, so resolution
//! always completes in at most three steps. Nothing here returns an error to
//! the caller.

pub mod extract;

pub use extract::extract_fields;

use crate::document::{ContextDocument, FieldValue};
use crate::store::ContextStore;
use crate::types::{FullDetailRef, Version};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// States of the degradation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackState {
    Structured,
    FullDetail,
    Absent,
}

/// Terminal outcome of resolving one producer
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A valid structured document, ready for classification and allocation
    Structured(ContextDocument),
    /// Fields extracted from the producer's full-detail document
    FullDetail {
        reference: FullDetailRef,
        fields: Vec<(String, FieldValue)>,
        reason: String,
    },
    /// Nothing usable; the consumer proceeds without this producer
    Absent { reason: String },
}

impl Resolution {
    pub fn state(&self) -> FallbackState {
        match self {
            Resolution::Structured(_) => FallbackState::Structured,
            Resolution::FullDetail { .. } => FallbackState::FullDetail,
            Resolution::Absent { .. } => FallbackState::Absent,
        }
    }
}

/// Walks the degradation chain against a context store
#[derive(Clone)]
pub struct FallbackResolver {
    store: Arc<dyn ContextStore>,
    max_summary_chars: usize,
}

impl FallbackResolver {
    pub fn new(store: Arc<dyn ContextStore>, max_summary_chars: usize) -> Self {
        Self {
            store,
            max_summary_chars,
        }
    }

    /// Resolve a producer's context, degrading as far as necessary.
    pub fn resolve(&self, producer_id: &str, min_version: Option<Version>) -> Resolution {
        let mut state = FallbackState::Structured;
        let mut reason = String::new();
        let mut document_ref: Option<FullDetailRef> = None;

        loop {
            match state {
                FallbackState::Structured => {
                    match self.store.get(producer_id, min_version) {
                        Ok(Some(document)) => {
                            match document.check_integrity(self.max_summary_chars) {
                                Ok(()) => {
                                    debug!(
                                        producer_id,
                                        version = document.version,
                                        "Resolved structured document"
                                    );
                                    return Resolution::Structured(document);
                                }
                                Err(e) => {
                                    reason = e.to_string();
                                    document_ref = document.full_detail_ref.clone();
                                }
                            }
                        }
                        Ok(None) => {
                            reason = match min_version {
                                Some(min) => format!(
                                    "no document at version {} or later for '{}'",
                                    min, producer_id
                                ),
                                None => format!("'{}' has not published", producer_id),
                            };
                        }
                        Err(e) => {
                            reason = format!("structured lookup failed: {}", e);
                        }
                    }
                    warn!(producer_id, reason = %reason, "Structured context unavailable");
                    state = FallbackState::FullDetail;
                }
                FallbackState::FullDetail => {
                    let reference = match document_ref.take() {
                        Some(reference) => Some(reference),
                        None => match self.store.last_full_detail_ref(producer_id) {
                            Ok(reference) => reference,
                            Err(e) => {
                                warn!(producer_id, error = %e, "Full-detail ref lookup failed");
                                None
                            }
                        },
                    };
                    let Some(reference) = reference else {
                        reason = format!("{}; no full-detail reference known", reason);
                        state = FallbackState::Absent;
                        continue;
                    };
                    match self.store.get_full_detail(&reference) {
                        Ok(body) => {
                            let fields = extract_fields(&body);
                            warn!(
                                producer_id,
                                reference = %reference,
                                fields = fields.len(),
                                "Falling back to full detail"
                            );
                            return Resolution::FullDetail {
                                reference,
                                fields,
                                reason,
                            };
                        }
                        Err(e) => {
                            reason = format!("{}; {}", reason, e);
                            state = FallbackState::Absent;
                        }
                    }
                }
                FallbackState::Absent => {
                    warn!(producer_id, reason = %reason, "No context available");
                    return Resolution::Absent { reason };
                }
            }
        }
    }
}
