//! Error types for the handoff context distribution system.

use crate::types::{Digest, Version};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Digest mismatch: expected {}, got {}", hex::encode(expected), hex::encode(actual))]
    DigestMismatch { expected: Digest, actual: Digest },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by the publish and consume interfaces.
///
/// Only `StaleVersion`, `BudgetExceeded` and `SummaryTooLong` reach a consumer
/// or producer in normal operation. `NotFound` and `Integrity` are absorbed by
/// the fallback resolver.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Stale version for producer '{producer_id}': attempted {attempted}, current {current}")]
    StaleVersion {
        producer_id: String,
        attempted: Version,
        current: Version,
    },

    #[error("Budget exceeded for producer '{producer_id}': critical fields need {required}, only {available} available")]
    BudgetExceeded {
        producer_id: String,
        required: u64,
        available: u64,
    },

    #[error("Full detail not found: {0}")]
    NotFound(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Summary too long for producer '{producer_id}': {len} chars (max {max})")]
    SummaryTooLong {
        producer_id: String,
        len: usize,
        max: usize,
    },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid classification rule: {0}")]
    InvalidRule(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::ConfigError(err.to_string())
    }
}

impl ContextError {
    /// True for the conditions a consumer can act on (raise the budget, retry
    /// the publish with a fresh version).
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            ContextError::StaleVersion { .. } | ContextError::BudgetExceeded { .. }
        )
    }
}

pub(crate) fn sled_io(err: sled::Error) -> StorageError {
    StorageError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        err.to_string(),
    ))
}

pub(crate) fn corrupt(key: impl Into<String>, reason: impl ToString) -> StorageError {
    StorageError::Corrupt {
        key: key.into(),
        reason: reason.to_string(),
    }
}
