//! Document digest computation

use crate::document::ContextDocument;
use crate::error::{corrupt, StorageError};
use crate::types::Digest;
use blake3::Hasher;

/// Compute the digest of a context document
///
/// Digest = hash("producer:" || producer_id || "version:" || version_le || "doc:" || canonical_json)
///
/// The canonical JSON encoding is deterministic: struct fields serialize in
/// declaration order, findings and decisions keep their declared order, and
/// every map in the document is key-sorted.
pub fn compute_document_digest(document: &ContextDocument) -> Result<Digest, StorageError> {
    let canonical = serde_json::to_vec(document)
        .map_err(|e| corrupt(document.producer_id.clone(), e))?;

    let mut hasher = Hasher::new();

    hasher.update(b"producer:");
    hasher.update(document.producer_id.as_bytes());

    hasher.update(b"version:");
    hasher.update(&document.version.to_le_bytes());

    hasher.update(b"doc:");
    hasher.update(&canonical);

    Ok(*hasher.finalize().as_bytes())
}
