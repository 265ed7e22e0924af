//! Full-detail storage
//!
//! Content-addressed storage for the complete documents behind context
//! summaries, on the filesystem. Bodies are stored at paths derived from their
//! reference to enable efficient lookup.

use crate::error::{ContextError, StorageError};
use crate::types::FullDetailRef;
use std::fs;
use std::path::{Path, PathBuf};

/// Content-addressed full-detail storage
///
/// Stores bodies using a content-addressed path structure:
/// `{root}/details/{hex[0..2]}/{hex[2..4]}/{ref}.detail`
///
/// This structure:
/// - Spreads files across subdirectories to prevent directory bloat
/// - Deduplicates identical bodies (same ref = same path)
pub struct DetailStorage {
    root: PathBuf,
}

impl DetailStorage {
    /// Create a new DetailStorage at the given root path
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();

        let details_dir = root.join("details");
        fs::create_dir_all(&details_dir).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to create details directory at {:?}: {}", details_dir, e),
            ))
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a body and return its reference
    ///
    /// Uses atomic writes (write to .tmp, then rename). Storing a body that is
    /// already present is a no-op.
    pub fn store(&self, body: &str) -> Result<FullDetailRef, StorageError> {
        let reference = FullDetailRef::for_content(body);
        let detail_path = self
            .detail_path(&reference)
            .ok_or_else(|| crate::error::corrupt(reference.as_str(), "invalid content ref"))?;

        if detail_path.exists() {
            return Ok(reference);
        }

        if let Some(parent) = detail_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to create parent directory {:?}: {}", parent, e),
                ))
            })?;
        }

        let temp_path = detail_path.with_extension("detail.tmp");
        fs::write(&temp_path, body.as_bytes()).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to write detail to {:?}: {}", temp_path, e),
            ))
        })?;

        fs::rename(&temp_path, &detail_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to rename temp file to {:?}: {}", detail_path, e),
            ))
        })?;

        Ok(reference)
    }

    /// Retrieve a body by reference
    ///
    /// Fails with `NotFound` for unknown or non content-addressed references,
    /// and with a digest mismatch when the stored bytes no longer hash to the
    /// reference.
    pub fn get(&self, reference: &FullDetailRef) -> Result<String, ContextError> {
        let Some(detail_path) = self.detail_path(reference) else {
            return Err(ContextError::NotFound(reference.to_string()));
        };
        if !detail_path.exists() {
            return Err(ContextError::NotFound(reference.to_string()));
        }

        let bytes = fs::read(&detail_path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to read detail from {:?}: {}", detail_path, e),
            ))
        })?;

        let actual = *blake3::hash(&bytes).as_bytes();
        let mut expected = [0u8; 32];
        hex::decode_to_slice(reference.as_str(), &mut expected)
            .map_err(|e| crate::error::corrupt(reference.as_str(), e))?;
        if actual != expected {
            return Err(StorageError::DigestMismatch { expected, actual }.into());
        }

        String::from_utf8(bytes)
            .map_err(|e| crate::error::corrupt(reference.as_str(), e).into())
    }

    pub fn exists(&self, reference: &FullDetailRef) -> bool {
        self.detail_path(reference)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    /// Path structure: `{root}/details/{hex[0..2]}/{hex[2..4]}/{ref}.detail`
    ///
    /// `None` for references that are not 64-char lowercase hex digests.
    fn detail_path(&self, reference: &FullDetailRef) -> Option<PathBuf> {
        let hex = reference.as_str();
        if hex.len() != 64 || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return None;
        }
        Some(
            self.root
                .join("details")
                .join(&hex[0..2])
                .join(&hex[2..4])
                .join(format!("{}.detail", hex)),
        )
    }
}
