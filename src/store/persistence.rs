//! Persistence layer for the context store

use crate::document::{compute_document_digest, ContextDocument};
use crate::error::{corrupt, sled_io, ContextError, StorageError};
use crate::store::{
    ensure_fresh, ContextStore, DetailStorage, HeadEntry, ProducerLocks, StoreOptions,
};
use crate::types::{FullDetailRef, Version};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use tracing::info;

const TREE_DOCUMENTS: &str = "ctx_documents";
const TREE_HEADS: &str = "ctx_heads";
const VERSION_KEY_PAD: usize = 20;

/// Stored form of a document: the document plus the digest computed at
/// publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentRecord {
    digest: String,
    document: ContextDocument,
}

/// Sled-based implementation of ContextStore
///
/// Layout under `root`:
/// - `db/`: sled database with a documents tree keyed `{producer}\0{version}`
///   and a heads tree keyed by producer
/// - `details/`: content-addressed full-detail bodies
pub struct SledContextStore {
    db: Db,
    documents: Tree,
    heads: Tree,
    details: DetailStorage,
    options: StoreOptions,
    locks: ProducerLocks,
}

impl SledContextStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P, options: StoreOptions) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let db = sled::open(root.join("db")).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        let details = DetailStorage::new(root)?;
        Self::with_db(db, details, options)
    }

    /// Build a store over an already-open database.
    pub fn with_db(db: Db, details: DetailStorage, options: StoreOptions) -> Result<Self, StorageError> {
        let documents = db.open_tree(TREE_DOCUMENTS).map_err(sled_io)?;
        let heads = db.open_tree(TREE_HEADS).map_err(sled_io)?;
        Ok(Self {
            db,
            documents,
            heads,
            details,
            options,
            locks: ProducerLocks::new(),
        })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(sled_io)?;
        Ok(())
    }

    /// Key of a stored document version. Zero padding keeps versions of one
    /// producer in numeric order under a prefix scan.
    pub fn document_key(producer_id: &str, version: Version) -> String {
        format!("{producer_id}\0{version:0VERSION_KEY_PAD$}")
    }

    /// Every stored version of a producer, oldest first.
    pub fn history(&self, producer_id: &str) -> Result<Vec<Version>, StorageError> {
        let prefix = format!("{producer_id}\0");
        let mut versions = Vec::new();
        for item in self.documents.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item.map_err(sled_io)?;
            let key = String::from_utf8_lossy(&key);
            let version = key[prefix.len()..]
                .parse::<Version>()
                .map_err(|e| corrupt(key.to_string(), e))?;
            versions.push(version);
        }
        Ok(versions)
    }

    fn read_head(&self, producer_id: &str) -> Result<Option<HeadEntry>, StorageError> {
        let Some(raw) = self.heads.get(producer_id.as_bytes()).map_err(sled_io)? else {
            return Ok(None);
        };
        let head: HeadEntry =
            bincode::deserialize(&raw).map_err(|e| corrupt(format!("head:{producer_id}"), e))?;
        Ok(Some(head))
    }

    fn write_head(&self, producer_id: &str, head: &HeadEntry) -> Result<(), StorageError> {
        let value = bincode::serialize(head).map_err(|e| corrupt(format!("head:{producer_id}"), e))?;
        self.heads
            .insert(producer_id.as_bytes(), value)
            .map_err(sled_io)?;
        Ok(())
    }

    fn read_document(
        &self,
        producer_id: &str,
        version: Version,
    ) -> Result<Option<ContextDocument>, StorageError> {
        let key = Self::document_key(producer_id, version);
        let Some(raw) = self.documents.get(key.as_bytes()).map_err(sled_io)? else {
            return Ok(None);
        };
        let record: DocumentRecord =
            serde_json::from_slice(&raw).map_err(|e| corrupt(key.clone(), e))?;

        let mut expected = [0u8; 32];
        hex::decode_to_slice(&record.digest, &mut expected).map_err(|e| corrupt(key.clone(), e))?;
        let actual = compute_document_digest(&record.document)?;
        if actual != expected {
            return Err(StorageError::DigestMismatch { expected, actual });
        }
        Ok(Some(record.document))
    }
}

impl ContextStore for SledContextStore {
    fn put(&self, document: ContextDocument) -> Result<ContextDocument, ContextError> {
        let lock = self.locks.lock_for(&document.producer_id);
        let _guard = lock.lock();

        let head = self.read_head(&document.producer_id)?;
        ensure_fresh(
            &document.producer_id,
            document.version,
            head.as_ref().map(|h| h.version),
        )?;
        let document = self.options.prepare(document)?;

        let digest = compute_document_digest(&document)?;
        let record = DocumentRecord {
            digest: hex::encode(digest),
            document,
        };
        let key = Self::document_key(&record.document.producer_id, record.document.version);
        let value = serde_json::to_vec(&record).map_err(|e| corrupt(key.clone(), e))?;
        self.documents
            .insert(key.as_bytes(), value)
            .map_err(sled_io)?;

        let next_head = match head {
            Some(existing) => existing.advanced(
                record.document.version,
                record.document.full_detail_ref.as_ref(),
            ),
            None => HeadEntry {
                version: record.document.version,
                full_detail_ref: record.document.full_detail_ref.clone(),
            },
        };
        self.write_head(&record.document.producer_id, &next_head)?;

        info!(
            producer_id = %record.document.producer_id,
            version = record.document.version,
            digest = %record.digest,
            "Published context document"
        );
        Ok(record.document)
    }

    fn get(
        &self,
        producer_id: &str,
        min_version: Option<Version>,
    ) -> Result<Option<ContextDocument>, StorageError> {
        let Some(head) = self.read_head(producer_id)? else {
            return Ok(None);
        };
        if min_version.map_or(false, |min| head.version < min) {
            return Ok(None);
        }
        self.read_document(producer_id, head.version)
    }

    fn get_full_detail(&self, reference: &FullDetailRef) -> Result<String, ContextError> {
        self.details.get(reference)
    }

    fn put_full_detail(&self, body: &str) -> Result<FullDetailRef, StorageError> {
        self.details.store(body)
    }

    fn last_full_detail_ref(
        &self,
        producer_id: &str,
    ) -> Result<Option<FullDetailRef>, StorageError> {
        Ok(self
            .read_head(producer_id)?
            .and_then(|head| head.full_detail_ref))
    }

    fn latest_version(&self, producer_id: &str) -> Result<Option<Version>, StorageError> {
        Ok(self.read_head(producer_id)?.map(|head| head.version))
    }

    fn producers(&self) -> Result<Vec<String>, StorageError> {
        let mut producers = Vec::new();
        for item in self.heads.iter() {
            let (key, _) = item.map_err(sled_io)?;
            producers.push(String::from_utf8_lossy(&key).to_string());
        }
        Ok(producers)
    }
}
