//! Durable sled-backed event log.

use std::path::Path;
use std::sync::Arc;

use sled::{Db, Tree};

use crate::error::{corrupt, sled_io, StorageError};
use crate::events::{EventRecord, EventSink};

const TREE_EVENTS: &str = "ctx_events";
const EVENT_KEY_PAD: usize = 20;

/// Event records keyed by a monotonically increasing sequence number
#[derive(Clone)]
pub struct SledEventLog {
    db: Db,
    events: Tree,
}

impl SledEventLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(sled_io)?;
        Self::new(db)
    }

    /// Share an already open database (e.g. the sled context store's).
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let events = db.open_tree(TREE_EVENTS).map_err(sled_io)?;
        Ok(Self { db, events })
    }

    pub fn shared(db: Db) -> Result<Arc<Self>, StorageError> {
        Ok(Arc::new(Self::new(db)?))
    }

    /// Every record in append order.
    pub fn records(&self) -> Result<Vec<EventRecord>, StorageError> {
        let mut out = Vec::new();
        for entry in self.events.iter() {
            let (key, value) = entry.map_err(sled_io)?;
            let record: EventRecord = serde_json::from_slice(&value)
                .map_err(|e| corrupt(String::from_utf8_lossy(&key), e))?;
            out.push(record);
        }
        Ok(out)
    }

    /// Records belonging to one load request.
    pub fn records_for_request(&self, request_id: &str) -> Result<Vec<EventRecord>, StorageError> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.request_id == request_id)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(sled_io)?;
        Ok(())
    }

    pub fn encode_key(seq: u64) -> String {
        format!("{seq:0EVENT_KEY_PAD$}")
    }
}

impl EventSink for SledEventLog {
    fn append(&self, record: &EventRecord) -> Result<(), StorageError> {
        let seq = self.db.generate_id().map_err(sled_io)?;
        let key = Self::encode_key(seq);
        let value =
            serde_json::to_vec(record).map_err(|e| corrupt(key.clone(), e))?;
        self.events
            .insert(key.as_bytes(), value)
            .map_err(sled_io)?;
        Ok(())
    }
}
