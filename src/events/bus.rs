//! In-process channel sink for event records.

use std::sync::mpsc::{channel, Receiver, Sender};

use parking_lot::Mutex;

use crate::error::StorageError;
use crate::events::{EventRecord, EventSink};

/// Forwards records to a receiver owned by observability tooling.
pub struct EventBus {
    sender: Mutex<Sender<EventRecord>>,
}

impl EventBus {
    pub fn new_pair() -> (Self, Receiver<EventRecord>) {
        let (sender, receiver) = channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl EventSink for EventBus {
    fn append(&self, record: &EventRecord) -> Result<(), StorageError> {
        self.sender.lock().send(record.clone()).map_err(|_| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "event receiver dropped",
            ))
        })
    }
}
