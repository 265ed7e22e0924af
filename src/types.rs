//! Shared identifiers, digests and time helpers.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// blake3 digest bytes
pub type Digest = [u8; 32];

/// Per-producer document version. Strictly increasing per producer.
pub type Version = u64;

/// Identifier of the agent that published a document.
pub type ProducerId = String;

/// Identifier of the agent requesting context.
pub type ConsumerId = String;

/// Locator for the complete document behind a summary.
///
/// Opaque to the loader. Stores that own full-detail content hand out
/// content-addressed refs (hex blake3 of the body).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullDetailRef(String);

impl FullDetailRef {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// Content-addressed ref for a full-detail body.
    pub fn for_content(body: &str) -> Self {
        Self(hex::encode(blake3::hash(body.as_bytes()).as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FullDetailRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FullDetailRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Current time as milliseconds since Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Current UTC time, RFC 3339 with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Generate a unique load request id.
pub fn new_request_id() -> String {
    let ts = now_millis();
    let pid = std::process::id();
    let seq = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("load-{ts}-{pid}-{seq}")
}
