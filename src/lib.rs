//! Handoff: Budgeted Context Distribution Between Agents
//!
//! Each agent publishes a compact, versioned context document after its run.
//! Downstream agents load only the fields they need, split into critical and
//! optional tiers, under a shared cost budget, falling back to the full
//! underlying document (and then to nothing) when the structured summary is
//! missing, stale, or malformed.

pub mod budget;
pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod fallback;
pub mod loader;
pub mod logging;
pub mod store;
pub mod types;

pub use budget::{Budget, BudgetAllocator, CostUnit, SharedBudget, ValueHeuristic};
pub use classify::{Classification, FieldClassifier, FieldRule, RuleOrigin};
pub use self::config::{ConfigLoader, HandoffConfig};
pub use document::{ContextDocument, FieldValue};
pub use error::{ContextError, StorageError};
pub use events::{EventRecord, EventSink, MemoryEventLog, Outcome};
pub use fallback::{FallbackResolver, FallbackState, Resolution};
pub use loader::{ContextBundle, ContextLoader, LoadRequest, LoadResult, Source};
pub use store::{ContextStore, MemoryContextStore, SledContextStore};
pub use types::{FullDetailRef, Version};
