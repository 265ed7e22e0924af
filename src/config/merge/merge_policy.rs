//! Built-in defaults, the lowest configuration layer.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

pub const DEFAULT_CEILING: u64 = 4000;
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2000;

/// Create a Config builder with defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("store.backend", "memory")?
        .set_default("budget.default_ceiling", DEFAULT_CEILING)?
        .set_default("budget.cost_unit", "tokens")?
        .set_default("budget.value_heuristic", "document_order")?
        .set_default(
            "document.max_summary_chars",
            crate::document::DEFAULT_MAX_SUMMARY_CHARS as u64,
        )?
        .set_default("document.summary_overflow", "reject")?
        .set_default("loader.lookup_timeout_ms", DEFAULT_LOOKUP_TIMEOUT_MS)
}
