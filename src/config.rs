//! Configuration System
//!
//! Layered configuration, lowest precedence first: built-in defaults, the
//! global file, the workspace `config/config.toml`, `config/{HANDOFF_ENV}.toml`,
//! then `HANDOFF__SECTION__KEY` environment variables.

use crate::budget::{Budget, BudgetAllocator, CostUnit, ValueHeuristic};
use crate::classify::{FieldClassifier, RuleConfig, RuleFile};
use crate::document::{SummaryOverflow, DEFAULT_MAX_SUMMARY_CHARS};
use crate::error::ContextError;
use crate::events::EventSink;
use crate::loader::ContextLoader;
use crate::logging::LoggingConfig;
use crate::store::{ContextStore, MemoryContextStore, SledContextStore, StoreOptions};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod merge;
mod sources;

use merge::merge_policy::{self, DEFAULT_CEILING, DEFAULT_LOOKUP_TIMEOUT_MS};
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub document: DocumentConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub classification: ClassificationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Root directory for the sled backend
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured path, else `store` under the user data directory.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::ProjectDirs::from("", "", "handoff")
            .map(|dirs| dirs.data_dir().join("store"))
            .unwrap_or_else(|| PathBuf::from(".handoff/store"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_ceiling")]
    pub default_ceiling: u64,

    #[serde(default)]
    pub cost_unit: CostUnit,

    #[serde(default)]
    pub value_heuristic: ValueHeuristic,
}

fn default_ceiling() -> u64 {
    DEFAULT_CEILING
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_ceiling: default_ceiling(),
            cost_unit: CostUnit::default(),
            value_heuristic: ValueHeuristic::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    #[serde(default = "default_max_summary_chars")]
    pub max_summary_chars: usize,

    #[serde(default)]
    pub summary_overflow: SummaryOverflow,
}

fn default_max_summary_chars() -> usize {
    DEFAULT_MAX_SUMMARY_CHARS
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_summary_chars: default_max_summary_chars(),
            summary_overflow: SummaryOverflow::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Bound on each store lookup in concurrent loads
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

fn default_lookup_timeout_ms() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_MS
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

/// Classification registry sources. Inline rules are applied after the rules
/// file, so they win for the same pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub rules_file: Option<PathBuf>,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Store(String),
    Budget(String),
    Document(String),
    Loader(String),
    Classification(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Store(msg) => write!(f, "Store: {}", msg),
            ValidationError::Budget(msg) => write!(f, "Budget: {}", msg),
            ValidationError::Document(msg) => write!(f, "Document: {}", msg),
            ValidationError::Loader(msg) => write!(f, "Loader: {}", msg),
            ValidationError::Classification(msg) => write!(f, "Classification: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl HandoffConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.store.backend == StoreBackend::Sled {
            if let Some(path) = &self.store.path {
                if path.as_os_str().is_empty() {
                    errors.push(ValidationError::Store("store path cannot be empty".to_string()));
                }
            }
        }

        if self.document.max_summary_chars == 0 {
            errors.push(ValidationError::Document(
                "max_summary_chars must be greater than zero".to_string(),
            ));
        }

        if self.loader.lookup_timeout_ms == 0 {
            errors.push(ValidationError::Loader(
                "lookup_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(path) = &self.classification.rules_file {
            if let Err(e) = RuleFile::load(path) {
                errors.push(ValidationError::Classification(e.to_string()));
            }
        }
        for rule in &self.classification.rules {
            if let Err(e) = rule.to_rule() {
                errors.push(ValidationError::Classification(e.to_string()));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "unknown level '{}'",
                self.logging.level
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_summary_chars: self.document.max_summary_chars,
            summary_overflow: self.document.summary_overflow,
        }
    }

    pub fn allocator(&self) -> BudgetAllocator {
        BudgetAllocator::new(self.budget.cost_unit, self.budget.value_heuristic)
    }

    /// A fresh budget at the configured default ceiling.
    pub fn new_budget(&self) -> Budget {
        Budget::new(self.budget.default_ceiling)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.loader.lookup_timeout_ms)
    }

    /// Classifier holding the rules file entries, then the inline rules.
    pub fn classifier(&self) -> Result<FieldClassifier, ContextError> {
        let mut classifier = match &self.classification.rules_file {
            Some(path) => FieldClassifier::from_rule_file(path)?,
            None => FieldClassifier::new(),
        };
        classifier.load_configs(&self.classification.rules)?;
        Ok(classifier)
    }

    /// Open the configured store backend.
    pub fn open_store(&self) -> Result<Arc<dyn ContextStore>, ContextError> {
        match self.store.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryContextStore::with_options(
                self.store_options(),
            ))),
            StoreBackend::Sled => {
                let path = self.store.resolved_path();
                info!(path = %path.display(), "Opening sled context store");
                Ok(Arc::new(SledContextStore::open(&path, self.store_options())?))
            }
        }
    }

    /// Loader over `store` with every configured policy applied.
    pub fn build_loader(
        &self,
        store: Arc<dyn ContextStore>,
        events: Arc<dyn EventSink>,
    ) -> Result<ContextLoader, ContextError> {
        Ok(ContextLoader::new(store, self.classifier()?, self.allocator())
            .with_events(events)
            .with_lookup_timeout(self.lookup_timeout())
            .with_max_summary_chars(self.document.max_summary_chars))
    }
}

/// Builds `HandoffConfig` from the configuration layers
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load every layer for `workspace_root` and validate the result.
    pub fn load(workspace_root: &Path) -> Result<HandoffConfig, ContextError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let config: HandoffConfig = builder
            .add_source(
                Environment::with_prefix("HANDOFF")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Self::validated(config)
    }

    /// Load a single file over the built-in defaults.
    pub fn load_from_file(path: &Path) -> Result<HandoffConfig, ContextError> {
        let config: HandoffConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        Self::validated(config)
    }

    /// Defaults only.
    pub fn defaults() -> Result<HandoffConfig, ContextError> {
        let config: HandoffConfig = Config::builder()
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    fn validated(config: HandoffConfig) -> Result<HandoffConfig, ContextError> {
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ContextError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;
        Ok(config)
    }
}
