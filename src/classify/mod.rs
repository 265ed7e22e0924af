//! Field Classifier
//!
//! Decides, per (producer, consumer) pair, which fields are critical (always
//! loaded) and which are optional (loaded if the budget allows).
//!
//! Resolution order:
//! 1. an explicit rule registered for the pair
//! 2. the producing document's `next_agent_needs[consumer]`
//! 3. `critical = {summary}`, `optional = {key_findings, decisions}`

pub mod rule;

pub use rule::{FieldRule, RuleConfig, RuleFile};

use crate::document::{ContextDocument, DECISIONS, KEY_FINDINGS, SUMMARY};
use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Where a classification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrigin {
    /// A registered rule for the pair
    Explicit,
    /// The producer's `next_agent_needs` entry for the consumer
    ProducerNeeds,
    /// The built-in default
    Default,
    /// No classification applies (unstructured full detail)
    Unclassified,
}

impl RuleOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOrigin::Explicit => "explicit",
            RuleOrigin::ProducerNeeds => "producer_needs",
            RuleOrigin::Default => "default",
            RuleOrigin::Unclassified => "unclassified",
        }
    }
}

/// Result of classifying a (producer, consumer) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub critical: Vec<String>,
    pub optional: Vec<String>,
    pub origin: RuleOrigin,
}

impl Classification {
    /// The built-in default classification.
    pub fn default_rule() -> Self {
        Self {
            critical: vec![SUMMARY.to_string()],
            optional: vec![KEY_FINDINGS.to_string(), DECISIONS.to_string()],
            origin: RuleOrigin::Default,
        }
    }

    fn from_rule(rule: &FieldRule) -> Self {
        Self {
            critical: rule.critical().to_vec(),
            optional: rule.optional().to_vec(),
            origin: RuleOrigin::Explicit,
        }
    }
}

/// Registry of explicit rules plus the fallback resolution order
#[derive(Debug, Default, Clone)]
pub struct FieldClassifier {
    rules: HashMap<(String, String), FieldRule>,
}

impl FieldClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a classifier from configured rule entries.
    pub fn from_configs(configs: &[RuleConfig]) -> Result<Self, ContextError> {
        let mut classifier = Self::new();
        classifier.load_configs(configs)?;
        Ok(classifier)
    }

    /// Build a classifier from a TOML rule registry file.
    pub fn from_rule_file<P: AsRef<Path>>(path: P) -> Result<Self, ContextError> {
        let file = RuleFile::load(path)?;
        Self::from_configs(&file.rules)
    }

    /// Register every entry; a later entry for the same pair replaces an
    /// earlier one.
    pub fn load_configs(&mut self, configs: &[RuleConfig]) -> Result<(), ContextError> {
        for config in configs {
            let rule = config.to_rule()?;
            self.register(&config.producer, &config.consumer, rule);
        }
        Ok(())
    }

    /// Register a rule for a pair, returning the rule it replaced.
    pub fn register(
        &mut self,
        producer_id: &str,
        consumer_id: &str,
        rule: FieldRule,
    ) -> Option<FieldRule> {
        self.rules
            .insert((producer_id.to_string(), consumer_id.to_string()), rule)
    }

    pub fn remove(&mut self, producer_id: &str, consumer_id: &str) -> Option<FieldRule> {
        self.rules
            .remove(&(producer_id.to_string(), consumer_id.to_string()))
    }

    pub fn rule(&self, producer_id: &str, consumer_id: &str) -> Option<&FieldRule> {
        self.rules
            .get(&(producer_id.to_string(), consumer_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify the fields `producer_id` offers to `consumer_id`.
    ///
    /// `document` is the producer's current document, consulted only when no
    /// explicit rule exists. Deterministic for a fixed rule set and document.
    pub fn classify(
        &self,
        producer_id: &str,
        consumer_id: &str,
        document: Option<&ContextDocument>,
    ) -> Classification {
        if let Some(rule) = self.rule(producer_id, consumer_id) {
            debug!(producer_id, consumer_id, "Classified by explicit rule");
            return Classification::from_rule(rule);
        }

        if let Some(needs) = document.and_then(|doc| doc.needs_for(consumer_id)) {
            let mut critical: Vec<String> = Vec::with_capacity(needs.len());
            for name in needs {
                if !critical.contains(name) {
                    critical.push(name.clone());
                }
            }
            debug!(producer_id, consumer_id, "Classified by producer needs");
            return Classification {
                critical,
                optional: Vec::new(),
                origin: RuleOrigin::ProducerNeeds,
            };
        }

        debug!(producer_id, consumer_id, "Classified by default rule");
        Classification::default_rule()
    }
}
