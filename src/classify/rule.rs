//! Field classification rules and the TOML rule registry format.

use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Critical and optional field names for one (producer, consumer) pair.
///
/// Names may be concrete field names or the group selectors `key_findings`
/// and `decisions`. The two lists are disjoint; any field listed in neither is
/// optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleLists")]
pub struct FieldRule {
    critical: Vec<String>,
    optional: Vec<String>,
}

/// Unchecked rule lists as they appear on the wire
#[derive(Deserialize)]
struct RuleLists {
    #[serde(default)]
    critical: Vec<String>,
    #[serde(default)]
    optional: Vec<String>,
}

impl TryFrom<RuleLists> for FieldRule {
    type Error = ContextError;

    fn try_from(lists: RuleLists) -> Result<Self, Self::Error> {
        FieldRule::new(lists.critical, lists.optional)
    }
}

impl FieldRule {
    /// Build a rule, dropping duplicate names and rejecting overlap.
    pub fn new<C, O, S>(critical: C, optional: O) -> Result<Self, ContextError>
    where
        C: IntoIterator<Item = S>,
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let critical = dedupe(critical)?;
        let optional = dedupe(optional)?;

        let critical_set: HashSet<&str> = critical.iter().map(String::as_str).collect();
        if let Some(overlap) = optional.iter().find(|name| critical_set.contains(name.as_str())) {
            return Err(ContextError::InvalidRule(format!(
                "field '{}' is listed as both critical and optional",
                overlap
            )));
        }

        Ok(Self { critical, optional })
    }

    pub fn critical(&self) -> &[String] {
        &self.critical
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }
}

fn dedupe<I, S>(names: I) -> Result<Vec<String>, ContextError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let name: String = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ContextError::InvalidRule("empty field name".to_string()));
        }
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    Ok(out)
}

/// One registry entry as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub producer: String,
    pub consumer: String,
    #[serde(default)]
    pub critical: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

impl RuleConfig {
    pub fn to_rule(&self) -> Result<FieldRule, ContextError> {
        if self.producer.trim().is_empty() || self.consumer.trim().is_empty() {
            return Err(ContextError::InvalidRule(
                "rule needs both producer and consumer".to_string(),
            ));
        }
        FieldRule::new(self.critical.iter().cloned(), self.optional.iter().cloned()).map_err(
            |e| {
                ContextError::InvalidRule(format!(
                    "{} -> {}: {}",
                    self.producer, self.consumer, e
                ))
            },
        )
    }
}

/// Standalone rule registry file
///
/// ```toml
/// [[rules]]
/// producer = "architect"
/// consumer = "developer"
/// critical = ["summary", "services"]
/// optional = ["decisions"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RuleFile {
    pub fn parse(raw: &str) -> Result<Self, ContextError> {
        toml::from_str(raw)
            .map_err(|e| ContextError::ConfigError(format!("Invalid rule file: {}", e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ContextError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ContextError::ConfigError(format!("Failed to read rule file {:?}: {}", path, e))
        })?;
        Self::parse(&raw)
    }
}
