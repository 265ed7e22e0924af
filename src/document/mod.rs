//! Context Documents
//!
//! The structured summary an agent publishes after a run. Documents are
//! immutable once published; corrections are new versions.
//!
//! A document exposes an ordered list of addressable fields: `summary`, then
//! each key finding in declaration order, then each decision in declaration
//! order. `key_findings` and `decisions` are group selectors that expand to
//! every member of their group.

pub mod digest;
pub mod value;

pub use digest::compute_document_digest;
pub use value::{FieldValue, ValueKind};

use crate::error::ContextError;
use crate::types::{now_rfc3339, FullDetailRef, Version};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Name of the summary field
pub const SUMMARY: &str = "summary";
/// Group selector for every key finding
pub const KEY_FINDINGS: &str = "key_findings";
/// Group selector for every decision
pub const DECISIONS: &str = "decisions";

/// Default bound on summary length, in chars
pub const DEFAULT_MAX_SUMMARY_CHARS: usize = 2000;

/// A named key finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    pub value: FieldValue,
}

/// A named decision with the chosen value and its rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub name: String,
    pub choice: FieldValue,
    #[serde(default)]
    pub rationale: String,
}

impl Decision {
    /// Addressable form: `{ choice, rationale }`
    pub fn as_value(&self) -> FieldValue {
        let mut entries = BTreeMap::new();
        entries.insert("choice".to_string(), self.choice.clone());
        entries.insert(
            "rationale".to_string(),
            FieldValue::Text(self.rationale.clone()),
        );
        FieldValue::Map(entries)
    }
}

/// What `put` does with a summary longer than the configured bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryOverflow {
    #[default]
    Reject,
    Truncate,
}

/// Structured summary published by one agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub producer_id: String,
    pub version: Version,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub summary_truncated: bool,
    #[serde(default)]
    pub key_findings: Vec<FieldEntry>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    /// consumer id -> field names that consumer is expected to need
    #[serde(default)]
    pub next_agent_needs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub full_detail_ref: Option<FullDetailRef>,
    #[serde(default)]
    pub published_at: String,
}

impl ContextDocument {
    pub fn builder(producer_id: impl Into<String>, version: Version) -> DocumentBuilder {
        DocumentBuilder::new(producer_id, version)
    }

    /// All addressable fields in declaration order.
    pub fn fields(&self) -> Vec<(String, FieldValue)> {
        let mut fields = Vec::with_capacity(1 + self.key_findings.len() + self.decisions.len());
        fields.push((SUMMARY.to_string(), FieldValue::Text(self.summary.clone())));
        for entry in &self.key_findings {
            fields.push((entry.name.clone(), entry.value.clone()));
        }
        for decision in &self.decisions {
            fields.push((decision.name.clone(), decision.as_value()));
        }
        fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        std::iter::once(SUMMARY)
            .chain(self.key_findings.iter().map(|e| e.name.as_str()))
            .chain(self.decisions.iter().map(|d| d.name.as_str()))
            .collect()
    }

    /// Look up a single addressable field.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        if name == SUMMARY {
            return Some(FieldValue::Text(self.summary.clone()));
        }
        if let Some(entry) = self.key_findings.iter().find(|e| e.name == name) {
            return Some(entry.value.clone());
        }
        self.decisions
            .iter()
            .find(|d| d.name == name)
            .map(Decision::as_value)
    }

    /// Expand a classification name into concrete field names.
    ///
    /// Group selectors expand to their members; any other name maps to itself
    /// whether or not the document carries it.
    pub fn expand_selector(&self, name: &str) -> Vec<String> {
        match name {
            KEY_FINDINGS => self.key_findings.iter().map(|e| e.name.clone()).collect(),
            DECISIONS => self.decisions.iter().map(|d| d.name.clone()).collect(),
            other => vec![other.to_string()],
        }
    }

    /// Fields this document says `consumer_id` will need, if it says anything.
    pub fn needs_for(&self, consumer_id: &str) -> Option<&[String]> {
        self.next_agent_needs.get(consumer_id).map(Vec::as_slice)
    }

    /// Basic shape check applied on publish and again on load.
    pub fn check_integrity(&self, max_summary_chars: usize) -> Result<(), ContextError> {
        if self.producer_id.trim().is_empty() {
            return Err(ContextError::Integrity("producer_id is empty".to_string()));
        }
        if self.summary.trim().is_empty() {
            return Err(ContextError::Integrity(format!(
                "document {}@{} has no summary",
                self.producer_id, self.version
            )));
        }
        let len = self.summary.chars().count();
        if len > max_summary_chars {
            return Err(ContextError::Integrity(format!(
                "document {}@{} summary is {} chars (max {})",
                self.producer_id, self.version, len, max_summary_chars
            )));
        }

        let mut seen = HashSet::new();
        let members = self
            .key_findings
            .iter()
            .map(|e| e.name.as_str())
            .chain(self.decisions.iter().map(|d| d.name.as_str()));
        for name in members {
            if name.trim().is_empty() {
                return Err(ContextError::Integrity(format!(
                    "document {}@{} has an unnamed field",
                    self.producer_id, self.version
                )));
            }
            if is_reserved(name) {
                return Err(ContextError::Integrity(format!(
                    "document {}@{} uses reserved field name '{}'",
                    self.producer_id, self.version, name
                )));
            }
            if !seen.insert(name) {
                return Err(ContextError::Integrity(format!(
                    "document {}@{} declares field '{}' twice",
                    self.producer_id, self.version, name
                )));
            }
        }

        let values = self
            .key_findings
            .iter()
            .map(|e| (e.name.as_str(), &e.value))
            .chain(self.decisions.iter().map(|d| (d.name.as_str(), &d.choice)));
        for (name, value) in values {
            if !value.is_finite() {
                return Err(ContextError::Integrity(format!(
                    "document {}@{} field '{}' holds a non-finite number",
                    self.producer_id, self.version, name
                )));
            }
        }
        Ok(())
    }

    /// Apply the summary bound before publishing.
    pub fn bound_summary(
        &mut self,
        max_summary_chars: usize,
        overflow: SummaryOverflow,
    ) -> Result<(), ContextError> {
        let len = self.summary.chars().count();
        if len <= max_summary_chars {
            return Ok(());
        }
        match overflow {
            SummaryOverflow::Reject => Err(ContextError::SummaryTooLong {
                producer_id: self.producer_id.clone(),
                len,
                max: max_summary_chars,
            }),
            SummaryOverflow::Truncate => {
                self.summary = self.summary.chars().take(max_summary_chars).collect();
                self.summary_truncated = true;
                Ok(())
            }
        }
    }
}

/// True for names that may not be used by findings or decisions.
pub fn is_reserved(name: &str) -> bool {
    matches!(name, SUMMARY | KEY_FINDINGS | DECISIONS)
}

/// Builder for context documents
pub struct DocumentBuilder {
    document: ContextDocument,
}

impl DocumentBuilder {
    pub fn new(producer_id: impl Into<String>, version: Version) -> Self {
        Self {
            document: ContextDocument {
                producer_id: producer_id.into(),
                version,
                summary: String::new(),
                summary_truncated: false,
                key_findings: Vec::new(),
                decisions: Vec::new(),
                next_agent_needs: BTreeMap::new(),
                full_detail_ref: None,
                published_at: String::new(),
            },
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.document.summary = summary.into();
        self
    }

    pub fn finding(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.document.key_findings.push(FieldEntry {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn decision(
        mut self,
        name: impl Into<String>,
        choice: impl Into<FieldValue>,
        rationale: impl Into<String>,
    ) -> Self {
        self.document.decisions.push(Decision {
            name: name.into(),
            choice: choice.into(),
            rationale: rationale.into(),
        });
        self
    }

    pub fn needs<I, S>(mut self, consumer_id: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document
            .next_agent_needs
            .insert(consumer_id.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn full_detail_ref(mut self, locator: impl Into<FullDetailRef>) -> Self {
        self.document.full_detail_ref = Some(locator.into());
        self
    }

    pub fn published_at(mut self, ts: impl Into<String>) -> Self {
        self.document.published_at = ts.into();
        self
    }

    /// Finish the document, stamping `published_at` if it was not set.
    pub fn build(mut self) -> ContextDocument {
        if self.document.published_at.is_empty() {
            self.document.published_at = now_rfc3339();
        }
        self.document
    }
}
