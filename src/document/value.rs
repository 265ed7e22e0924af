//! Typed field values carried by context documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Declared kind of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Number,
    List,
    Map,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        }
    }
}

/// Value of a finding, a decision choice, or an extracted full-detail section.
///
/// Nested maps are key-sorted so rendering, and therefore cost, is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::Number(_) => ValueKind::Number,
            FieldValue::List(_) => ValueKind::List,
            FieldValue::Map(_) => ValueKind::Map,
        }
    }

    /// Text form handed to consumers and measured by the cost model.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(n) => render_number(*n),
            FieldValue::List(items) => items.join("\n"),
            FieldValue::Map(_) => self.to_json().to_string(),
        }
    }

    /// False if any number in the value, nested maps included, is NaN or
    /// infinite. Such numbers have no JSON form.
    pub fn is_finite(&self) -> bool {
        match self {
            FieldValue::Number(n) => n.is_finite(),
            FieldValue::Map(entries) => entries.values().all(FieldValue::is_finite),
            FieldValue::Text(_) | FieldValue::List(_) => true,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            FieldValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Lossy conversion from arbitrary JSON. Booleans and nulls become text,
    /// arrays become lists of rendered items.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Number(n) => FieldValue::Number(n.as_f64().unwrap_or_default()),
            Value::Bool(b) => FieldValue::Text(b.to_string()),
            Value::Null => FieldValue::Text(String::new()),
            Value::Array(items) => FieldValue::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => FieldValue::from_json(other).render(),
                    })
                    .collect(),
            ),
            Value::Object(map) => FieldValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

fn render_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        FieldValue::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<BTreeMap<String, FieldValue>> for FieldValue {
    fn from(value: BTreeMap<String, FieldValue>) -> Self {
        FieldValue::Map(value)
    }
}
