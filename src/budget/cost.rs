//! Field cost measurement

use crate::document::FieldValue;
use serde::{Deserialize, Serialize};

/// Unit in which budgets and field costs are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostUnit {
    /// UTF-8 byte length
    Bytes,
    /// Unicode scalar count
    Chars,
    /// Estimated tokens: ceil(chars / 4)
    #[default]
    Tokens,
}

impl CostUnit {
    pub fn measure(&self, text: &str) -> u64 {
        match self {
            CostUnit::Bytes => text.len() as u64,
            CostUnit::Chars => text.chars().count() as u64,
            CostUnit::Tokens => (text.chars().count() as u64).div_ceil(4),
        }
    }

    /// Cost of a field is the cost of its rendered value.
    pub fn cost_of(&self, value: &FieldValue) -> u64 {
        self.measure(&value.render())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CostUnit::Bytes => "bytes",
            CostUnit::Chars => "chars",
            CostUnit::Tokens => "tokens",
        }
    }
}
