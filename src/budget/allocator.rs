//! Budget Allocator
//!
//! Critical fields are all-or-nothing: either every present critical field
//! fits, or the allocation fails and the budget is left untouched. Optional
//! fields are packed greedily in value order, skipping (never truncating) any
//! field that does not fit, so a smaller lower-ranked field can still be
//! admitted. The same inputs always reproduce the same selection.

use crate::budget::{Budget, CostUnit};
use crate::classify::Classification;
use crate::document::{ContextDocument, FieldValue};
use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Ranking of optional fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueHeuristic {
    /// Fields declared first in the document rank higher
    #[default]
    DocumentOrder,
    /// Fields listed in the classification's optional list rank first, in
    /// listed order; the rest follow in document order
    RuleOrder,
}

/// A field selected for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedField {
    pub name: String,
    pub value: FieldValue,
    pub cost: u64,
}

/// Outcome of one allocation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Allocation {
    /// Included fields, in document order
    pub included: Vec<LoadedField>,
    /// Omitted field names: document fields in document order, then critical
    /// names the document does not carry
    pub omitted: Vec<String>,
    /// Critical names the document does not carry
    pub missing_critical: Vec<String>,
    pub cost: u64,
}

impl Allocation {
    pub fn included_names(&self) -> Vec<String> {
        self.included.iter().map(|f| f.name.clone()).collect()
    }
}

/// Fits classified document fields into a budget
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetAllocator {
    cost_unit: CostUnit,
    heuristic: ValueHeuristic,
}

impl BudgetAllocator {
    pub fn new(cost_unit: CostUnit, heuristic: ValueHeuristic) -> Self {
        Self {
            cost_unit,
            heuristic,
        }
    }

    pub fn cost_unit(&self) -> CostUnit {
        self.cost_unit
    }

    pub fn heuristic(&self) -> ValueHeuristic {
        self.heuristic
    }

    /// Cost of a single field value under this allocator's unit.
    pub fn cost_of(&self, value: &FieldValue) -> u64 {
        self.cost_unit.cost_of(value)
    }

    /// Allocate a structured document's fields against `budget`.
    ///
    /// Fails with `BudgetExceeded` when the present critical fields alone
    /// exceed the remaining budget.
    pub fn allocate(
        &self,
        document: &ContextDocument,
        classification: &Classification,
        budget: &mut Budget,
    ) -> Result<Allocation, ContextError> {
        let fields: Vec<(String, FieldValue, u64)> = document
            .fields()
            .into_iter()
            .map(|(name, value)| {
                let cost = self.cost_of(&value);
                (name, value, cost)
            })
            .collect();
        let position = |name: &str| fields.iter().position(|(n, _, _)| n == name);

        let mut critical: Vec<usize> = Vec::new();
        let mut missing_critical: Vec<String> = Vec::new();
        for selector in &classification.critical {
            for name in document.expand_selector(selector) {
                match position(&name) {
                    Some(idx) if !critical.contains(&idx) => critical.push(idx),
                    Some(_) => {}
                    None if !missing_critical.contains(&name) => missing_critical.push(name),
                    None => {}
                }
            }
        }

        let required = critical
            .iter()
            .fold(0u64, |acc, idx| acc.saturating_add(fields[*idx].2));
        if !budget.try_charge(required) {
            return Err(ContextError::BudgetExceeded {
                producer_id: document.producer_id.clone(),
                required,
                available: budget.remaining(),
            });
        }

        let ranked: Vec<usize> = match self.heuristic {
            ValueHeuristic::DocumentOrder => (0..fields.len())
                .filter(|idx| !critical.contains(idx))
                .collect(),
            ValueHeuristic::RuleOrder => {
                let mut ranked: Vec<usize> = Vec::new();
                for selector in &classification.optional {
                    for name in document.expand_selector(selector) {
                        if let Some(idx) = position(&name) {
                            if !critical.contains(&idx) && !ranked.contains(&idx) {
                                ranked.push(idx);
                            }
                        }
                    }
                }
                for idx in 0..fields.len() {
                    if !critical.contains(&idx) && !ranked.contains(&idx) {
                        ranked.push(idx);
                    }
                }
                ranked
            }
        };

        let mut chosen: HashSet<usize> = critical.iter().copied().collect();
        let mut cost = required;
        for idx in ranked {
            let (name, _, field_cost) = &fields[idx];
            if budget.try_charge(*field_cost) {
                debug!(field = %name, cost = field_cost, "Included optional field");
                chosen.insert(idx);
                cost += field_cost;
            } else {
                debug!(
                    field = %name,
                    cost = field_cost,
                    remaining = budget.remaining(),
                    "Skipped optional field"
                );
            }
        }

        let mut allocation = Allocation {
            cost,
            ..Allocation::default()
        };
        for (idx, (name, value, field_cost)) in fields.into_iter().enumerate() {
            if chosen.contains(&idx) {
                allocation.included.push(LoadedField {
                    name,
                    value,
                    cost: field_cost,
                });
            } else {
                allocation.omitted.push(name);
            }
        }
        allocation.omitted.extend(missing_critical.iter().cloned());
        allocation.missing_critical = missing_critical;
        Ok(allocation)
    }

    /// Allocate unclassified fields (extracted from full detail). Every field
    /// is optional and packed in the given order.
    pub fn allocate_unclassified(
        &self,
        fields: Vec<(String, FieldValue)>,
        budget: &mut Budget,
    ) -> Allocation {
        let mut allocation = Allocation::default();
        for (name, value) in fields {
            let cost = self.cost_of(&value);
            if budget.try_charge(cost) {
                allocation.cost += cost;
                allocation.included.push(LoadedField { name, value, cost });
            } else {
                debug!(field = %name, cost, "Skipped full-detail field");
                allocation.omitted.push(name);
            }
        }
        allocation
    }
}
