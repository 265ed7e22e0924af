//! Budgets
//!
//! A budget is a per-request cost ceiling plus a running `spent` counter.
//! `spent` never exceeds the ceiling.

pub mod allocator;
pub mod cost;

pub use allocator::{Allocation, BudgetAllocator, LoadedField, ValueHeuristic};
pub use cost::CostUnit;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cost ceiling and running spend for one loading session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BudgetState")]
pub struct Budget {
    ceiling: u64,
    spent: u64,
}

/// Serialized form of a budget, checked before it becomes a `Budget`
#[derive(Deserialize)]
struct BudgetState {
    ceiling: u64,
    #[serde(default)]
    spent: u64,
}

impl TryFrom<BudgetState> for Budget {
    type Error = String;

    fn try_from(state: BudgetState) -> Result<Self, Self::Error> {
        if state.spent > state.ceiling {
            return Err(format!(
                "budget spent {} exceeds ceiling {}",
                state.spent, state.ceiling
            ));
        }
        Ok(Self {
            ceiling: state.ceiling,
            spent: state.spent,
        })
    }
}

impl Budget {
    pub fn new(ceiling: u64) -> Self {
        Self { ceiling, spent: 0 }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn spent(&self) -> u64 {
        self.spent
    }

    pub fn remaining(&self) -> u64 {
        self.ceiling.saturating_sub(self.spent)
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        cost <= self.remaining()
    }

    /// Deduct `cost` if it fits. Leaves the budget unchanged otherwise.
    pub fn try_charge(&mut self, cost: u64) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.spent += cost;
        true
    }
}

/// Budget shared between threads of one request
///
/// Every charge happens under the lock, so concurrent producers can never
/// jointly overspend the ceiling.
#[derive(Debug, Clone)]
pub struct SharedBudget {
    inner: Arc<Mutex<Budget>>,
}

impl SharedBudget {
    pub fn new(budget: Budget) -> Self {
        Self {
            inner: Arc::new(Mutex::new(budget)),
        }
    }

    /// Current state of the budget.
    pub fn snapshot(&self) -> Budget {
        *self.inner.lock()
    }

    /// Run `f` with exclusive access to the budget.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut Budget) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}
