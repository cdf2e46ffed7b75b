//! Disruption budget evaluation
//!
//! Computes how many more disruptions a budget tolerates given a
//! point-in-time snapshot of the instances in its namespace. Percentages
//! round in the direction that never over-permits: up for
//! `min_available`, down for `max_unavailable`.

use crate::error::BudgetError;
use crate::models::{BudgetStatus, DisruptionBudget, Instance, IntOrPercent, PolicyValue};
use crate::selector::Selector;
use serde::Serialize;

/// Validated policy field of a budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetPolicy {
    MinAvailable(IntOrPercent),
    MaxUnavailable(IntOrPercent),
    Unconstrained,
}

/// A budget whose selector and policy have been validated
#[derive(Debug, Clone)]
pub struct CompiledBudget<'a> {
    budget: &'a DisruptionBudget,
    /// `None` when the budget carries no selector and so selects nothing
    selector: Option<Selector>,
    policy: BudgetPolicy,
}

impl<'a> CompiledBudget<'a> {
    pub fn compile(budget: &'a DisruptionBudget) -> Result<Self, BudgetError> {
        let selector = budget
            .selector
            .as_ref()
            .map(Selector::compile)
            .transpose()
            .map_err(|source| BudgetError::Selector {
                budget: budget.name.clone(),
                source,
            })?;

        let policy = if let Some(value) = &budget.min_available {
            BudgetPolicy::MinAvailable(validate_policy(budget, "minAvailable", value)?)
        } else if let Some(value) = &budget.max_unavailable {
            BudgetPolicy::MaxUnavailable(validate_policy(budget, "maxUnavailable", value)?)
        } else {
            BudgetPolicy::Unconstrained
        };

        Ok(Self {
            budget,
            selector,
            policy,
        })
    }

    pub fn name(&self) -> &str {
        &self.budget.name
    }

    pub fn budget(&self) -> &DisruptionBudget {
        self.budget
    }

    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }

    /// Whether this budget covers the instance
    pub fn applies_to(&self, instance: &Instance) -> bool {
        instance.namespace == self.budget.namespace
            && self
                .selector
                .as_ref()
                .is_some_and(|s| s.matches(&instance.labels))
    }

    /// Status against a snapshot of the budget's namespace
    pub fn status(&self, instances: &[Instance]) -> BudgetStatus {
        let mut matched = 0i32;
        let mut healthy = 0i32;
        for instance in instances.iter().filter(|i| self.applies_to(i)) {
            matched += 1;
            if instance.is_healthy() {
                healthy += 1;
            }
        }

        let (desired, allowed) = match self.policy {
            BudgetPolicy::MinAvailable(min) => {
                let desired = scaled(min, matched, true);
                (desired, healthy - desired)
            }
            BudgetPolicy::MaxUnavailable(max) => {
                let allowed = scaled(max, matched, false);
                (healthy - allowed, allowed)
            }
            BudgetPolicy::Unconstrained => (matched, matched),
        };

        BudgetStatus {
            matched,
            current_healthy: healthy,
            desired_healthy: desired,
            allowed_disruptions: allowed.max(0),
        }
    }
}

/// Compile a budget and compute its status in one step
pub fn evaluate(
    budget: &DisruptionBudget,
    instances: &[Instance],
) -> Result<BudgetStatus, BudgetError> {
    Ok(CompiledBudget::compile(budget)?.status(instances))
}

fn validate_policy(
    budget: &DisruptionBudget,
    field: &'static str,
    value: &PolicyValue,
) -> Result<IntOrPercent, BudgetError> {
    let parsed = match value {
        PolicyValue::Int(n) if *n >= 0 => Some(IntOrPercent::Int(*n)),
        PolicyValue::Int(_) => None,
        // A string must be a percentage; bare digits in string form are rejected
        PolicyValue::Str(s) if s.trim().ends_with('%') => {
            IntOrPercent::parse(s).filter(|v| matches!(v, IntOrPercent::Percent(p) if *p <= 100))
        }
        PolicyValue::Str(_) => None,
    };

    parsed.ok_or_else(|| BudgetError::InvalidPolicy {
        budget: budget.name.clone(),
        field,
        value: value.to_string(),
    })
}

fn scaled(value: IntOrPercent, matched: i32, round_up: bool) -> i32 {
    match value {
        IntOrPercent::Int(n) => n,
        IntOrPercent::Percent(pct) => {
            let product = i64::from(pct) * i64::from(matched);
            let scaled = if round_up {
                (product + 99) / 100
            } else {
                product / 100
            };
            scaled as i32
        }
    }
}

/// Per-budget row for inspection output
#[derive(Debug, Clone, Serialize)]
pub struct BudgetReport {
    pub name: String,
    pub min_available: Option<String>,
    pub max_unavailable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BudgetStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Evaluate every budget, keeping failures as rows rather than dropping them
pub fn inspect_budgets(budgets: &[DisruptionBudget], instances: &[Instance]) -> Vec<BudgetReport> {
    budgets
        .iter()
        .map(|budget| {
            let (status, error) = match evaluate(budget, instances) {
                Ok(status) => (Some(status), None),
                Err(e) => (None, Some(e.to_string())),
            };
            BudgetReport {
                name: budget.name.clone(),
                min_available: budget.min_available.as_ref().map(|v| v.to_string()),
                max_unavailable: budget.max_unavailable.as_ref().map(|v| v.to_string()),
                status,
                error,
            }
        })
        .collect()
}
