//! Per-instance admit/deny decisions across all active budgets

use super::budget::CompiledBudget;
use super::protection::{Protection, ProtectionPolicy};
use crate::error::BudgetError;
use crate::models::{BudgetStatus, DisruptionBudget, Instance};
use std::fmt;
use tracing::{debug, warn};

/// Why an instance was admitted or denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictReason {
    Protected(Protection),
    Unprotected,
    BudgetExhausted { budget: String, status: BudgetStatus },
    AllBudgetsPermit,
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictReason::Protected(protection) => write!(f, "{}", protection),
            VerdictReason::Unprotected => f.write_str("unprotected by any budget"),
            VerdictReason::BudgetExhausted { budget, status } => write!(
                f,
                "budget {} would be violated (current healthy {}, desired healthy {}, allowed disruptions {})",
                budget, status.current_healthy, status.desired_healthy, status.allowed_disruptions
            ),
            VerdictReason::AllBudgetsPermit => {
                f.write_str("all applicable budgets permit disruption")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub admitted: bool,
    pub reason: VerdictReason,
}

impl Verdict {
    fn admit(reason: VerdictReason) -> Self {
        Self {
            admitted: true,
            reason,
        }
    }

    fn deny(reason: VerdictReason) -> Self {
        Self {
            admitted: false,
            reason,
        }
    }
}

/// A compiled budget together with its status against the engine's snapshot
#[derive(Debug, Clone)]
pub struct AssessedBudget<'a> {
    pub compiled: CompiledBudget<'a>,
    pub status: BudgetStatus,
}

impl AssessedBudget<'_> {
    pub fn name(&self) -> &str {
        self.compiled.name()
    }
}

/// Safety decisions against one snapshot of budgets and instances
///
/// Budgets are compiled and their status computed once on construction;
/// every verdict reads the same status. A budget that fails to
/// compile is skipped with a warning and reported through
/// [`SafetyEngine::skipped`]; it neither admits nor denies anything.
/// Applicable budgets are consulted in input order and the first one
/// with no remaining tolerance decides the denial.
pub struct SafetyEngine<'a> {
    policy: &'a ProtectionPolicy,
    budgets: Vec<AssessedBudget<'a>>,
    skipped: Vec<BudgetError>,
}

impl<'a> SafetyEngine<'a> {
    pub fn new(
        policy: &'a ProtectionPolicy,
        budgets: &'a [DisruptionBudget],
        instances: &'a [Instance],
    ) -> Self {
        let mut compiled = Vec::with_capacity(budgets.len());
        let mut skipped = Vec::new();

        for budget in budgets {
            match CompiledBudget::compile(budget) {
                Ok(c) => {
                    let status = c.status(instances);
                    compiled.push(AssessedBudget {
                        compiled: c,
                        status,
                    });
                }
                Err(e) => {
                    warn!(budget = %budget.name, error = %e, "Skipping budget that cannot be evaluated");
                    skipped.push(e);
                }
            }
        }

        Self {
            policy,
            budgets: compiled,
            skipped,
        }
    }

    pub fn policy(&self) -> &ProtectionPolicy {
        self.policy
    }

    /// Budgets that were skipped, with the reason
    pub fn skipped(&self) -> &[BudgetError] {
        &self.skipped
    }

    pub fn budgets(&self) -> &[AssessedBudget<'a>] {
        &self.budgets
    }

    /// Decide whether `instance` can be removed right now
    pub fn can_disrupt(&self, instance: &Instance) -> Verdict {
        if let Some(protection) = self.policy.classify(instance) {
            return Verdict::deny(VerdictReason::Protected(protection));
        }

        let mut applicable = self
            .budgets
            .iter()
            .filter(|b| b.compiled.applies_to(instance))
            .peekable();

        if applicable.peek().is_none() {
            debug!(instance = %instance.name, "No budget covers instance");
            return Verdict::admit(VerdictReason::Unprotected);
        }

        for budget in applicable {
            let status = budget.status;
            debug!(
                instance = %instance.name,
                budget = %budget.name(),
                current_healthy = status.current_healthy,
                desired_healthy = status.desired_healthy,
                allowed_disruptions = status.allowed_disruptions,
                "Evaluated budget"
            );

            if status.allowed_disruptions <= 0 {
                return Verdict::deny(VerdictReason::BudgetExhausted {
                    budget: budget.name().to_string(),
                    status,
                });
            }
        }

        Verdict::admit(VerdictReason::AllBudgetsPermit)
    }
}

/// One-shot form of [`SafetyEngine::can_disrupt`]
pub fn can_disrupt(
    instance: &Instance,
    policy: &ProtectionPolicy,
    budgets: &[DisruptionBudget],
    instances: &[Instance],
) -> Verdict {
    SafetyEngine::new(policy, budgets, instances).can_disrupt(instance)
}
