//! Safety evaluation for candidate instances
//!
//! This module provides:
//! - Protection rules for instances that are never disrupted
//! - Disruption budget status computation
//! - The engine combining both into one verdict per instance

mod budget;
mod engine;
mod protection;


pub use budget::{evaluate, inspect_budgets, BudgetPolicy, BudgetReport, CompiledBudget};
pub use engine::{can_disrupt, AssessedBudget, SafetyEngine, Verdict, VerdictReason};
pub use protection::{
    Protection, ProtectionPolicy, DEFAULT_PROTECTED_NAMESPACES, DEFAULT_PROTECTED_OWNER_KINDS,
};
