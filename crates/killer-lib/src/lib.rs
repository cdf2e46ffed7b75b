//! Disruption-aware instance selection for chaos testing
//!
//! This crate provides the decision core for picking one instance that
//! can be removed without violating any active disruption budget:
//! - Label selector compilation and matching
//! - Protection rules for untouchable instances
//! - Disruption budget evaluation and the per-instance safety engine
//! - Candidate screening and uniform random selection
//! - Collaborator traits and a full selection cycle

pub mod cycle;
pub mod error;
pub mod models;
pub mod observability;
pub mod safety;
pub mod selection;
pub mod selector;
pub mod source;

pub use cycle::{CycleConfig, CycleReport, SelectionCycle, SkippedBudget};
pub use error::{BudgetError, CycleError, Result, SelectorError, SourceError};
pub use models::*;
pub use observability::SelectionMetrics;
pub use safety::{
    can_disrupt, evaluate, inspect_budgets, AssessedBudget, BudgetReport, Protection,
    ProtectionPolicy, SafetyEngine, Verdict, VerdictReason,
};
pub use selection::{
    pick, screen, select_one, EntropySource, InstanceVerdict, RandomSource, SequenceSource,
};
pub use selector::Selector;
pub use source::{
    BudgetSource, Cluster, ClusterSnapshot, DisruptionExecutor, InstanceSource, RemovalMode,
    StaticCluster,
};
