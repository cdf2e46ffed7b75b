//! One full selection cycle against a cluster
//!
//! Parse the targeting selector, read both snapshots, screen every
//! instance, pick one, and optionally hand it to the executor. Each run
//! starts from fresh snapshots; nothing carries over between runs.

use crate::error::{CycleError, Result};
use crate::observability::SelectionMetrics;
use crate::safety::{inspect_budgets, BudgetReport, ProtectionPolicy, SafetyEngine, VerdictReason};
use crate::selection::{pick, screen, InstanceVerdict, RandomSource, Screen};
use crate::selector::Selector;
use crate::source::{Cluster, RemovalMode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Inputs for a selection cycle
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub namespace: String,
    /// String form of the targeting selector; empty targets everything
    pub selector: String,
    pub protection: ProtectionPolicy,
    pub mode: RemovalMode,
    /// Evaluate and pick without removing anything
    pub dry_run: bool,
}

impl CycleConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            selector: String::new(),
            protection: ProtectionPolicy::default(),
            mode: RemovalMode::default(),
            dry_run: false,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_protection(mut self, protection: ProtectionPolicy) -> Self {
        self.protection = protection;
        self
    }

    pub fn with_mode(mut self, mode: RemovalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Budget that was left out of the decision
#[derive(Debug, Clone, Serialize)]
pub struct SkippedBudget {
    pub budget: String,
    pub error: String,
}

/// Auditable record of one cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub namespace: String,
    pub selector: String,
    pub decided_at: DateTime<Utc>,
    pub mode: RemovalMode,
    pub dry_run: bool,
    pub budgets: Vec<BudgetReport>,
    pub skipped_budgets: Vec<SkippedBudget>,
    pub verdicts: Vec<InstanceVerdict>,
    /// `None` means no eligible candidate this cycle
    pub chosen: Option<String>,
    pub removed: bool,
}

impl CycleReport {
    pub fn admitted(&self) -> impl Iterator<Item = &InstanceVerdict> {
        self.verdicts.iter().filter(|v| v.admitted)
    }
}

/// Runs selection cycles with a fixed configuration
pub struct SelectionCycle {
    config: CycleConfig,
    metrics: SelectionMetrics,
}

impl SelectionCycle {
    pub fn new(config: CycleConfig) -> Self {
        Self {
            config,
            metrics: SelectionMetrics::new(),
        }
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Run one cycle
    ///
    /// A malformed targeting selector or a failed snapshot read aborts the
    /// cycle before any decision. A removal failure is returned as an
    /// error; no other candidate is tried.
    pub async fn run<C, R>(&self, cluster: &C, rng: &mut R) -> Result<CycleReport>
    where
        C: Cluster + ?Sized,
        R: RandomSource + ?Sized,
    {
        let config = &self.config;
        let target = Selector::parse(&config.selector).map_err(|source| {
            CycleError::TargetSelector {
                selector: config.selector.clone(),
                source,
            }
        })?;

        let (instances, budgets) = tokio::try_join!(
            cluster.list_instances(&config.namespace),
            cluster.list_budgets(&config.namespace),
        )
        .map_err(CycleError::SnapshotError)?;

        info!(
            namespace = %config.namespace,
            selector = %target,
            instances = instances.len(),
            budgets = budgets.len(),
            "Snapshot read"
        );

        let started = Instant::now();
        let engine = SafetyEngine::new(&config.protection, &budgets, &instances);
        let screened = screen(&instances, &target, &engine);
        self.metrics
            .observe_evaluation(started.elapsed().as_secs_f64());

        let skipped_budgets: Vec<SkippedBudget> = engine
            .skipped()
            .iter()
            .map(|e| SkippedBudget {
                budget: e.budget().to_string(),
                error: e.to_string(),
            })
            .collect();
        self.metrics.record_skipped_budgets(skipped_budgets.len());

        let mut judged = 0;
        for s in &screened {
            if let Screen::Judged(verdict) = &s.screen {
                judged += 1;
                self.metrics
                    .record_verdict(verdict.admitted, reason_class(&verdict.reason));
                if !verdict.admitted {
                    info!(instance = %s.instance.name, reason = %verdict.reason, "Instance cannot be disrupted");
                }
            }
        }

        let verdicts: Vec<InstanceVerdict> = screened.iter().map(InstanceVerdict::from).collect();
        let admitted = verdicts.iter().filter(|v| v.admitted).count();
        self.metrics.set_pool(judged, admitted);
        info!(admitted, judged, "Safe candidates: {} of {} eligible", admitted, judged);

        let chosen = pick(&screened, rng);
        let mut report = CycleReport {
            namespace: config.namespace.clone(),
            selector: target.to_string(),
            decided_at: Utc::now(),
            mode: config.mode,
            dry_run: config.dry_run,
            budgets: inspect_budgets(&budgets, &instances),
            skipped_budgets,
            verdicts,
            chosen: chosen.map(|i| i.name.clone()),
            removed: false,
        };

        let Some(instance) = chosen else {
            info!(namespace = %config.namespace, "No eligible candidate");
            return Ok(report);
        };

        info!(instance = %instance.name, mode = %config.mode, dry_run = config.dry_run, "Selected instance");
        if config.dry_run {
            return Ok(report);
        }

        match cluster.remove(instance, config.mode).await {
            Ok(()) => {
                self.metrics.record_removal(&config.mode.to_string(), true);
                info!(instance = %instance.name, "Instance removed");
                report.removed = true;
                Ok(report)
            }
            Err(source) => {
                self.metrics.record_removal(&config.mode.to_string(), false);
                warn!(instance = %instance.name, error = %source, "Removal failed");
                Err(CycleError::RemovalError {
                    namespace: instance.namespace.clone(),
                    instance: instance.name.clone(),
                    source,
                })
            }
        }
    }
}

/// Low-cardinality label for a verdict reason
fn reason_class(reason: &VerdictReason) -> &'static str {
    match reason {
        VerdictReason::Protected(_) => "protected",
        VerdictReason::Unprotected => "unprotected",
        VerdictReason::BudgetExhausted { .. } => "budget_exhausted",
        VerdictReason::AllBudgetsPermit => "budgets_permit",
    }
}
