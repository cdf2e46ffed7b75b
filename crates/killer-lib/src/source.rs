//! Collaborator interfaces to the cluster
//!
//! The decision core never talks to the control plane itself. It reads
//! snapshots through [`InstanceSource`] and [`BudgetSource`] and hands
//! the chosen instance to a [`DisruptionExecutor`].

use crate::error::SourceError;
use crate::models::{DisruptionBudget, Instance};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

/// How the chosen instance is removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalMode {
    /// Delete the instance outright
    #[default]
    Delete,
    /// Go through the cluster's eviction path, which re-checks budgets server-side
    Evict,
}

impl fmt::Display for RemovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalMode::Delete => f.write_str("delete"),
            RemovalMode::Evict => f.write_str("evict"),
        }
    }
}

impl FromStr for RemovalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "delete" => Ok(RemovalMode::Delete),
            "evict" => Ok(RemovalMode::Evict),
            other => Err(format!("unknown removal mode '{}'", other)),
        }
    }
}

/// Lists instances in a namespace
#[async_trait]
pub trait InstanceSource: Send + Sync {
    async fn list_instances(&self, namespace: &str) -> Result<Vec<Instance>, SourceError>;
}

/// Lists disruption budgets in a namespace
#[async_trait]
pub trait BudgetSource: Send + Sync {
    async fn list_budgets(&self, namespace: &str) -> Result<Vec<DisruptionBudget>, SourceError>;
}

/// Removes a chosen instance
#[async_trait]
pub trait DisruptionExecutor: Send + Sync {
    async fn remove(&self, instance: &Instance, mode: RemovalMode) -> Result<(), SourceError>;
}

/// Everything a selection cycle needs from the cluster
pub trait Cluster: InstanceSource + BudgetSource + DisruptionExecutor {}

impl<T: InstanceSource + BudgetSource + DisruptionExecutor> Cluster for T {}

/// Serialized point-in-time view of a namespace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub budgets: Vec<DisruptionBudget>,
}

/// In-memory cluster backed by a snapshot
///
/// Removals are recorded rather than applied, so repeated cycles see the
/// same snapshot. Used for offline replays and tests.
#[derive(Debug, Default)]
pub struct StaticCluster {
    snapshot: ClusterSnapshot,
    removed: Mutex<Vec<(String, RemovalMode)>>,
    fail_removal: bool,
}

impl StaticCluster {
    pub fn new(snapshot: ClusterSnapshot) -> Self {
        Self {
            snapshot,
            removed: Mutex::new(Vec::new()),
            fail_removal: false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Make every removal fail, for exercising error paths
    pub fn failing_removals(mut self) -> Self {
        self.fail_removal = true;
        self
    }

    /// Names and modes of instances removed so far
    pub fn removed(&self) -> Vec<(String, RemovalMode)> {
        self.removed
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InstanceSource for StaticCluster {
    async fn list_instances(&self, namespace: &str) -> Result<Vec<Instance>, SourceError> {
        Ok(self
            .snapshot
            .instances
            .iter()
            .filter(|i| i.namespace == namespace)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BudgetSource for StaticCluster {
    async fn list_budgets(&self, namespace: &str) -> Result<Vec<DisruptionBudget>, SourceError> {
        Ok(self
            .snapshot
            .budgets
            .iter()
            .filter(|b| b.namespace == namespace)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DisruptionExecutor for StaticCluster {
    async fn remove(&self, instance: &Instance, mode: RemovalMode) -> Result<(), SourceError> {
        if self.fail_removal {
            return Err(SourceError::new("remove", format!("refused to {} {}", mode, instance.name)));
        }
        self.removed
            .lock()
            .map_err(|_| SourceError::new("remove", "removal log poisoned"))?
            .push((instance.name.clone(), mode));
        Ok(())
    }
}
