//! Kubernetes cluster adapter
//!
//! Implements the selector's collaborator traits on top of kube-rs:
//! lists pods and PodDisruptionBudgets, converts them into the core
//! model, and deletes or evicts the chosen pod. Every call is bounded by
//! the configured timeout.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use killer_lib::{
    BudgetSource, Condition, DisruptionBudget, DisruptionExecutor, Instance, InstanceSource,
    LabelSelectorSpec, OwnerRef, Phase, PolicyValue, RemovalMode, SelectorExpression,
    SourceError,
};
use kube::api::{Api, DeleteParams, EvictParams, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, ResourceExt};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Failure to build a client
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Failed to read kubeconfig {path}: {source}")]
    Kubeconfig {
        path: String,
        #[source]
        source: kube::config::KubeconfigError,
    },

    #[error("No in-cluster config and no usable kubeconfig: {0}")]
    NoConfig(#[source] kube::config::KubeconfigError),

    #[error("Failed to create Kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

/// Cluster adapter backed by the Kubernetes API
pub struct KubeCluster {
    client: Client,
    timeout: Duration,
}

impl KubeCluster {
    /// Connect using an explicit kubeconfig, else in-cluster config, else the default kubeconfig
    pub async fn connect(kubeconfig: Option<&str>, timeout: Duration) -> Result<Self, ConnectError> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig =
                    Kubeconfig::read_from(path).map_err(|source| ConnectError::Kubeconfig {
                        path: path.to_string(),
                        source,
                    })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|source| ConnectError::Kubeconfig {
                        path: path.to_string(),
                        source,
                    })?
            }
            None => match Config::incluster() {
                Ok(config) => {
                    debug!("Using in-cluster configuration");
                    config
                }
                Err(e) => {
                    debug!(error = %e, "No in-cluster configuration, falling back to kubeconfig");
                    Config::from_kubeconfig(&KubeConfigOptions::default())
                        .await
                        .map_err(ConnectError::NoConfig)?
                }
            },
        };

        let client = Client::try_from(config)?;
        Ok(Self { client, timeout })
    }

    /// API server version, logged on connect to verify connectivity
    pub async fn server_version(&self) -> Result<String, SourceError> {
        let info = self
            .bounded("get server version", self.client.apiserver_version())
            .await?;
        info!(version = %info.git_version, "Connected to Kubernetes cluster");
        Ok(info.git_version)
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        bounded(self.timeout, operation, call).await
    }
}

/// Run an API call under a deadline, folding both failure kinds into `SourceError`
pub async fn bounded<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, kube::Error>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SourceError::new(operation, e.to_string())),
        Err(_) => Err(SourceError::new(
            operation,
            format!("timed out after {}s", timeout.as_secs()),
        )),
    }
}

#[async_trait]
impl InstanceSource for KubeCluster {
    async fn list_instances(&self, namespace: &str) -> Result<Vec<Instance>, SourceError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .bounded("list pods", pods.list(&ListParams::default()))
            .await?;
        debug!(namespace = %namespace, count = list.items.len(), "Listed pods");
        Ok(list.items.iter().map(instance_from_pod).collect())
    }
}

#[async_trait]
impl BudgetSource for KubeCluster {
    async fn list_budgets(&self, namespace: &str) -> Result<Vec<DisruptionBudget>, SourceError> {
        let pdbs: Api<PodDisruptionBudget> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .bounded("list PodDisruptionBudgets", pdbs.list(&ListParams::default()))
            .await?;

        let budgets: Vec<DisruptionBudget> = list.items.iter().map(budget_from_pdb).collect();
        for budget in &budgets {
            debug!(
                budget = %budget.name,
                min_available = ?budget.min_available,
                max_unavailable = ?budget.max_unavailable,
                "Found PodDisruptionBudget"
            );
        }
        Ok(budgets)
    }
}

#[async_trait]
impl DisruptionExecutor for KubeCluster {
    async fn remove(&self, instance: &Instance, mode: RemovalMode) -> Result<(), SourceError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &instance.namespace);
        info!(pod = %instance.name, namespace = %instance.namespace, mode = %mode, "Removing pod");

        match mode {
            RemovalMode::Delete => {
                self.bounded("delete pod", pods.delete(&instance.name, &DeleteParams::default()))
                    .await?;
            }
            RemovalMode::Evict => {
                self.bounded("evict pod", pods.evict(&instance.name, &EvictParams::default()))
                    .await?;
            }
        }
        Ok(())
    }
}

/// Convert a pod into the core instance model
pub fn instance_from_pod(pod: &Pod) -> Instance {
    let status = pod.status.as_ref();

    let phase = if pod.metadata.deletion_timestamp.is_some() {
        Phase::Terminating
    } else {
        Phase::from_reported(status.and_then(|s| s.phase.as_deref()))
    };

    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .map(|c| Condition {
                    condition_type: c.type_.clone(),
                    status: c.status == "True",
                })
                .collect()
        })
        .unwrap_or_default();

    Instance {
        name: pod.name_any(),
        namespace: pod.namespace().unwrap_or_default(),
        phase,
        conditions,
        labels: pod.labels().clone(),
        owner_references: pod
            .owner_references()
            .iter()
            .map(|o| OwnerRef {
                kind: o.kind.clone(),
                name: o.name.clone(),
            })
            .collect(),
    }
}

/// Convert a PodDisruptionBudget into the core budget model
pub fn budget_from_pdb(pdb: &PodDisruptionBudget) -> DisruptionBudget {
    let spec = pdb.spec.as_ref();

    let selector = spec.and_then(|s| s.selector.as_ref()).map(|selector| LabelSelectorSpec {
        match_labels: selector.match_labels.clone().unwrap_or_default(),
        match_expressions: selector
            .match_expressions
            .iter()
            .flatten()
            .map(|r| SelectorExpression {
                key: r.key.clone(),
                operator: r.operator.clone(),
                values: r.values.clone().unwrap_or_default(),
            })
            .collect(),
    });

    DisruptionBudget {
        name: pdb.name_any(),
        namespace: pdb.namespace().unwrap_or_default(),
        selector,
        min_available: spec.and_then(|s| s.min_available.as_ref()).map(policy_value),
        max_unavailable: spec.and_then(|s| s.max_unavailable.as_ref()).map(policy_value),
    }
}

fn policy_value(value: &IntOrString) -> PolicyValue {
    match value {
        IntOrString::Int(n) => PolicyValue::Int(*n),
        IntOrString::String(s) => PolicyValue::Str(s.clone()),
    }
}
