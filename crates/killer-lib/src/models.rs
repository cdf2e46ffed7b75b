//! Core data models for the disruption selector
//!
//! All of these are point-in-time snapshots built at the start of a
//! selection cycle and dropped at its end. Nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label set attached to an instance
pub type Labels = BTreeMap<String, String>;

/// Lifecycle phase of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    Terminating,
}

impl Phase {
    /// Map a cluster-reported phase string; anything unrecognised is `Unknown`
    pub fn from_reported(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => Phase::Pending,
            Some("Running") => Phase::Running,
            Some("Succeeded") => Phase::Succeeded,
            Some("Failed") => Phase::Failed,
            _ => Phase::Unknown,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "Pending",
            Phase::Running => "Running",
            Phase::Succeeded => "Succeeded",
            Phase::Failed => "Failed",
            Phase::Unknown => "Unknown",
            Phase::Terminating => "Terminating",
        };
        f.write_str(s)
    }
}

/// Typed condition reported on an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub condition_type: String,
    pub status: bool,
}

/// Reference to the controller or object owning an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

/// A running unit of work (a pod)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub namespace: String,
    pub phase: Phase,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub owner_references: Vec<OwnerRef>,
}

impl Instance {
    /// Create a running instance with no labels, owners or conditions
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase: Phase::Running,
            conditions: Vec::new(),
            labels: Labels::new(),
            owner_references: Vec::new(),
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_owner(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.owner_references.push(OwnerRef {
            kind: kind.into(),
            name: name.into(),
        });
        self
    }

    /// Set the `Ready` condition, replacing any existing one
    pub fn with_ready(mut self, ready: bool) -> Self {
        self.conditions.retain(|c| c.condition_type != READY_CONDITION);
        self.conditions.push(Condition {
            condition_type: READY_CONDITION.to_string(),
            status: ready,
        });
        self
    }

    /// True iff a `Ready` condition is present and true
    pub fn is_ready(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.condition_type == READY_CONDITION && c.status)
    }

    /// Running and ready
    pub fn is_healthy(&self) -> bool {
        self.phase == Phase::Running && self.is_ready()
    }
}

/// Condition type carrying readiness
pub const READY_CONDITION: &str = "Ready";

/// Absolute count or percentage of matched instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntOrPercent {
    Int(i32),
    Percent(u32),
}

impl IntOrPercent {
    /// Parse the int-or-string form, e.g. `"25%"` or `"3"`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.strip_suffix('%') {
            Some(pct) => pct.parse::<u32>().ok().map(IntOrPercent::Percent),
            None => raw.parse::<i32>().ok().map(IntOrPercent::Int),
        }
    }
}

impl fmt::Display for IntOrPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntOrPercent::Int(n) => write!(f, "{}", n),
            IntOrPercent::Percent(p) => write!(f, "{}%", p),
        }
    }
}

/// Policy value as reported by the cluster, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyValue {
    Int(i32),
    Str(String),
}

impl From<i32> for PolicyValue {
    fn from(n: i32) -> Self {
        PolicyValue::Int(n)
    }
}

impl From<&str> for PolicyValue {
    fn from(s: &str) -> Self {
        PolicyValue::Str(s.to_string())
    }
}

impl fmt::Display for PolicyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyValue::Int(n) => write!(f, "{}", n),
            PolicyValue::Str(s) => f.write_str(s),
        }
    }
}

/// One `match_expressions` entry of a structured selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorExpression {
    pub key: String,
    pub operator: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Structured label selector as carried by a disruption budget
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorSpec {
    #[serde(default)]
    pub match_labels: Labels,
    #[serde(default)]
    pub match_expressions: Vec<SelectorExpression>,
}

impl LabelSelectorSpec {
    pub fn match_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    pub fn match_expression(
        mut self,
        key: impl Into<String>,
        operator: impl Into<String>,
        values: &[&str],
    ) -> Self {
        self.match_expressions.push(SelectorExpression {
            key: key.into(),
            operator: operator.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }
}

/// A disruption budget scoped to a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisruptionBudget {
    pub name: String,
    pub namespace: String,
    /// `None` selects nothing; an empty spec selects everything
    pub selector: Option<LabelSelectorSpec>,
    pub min_available: Option<PolicyValue>,
    pub max_unavailable: Option<PolicyValue>,
}

impl DisruptionBudget {
    /// Budget with the given selector and no policy field set
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        selector: LabelSelectorSpec,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            selector: Some(selector),
            min_available: None,
            max_unavailable: None,
        }
    }

    pub fn with_min_available(mut self, value: impl Into<PolicyValue>) -> Self {
        self.min_available = Some(value.into());
        self
    }

    pub fn with_max_unavailable(mut self, value: impl Into<PolicyValue>) -> Self {
        self.max_unavailable = Some(value.into());
        self
    }
}

/// Derived status of one budget against one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub matched: i32,
    pub current_healthy: i32,
    pub desired_healthy: i32,
    /// Never negative
    pub allowed_disruptions: i32,
}
