//! Error types for the disruption selector

use thiserror::Error;

/// A selector that could not be compiled
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("unexpected end of selector, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("unexpected token '{token}' at position {position}, expected {expected}")]
    UnexpectedToken {
        token: String,
        position: usize,
        expected: &'static str,
    },

    #[error("invalid label key '{0}'")]
    InvalidKey(String),

    #[error("invalid label value '{value}' for key '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("operator '{operator}' on key '{key}' requires at least one value")]
    EmptyValues { key: String, operator: String },

    #[error("operator '{operator}' on key '{key}' does not take values")]
    UnexpectedValues { key: String, operator: String },

    #[error("unknown selector operator '{0}'")]
    UnknownOperator(String),
}

/// A budget whose status cannot be determined
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BudgetError {
    #[error("invalid selector in budget {budget}: {source}")]
    Selector {
        budget: String,
        #[source]
        source: SelectorError,
    },

    #[error("invalid {field} '{value}' in budget {budget}")]
    InvalidPolicy {
        budget: String,
        field: &'static str,
        value: String,
    },
}

impl BudgetError {
    /// Name of the budget that failed evaluation
    pub fn budget(&self) -> &str {
        match self {
            BudgetError::Selector { budget, .. } => budget,
            BudgetError::InvalidPolicy { budget, .. } => budget,
        }
    }
}

/// Failure reported by a cluster collaborator
#[derive(Error, Debug)]
#[error("{operation} failed: {message}")]
pub struct SourceError {
    pub operation: &'static str,
    pub message: String,
}

impl SourceError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Errors that abort a selection cycle
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("invalid targeting selector '{selector}': {source}")]
    TargetSelector {
        selector: String,
        #[source]
        source: SelectorError,
    },

    #[error("snapshot read failed: {0}")]
    SnapshotError(#[source] SourceError),

    #[error("failed to remove {namespace}/{instance}: {source}")]
    RemovalError {
        namespace: String,
        instance: String,
        #[source]
        source: SourceError,
    },
}

pub type Result<T, E = CycleError> = std::result::Result<T, E>;
