use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Violation;

/// The kinds of record an instance store holds, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Instance,
    Dag,
    DagRun,
    TaskInstance,
    TaskLog,
    XCom,
    Connection,
    Variable,
    Pool,
    Provider,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Instance => "instance",
            EntityKind::Dag => "DAG",
            EntityKind::DagRun => "DAG run",
            EntityKind::TaskInstance => "task instance",
            EntityKind::TaskLog => "task log",
            EntityKind::XCom => "XCom entry",
            EntityKind::Connection => "connection",
            EntityKind::Variable => "variable",
            EntityKind::Pool => "pool",
            EntityKind::Provider => "provider",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A segment of the key path does not resolve. `key` is the path up to
    /// and including the first missing segment, joined with `/`.
    #[error("{kind} '{key}' not found")]
    NotFound { kind: EntityKind, key: String },

    #[error("{kind} '{key}' already exists")]
    Conflict { kind: EntityKind, key: String },

    #[error("instance '{instance}' already holds data")]
    AlreadyPopulated { instance: String },

    #[error("invalid request: {0}")]
    Validation(#[from] Violation),

    #[error("instance '{0}' not found")]
    InstanceNotFound(String),
}

/// Coarse failure classes the transport maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    InstanceNotFound,
}

impl StoreError {
    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn conflict(kind: EntityKind, key: impl Into<String>) -> Self {
        StoreError::Conflict {
            kind,
            key: key.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::NotFound { .. } => ErrorCategory::NotFound,
            StoreError::Conflict { .. } | StoreError::AlreadyPopulated { .. } => {
                ErrorCategory::Conflict
            }
            StoreError::Validation(_) => ErrorCategory::Validation,
            StoreError::InstanceNotFound(_) => ErrorCategory::InstanceNotFound,
        }
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            StoreError::Validation(violation) => Some(violation),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
