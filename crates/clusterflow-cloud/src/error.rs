//! Cloud engine error types

use crate::model::ServerState;
use crate::resource::ResourceType;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Engine errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// The resource does not exist (or no longer exists).
    #[error("{resource_type} '{id}' not found")]
    NotFound {
        resource_type: ResourceType,
        id: String,
    },

    #[error("cannot change immutable field(s) {} of {resource}", .fields.join(", "))]
    ImmutableFieldChanged {
        resource: String,
        fields: Vec<String>,
    },

    #[error("field {field} is required to create {resource}")]
    RequiredField { resource: String, field: String },

    /// Retryable API failure (rate limiting, 5xx, transport).
    #[error("transient API error: {0}")]
    Transient(String),

    #[error("don't know how to reach state {to} from state {from} for server {server}")]
    NoKnownTransition {
        server: String,
        from: ServerState,
        to: ServerState,
    },

    #[error("teardown stuck:\n{0}")]
    TeardownStuck(StuckReport),

    #[error("timed out after {after:?} waiting for {what}{}", last_error_suffix(.last_error))]
    Timeout {
        what: String,
        after: Duration,
        last_error: Option<String>,
    },

    #[error("cancelled while {0}")]
    Cancelled(String),

    #[error("{operation} is not supported for {resource_type}")]
    UnsupportedOperation {
        resource_type: ResourceType,
        operation: &'static str,
    },

    #[error("no handler registered for {0}")]
    HandlerNotRegistered(ResourceType),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid desired state: {0}")]
    InvalidDesiredState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" (last error: {})", e))
        .unwrap_or_default()
}

impl CloudError {
    pub fn not_found(resource_type: ResourceType, id: impl Into<String>) -> Self {
        CloudError::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    pub fn unsupported(resource_type: ResourceType, operation: &'static str) -> Self {
        CloudError::UnsupportedOperation {
            resource_type,
            operation,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }

    /// Check if this error may go away by itself when retried
    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::Transient(_))
    }
}

/// Resources a teardown could not delete, with the blocker types still present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StuckReport {
    pub remaining: Vec<StuckResource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuckResource {
    pub resource_type: ResourceType,
    pub id: String,
    pub name: String,
    pub unresolved: Vec<ResourceType>,
}

impl StuckReport {
    pub fn ids(&self) -> Vec<&str> {
        self.remaining.iter().map(|r| r.id.as_str()).collect()
    }
}

impl fmt::Display for StuckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.remaining.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let blockers: Vec<&str> = r.unresolved.iter().map(|t| t.as_str()).collect();
            write!(
                f,
                "  {} {} ({}) blocked by [{}]",
                r.resource_type,
                r.id,
                r.name,
                blockers.join(", ")
            )?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
