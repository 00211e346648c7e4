//! Scaleway binding error types

use clusterflow_cloud::{CloudError, ResourceType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScalewayError {
    #[error("{resource_type} {id} not found")]
    NotFound {
        resource_type: ResourceType,
        id: String,
    },

    #[error("Scaleway API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ScalewayError {
    /// Rate limiting, server-side failures and transport errors
    pub fn is_retryable(&self) -> bool {
        match self {
            ScalewayError::Api { status, .. } => *status == 429 || *status >= 500,
            ScalewayError::Http(e) => !e.is_decode() && !e.is_builder(),
            _ => false,
        }
    }
}

impl From<ScalewayError> for CloudError {
    fn from(err: ScalewayError) -> Self {
        if err.is_retryable() {
            return CloudError::Transient(err.to_string());
        }
        match err {
            ScalewayError::NotFound { resource_type, id } => {
                CloudError::NotFound { resource_type, id }
            }
            ScalewayError::InvalidConfig(msg) => CloudError::InvalidConfig(msg),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScalewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ScalewayError {
        ScalewayError::Api {
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(CloudError::from(api(429)).is_transient());
        assert!(CloudError::from(api(503)).is_transient());
        assert!(matches!(CloudError::from(api(400)), CloudError::ApiError(_)));
        assert!(matches!(CloudError::from(api(403)), CloudError::ApiError(_)));
    }

    #[test]
    fn test_not_found_keeps_its_target() {
        let err = CloudError::from(ScalewayError::NotFound {
            resource_type: ResourceType::Volume,
            id: "vol-1".to_string(),
        });

        assert!(err.is_not_found());
        assert!(err.to_string().contains("vol-1"));
    }
}
