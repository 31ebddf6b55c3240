//! Unified error types for Syncman Core.

use serde::Serialize;
use syncman_types::{ConfigError, ProjectError};
use thiserror::Error;

use crate::collaborators::ModuleError;
use crate::runner::RunnerError;
use crate::store::StoreError;

/// Main error type for all synchronization-manager operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    /// Unknown project or sub-resource, quota rejection, bad payload.
    #[error(transparent)]
    Project(#[from] ProjectError),

    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persistence through the active store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Admin collaborator could not issue an internal access token.
    #[error("Admin error: {0}")]
    Admin(String),

    /// Workload-runner call failed.
    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    /// A dependent module rejected the pushed config.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Membership state cannot answer the query (e.g. empty service directory).
    #[error("Cluster error: {0}")]
    Cluster(String),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// HTTP status class of this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Project(ProjectError::NotFound { .. })
            | Self::Project(ProjectError::ResourceNotFound { .. }) => 404,
            Self::Project(ProjectError::Forbidden { .. }) => 403,
            Self::Project(ProjectError::Invalid { .. })
            | Self::Config(ConfigError::ValidationError { .. }) => 400,
            Self::Cluster(_) => 503,
            _ => 500,
        }
    }

    /// Validation-class errors are raised before anything is mutated.
    pub fn is_validation(&self) -> bool {
        matches!(self.status_code(), 400 | 403 | 404)
    }
}

impl Serialize for SyncError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for synchronization-manager operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_classification() {
        assert_eq!(SyncError::from(ProjectError::not_found("todo")).status_code(), 404);
        assert_eq!(
            SyncError::from(ProjectError::resource("todo", "route", "r1")).status_code(),
            404
        );
        assert_eq!(
            SyncError::from(ProjectError::Forbidden {
                id: "todo".to_string(),
                reason: "quota".to_string()
            })
            .status_code(),
            403
        );
        assert_eq!(SyncError::Admin("token".to_string()).status_code(), 500);
        assert_eq!(SyncError::Cluster("no nodes".to_string()).status_code(), 503);
    }

    #[test]
    fn test_validation_errors_are_flagged() {
        assert!(SyncError::from(ProjectError::not_found("todo")).is_validation());
        assert!(!SyncError::from(StoreError::Backend {
            status: 500,
            message: "boom".to_string()
        })
        .is_validation());
    }

    #[test]
    fn test_serializes_as_message() {
        let err = SyncError::from(ProjectError::not_found("todo"));
        let json = serde_json::to_string(&err).unwrap_or_default();
        assert!(json.contains("todo"));
    }
}
