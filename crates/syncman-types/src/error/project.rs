//! Project lookup and provisioning errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by project-level operations before any state is mutated.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ProjectError {
    /// No project with this id in the current config
    #[error("Project ({id}) not present in config")]
    NotFound {
        /// Requested project id
        id: String,
    },

    /// A sub-resource (database, route, file rule, ...) is missing
    #[error("{kind} ({id}) not present in config of project {project}")]
    ResourceNotFound {
        /// Owning project id
        project: String,
        /// Resource kind, e.g. "database" or "route"
        kind: String,
        /// Resource id
        id: String,
    },

    /// Admin rejected the operation (plan quota, license)
    #[error("Operation rejected for project {id}: {reason}")]
    Forbidden {
        /// Project the operation targeted
        id: String,
        /// Human-readable rejection reason
        reason: String,
    },

    /// Incoming project payload is unusable
    #[error("Invalid project payload: {message}")]
    Invalid {
        /// Description of the problem
        message: String,
    },
}

impl ProjectError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn resource(
        project: impl Into<String>,
        kind: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::ResourceNotFound { project: project.into(), kind: kind.into(), id: id.into() }
    }
}
