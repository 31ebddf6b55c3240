//! Typed error definitions for Syncman.
//!
//! Domain errors here are plain data: they serialize into API responses and carry
//! no source chains. Transport and backend failures live in `syncman-core`.

mod config;
mod project;

pub use config::ConfigError;
pub use project::ProjectError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type that wraps all domain-specific errors.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "domain", content = "error")]
pub enum TypedError {
    /// Wraps a project lookup or mutation error
    #[error("Project error: {0}")]
    Project(#[from] ProjectError),

    /// Wraps a configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Standard Result type using TypedError.
pub type Result<T> = std::result::Result<T, TypedError>;
