//! # Syncman Types
//!
//! Config data model, versioned envelope, and error definitions for Syncman.
//!
//! This crate provides the foundational type system for the gateway control plane:
//!
//! - **`error`** - Typed error hierarchy for projects and configuration
//! - **`models`** - The replicated config tree (`GlobalConfig`, `ProjectConfig`, `Modules`),
//!   cluster membership (`ClusterNode`) and the revision-ordered `VersionedSet`
//!
//! ## Architecture Role
//!
//! `syncman-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!            syncman-types (this crate)
//!                    │
//!                    ▼
//!              syncman-core
//!   (stores, sharding, sync manager)
//!                    │
//!                    ▼
//!             syncman-server
//! ```
//!
//! All config types serialize with the camelCase field names used by the persisted
//! config file and the distributed stores.

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{ConfigError, ProjectError, Result, TypedError};

// Re-export core model types
pub use models::{
    ClusterNode, GlobalConfig, Modules, ProjectConfig, ProjectSummary, Version, Versioned,
    VersionedSet,
};
