//! Core domain models for Syncman.
//!
//! This module contains the replicated config tree and the cluster membership types.

mod cluster;
pub mod config;
mod versioned;

// Re-export all models
pub use cluster::{position_of, sort_nodes, ClusterNode};
pub use config::{
    AdminConfig, AuthStub, ClusterConfig, CrudStub, Endpoint, Eventing, EventingRule, FileRule,
    FileStore, GlobalConfig, Header, LetsEncrypt, Modules, ProjectConfig, ProjectSummary, Route,
    RouteModify, RouteSource, RouteTarget, Rule, SchemaObject, Secret, Service, ServicesModule,
    Ssl, TableRule,
};
pub use versioned::{Version, Versioned, VersionedSet};
