//! Gateway configuration models.
//!
//! The tree mirrors the persisted layout: a `GlobalConfig` holds every project,
//! and each `ProjectConfig` owns a `Modules` tree consumed by the dependent engines.

mod global;
mod modules;
mod project;
mod routing;
mod rule;

pub use global::{AdminConfig, ClusterConfig, GlobalConfig, Ssl};
pub use modules::{
    AuthStub, CrudStub, Endpoint, Eventing, EventingRule, FileRule, FileStore, LetsEncrypt,
    Modules, SchemaObject, Service, ServicesModule, TableRule,
};
pub use project::{ProjectConfig, ProjectSummary, Secret, DEFAULT_CONTEXT_TIME_GRAPHQL};
pub use routing::{Header, Route, RouteModify, RouteSource, RouteTarget};
pub use rule::Rule;
