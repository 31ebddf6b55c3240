//! Interfaces the synchronization manager needs from the rest of the gateway.
//!
//! The admin module decides whether a project may be provisioned and issues the
//! internal token used to call the runner. The dependent modules (CRUD, auth,
//! file store, eventing, services, routing) receive every config change the
//! manager accepts.

use std::collections::BTreeMap;

use syncman_types::models::{
    AuthStub, CrudStub, Eventing, FileStore, Route, Secret, ServicesModule,
};
use syncman_types::{GlobalConfig, ProjectConfig};
use thiserror::Error;

/// A dependent module refused a config push.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{module} rejected config: {message}")]
pub struct ModuleError {
    pub module: String,
    pub message: String,
}

impl ModuleError {
    pub fn new(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self { module: module.into(), message: message.into() }
    }
}

pub trait AdminManager: Send + Sync {
    /// Whether `project` may be created or updated given the current config
    /// (plan quota, license).
    fn validate_sync_operation(
        &self,
        config: &GlobalConfig,
        project: &ProjectConfig,
    ) -> bool;

    /// Token authorizing calls to the runner.
    fn get_internal_access_token(&self) -> Result<String, String>;
}

/// Receivers of the accepted configuration.
///
/// Calls are synchronous and must not block for long: they run while the
/// manager holds its state lock.
pub trait DependentModules: Send + Sync {
    /// Full config push after a bulk replacement.
    fn set_project_config(&self, config: &GlobalConfig) -> Result<(), ModuleError>;

    fn set_crud_config(
        &self,
        project: &str,
        crud: &BTreeMap<String, CrudStub>,
    ) -> Result<(), ModuleError>;

    fn set_services_config(
        &self,
        project: &str,
        services: &ServicesModule,
    ) -> Result<(), ModuleError>;

    fn set_file_store_config(&self, project: &str, file_store: &FileStore)
        -> Result<(), ModuleError>;

    fn set_eventing_config(&self, project: &str, eventing: &Eventing) -> Result<(), ModuleError>;

    fn set_userman_config(
        &self,
        project: &str,
        auth: &BTreeMap<String, AuthStub>,
    ) -> Result<(), ModuleError>;

    fn set_routing_config(&self, project: &str, routes: &[Route]) -> Result<(), ModuleError>;

    /// Project-level settings: name, secrets, AES key.
    fn set_global_config(
        &self,
        project: &str,
        name: &str,
        secrets: &[Secret],
        aes_key: &str,
    ) -> Result<(), ModuleError>;

    fn delete_project(&self, project: &str) -> Result<(), ModuleError>;
}
