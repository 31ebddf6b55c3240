//! In-process admin and module registry handed to the manager.

use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::{debug, info};

use syncman_core::{AdminManager, DependentModules, ModuleError};
use syncman_types::models::{AuthStub, CrudStub, Eventing, FileStore, Route, Secret, ServicesModule};
use syncman_types::{GlobalConfig, ProjectConfig};

/// Project quota and a static internal token.
pub struct LocalAdmin {
    max_projects: Option<usize>,
    token: String,
}

impl LocalAdmin {
    pub fn new(max_projects: Option<usize>, token: Option<String>) -> Self {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        Self { max_projects, token }
    }
}

impl AdminManager for LocalAdmin {
    fn validate_sync_operation(&self, config: &GlobalConfig, project: &ProjectConfig) -> bool {
        if config.project(&project.id).is_some() {
            return true;
        }
        self.max_projects.map_or(true, |max| config.projects.len() < max)
    }

    fn get_internal_access_token(&self) -> Result<String, String> {
        Ok(self.token.clone())
    }
}

/// Effective config per project as seen by the dependent modules.
#[derive(Default)]
pub struct ModuleRegistry {
    projects: DashMap<String, ProjectConfig>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effective(&self, project: &str) -> Option<ProjectConfig> {
        self.projects.get(project).map(|p| p.clone())
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    fn with_project(&self, project: &str, module: &str, f: impl FnOnce(&mut ProjectConfig)) {
        let mut entry = self.projects.entry(project.to_string()).or_insert_with(|| ProjectConfig {
            id: project.to_string(),
            ..Default::default()
        });
        f(entry.value_mut());
        debug!(project_id = project, module, "module config updated");
    }
}

impl DependentModules for ModuleRegistry {
    fn set_project_config(&self, config: &GlobalConfig) -> Result<(), ModuleError> {
        self.projects.retain(|id, _| config.project(id).is_some());
        for project in &config.projects {
            self.projects.insert(project.id.clone(), project.clone());
        }
        info!(projects = config.projects.len(), "modules reloaded");
        Ok(())
    }

    fn set_crud_config(&self, project: &str, crud: &BTreeMap<String, CrudStub>) -> Result<(), ModuleError> {
        self.with_project(project, "crud", |p| p.modules_mut().crud = crud.clone());
        Ok(())
    }

    fn set_services_config(&self, project: &str, services: &ServicesModule) -> Result<(), ModuleError> {
        self.with_project(project, "services", |p| p.modules_mut().services = services.clone());
        Ok(())
    }

    fn set_file_store_config(&self, project: &str, file_store: &FileStore) -> Result<(), ModuleError> {
        self.with_project(project, "filestore", |p| p.modules_mut().file_store = file_store.clone());
        Ok(())
    }

    fn set_eventing_config(&self, project: &str, eventing: &Eventing) -> Result<(), ModuleError> {
        self.with_project(project, "eventing", |p| p.modules_mut().eventing = eventing.clone());
        Ok(())
    }

    fn set_userman_config(&self, project: &str, auth: &BTreeMap<String, AuthStub>) -> Result<(), ModuleError> {
        self.with_project(project, "userman", |p| p.modules_mut().auth = auth.clone());
        Ok(())
    }

    fn set_routing_config(&self, project: &str, routes: &[Route]) -> Result<(), ModuleError> {
        self.with_project(project, "routing", |p| p.modules_mut().routes = routes.to_vec());
        Ok(())
    }

    fn set_global_config(
        &self,
        project: &str,
        name: &str,
        secrets: &[Secret],
        aes_key: &str,
    ) -> Result<(), ModuleError> {
        self.with_project(project, "global", |p| {
            p.name = name.to_string();
            p.secrets = secrets.to_vec();
            p.aes_key = aes_key.to_string();
        });
        Ok(())
    }

    fn delete_project(&self, project: &str) -> Result<(), ModuleError> {
        self.projects.remove(project);
        info!(project_id = project, "project dropped from modules");
        Ok(())
    }
}
