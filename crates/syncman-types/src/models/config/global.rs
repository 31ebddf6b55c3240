//! Root aggregate of the gateway configuration.

use serde::{Deserialize, Serialize};

use super::project::ProjectConfig;

/// Full gateway configuration: the unit persisted by the local store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub projects: Vec<ProjectConfig>,
    pub ssl: Option<Ssl>,
    pub admin: Option<AdminConfig>,
}

impl GlobalConfig {
    pub fn project(&self, id: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut ProjectConfig> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    /// Replace the project with the same id, or append it.
    pub fn upsert_project(&mut self, project: ProjectConfig) {
        match self.project_mut(&project.id) {
            Some(existing) => *existing = project,
            None => self.projects.push(project),
        }
    }

    /// Remove a project by id. Returns the removed project, if any.
    pub fn remove_project(&mut self, id: &str) -> Option<ProjectConfig> {
        let index = self.projects.iter().position(|p| p.id == id)?;
        Some(self.projects.remove(index))
    }
}

/// TLS certificate and key file locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ssl {
    pub enabled: bool,
    pub crt: String,
    pub key: String,
}

/// Cluster-level admin settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminConfig {
    pub cluster_config: Option<ClusterConfig>,
    pub cluster_id: String,
    pub cluster_key: String,
    pub license: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterConfig {
    pub email: String,
    pub enable_metrics: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn project(id: &str, name: &str) -> ProjectConfig {
        ProjectConfig { id: id.to_string(), name: name.to_string(), ..Default::default() }
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut config = GlobalConfig::default();
        config.upsert_project(project("a", "first"));
        config.upsert_project(project("b", "second"));
        config.upsert_project(project("a", "renamed"));

        assert_eq!(config.projects.len(), 2);
        assert_eq!(config.projects[0].name, "renamed");
        assert_eq!(config.projects[1].id, "b");
    }

    #[test]
    fn test_remove_project() {
        let mut config = GlobalConfig::default();
        config.upsert_project(project("a", "first"));

        assert!(config.remove_project("missing").is_none());
        assert_eq!(config.remove_project("a").unwrap().name, "first");
        assert!(config.projects.is_empty());
    }

    #[test]
    fn test_deserialize_sparse_file() {
        let config: GlobalConfig =
            serde_json::from_str(r#"{"projects":[{"id":"todo","name":"Todo"}]}"#).unwrap();
        assert_eq!(config.projects.len(), 1);
        assert!(config.ssl.is_none());
        assert!(config.projects[0].modules.is_none());
    }
}
