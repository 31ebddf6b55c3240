#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test, panics are the assertion mechanism")]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use syncman_core::config_file::load_config;
use syncman_core::store::{LocalStore, StoreType};
use syncman_core::{
    AdminManager, DependentModules, HealthRegistry, Manager, ManagerConfig, ModuleError, ReconnectPolicy,
};
use syncman_types::models::{AuthStub, CrudStub, Eventing, FileStore, Route, Secret, ServicesModule};
use syncman_types::{ClusterNode, GlobalConfig, ProjectConfig};

struct OpenAdmin;

impl AdminManager for OpenAdmin {
    fn validate_sync_operation(&self, _: &GlobalConfig, _: &ProjectConfig) -> bool {
        true
    }

    fn get_internal_access_token(&self) -> Result<String, String> {
        Ok("token".to_string())
    }
}

struct NoopModules;

impl DependentModules for NoopModules {
    fn set_project_config(&self, _: &GlobalConfig) -> Result<(), ModuleError> {
        Ok(())
    }
    fn set_crud_config(&self, _: &str, _: &BTreeMap<String, CrudStub>) -> Result<(), ModuleError> {
        Ok(())
    }
    fn set_services_config(&self, _: &str, _: &ServicesModule) -> Result<(), ModuleError> {
        Ok(())
    }
    fn set_file_store_config(&self, _: &str, _: &FileStore) -> Result<(), ModuleError> {
        Ok(())
    }
    fn set_eventing_config(&self, _: &str, _: &Eventing) -> Result<(), ModuleError> {
        Ok(())
    }
    fn set_userman_config(&self, _: &str, _: &BTreeMap<String, AuthStub>) -> Result<(), ModuleError> {
        Ok(())
    }
    fn set_routing_config(&self, _: &str, _: &[Route]) -> Result<(), ModuleError> {
        Ok(())
    }
    fn set_global_config(&self, _: &str, _: &str, _: &[Secret], _: &str) -> Result<(), ModuleError> {
        Ok(())
    }
    fn delete_project(&self, _: &str) -> Result<(), ModuleError> {
        Ok(())
    }
}

async fn start(config_path: &Path, initial: GlobalConfig) -> Manager {
    let store = Arc::new(LocalStore::new(
        config_path.to_path_buf(),
        ClusterNode::new("node-a", "10.0.0.1:4122"),
    ));
    let manager = Manager::new(
        ManagerConfig {
            node_id: "node-a".to_string(),
            cluster_id: "local".to_string(),
            advertise_addr: "10.0.0.1:4122".to_string(),
            runner_addr: None,
            store_type: StoreType::None,
            config_path: config_path.to_path_buf(),
            join_policy: ReconnectPolicy::join(),
        },
        store,
        Arc::new(OpenAdmin),
        Arc::new(NoopModules),
        HealthRegistry::new(),
    )
    .expect("manager");
    manager.start(initial, 4122).await.expect("start");
    manager
}

#[tokio::test]
async fn test_changes_survive_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("config.json");

    let manager = start(&config_path, GlobalConfig::default()).await;
    manager
        .apply_project_config(ProjectConfig { id: "todo".to_string(), ..Default::default() })
        .await
        .expect("apply");
    manager
        .set_database_connection(
            "todo",
            "postgres",
            CrudStub { conn: "postgres://db".to_string(), enabled: true, ..Default::default() },
        )
        .await
        .expect("db");
    drop(manager);

    let on_disk = load_config(&config_path).expect("load");
    assert_eq!(on_disk.projects.len(), 1);

    // Bootstrapping from the file yields the same state.
    let manager = start(&config_path, on_disk).await;
    let todo = manager.get_config("todo").await.expect("todo");
    assert_eq!(todo.modules.expect("modules").crud["postgres"].conn, "postgres://db");
    assert_eq!(manager.get_nodes_in_cluster().await, 1);
    assert_eq!(manager.get_services().await, vec![ClusterNode::new("node-a", "10.0.0.1:4122")]);
}

#[tokio::test]
async fn test_delete_removes_project_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("nested").join("config.json");

    let manager = start(&config_path, GlobalConfig::default()).await;
    for id in ["todo", "blog"] {
        manager
            .apply_project_config(ProjectConfig { id: id.to_string(), ..Default::default() })
            .await
            .expect("apply");
    }
    manager.delete_project_config("todo").await.expect("delete");

    let on_disk = load_config(&config_path).expect("load");
    let ids: Vec<_> = on_disk.projects.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["blog"]);
}
