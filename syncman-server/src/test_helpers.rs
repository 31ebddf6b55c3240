//! Test helpers for syncman-server unit tests.

use std::sync::Arc;

use tempfile::TempDir;

use syncman_core::store::LocalStore;
use syncman_core::{HealthRegistry, Manager, ManagerConfig, ReconnectPolicy, StoreType};
use syncman_types::{ClusterNode, GlobalConfig, ProjectConfig};

use crate::collaborators::{LocalAdmin, ModuleRegistry};
use crate::state::AppState;

pub const TEST_NODE: &str = "test-node";
pub const TEST_PORT: u16 = 4122;

/// Standalone node backed by a config file in a temp dir.
///
/// Returns `(AppState, TempDir)`; keep `TempDir` alive for the test duration.
pub async fn test_app_state() -> (AppState, TempDir) {
    test_app_state_with_quota(None).await
}

pub async fn test_app_state_with_quota(max_projects: Option<usize>) -> (AppState, TempDir) {
    build(max_projects, HealthRegistry::new()).await
}

/// Shares `health` with the manager so tests can drive component status.
pub async fn test_app_state_with_health(health: HealthRegistry) -> (AppState, TempDir) {
    build(None, health).await
}

async fn build(max_projects: Option<usize>, health: HealthRegistry) -> (AppState, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let config_path = temp_dir.path().join("config.json");
    let advertise_addr = format!("127.0.0.1:{TEST_PORT}");

    let store = Arc::new(LocalStore::new(
        config_path.clone(),
        ClusterNode::new(TEST_NODE, advertise_addr.clone()),
    ));
    let modules = Arc::new(ModuleRegistry::new());
    let manager = Manager::new(
        ManagerConfig {
            node_id: TEST_NODE.to_string(),
            cluster_id: "test".to_string(),
            advertise_addr,
            runner_addr: None,
            store_type: StoreType::None,
            config_path,
            join_policy: ReconnectPolicy::join(),
        },
        store,
        Arc::new(LocalAdmin::new(max_projects, Some("test-token".to_string()))),
        modules.clone(),
        health,
    )
    .expect("failed to create test manager");

    manager.start(GlobalConfig::default(), TEST_PORT).await.expect("failed to start test manager");

    (AppState::new(manager, modules), temp_dir)
}

pub fn project(id: &str, name: &str) -> ProjectConfig {
    ProjectConfig { id: id.to_string(), name: name.to_string(), ..Default::default() }
}
