//! Manager tests against in-memory collaborators.

mod project;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use syncman_types::models::{AuthStub, CrudStub, Eventing, FileStore, Route, Secret, ServicesModule};
use syncman_types::{ClusterNode, GlobalConfig, ProjectConfig};
use tempfile::TempDir;

use super::{Manager, ManagerConfig};
use crate::collaborators::{AdminManager, DependentModules, ModuleError};
use crate::store::{SnapshotCallback, Store, StoreError, StoreResult, StoreType};
use crate::supervisor::{ExhaustedAction, HealthRegistry, ReconnectPolicy};

/// Records every push; can be told to reject them.
#[derive(Default)]
pub(super) struct RecordingModules {
    pub pushes: Mutex<Vec<String>>,
    pub last_global: Mutex<Option<GlobalConfig>>,
    pub fail: AtomicBool,
}

impl RecordingModules {
    fn record(&self, what: String) -> Result<(), ModuleError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ModuleError::new("test", format!("refusing {what}")));
        }
        self.pushes.lock().push(what);
        Ok(())
    }

    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().clone()
    }

    pub fn clear(&self) {
        self.pushes.lock().clear();
    }
}

impl DependentModules for RecordingModules {
    fn set_project_config(&self, config: &GlobalConfig) -> Result<(), ModuleError> {
        self.record("project".to_string())?;
        *self.last_global.lock() = Some(config.clone());
        Ok(())
    }

    fn set_crud_config(&self, project: &str, _: &BTreeMap<String, CrudStub>) -> Result<(), ModuleError> {
        self.record(format!("crud:{project}"))
    }

    fn set_services_config(&self, project: &str, _: &ServicesModule) -> Result<(), ModuleError> {
        self.record(format!("services:{project}"))
    }

    fn set_file_store_config(&self, project: &str, _: &FileStore) -> Result<(), ModuleError> {
        self.record(format!("filestore:{project}"))
    }

    fn set_eventing_config(&self, project: &str, _: &Eventing) -> Result<(), ModuleError> {
        self.record(format!("eventing:{project}"))
    }

    fn set_userman_config(&self, project: &str, _: &BTreeMap<String, AuthStub>) -> Result<(), ModuleError> {
        self.record(format!("userman:{project}"))
    }

    fn set_routing_config(&self, project: &str, _: &[Route]) -> Result<(), ModuleError> {
        self.record(format!("routing:{project}"))
    }

    fn set_global_config(&self, project: &str, _: &str, _: &[Secret], _: &str) -> Result<(), ModuleError> {
        self.record(format!("global:{project}"))
    }

    fn delete_project(&self, project: &str) -> Result<(), ModuleError> {
        self.record(format!("delete:{project}"))
    }
}

pub(super) struct FakeAdmin {
    pub allow: AtomicBool,
    pub token: Mutex<Result<String, String>>,
}

impl Default for FakeAdmin {
    fn default() -> Self {
        Self { allow: AtomicBool::new(true), token: Mutex::new(Ok("internal-token".to_string())) }
    }
}

impl AdminManager for FakeAdmin {
    fn validate_sync_operation(&self, _: &GlobalConfig, _: &ProjectConfig) -> bool {
        self.allow.load(Ordering::SeqCst)
    }

    fn get_internal_access_token(&self) -> Result<String, String> {
        self.token.lock().clone()
    }
}

/// Store keeping projects in memory and handing out the watch callbacks so a
/// test can play the role of a remote writer.
#[derive(Default)]
pub(super) struct MemoryStore {
    pub projects: Mutex<BTreeMap<String, ProjectConfig>>,
    pub nodes: Mutex<Vec<ClusterNode>>,
    pub fail: AtomicBool,
    project_watchers: Mutex<Vec<SnapshotCallback<ProjectConfig>>>,
    service_watchers: Mutex<Vec<SnapshotCallback<ClusterNode>>>,
}

impl MemoryStore {
    fn check(&self) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::backend(503, "store unavailable"));
        }
        Ok(())
    }

    pub fn stored(&self, id: &str) -> Option<ProjectConfig> {
        self.projects.lock().get(id).cloned()
    }

    pub async fn emit_projects(&self, projects: Vec<ProjectConfig>) {
        let watchers = self.project_watchers.lock().clone();
        for watcher in watchers {
            watcher(projects.clone()).await;
        }
    }

    pub async fn emit_nodes(&self, nodes: Vec<ClusterNode>) {
        *self.nodes.lock() = nodes.clone();
        let watchers = self.service_watchers.lock().clone();
        for watcher in watchers {
            watcher(nodes.clone()).await;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn register(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn watch_projects(&self, callback: SnapshotCallback<ProjectConfig>) -> StoreResult<()> {
        let snapshot: Vec<_> = self.projects.lock().values().cloned().collect();
        self.project_watchers.lock().push(callback.clone());
        callback(snapshot).await;
        Ok(())
    }

    async fn watch_services(&self, callback: SnapshotCallback<ClusterNode>) -> StoreResult<()> {
        let snapshot = self.nodes.lock().clone();
        self.service_watchers.lock().push(callback.clone());
        callback(snapshot).await;
        Ok(())
    }

    async fn set_project(&self, project: &ProjectConfig) -> StoreResult<()> {
        self.check()?;
        self.projects.lock().insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn delete_project(&self, project_id: &str) -> StoreResult<()> {
        self.check()?;
        self.projects.lock().remove(project_id);
        Ok(())
    }
}

pub(super) struct Harness {
    pub manager: Manager,
    pub store: Arc<MemoryStore>,
    pub modules: Arc<RecordingModules>,
    pub admin: Arc<FakeAdmin>,
    pub dir: TempDir,
}

pub(super) fn manager_config(dir: &TempDir, store_type: StoreType, runner: Option<String>) -> ManagerConfig {
    ManagerConfig {
        node_id: "node-a".to_string(),
        cluster_id: "prod".to_string(),
        advertise_addr: "10.0.0.1:4122".to_string(),
        runner_addr: runner,
        store_type,
        config_path: dir.path().join("config.json"),
        join_policy: ReconnectPolicy {
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            max_attempts: 5,
            on_exhausted: ExhaustedAction::StayDegraded,
        },
    }
}

/// Manager over fresh collaborators, not started yet.
pub(super) fn harness(store_type: StoreType, runner: Option<String>) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::default());
    let modules = Arc::new(RecordingModules::default());
    let admin = Arc::new(FakeAdmin::default());

    let manager = Manager::new(
        manager_config(&dir, store_type, runner),
        store.clone(),
        admin.clone(),
        modules.clone(),
        HealthRegistry::new(),
    )
    .unwrap();

    Harness { manager, store, modules, admin, dir }
}

/// Started manager. Distributed store types see `node-a` in the directory.
pub(super) async fn started(store_type: StoreType, runner: Option<String>) -> Harness {
    let h = harness(store_type, runner);
    if store_type != StoreType::None {
        *h.store.nodes.lock() = vec![ClusterNode::new("node-a", "10.0.0.1:4122")];
    }
    h.manager.start(GlobalConfig::default(), 4122).await.unwrap();
    h.modules.clear();
    h
}

/// Started standalone manager with one empty project `todo`.
pub(super) async fn with_project() -> Harness {
    let h = started(StoreType::None, None).await;
    h.manager
        .apply_project_config(ProjectConfig { id: "todo".to_string(), ..Default::default() })
        .await
        .unwrap();
    h.modules.clear();
    h
}
