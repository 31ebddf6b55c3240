//! The synchronization manager.
//!
//! One [`Manager`] per process owns the authoritative in-memory [`GlobalConfig`]
//! and the sorted service directory. Every mutation runs under the write lock:
//!
//! ```text
//! lock → copy project → mutate copy → push to module → commit → Store::set_project
//!                                        │ error: nothing committed
//!                                                                 │ error: restore previous
//! ```
//!
//! Remote changes arrive through the store's watch callbacks, which take the
//! same lock and replace the collection wholesale.

mod crud;
mod eventing;
mod file_store;
mod membership;
mod project;
mod routing;
mod services;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Weak};

use syncman_types::models::{position_of, sort_nodes};
use syncman_types::{ClusterNode, GlobalConfig, Modules, ProjectConfig, ProjectError};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::collaborators::{AdminManager, DependentModules, ModuleError};
use crate::config_file;
use crate::error::{SyncError, SyncResult};
use crate::runner::RunnerClient;
use crate::store::{snapshot_callback, Store, StoreType};
use crate::supervisor::{ComponentHealth, HealthRegistry, HealthStatus, ReconnectPolicy};

/// Process-level identity and wiring of a manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub node_id: String,
    pub cluster_id: String,
    pub advertise_addr: String,
    pub runner_addr: Option<String>,
    pub store_type: StoreType,
    /// Local cache of the full config, written on every remote change
    pub config_path: PathBuf,
    /// How long `start` waits for this node to show up in the service directory
    pub join_policy: ReconnectPolicy,
}

/// State guarded by the manager lock.
#[derive(Debug)]
struct State {
    config: GlobalConfig,
    /// Sorted by node id
    services: Vec<ClusterNode>,
    /// Projects created on the runner whose first persist has not succeeded yet
    runner_provisioned: HashSet<String>,
}

struct ManagerInner {
    config: ManagerConfig,
    port: AtomicU16,
    state: RwLock<State>,
    store: Arc<dyn Store>,
    admin: Arc<dyn AdminManager>,
    modules: Arc<dyn DependentModules>,
    runner: Option<RunnerClient>,
    health: HealthRegistry,
}

/// Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    pub fn new(
        config: ManagerConfig,
        store: Arc<dyn Store>,
        admin: Arc<dyn AdminManager>,
        modules: Arc<dyn DependentModules>,
        health: HealthRegistry,
    ) -> SyncResult<Self> {
        let runner = match config.runner_addr.as_deref().filter(|a| !a.trim().is_empty()) {
            Some(addr) => Some(RunnerClient::new(addr)?),
            None => None,
        };

        // A single node is its own cluster until the store says otherwise.
        let services = if config.store_type == StoreType::None {
            vec![ClusterNode::new(config.node_id.clone(), config.advertise_addr.clone())]
        } else {
            Vec::new()
        };

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                port: AtomicU16::new(0),
                state: RwLock::new(State {
                    config: GlobalConfig::default(),
                    services,
                    runner_provisioned: HashSet::new(),
                }),
                store,
                admin,
                modules,
                runner,
                health,
            }),
        })
    }

    /// Install the bootstrap config and start following the store.
    ///
    /// Returns once the initial project and service snapshots were applied.
    pub async fn start(&self, initial: GlobalConfig, port: u16) -> SyncResult<()> {
        self.inner.port.store(port, Ordering::Relaxed);

        {
            let mut state = self.inner.state.write().await;
            state.config = initial;
            config_file::persist(self.inner.config.config_path.clone(), state.config.clone())
                .await?;
            if let Err(e) = self.inner.modules.set_project_config(&state.config) {
                warn!("dependent modules rejected bootstrap config: {}", e);
            }
        }

        info!(
            node_id = %self.inner.config.node_id,
            cluster_id = %self.inner.config.cluster_id,
            store = %self.inner.config.store_type,
            port,
            "starting synchronization manager"
        );

        self.inner.store.register().await?;

        let weak = Arc::downgrade(&self.inner);
        self.inner
            .store
            .watch_projects(snapshot_callback(move |projects| {
                let weak = weak.clone();
                async move {
                    if let Some(manager) = Manager::upgrade(&weak) {
                        manager.on_projects(projects).await;
                    }
                }
            }))
            .await?;

        let weak = Arc::downgrade(&self.inner);
        self.inner
            .store
            .watch_services(snapshot_callback(move |services| {
                let weak = weak.clone();
                async move {
                    if let Some(manager) = Manager::upgrade(&weak) {
                        manager.on_services(services).await;
                    }
                }
            }))
            .await?;

        self.await_membership().await
    }

    /// Wait until the store lists this node. A node missing from the directory
    /// would claim tokens its peers already own.
    async fn await_membership(&self) -> SyncResult<()> {
        if self.inner.config.store_type == StoreType::None {
            return Ok(());
        }

        let node_id = &self.inner.config.node_id;
        let policy = &self.inner.config.join_policy;
        for attempt in 0..policy.max_attempts {
            if position_of(&self.inner.state.read().await.services, node_id).is_some() {
                info!(node_id = %node_id, "node joined the service directory");
                return Ok(());
            }
            let delay = policy.backoff(attempt);
            debug!(node_id = %node_id, attempt, ?delay, "waiting for node to appear in service directory");
            tokio::time::sleep(delay).await;
        }

        if position_of(&self.inner.state.read().await.services, node_id).is_some() {
            return Ok(());
        }
        Err(SyncError::Cluster(format!(
            "node ({node_id}) did not appear in the service directory after {} attempts",
            policy.max_attempts
        )))
    }

    fn upgrade(weak: &Weak<ManagerInner>) -> Option<Manager> {
        weak.upgrade().map(|inner| Manager { inner })
    }

    async fn on_projects(&self, projects: Vec<ProjectConfig>) {
        let mut state = self.inner.state.write().await;
        info!(projects = projects.len(), "applying project snapshot from store");
        state.config.projects = projects;

        if let Err(e) =
            config_file::persist(self.inner.config.config_path.clone(), state.config.clone()).await
        {
            warn!("failed to cache config to {}: {}", self.inner.config.config_path.display(), e);
        }
        if let Err(e) = self.inner.modules.set_project_config(&state.config) {
            error!("dependent modules rejected project snapshot: {}", e);
        }
    }

    async fn on_services(&self, mut services: Vec<ClusterNode>) {
        sort_nodes(&mut services);
        let mut state = self.inner.state.write().await;
        if state.services != services {
            info!(
                nodes = services.len(),
                ids = ?services.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
                "service directory changed"
            );
        }
        state.services = services;
    }

    /// Replace the whole config. Meant to be called before [`Manager::start`].
    pub async fn set_global_config(&self, config: GlobalConfig) {
        self.inner.state.write().await.config = config;
    }

    pub async fn get_global_config(&self) -> GlobalConfig {
        self.inner.state.read().await.config.clone()
    }

    /// Worst health across the store sessions.
    pub fn health(&self) -> HealthStatus {
        self.inner.health.status()
    }

    pub fn health_report(&self) -> std::collections::BTreeMap<String, ComponentHealth> {
        self.inner.health.snapshot()
    }

    pub fn store_type(&self) -> StoreType {
        self.inner.config.store_type
    }

    pub fn cluster_id(&self) -> &str {
        &self.inner.config.cluster_id
    }

    pub fn port(&self) -> u16 {
        self.inner.port.load(Ordering::Relaxed)
    }

    /// Apply `mutate` to a copy of the project's modules, push the result with
    /// `push`, then commit and persist.
    async fn mutate_modules<M, P>(&self, project_id: &str, mutate: M, push: P) -> SyncResult<()>
    where
        M: FnOnce(&mut Modules) -> SyncResult<()> + Send,
        P: FnOnce(&dyn DependentModules, &str, &Modules) -> Result<(), ModuleError> + Send,
    {
        let mut state = self.inner.state.write().await;
        let previous = lookup(&state.config, project_id)?;

        let mut project = previous.clone();
        mutate(project.modules_mut())?;

        if let Err(e) = push(self.inner.modules.as_ref(), project_id, project.modules_mut()) {
            error!(project_id, "error pushing config to module: {}", e);
            return Err(e.into());
        }

        self.commit(&mut state, Some(previous), project).await
    }

    /// Upsert `project` in memory and persist it.
    async fn commit(
        &self,
        state: &mut State,
        previous: Option<ProjectConfig>,
        project: ProjectConfig,
    ) -> SyncResult<()> {
        state.config.upsert_project(project.clone());
        self.persist(state, previous, &project).await
    }

    /// Persist an already-committed project, restoring `previous` on failure.
    async fn persist(
        &self,
        state: &mut State,
        previous: Option<ProjectConfig>,
        project: &ProjectConfig,
    ) -> SyncResult<()> {
        match self.inner.store.set_project(project).await {
            Ok(()) => {
                debug!(project_id = %project.id, "project persisted");
                Ok(())
            },
            Err(e) => {
                error!(project_id = %project.id, "failed to persist project: {}", e);
                self.restore(state, &project.id, previous);
                Err(e.into())
            },
        }
    }

    /// Put back the pre-mutation project and re-push the full config.
    fn restore(&self, state: &mut State, project_id: &str, previous: Option<ProjectConfig>) {
        match previous {
            Some(project) => state.config.upsert_project(project),
            None => {
                state.config.remove_project(project_id);
            },
        }
        if let Err(e) = self.inner.modules.set_project_config(&state.config) {
            warn!(project_id, "failed to re-push restored config: {}", e);
        }
    }

    fn internal_token(&self) -> SyncResult<String> {
        self.inner.admin.get_internal_access_token().map_err(SyncError::Admin)
    }
}

/// Deep copy of a project, or not-found.
fn lookup(config: &GlobalConfig, project_id: &str) -> SyncResult<ProjectConfig> {
    config.project(project_id).cloned().ok_or_else(|| ProjectError::not_found(project_id).into())
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("node_id", &self.inner.config.node_id)
            .field("cluster_id", &self.inner.config.cluster_id)
            .field("store_type", &self.inner.config.store_type)
            .finish_non_exhaustive()
    }
}
