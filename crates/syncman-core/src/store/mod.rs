//! Pluggable persistence and watch backends.
//!
//! Every backend implements [`Store`]. Watch callbacks always receive a complete
//! snapshot of the watched collection, never a delta, so the manager can replace
//! its in-memory copy wholesale.

mod codec;
mod consul;
mod error;
mod etcd;
pub mod keys;
mod kube;
mod local;

pub use consul::{ConsulOptions, ConsulStore};
pub use error::{StoreError, StoreResult};
pub use etcd::{EtcdOptions, EtcdStore};
pub use kube::{KubeOptions, KubeStore};
pub use local::LocalStore;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use syncman_types::{ClusterNode, ProjectConfig};

use crate::supervisor::{HealthRegistry, ReconnectPolicy};

/// Receives the full collection on every change.
pub type SnapshotCallback<T> = Arc<dyn Fn(Vec<T>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`SnapshotCallback`].
pub fn snapshot_callback<T, F, Fut>(f: F) -> SnapshotCallback<T>
where
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |items| Box::pin(f(items)))
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Announce this node to the cluster.
    async fn register(&self) -> StoreResult<()>;

    /// Deliver the current projects, then keep delivering on every change from a
    /// background task. Returns once the initial snapshot was delivered.
    async fn watch_projects(&self, callback: SnapshotCallback<ProjectConfig>) -> StoreResult<()>;

    /// Same contract for cluster membership; snapshots are sorted by node id.
    async fn watch_services(&self, callback: SnapshotCallback<ClusterNode>) -> StoreResult<()>;

    /// Upsert one project's persisted state.
    async fn set_project(&self, project: &ProjectConfig) -> StoreResult<()>;

    /// Remove one project's persisted state. Absent projects are not an error.
    async fn delete_project(&self, project_id: &str) -> StoreResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    None,
    Etcd,
    Consul,
    Kube,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Etcd => "etcd",
            Self::Consul => "consul",
            Self::Kube => "kube",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "local" | "" => Ok(Self::None),
            "etcd" => Ok(Self::Etcd),
            "consul" => Ok(Self::Consul),
            "kube" | "kubernetes" => Ok(Self::Kube),
            other => Err(StoreError::InvalidConfig(format!("unsupported store type: {other}"))),
        }
    }
}

/// Everything a backend needs at construction time.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub node_id: String,
    pub cluster_id: String,
    pub advertise_addr: String,
    pub config_path: PathBuf,
    pub reconnect: ReconnectPolicy,
    pub health: HealthRegistry,
    pub kube: KubeOptions,
}

/// Build the backend selected by `store_type`.
pub async fn connect_store(
    store_type: StoreType,
    options: StoreOptions,
) -> StoreResult<Arc<dyn Store>> {
    tracing::info!(store = %store_type, cluster_id = %options.cluster_id, "connecting store");

    let store: Arc<dyn Store> = match store_type {
        StoreType::None => Arc::new(LocalStore::new(
            options.config_path,
            ClusterNode::new(options.node_id, options.advertise_addr),
        )),
        StoreType::Etcd => Arc::new(EtcdStore::connect(EtcdOptions::from_env()?, options).await?),
        StoreType::Consul => Arc::new(ConsulStore::new(ConsulOptions::from_env(), options)?),
        StoreType::Kube => Arc::new(KubeStore::in_cluster(options)?),
    };
    Ok(store)
}
