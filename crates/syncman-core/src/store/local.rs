//! Single-node store backed by the config file.

use async_trait::async_trait;
use std::path::PathBuf;
use syncman_types::{ClusterNode, ProjectConfig};
use tokio::sync::Mutex;
use tracing::debug;

use super::{SnapshotCallback, Store, StoreError, StoreResult};
use crate::config_file;

/// Persists projects to the local config file. The service directory is just
/// this node.
pub struct LocalStore {
    path: PathBuf,
    node: ClusterNode,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(path: PathBuf, node: ClusterNode) -> Self {
        Self { path, node, write_lock: Mutex::new(()) }
    }

    async fn update<F>(&self, updater: F) -> StoreResult<()>
    where
        F: FnOnce(&mut syncman_types::GlobalConfig) + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || config_file::update_config(&path, updater))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;
        Ok(())
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn register(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn watch_projects(&self, callback: SnapshotCallback<ProjectConfig>) -> StoreResult<()> {
        let path = self.path.clone();
        let config = tokio::task::spawn_blocking(move || config_file::load_config(&path))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;
        debug!(projects = config.projects.len(), "loaded projects from config file");
        callback(config.projects).await;
        Ok(())
    }

    async fn watch_services(&self, callback: SnapshotCallback<ClusterNode>) -> StoreResult<()> {
        callback(vec![self.node.clone()]).await;
        Ok(())
    }

    async fn set_project(&self, project: &ProjectConfig) -> StoreResult<()> {
        let project = project.clone();
        self.update(move |config| config.upsert_project(project)).await
    }

    async fn delete_project(&self, project_id: &str) -> StoreResult<()> {
        let id = project_id.to_string();
        self.update(move |config| {
            config.remove_project(&id);
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::snapshot_callback;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LocalStore {
        LocalStore::new(dir.path().join("config.json"), ClusterNode::new("node-1", "127.0.0.1:4122"))
    }

    #[tokio::test]
    async fn test_set_then_watch_returns_project() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let project = ProjectConfig { id: "todo".into(), name: "Todo".into(), ..Default::default() };
        store.set_project(&project).await.unwrap();

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        store
            .watch_projects(snapshot_callback(move |projects| {
                let sink = sink.clone();
                async move { *sink.lock() = projects }
            }))
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![project]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.delete_project("missing").await.unwrap();
        store.set_project(&ProjectConfig { id: "a".into(), ..Default::default() }).await.unwrap();
        store.delete_project("a").await.unwrap();
        store.delete_project("a").await.unwrap();

        let config = config_file::load_config(&dir.path().join("config.json")).unwrap();
        assert!(config.projects.is_empty());
    }

    #[tokio::test]
    async fn test_services_is_self() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        store
            .watch_services(snapshot_callback(move |nodes| {
                let sink = sink.clone();
                async move { *sink.lock() = nodes }
            }))
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![ClusterNode::new("node-1", "127.0.0.1:4122")]);
    }
}
