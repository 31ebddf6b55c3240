use std::sync::atomic::Ordering;

use syncman_types::models::{CrudStub, Secret};
use syncman_types::{ProjectConfig, ProjectError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{started, with_project};
use crate::config_file;
use crate::error::SyncError;
use crate::store::StoreType;

fn project(id: &str, name: &str) -> ProjectConfig {
    ProjectConfig { id: id.to_string(), name: name.to_string(), ..Default::default() }
}

#[tokio::test]
async fn test_apply_new_project_gets_defaults() {
    let h = started(StoreType::None, None).await;

    h.manager.apply_project_config(project("todo", "Todo")).await.unwrap();

    let stored = h.manager.get_config("todo").await.unwrap();
    assert_eq!(stored.name, "Todo");
    assert_eq!(stored.context_time_graphql, 10);
    assert_eq!(stored.modules, Some(Default::default()));
    assert_eq!(h.store.stored("todo"), Some(stored));
    assert_eq!(h.modules.pushes(), vec!["project"]);
}

#[tokio::test]
async fn test_apply_existing_project_keeps_modules() {
    let h = with_project().await;
    h.manager
        .set_database_connection("todo", "postgres", CrudStub { enabled: true, ..Default::default() })
        .await
        .unwrap();

    let mut update = project("todo", "Renamed");
    update.context_time_graphql = 30;
    update.secrets = vec![Secret { is_primary: true, secret: "s".to_string() }];
    h.manager.apply_project_config(update).await.unwrap();

    let stored = h.manager.get_config("todo").await.unwrap();
    assert_eq!(stored.name, "Renamed");
    assert_eq!(stored.context_time_graphql, 30);
    assert_eq!(stored.secrets.len(), 1);
    assert!(stored.modules.unwrap().crud.contains_key("postgres"));
}

#[tokio::test]
async fn test_apply_rejected_by_admin() {
    let h = started(StoreType::None, None).await;
    h.admin.allow.store(false, Ordering::SeqCst);

    let err = h.manager.apply_project_config(project("todo", "Todo")).await.unwrap_err();

    assert_eq!(err.status_code(), 403);
    assert!(h.manager.get_config("todo").await.is_err());
    assert!(h.store.stored("todo").is_none());
}

#[tokio::test]
async fn test_apply_fails_without_internal_token() {
    let h = started(StoreType::None, None).await;
    *h.admin.token.lock() = Err("license expired".to_string());

    let err = h.manager.apply_project_config(project("todo", "Todo")).await.unwrap_err();

    assert!(matches!(err, SyncError::Admin(ref msg) if msg == "license expired"));
    assert!(h.store.stored("todo").is_none());
}

#[tokio::test]
async fn test_apply_requires_id() {
    let h = started(StoreType::None, None).await;

    let err = h.manager.apply_project_config(project("  ", "Nameless")).await.unwrap_err();

    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_new_project_is_created_on_runner() {
    let runner = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/runner/project/todo"))
        .and(header("authorization", "Bearer internal-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&runner)
        .await;

    let h = started(StoreType::None, Some(runner.uri())).await;
    h.manager.apply_project_config(project("todo", "Todo")).await.unwrap();

    // An existing project is not created again.
    h.manager.apply_project_config(project("todo", "Todo v2")).await.unwrap();
    assert_eq!(h.manager.get_config("todo").await.unwrap().name, "Todo v2");
}

#[tokio::test]
async fn test_retry_after_store_outage_reuses_runner_project() {
    let runner = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/runner/project/todo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&runner)
        .await;

    let h = started(StoreType::None, Some(runner.uri())).await;

    h.store.fail.store(true, Ordering::SeqCst);
    let err = h.manager.apply_project_config(project("todo", "Todo")).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
    assert!(h.manager.get_config("todo").await.is_err());

    h.store.fail.store(false, Ordering::SeqCst);
    h.manager.apply_project_config(project("todo", "Todo")).await.unwrap();

    assert_eq!(h.manager.get_config("todo").await.unwrap().name, "Todo");
    assert!(h.store.stored("todo").is_some());
}

#[tokio::test]
async fn test_runner_failure_leaves_no_project() {
    let runner = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("runner down"))
        .mount(&runner)
        .await;

    let h = started(StoreType::None, Some(runner.uri())).await;
    let err = h.manager.apply_project_config(project("todo", "Todo")).await.unwrap_err();

    assert!(matches!(err, SyncError::Runner(_)));
    assert!(h.manager.get_config("todo").await.is_err());
    assert!(h.modules.pushes().is_empty());
}

#[tokio::test]
async fn test_set_project_config_is_idempotent() {
    let h = started(StoreType::None, None).await;
    let mut p = project("todo", "Todo");
    p.modules_mut().crud.insert("mongo".to_string(), CrudStub::default());

    h.manager.set_project_config(p.clone()).await.unwrap();
    let first = h.manager.get_global_config().await;
    h.manager.set_project_config(p.clone()).await.unwrap();
    let second = h.manager.get_global_config().await;

    assert_eq!(first, second);
    assert_eq!(second.projects.len(), 1);
    assert_eq!(h.manager.get_config("todo").await.unwrap(), p);
}

#[tokio::test]
async fn test_set_project_config_rolls_back_on_store_failure() {
    let h = with_project().await;
    let before = h.manager.get_config("todo").await.unwrap();
    h.store.fail.store(true, Ordering::SeqCst);

    let result = h.manager.set_project_config(project("todo", "Broken")).await;

    assert!(matches!(result, Err(SyncError::Store(_))));
    assert_eq!(h.manager.get_config("todo").await.unwrap(), before);
    // Restored config was pushed back to the modules.
    let last = h.modules.last_global.lock().clone().unwrap();
    assert_eq!(last.project("todo"), Some(&before));
}

#[tokio::test]
async fn test_new_project_rolls_back_on_store_failure() {
    let h = started(StoreType::None, None).await;
    h.store.fail.store(true, Ordering::SeqCst);

    assert!(h.manager.set_project_config(project("todo", "Todo")).await.is_err());
    assert!(h.manager.get_global_config().await.projects.is_empty());
}

#[tokio::test]
async fn test_set_project_global_config() {
    let h = with_project().await;
    let mut update = project("todo", "Todo Prod");
    update.aes_key = "bXlrZXk=".to_string();
    update.context_time_graphql = 20;

    h.manager.set_project_global_config(&update).await.unwrap();

    let stored = h.manager.get_config("todo").await.unwrap();
    assert_eq!(stored.name, "Todo Prod");
    assert_eq!(stored.aes_key, "bXlrZXk=");
    assert_eq!(stored.context_time_graphql, 20);
    assert_eq!(h.modules.pushes(), vec!["global:todo"]);

    let err = h.manager.set_project_global_config(&project("ghost", "")).await.unwrap_err();
    assert!(matches!(err, SyncError::Project(ProjectError::NotFound { .. })));
}

#[tokio::test]
async fn test_delete_project() {
    let h = with_project().await;

    h.manager.delete_project_config("todo").await.unwrap();

    assert!(h.manager.get_config("todo").await.is_err());
    assert!(h.store.stored("todo").is_none());
    assert_eq!(h.modules.pushes(), vec!["delete:todo", "project"]);
}

#[tokio::test]
async fn test_delete_unknown_project_succeeds() {
    let h = started(StoreType::None, None).await;

    h.manager.delete_project_config("ghost").await.unwrap();
    h.manager.delete_project_config("ghost").await.unwrap();
}

#[tokio::test]
async fn test_delete_restores_project_on_store_failure() {
    let h = with_project().await;
    h.store.fail.store(true, Ordering::SeqCst);

    assert!(h.manager.delete_project_config("todo").await.is_err());
    assert!(h.manager.get_config("todo").await.is_ok());
}

#[tokio::test]
async fn test_delete_calls_runner() {
    let runner = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&runner).await;
    Mock::given(method("DELETE"))
        .and(path("/v1/runner/todo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&runner)
        .await;

    let h = started(StoreType::None, Some(runner.uri())).await;
    h.manager.apply_project_config(project("todo", "Todo")).await.unwrap();
    h.manager.delete_project_config("todo").await.unwrap();
}

#[tokio::test]
async fn test_project_summaries() {
    let h = with_project().await;
    h.manager.apply_project_config(project("blog", "Blog")).await.unwrap();

    let all = h.manager.get_project_config("*").await.unwrap();
    assert_eq!(all.len(), 2);

    let one = h.manager.get_project_config("blog").await.unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].name, "Blog");

    assert_eq!(h.manager.get_project_config("ghost").await.unwrap_err().status_code(), 404);
}

#[tokio::test]
async fn test_remote_snapshot_replaces_projects_and_cache() {
    let h = with_project().await;

    h.store.emit_projects(vec![project("remote", "From peer")]).await;

    let config = h.manager.get_global_config().await;
    assert_eq!(config.projects.len(), 1);
    assert_eq!(config.projects[0].id, "remote");
    assert_eq!(h.modules.pushes(), vec!["project"]);

    let cached = config_file::load_config(&h.dir.path().join("config.json")).unwrap();
    assert_eq!(cached.projects, config.projects);
}

#[tokio::test]
async fn test_start_loads_projects_from_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = std::sync::Arc::new(super::MemoryStore::default());
    store.projects.lock().insert("todo".to_string(), project("todo", "Persisted"));
    let modules = std::sync::Arc::new(super::RecordingModules::default());

    let manager = super::Manager::new(
        super::manager_config(&dir, StoreType::Etcd, None),
        store,
        std::sync::Arc::new(super::FakeAdmin::default()),
        modules.clone(),
        crate::supervisor::HealthRegistry::new(),
    )
    .unwrap();
    manager.start(Default::default(), 4122).await.unwrap();

    assert_eq!(manager.get_config("todo").await.unwrap().name, "Persisted");
    // Bootstrap push, then the initial snapshot.
    assert_eq!(modules.pushes(), vec!["project", "project"]);
}
