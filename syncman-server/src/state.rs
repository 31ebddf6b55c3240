//! Application State
//!
//! Shared by every HTTP handler: the synchronization manager and the module
//! registry it pushes into.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use syncman_core::Manager;

use crate::collaborators::ModuleRegistry;

#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub manager: Manager,
    pub modules: Arc<ModuleRegistry>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(manager: Manager, modules: Arc<ModuleRegistry>) -> Self {
        Self { inner: Arc::new(AppStateInner { manager, modules, started_at: Utc::now() }) }
    }

    pub fn manager(&self) -> &Manager {
        &self.inner.manager
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.inner.modules
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.inner.started_at).num_seconds()
    }
}
