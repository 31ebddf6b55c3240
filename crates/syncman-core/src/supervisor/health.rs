//! Health of the background store sessions (watches, leases, sessions).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Session established and delivering
    Healthy,
    /// Session lost, reconnecting with backoff
    Degraded,
    /// Reconnect budget exhausted; serving the last known snapshot
    Failed,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub since: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Shared registry; cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_healthy(&self, component: &str) {
        self.set(component, HealthStatus::Healthy, 0, None);
    }

    pub fn mark_degraded(&self, component: &str, attempts: u32, error: &str) {
        self.set(component, HealthStatus::Degraded, attempts, Some(error.to_string()));
    }

    pub fn mark_failed(&self, component: &str, attempts: u32, error: &str) {
        self.set(component, HealthStatus::Failed, attempts, Some(error.to_string()));
    }

    fn set(&self, component: &str, status: HealthStatus, attempts: u32, error: Option<String>) {
        let mut components = self.components.write();
        let since = match components.get(component) {
            Some(existing) if existing.status == status => existing.since,
            _ => Utc::now(),
        };
        components.insert(
            component.to_string(),
            ComponentHealth { status, since, attempts, last_error: error },
        );
    }

    /// Worst status across components. Healthy when nothing is registered.
    pub fn status(&self) -> HealthStatus {
        self.components
            .read()
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }

    pub fn status_of(&self, component: &str) -> Option<HealthStatus> {
        self.components.read().get(component).map(|c| c.status)
    }

    pub fn snapshot(&self) -> BTreeMap<String, ComponentHealth> {
        self.components.read().clone()
    }
}
