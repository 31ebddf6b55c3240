use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;

use syncman_core::supervisor::ComponentHealth;
use syncman_core::HealthStatus;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub node_id: String,
    pub cluster_id: String,
    pub store: String,
    pub nodes_in_cluster: usize,
    pub projects: usize,
    pub uptime_seconds: i64,
    pub version: &'static str,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// 503 once a store session gave up; degraded nodes still answer 200.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let manager = state.manager();
    let status = manager.health();
    let code = if status == HealthStatus::Failed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(HealthResponse {
            status,
            node_id: manager.get_node_id().to_string(),
            cluster_id: manager.cluster_id().to_string(),
            store: manager.store_type().to_string(),
            nodes_in_cluster: manager.get_nodes_in_cluster().await,
            projects: state.modules().project_count(),
            uptime_seconds: state.uptime_seconds(),
            version: env!("CARGO_PKG_VERSION"),
            components: manager.health_report(),
        }),
    )
}
