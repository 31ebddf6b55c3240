//! Control API
//!
//! Project config and cluster membership endpoints over the sync manager.

pub mod cluster;
pub mod health;
pub mod projects;

#[cfg(test)]
mod cluster_tests;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};

use syncman_core::SyncError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Projects
        .route("/config/projects", get(projects::list_projects))
        .route(
            "/config/projects/:project_id",
            get(projects::get_project).post(projects::apply_project).delete(projects::delete_project),
        )
        // Cluster
        .route("/cluster/nodes", get(cluster::get_nodes))
        .route("/cluster/tokens", get(cluster::get_tokens))
        .route("/cluster/tokens/:token/owner", get(cluster::get_token_owner))
        .fallback(api_not_found)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

/// Manager error rendered as `{"error": message}` with its status class.
#[derive(Debug)]
pub struct ApiError(SyncError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<SyncError> for ApiError {
    fn from(error: SyncError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
