//! Project config handlers: list, get, apply, delete

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Serialize;

use syncman_types::{ProjectConfig, ProjectSummary};

use super::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Vec<ProjectSummary>> {
    Ok(Json(state.manager().get_project_config("*").await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<ProjectConfig> {
    Ok(Json(state.manager().get_config(&project_id).await?))
}

/// The path id wins over the id in the body.
pub async fn apply_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(mut project): Json<ProjectConfig>,
) -> ApiResult<Ack> {
    project.id = project_id;
    state.manager().apply_project_config(project).await?;
    Ok(Json(Ack { ok: true }))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Ack> {
    state.manager().delete_project_config(&project_id).await?;
    Ok(Json(Ack { ok: true }))
}
