//! Cluster membership and event-token ownership

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use syncman_core::cluster::TokenRange;
use syncman_types::ClusterNode;

use super::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NodesResponse {
    pub node_id: String,
    pub index: usize,
    pub nodes: Vec<ClusterNode>,
}

#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub node_id: String,
    pub nodes_in_cluster: usize,
    #[serde(flatten)]
    pub range: TokenRange,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub project: String,
}

#[derive(Debug, Serialize)]
pub struct OwnerResponse {
    pub token: usize,
    pub url: String,
}

pub async fn get_nodes(State(state): State<AppState>) -> Json<NodesResponse> {
    let manager = state.manager();
    Json(NodesResponse {
        node_id: manager.get_node_id().to_string(),
        index: manager.get_gateway_index().await,
        nodes: manager.get_services().await,
    })
}

pub async fn get_tokens(State(state): State<AppState>) -> Json<TokensResponse> {
    let manager = state.manager();
    Json(TokensResponse {
        node_id: manager.get_node_id().to_string(),
        nodes_in_cluster: manager.get_nodes_in_cluster().await,
        range: manager.get_assigned_tokens().await,
    })
}

pub async fn get_token_owner(
    State(state): State<AppState>,
    Path(token): Path<usize>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<OwnerResponse> {
    let url = state.manager().get_assigned_space_cloud_url(&query.project, token).await?;
    Ok(Json(OwnerResponse { token, url }))
}
