#![allow(clippy::unwrap_used)]

use axum::extract::{Path, Query, State};

use super::cluster::{get_nodes, get_token_owner, get_tokens, OwnerQuery};
use crate::test_helpers::{test_app_state, TEST_NODE, TEST_PORT};

#[tokio::test]
async fn test_standalone_node_is_its_own_cluster() {
    let (state, _dir) = test_app_state().await;

    let nodes = get_nodes(State(state)).await.0;
    assert_eq!(nodes.node_id, TEST_NODE);
    assert_eq!(nodes.index, 0);
    assert_eq!(nodes.nodes.len(), 1);
    assert_eq!(nodes.nodes[0].id, TEST_NODE);
}

#[tokio::test]
async fn test_standalone_owns_every_token() {
    let (state, _dir) = test_app_state().await;

    let tokens = get_tokens(State(state)).await.0;
    assert_eq!(tokens.nodes_in_cluster, 1);
    assert_eq!((tokens.range.start, tokens.range.end), (0, 99));

    let body = serde_json::to_value(&tokens).unwrap();
    assert_eq!(body["start"], 0);
    assert_eq!(body["end"], 99);
}

#[tokio::test]
async fn test_token_owner_points_at_localhost() {
    let (state, _dir) = test_app_state().await;

    let owner = get_token_owner(State(state), Path(42), Query(OwnerQuery { project: "todo".to_string() }))
        .await
        .unwrap()
        .0;
    assert_eq!(owner.token, 42);
    assert_eq!(owner.url, format!("http://localhost:{TEST_PORT}/v1/api/todo/eventing/process"));
}
