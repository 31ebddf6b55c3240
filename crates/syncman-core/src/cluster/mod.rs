//! Cluster membership helpers and event-token sharding.

mod sharding;

pub use sharding::{calc_index, calc_tokens, TokenRange, MAX_EVENT_TOKENS};

use syncman_types::{models::position_of, ClusterNode};

/// Own position in the sorted service directory, 0 when absent.
pub fn gateway_index(directory: &[ClusterNode], node_id: &str) -> usize {
    position_of(directory, node_id).unwrap_or(0)
}

/// Directory size, never less than one.
pub fn nodes_in_cluster(directory: &[ClusterNode]) -> usize {
    directory.len().max(1)
}

/// Token range owned by `node_id` given the current directory.
pub fn assigned_tokens(directory: &[ClusterNode], node_id: &str) -> TokenRange {
    calc_tokens(nodes_in_cluster(directory), MAX_EVENT_TOKENS, gateway_index(directory, node_id))
}

/// Node owning `token`, if the directory is not empty.
pub fn token_owner(directory: &[ClusterNode], token: usize) -> Option<&ClusterNode> {
    if directory.is_empty() {
        return None;
    }
    directory.get(calc_index(token, MAX_EVENT_TOKENS, directory.len()))
}
