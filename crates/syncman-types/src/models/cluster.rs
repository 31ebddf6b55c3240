//! Cluster membership: the Service Directory entries.

use serde::{Deserialize, Serialize};

/// One live gateway process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: String,
    pub address: String,
}

impl ClusterNode {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self { id: id.into(), address: address.into() }
    }
}

/// Stable sort by node id. Token ownership is derived from positions in this order.
pub fn sort_nodes(nodes: &mut [ClusterNode]) {
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
}

/// Position of `node_id` in a sorted directory, if present.
pub fn position_of(nodes: &[ClusterNode], node_id: &str) -> Option<usize> {
    nodes.iter().position(|n| n.id == node_id)
}
