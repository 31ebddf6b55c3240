//! Membership queries and node address resolution.
//!
//! Without a distributed store the node is alone, so every URL points back at
//! `localhost` on the gateway port.

use syncman_types::ClusterNode;

use super::Manager;
use crate::cluster::{self, TokenRange};
use crate::error::{SyncError, SyncResult};
use crate::store::StoreType;

impl Manager {
    fn is_standalone(&self) -> bool {
        self.inner.config.store_type == StoreType::None
    }

    pub async fn get_gateway_index(&self) -> usize {
        let state = self.inner.state.read().await;
        cluster::gateway_index(&state.services, &self.inner.config.node_id)
    }

    pub async fn get_nodes_in_cluster(&self) -> usize {
        let state = self.inner.state.read().await;
        cluster::nodes_in_cluster(&state.services)
    }

    /// Event tokens this node is responsible for.
    pub async fn get_assigned_tokens(&self) -> TokenRange {
        if self.is_standalone() {
            return cluster::assigned_tokens(&[], &self.inner.config.node_id);
        }
        let state = self.inner.state.read().await;
        cluster::assigned_tokens(&state.services, &self.inner.config.node_id)
    }

    /// Eventing endpoint of the node owning `token`.
    pub async fn get_assigned_space_cloud_url(&self, project: &str, token: usize) -> SyncResult<String> {
        if self.is_standalone() {
            return Ok(format!("http://localhost:{}/v1/api/{}/eventing/process", self.port(), project));
        }

        let state = self.inner.state.read().await;
        let owner = cluster::token_owner(&state.services, token)
            .ok_or_else(|| SyncError::Cluster("service directory is empty".to_string()))?;
        Ok(format!("http://{}/v1/api/{}/eventing/process", owner.address, project))
    }

    /// Realtime endpoints of every node, in directory order.
    pub async fn get_space_cloud_node_urls(&self, project: &str) -> Vec<String> {
        if self.is_standalone() {
            return vec![format!("http://localhost:{}/v1/api/{}/realtime/process", self.port(), project)];
        }

        let state = self.inner.state.read().await;
        state
            .services
            .iter()
            .map(|node| format!("http://{}/v1/api/{}/realtime/process", node.address, project))
            .collect()
    }

    pub fn get_realtime_url(&self, project: &str) -> String {
        format!("http://localhost:{}/v1/api/{}/realtime/handle", self.port(), project)
    }

    pub fn get_event_source(&self) -> String {
        format!("sc-{}", self.inner.config.node_id)
    }

    pub fn get_node_id(&self) -> &str {
        &self.inner.config.node_id
    }

    /// Address of a peer by node id.
    pub async fn get_space_cloud_url_from_id(&self, node_id: &str) -> SyncResult<String> {
        let state = self.inner.state.read().await;
        state
            .services
            .iter()
            .find(|node| node.id == node_id)
            .map(|node| node.address.clone())
            .ok_or_else(|| SyncError::Cluster(format!("node ({node_id}) is not in the service directory")))
    }

    /// Snapshot of the sorted service directory.
    pub async fn get_services(&self) -> Vec<ClusterNode> {
        self.inner.state.read().await.services.clone()
    }
}
