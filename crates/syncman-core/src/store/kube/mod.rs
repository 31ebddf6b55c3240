//! Kubernetes backend.
//!
//! Projects are ConfigMaps named `<cluster>-<project>` carrying the project JSON.
//! Membership is implicit: every running gateway pod with an IP is a node, so
//! `register` does nothing.

mod api;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use syncman_types::{ClusterNode, ProjectConfig, Version, VersionedSet};
use tracing::{debug, info, warn};

use self::api::{object_name, resource_version, KubeApi, WatchEvent};
use super::{SnapshotCallback, Store, StoreError, StoreOptions, StoreResult};
use crate::supervisor::Supervisor;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const CONFIGMAPS: &str = "configmaps";
const PODS: &str = "pods";
/// Pause before re-watching after a stream that ended almost immediately.
const QUICK_CLOSE_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeOptions {
    pub namespace: String,
    /// Headless service the gateway pods are addressed through
    pub service_name: String,
    pub gateway_port: u16,
    /// Overrides the in-cluster `KUBERNETES_SERVICE_HOST`/`PORT` address
    pub api_server: Option<String>,
    pub token_path: PathBuf,
    pub ca_path: PathBuf,
}

impl Default for KubeOptions {
    fn default() -> Self {
        Self {
            namespace: "space-cloud".to_string(),
            service_name: "gateway".to_string(),
            gateway_port: 4122,
            api_server: None,
            token_path: PathBuf::from(SERVICE_ACCOUNT_DIR).join("token"),
            ca_path: PathBuf::from(SERVICE_ACCOUNT_DIR).join("ca.crt"),
        }
    }
}

/// Outcome of decoding one watched object.
enum Decoded<T> {
    Keep { id: String, item: T },
    /// Object exists but must not appear in snapshots (e.g. pod not running)
    Drop { id: String },
    Skip,
}

trait WatchedKind: Send + Sync + 'static {
    type Item: Clone + PartialEq + Send + Sync + 'static;
    const RESOURCE: &'static str;

    fn selector(&self) -> String;
    fn decode(&self, object: &Value) -> Decoded<Self::Item>;
}

struct ProjectMaps {
    cluster_id: String,
}

impl WatchedKind for ProjectMaps {
    type Item = ProjectConfig;
    const RESOURCE: &'static str = CONFIGMAPS;

    fn selector(&self) -> String {
        format!("kind=project,clusterId={}", self.cluster_id)
    }

    fn decode(&self, object: &Value) -> Decoded<ProjectConfig> {
        let name = object_name(object).unwrap_or_default();
        let Some(raw) = object.pointer("/data/project").and_then(Value::as_str) else {
            warn!(configmap = %name, "project ConfigMap has no project data");
            return Decoded::Skip;
        };
        match serde_json::from_str::<ProjectConfig>(raw) {
            Ok(project) => Decoded::Keep { id: project.id.clone(), item: project },
            Err(e) => {
                warn!(configmap = %name, "skipping malformed project ConfigMap: {}", e);
                Decoded::Skip
            },
        }
    }
}

struct GatewayPods {
    cluster_id: String,
    namespace: String,
    service_name: String,
    port: u16,
}

impl WatchedKind for GatewayPods {
    type Item = ClusterNode;
    const RESOURCE: &'static str = PODS;

    fn selector(&self) -> String {
        format!("app=gateway,clusterId={}", self.cluster_id)
    }

    fn decode(&self, object: &Value) -> Decoded<ClusterNode> {
        let Some(name) = object_name(object) else { return Decoded::Skip };
        let running = object.pointer("/status/phase").and_then(Value::as_str) == Some("Running");
        let has_ip = object
            .pointer("/status/podIP")
            .and_then(Value::as_str)
            .is_some_and(|ip| !ip.is_empty());

        if !(running && has_ip) {
            return Decoded::Drop { id: name.to_string() };
        }
        let address = format!(
            "{}.{}.{}.svc.cluster.local:{}",
            name, self.service_name, self.namespace, self.port
        );
        Decoded::Keep { id: name.to_string(), item: ClusterNode::new(name, address) }
    }
}

pub struct KubeStore {
    api: KubeApi,
    options: StoreOptions,
}

impl KubeStore {
    /// Connect with the pod's service account.
    pub fn in_cluster(options: StoreOptions) -> StoreResult<Self> {
        let kube = &options.kube;
        let api_server = match &kube.api_server {
            Some(server) => server.clone(),
            None => {
                let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
                    StoreError::InvalidConfig("KUBERNETES_SERVICE_HOST is not set".to_string())
                })?;
                let port =
                    std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
                format!("https://{host}:{port}")
            },
        };

        let token = std::fs::read_to_string(&kube.token_path)?.trim().to_string();
        let ca = if kube.ca_path.exists() { Some(std::fs::read(&kube.ca_path)?) } else { None };

        Self::connect(&api_server, Some(token), ca.as_deref(), options)
    }

    /// Connect to an explicit API server address.
    pub fn connect(
        api_server: &str,
        token: Option<String>,
        ca_pem: Option<&[u8]>,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let api = KubeApi::new(api_server, token, ca_pem)?;
        info!(%api_server, namespace = %options.kube.namespace, "using Kubernetes store");
        Ok(Self { api, options })
    }

    fn namespace(&self) -> &str {
        &self.options.kube.namespace
    }

    fn configmap_name(&self, project_id: &str) -> String {
        format!("{}-{}", self.options.cluster_id, project_id)
    }

    fn project_configmap(&self, project: &ProjectConfig) -> StoreResult<Value> {
        Ok(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": self.configmap_name(&project.id),
                "namespace": self.namespace(),
                "labels": {
                    "kind": "project",
                    "projectId": project.id,
                    "clusterId": self.options.cluster_id,
                },
            },
            "data": {
                "id": project.id,
                "project": serde_json::to_string(project)?,
            },
        }))
    }

    async fn watch_kind<K: WatchedKind>(
        &self,
        kind: K,
        callback: SnapshotCallback<K::Item>,
    ) -> StoreResult<()> {
        let watcher = KindWatcher {
            api: self.api.clone(),
            namespace: self.namespace().to_string(),
            selector: kind.selector(),
            kind,
            callback,
        };

        let (set, resource_version) = watcher.list().await?;
        (watcher.callback)(set.sorted_payloads()).await;
        debug!(
            resource = K::RESOURCE,
            items = set.len(),
            %resource_version,
            "initial Kubernetes snapshot delivered"
        );

        let supervisor = Supervisor::new(
            format!("kube:{}", K::RESOURCE),
            self.options.reconnect.clone(),
            self.options.health.clone(),
        );
        tokio::spawn(watcher.run(set, resource_version, supervisor));
        Ok(())
    }
}

/// How a single watch stream ended without an error.
enum StreamEnd {
    /// Server closed the stream (timeoutSeconds elapsed)
    Closed,
    /// resourceVersion too old; must re-list
    Expired,
}

struct KindWatcher<K: WatchedKind> {
    api: KubeApi,
    namespace: String,
    selector: String,
    kind: K,
    callback: SnapshotCallback<K::Item>,
}

impl<K: WatchedKind> KindWatcher<K> {
    async fn list(&self) -> StoreResult<(VersionedSet<K::Item>, String)> {
        let list = self.api.list(&self.namespace, K::RESOURCE, &self.selector).await?;

        let mut set = VersionedSet::new();
        set.reset(list.items.iter().filter_map(|object| match self.kind.decode(object) {
            Decoded::Keep { id, item } => {
                let version = resource_version(object);
                Some((id, Version::new(version, version), item))
            },
            Decoded::Drop { .. } | Decoded::Skip => None,
        }));
        Ok((set, list.metadata.resource_version))
    }

    async fn run(
        self,
        mut set: VersionedSet<K::Item>,
        mut resource_version: String,
        mut supervisor: Supervisor,
    ) {
        supervisor.established();
        let mut relist = false;

        loop {
            if relist {
                match self.list().await {
                    Ok((fresh, fresh_version)) => {
                        let before = set.sorted_payloads();
                        set = fresh;
                        resource_version = fresh_version;
                        relist = false;
                        let after = set.sorted_payloads();
                        if before != after {
                            (self.callback)(after).await;
                        }
                    },
                    Err(e) => {
                        if !supervisor.retry(&e).await {
                            return;
                        }
                        continue;
                    },
                }
            }

            let started = Instant::now();
            match self.follow(&mut set, &mut resource_version, &mut supervisor).await {
                Ok(StreamEnd::Closed) => {
                    if started.elapsed() < QUICK_CLOSE_PAUSE {
                        tokio::time::sleep(QUICK_CLOSE_PAUSE).await;
                    }
                },
                Ok(StreamEnd::Expired) => {
                    debug!(resource = K::RESOURCE, "resourceVersion expired, re-listing");
                    relist = true;
                },
                Err(e) => {
                    relist = true;
                    if !supervisor.retry(&e).await {
                        return;
                    }
                },
            }
        }
    }

    async fn follow(
        &self,
        set: &mut VersionedSet<K::Item>,
        resource_version: &mut String,
        supervisor: &mut Supervisor,
    ) -> StoreResult<StreamEnd> {
        let stream =
            self.api.watch(&self.namespace, K::RESOURCE, &self.selector, resource_version.as_str());
        futures::pin_mut!(stream);

        let mut first = true;
        while let Some(event) = stream.next().await {
            let event = event?;
            if first {
                supervisor.established();
                first = false;
            }

            match event.event_type.as_str() {
                "ERROR" => {
                    let code = event.object.get("code").and_then(Value::as_u64).unwrap_or_default();
                    if code == 410 {
                        return Ok(StreamEnd::Expired);
                    }
                    let message = event
                        .object
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("watch error")
                        .to_string();
                    return Err(StoreError::backend(code as u16, message));
                },
                "BOOKMARK" => {
                    if let Some(rv) = bookmark_version(&event) {
                        *resource_version = rv;
                    }
                },
                _ => {
                    if let Some(rv) = bookmark_version(&event) {
                        *resource_version = rv;
                    }
                    if self.apply(&event, set) {
                        (self.callback)(set.sorted_payloads()).await;
                    }
                },
            }
        }
        Ok(StreamEnd::Closed)
    }

    fn apply(&self, event: &WatchEvent, set: &mut VersionedSet<K::Item>) -> bool {
        let version = resource_version(&event.object);
        match (event.event_type.as_str(), self.kind.decode(&event.object)) {
            ("DELETED", Decoded::Keep { id, .. } | Decoded::Drop { id }) => {
                set.apply_delete(&id, version)
            },
            ("ADDED" | "MODIFIED", Decoded::Drop { id }) => set.remove(&id),
            ("ADDED", Decoded::Keep { id, item }) => {
                set.apply_put(id, Version::new(version, version), item)
            },
            ("MODIFIED", Decoded::Keep { id, item }) => {
                let create = set.version_of(&id).map_or(version, |v| v.create);
                set.apply_put(id, Version::new(create, version), item)
            },
            _ => false,
        }
    }
}

fn bookmark_version(event: &WatchEvent) -> Option<String> {
    event
        .object
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
        .filter(|rv| !rv.is_empty())
        .map(String::from)
}

#[async_trait]
impl Store for KubeStore {
    async fn register(&self) -> StoreResult<()> {
        debug!("Kubernetes membership follows pod lifecycle, nothing to register");
        Ok(())
    }

    async fn watch_projects(&self, callback: SnapshotCallback<ProjectConfig>) -> StoreResult<()> {
        let kind = ProjectMaps { cluster_id: self.options.cluster_id.clone() };
        self.watch_kind(kind, callback).await
    }

    async fn watch_services(&self, callback: SnapshotCallback<ClusterNode>) -> StoreResult<()> {
        let kind = GatewayPods {
            cluster_id: self.options.cluster_id.clone(),
            namespace: self.options.kube.namespace.clone(),
            service_name: self.options.kube.service_name.clone(),
            port: self.options.kube.gateway_port,
        };
        self.watch_kind(kind, callback).await
    }

    async fn set_project(&self, project: &ProjectConfig) -> StoreResult<()> {
        let name = self.configmap_name(&project.id);
        let mut body = self.project_configmap(project)?;

        match self.api.get(self.namespace(), CONFIGMAPS, &name).await? {
            None => self.api.create(self.namespace(), CONFIGMAPS, &body).await,
            Some(existing) => {
                if let (Some(rv), Some(metadata)) = (
                    existing.pointer("/metadata/resourceVersion").cloned(),
                    body.get_mut("metadata").and_then(Value::as_object_mut),
                ) {
                    metadata.insert("resourceVersion".to_string(), rv);
                }
                self.api.replace(self.namespace(), CONFIGMAPS, &name, &body).await
            },
        }
    }

    async fn delete_project(&self, project_id: &str) -> StoreResult<()> {
        self.api.delete(self.namespace(), CONFIGMAPS, &self.configmap_name(project_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pods() -> GatewayPods {
        GatewayPods {
            cluster_id: "prod".into(),
            namespace: "space-cloud".into(),
            service_name: "gateway".into(),
            port: 4122,
        }
    }

    #[test]
    fn test_running_pod_becomes_node() {
        let pod = json!({
            "metadata": { "name": "gateway-0", "resourceVersion": "42" },
            "status": { "phase": "Running", "podIP": "10.1.0.7" },
        });
        match pods().decode(&pod) {
            Decoded::Keep { id, item } => {
                assert_eq!(id, "gateway-0");
                assert_eq!(item.address, "gateway-0.gateway.space-cloud.svc.cluster.local:4122");
            },
            _ => panic!("running pod should be kept"),
        }
    }

    #[test]
    fn test_pending_pod_is_dropped() {
        let pod = json!({
            "metadata": { "name": "gateway-1" },
            "status": { "phase": "Pending" },
        });
        assert!(matches!(pods().decode(&pod), Decoded::Drop { id } if id == "gateway-1"));
    }

    #[test]
    fn test_project_configmap_decodes_payload() {
        let kind = ProjectMaps { cluster_id: "prod".into() };
        let map = json!({
            "metadata": { "name": "prod-todo" },
            "data": { "id": "todo", "project": "{\"id\":\"todo\",\"name\":\"Todo\"}" },
        });
        assert!(matches!(kind.decode(&map), Decoded::Keep { id, .. } if id == "todo"));

        let broken = json!({ "metadata": { "name": "prod-bad" }, "data": { "project": "{" } });
        assert!(matches!(kind.decode(&broken), Decoded::Skip));
    }
}
