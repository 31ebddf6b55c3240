//! Consul backend over the HTTP API.
//!
//! Same key layout as etcd. Instance keys are acquired with a session that has
//! `Behavior=delete`, so they vanish when the node stops renewing. Watches are
//! blocking queries on the prefix: each response is a full listing, tagged with
//! the `X-Consul-Index` of the last change.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use syncman_types::{ClusterNode, ProjectConfig, Version, VersionedSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

use super::codec::{decode_instance, decode_project, Decoder};
use super::{keys, SnapshotCallback, Store, StoreError, StoreOptions, StoreResult};
use crate::supervisor::Supervisor;

const DEFAULT_ADDR: &str = "127.0.0.1:8500";
const SESSION_TTL: &str = "10s";
const SESSION_RENEW_INTERVAL: Duration = Duration::from_secs(4);
const BLOCKING_WAIT: &str = "5m";
const BLOCKING_TIMEOUT: Duration = Duration::from_secs(330);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const INDEX_HEADER: &str = "X-Consul-Index";
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Agent address and ACL token from `CONSUL_HTTP_ADDR` / `CONSUL_HTTP_TOKEN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsulOptions {
    pub address: String,
    pub token: Option<String>,
}

impl Default for ConsulOptions {
    fn default() -> Self {
        Self { address: format!("http://{DEFAULT_ADDR}"), token: None }
    }
}

impl ConsulOptions {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let address = lookup("CONSUL_HTTP_ADDR")
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let address =
            if address.contains("://") { address } else { format!("http://{address}") };
        let token = lookup("CONSUL_HTTP_TOKEN").filter(|t| !t.trim().is_empty());
        Self { address, token }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvEntry {
    key: String,
    value: Option<String>,
    create_index: u64,
    modify_index: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SessionCreated {
    #[serde(rename = "ID")]
    id: String,
}

/// One response of a (possibly blocking) recursive KV read.
struct KvListing {
    index: u64,
    entries: Vec<KvEntry>,
}

/// Thin wrapper over the agent's HTTP API.
#[derive(Debug, Clone)]
struct ConsulApi {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl ConsulApi {
    fn new(options: &ConsulOptions) -> StoreResult<Self> {
        let base = Url::parse(&options.address).map_err(|e| {
            StoreError::InvalidConfig(format!("invalid CONSUL_HTTP_ADDR {}: {}", options.address, e))
        })?;
        Ok(Self { http: Client::builder().build()?, base, token: options.token.clone() })
    }

    fn request(&self, method: Method, path: &str) -> StoreResult<RequestBuilder> {
        let url = self
            .base
            .join(path)
            .map_err(|e| StoreError::InvalidConfig(format!("invalid Consul path {path}: {e}")))?;
        let mut builder = self.http.request(method, url).timeout(REQUEST_TIMEOUT);
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        Ok(builder)
    }

    async fn create_session(&self, name: &str) -> StoreResult<String> {
        let response = self
            .request(Method::PUT, "/v1/session/create")?
            .json(&json!({ "Name": name, "Behavior": "delete", "TTL": SESSION_TTL }))
            .send()
            .await?;
        let created: SessionCreated = ensure_success(response).await?.json().await?;
        Ok(created.id)
    }

    async fn renew_session(&self, session: &str) -> StoreResult<()> {
        let response =
            self.request(Method::PUT, &format!("/v1/session/renew/{session}"))?.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::WatchClosed(format!("session {session} expired")));
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn acquire(&self, key: &str, value: &str, session: &str) -> StoreResult<bool> {
        let response = self
            .request(Method::PUT, &format!("/v1/kv/{key}"))?
            .query(&[("acquire", session)])
            .body(value.to_string())
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let response = self.request(Method::PUT, &format!("/v1/kv/{key}"))?.body(value).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let response = self.request(Method::DELETE, &format!("/v1/kv/{key}"))?.send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Recursive read of `prefix`. With `index > 0` this blocks until the prefix
    /// changes past `index` or the wait time elapses.
    async fn list(&self, prefix: &str, index: u64) -> StoreResult<KvListing> {
        let mut builder = self.request(Method::GET, &format!("/v1/kv/{prefix}"))?;
        builder = builder.query(&[("recurse", "true")]);
        if index > 0 {
            builder = builder
                .query(&[("index", index.to_string().as_str()), ("wait", BLOCKING_WAIT)])
                .timeout(BLOCKING_TIMEOUT);
        }

        let response = builder.send().await?;
        let index = response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_default();

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(KvListing { index, entries: Vec::new() });
        }
        let entries = ensure_success(response).await?.json().await?;
        Ok(KvListing { index, entries })
    }
}

async fn ensure_success(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::backend(status.as_u16(), body))
}

/// Decode a listing into a fresh set, skipping foreign and malformed entries.
fn build_set<T: Clone>(entries: &[KvEntry], cluster_id: &str, decode: Decoder<T>) -> VersionedSet<T> {
    let mut set = VersionedSet::new();
    set.reset(entries.iter().filter_map(|entry| {
        let id = keys::item_id(&entry.key, cluster_id)?;
        let raw = match entry.value.as_deref().map(|v| STANDARD.decode(v)) {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => {
                warn!(key = %entry.key, "skipping Consul value with bad base64: {}", e);
                return None;
            },
            None => Vec::new(),
        };
        match decode(&entry.key, &raw) {
            Ok(item) => Some((
                id.to_string(),
                Version::new(entry.create_index, entry.modify_index),
                item,
            )),
            Err(e) => {
                warn!("skipping Consul value: {}", e);
                None
            },
        }
    }));
    set
}

pub struct ConsulStore {
    api: ConsulApi,
    options: StoreOptions,
}

impl ConsulStore {
    pub fn new(consul: ConsulOptions, options: StoreOptions) -> StoreResult<Self> {
        let api = ConsulApi::new(&consul)?;
        info!(address = %consul.address, "using Consul store");
        Ok(Self { api, options })
    }

    fn session_name(&self) -> String {
        format!("syncman-{}-{}", self.options.cluster_id, self.options.node_id)
    }

    fn project_key(&self, project_id: &str) -> String {
        keys::key(keys::PROJECTS, &self.options.cluster_id, project_id)
    }

    async fn watch_prefix<T>(
        &self,
        kind: &'static str,
        decode: Decoder<T>,
        callback: SnapshotCallback<T>,
    ) -> StoreResult<()>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let prefix = keys::prefix(kind, &self.options.cluster_id);
        let listing = self.api.list(&prefix, 0).await?;
        let set = build_set(&listing.entries, &self.options.cluster_id, decode);
        let mut current = set.sorted_payloads();
        callback(current.clone()).await;
        debug!(%prefix, items = current.len(), index = listing.index, "initial Consul snapshot delivered");

        let api = self.api.clone();
        let cluster_id = self.options.cluster_id.clone();
        let mut supervisor = Supervisor::new(
            format!("consul:{kind}"),
            self.options.reconnect.clone(),
            self.options.health.clone(),
        );
        let mut index = listing.index;

        tokio::spawn(async move {
            supervisor.established();
            loop {
                let listing = match api.list(&prefix, index.max(1)).await {
                    Ok(listing) => listing,
                    Err(e) => {
                        if !supervisor.retry(&e).await {
                            return;
                        }
                        continue;
                    },
                };
                supervisor.established();

                if listing.index == index {
                    continue;
                }
                // Index went backwards (e.g. snapshot restore): start over.
                index = if listing.index < index { 0 } else { listing.index };

                let fresh = build_set(&listing.entries, &cluster_id, decode).sorted_payloads();
                if fresh != current {
                    current = fresh;
                    callback(current.clone()).await;
                }
            }
        });
        Ok(())
    }
}

/// Keep the session alive and the instance key acquired until the budget runs out.
async fn run_session(
    api: ConsulApi,
    name: String,
    key: String,
    address: String,
    mut session: String,
    mut acquired: bool,
    mut supervisor: Supervisor,
) {
    let mut ticker = interval(SESSION_RENEW_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    supervisor.established();

    loop {
        ticker.tick().await;

        let outcome = match api.renew_session(&session).await {
            Ok(()) if acquired => Ok(()),
            Ok(()) => api.acquire(&key, &address, &session).await.map(|ok| acquired = ok),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => supervisor.established(),
            Err(e) => {
                if !supervisor.retry(&e).await {
                    return;
                }
                match establish_session(&api, &name, &key, &address).await {
                    Ok((fresh, ok)) => {
                        info!(session = %fresh, %key, "re-created Consul session");
                        session = fresh;
                        acquired = ok;
                    },
                    Err(e) => warn!("failed to re-create Consul session: {}", e),
                }
            },
        }
    }
}

async fn establish_session(
    api: &ConsulApi,
    name: &str,
    key: &str,
    address: &str,
) -> StoreResult<(String, bool)> {
    let session = api.create_session(name).await?;
    let acquired = api.acquire(key, address, &session).await?;
    if !acquired {
        warn!(%key, "instance key is held by another session, will retry");
    }
    Ok((session, acquired))
}

#[async_trait]
impl Store for ConsulStore {
    async fn register(&self) -> StoreResult<()> {
        let name = self.session_name();
        let key = keys::key(keys::INSTANCES, &self.options.cluster_id, &self.options.node_id);
        let address = self.options.advertise_addr.clone();

        let (session, acquired) = establish_session(&self.api, &name, &key, &address).await?;
        info!(%session, %key, acquired, "registered instance in Consul");

        let supervisor = Supervisor::new(
            "consul:session",
            self.options.reconnect.clone(),
            self.options.health.clone(),
        );
        tokio::spawn(run_session(self.api.clone(), name, key, address, session, acquired, supervisor));
        Ok(())
    }

    async fn watch_projects(&self, callback: SnapshotCallback<ProjectConfig>) -> StoreResult<()> {
        self.watch_prefix(keys::PROJECTS, decode_project, callback).await
    }

    async fn watch_services(&self, callback: SnapshotCallback<ClusterNode>) -> StoreResult<()> {
        self.watch_prefix(keys::INSTANCES, decode_instance, callback).await
    }

    async fn set_project(&self, project: &ProjectConfig) -> StoreResult<()> {
        self.api.put(&self.project_key(&project.id), serde_json::to_vec(project)?).await
    }

    async fn delete_project(&self, project_id: &str) -> StoreResult<()> {
        self.api.delete(&self.project_key(project_id)).await
    }
}
