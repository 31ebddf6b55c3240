//! etcd backend.
//!
//! Projects live under `projects/<cluster>/<id>` as JSON. Each node registers
//! `instances/<cluster>/<node>` bound to a lease it keeps alive; when the node
//! dies the lease expires and the key disappears from every watcher's directory.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{
    Certificate, Client, ConnectOptions, EventType, GetOptions, Identity, PutOptions, TlsOptions,
    WatchOptions, WatchResponse,
};
use syncman_types::{ClusterNode, ProjectConfig, Version, VersionedSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::codec::{decode_instance, decode_project, Decoder};
use super::{keys, SnapshotCallback, Store, StoreError, StoreOptions, StoreResult};
use crate::supervisor::Supervisor;

const LEASE_TTL_SECS: i64 = 10;
const DEFAULT_ENDPOINT: &str = "http://localhost:2379";

/// Connection settings read from `ETCD_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EtcdOptions {
    pub endpoints: Vec<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub ca_cert: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

impl EtcdOptions {
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let endpoints: Vec<String> = non_empty("ETCD_ENDPOINTS")
            .map(|raw| {
                raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
            })
            .unwrap_or_default();

        let options = Self {
            endpoints: if endpoints.is_empty() {
                vec![DEFAULT_ENDPOINT.to_string()]
            } else {
                endpoints
            },
            user: non_empty("ETCD_USER"),
            password: non_empty("ETCD_PASSWORD"),
            ca_cert: non_empty("ETCD_CACERT").map(PathBuf::from),
            client_cert: non_empty("ETCD_CLIENT_CERT").map(PathBuf::from),
            client_key: non_empty("ETCD_CLIENT_KEY").map(PathBuf::from),
        };

        if options.client_cert.is_some() != options.client_key.is_some() {
            return Err(StoreError::InvalidConfig(
                "ETCD_CLIENT_CERT and ETCD_CLIENT_KEY must be set together".to_string(),
            ));
        }
        Ok(options)
    }

    async fn connect_options(&self) -> StoreResult<Option<ConnectOptions>> {
        let mut connect = ConnectOptions::new();
        let mut customized = false;

        if let Some(user) = &self.user {
            connect = connect.with_user(user.clone(), self.password.clone().unwrap_or_default());
            customized = true;
        }

        if self.ca_cert.is_some() || self.client_cert.is_some() {
            let mut tls = TlsOptions::new();
            if let Some(ca) = &self.ca_cert {
                tls = tls.ca_certificate(Certificate::from_pem(tokio::fs::read(ca).await?));
            }
            if let (Some(cert), Some(key)) = (&self.client_cert, &self.client_key) {
                let cert = tokio::fs::read(cert).await?;
                let key = tokio::fs::read(key).await?;
                tls = tls.identity(Identity::from_pem(cert, key));
            }
            connect = connect.with_tls(tls);
            customized = true;
        }

        Ok(customized.then_some(connect))
    }
}

pub struct EtcdStore {
    client: Client,
    options: StoreOptions,
}

impl EtcdStore {
    pub async fn connect(etcd: EtcdOptions, options: StoreOptions) -> StoreResult<Self> {
        let connect = etcd.connect_options().await?;
        let client = Client::connect(&etcd.endpoints, connect).await?;
        info!(endpoints = ?etcd.endpoints, "connected to etcd");
        Ok(Self { client, options })
    }

    fn instance_key(&self) -> String {
        keys::key(keys::INSTANCES, &self.options.cluster_id, &self.options.node_id)
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
        let ctx = WatchContext {
            prefix: keys::prefix(kind, &self.options.cluster_id),
            cluster_id: self.options.cluster_id.clone(),
            decode,
            callback,
        };
        let mut client = self.client.clone();

        let (set, revision) = ctx.list(&mut client).await?;
        (ctx.callback)(set.sorted_payloads()).await;
        debug!(prefix = %ctx.prefix, items = set.len(), revision, "initial etcd snapshot delivered");

        let supervisor = Supervisor::new(
            format!("etcd:{kind}"),
            self.options.reconnect.clone(),
            self.options.health.clone(),
        );
        tokio::spawn(ctx.run(client, set, revision, supervisor));
        Ok(())
    }
}

/// Everything a background watch task owns.
struct WatchContext<T> {
    prefix: String,
    cluster_id: String,
    decode: Decoder<T>,
    callback: SnapshotCallback<T>,
}

impl<T> WatchContext<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Full listing of the prefix plus the revision it was read at.
    async fn list(&self, client: &mut Client) -> StoreResult<(VersionedSet<T>, i64)> {
        let response = client.get(self.prefix.as_str(), Some(GetOptions::new().with_prefix())).await?;
        let revision = response.header().map(|h| h.revision()).unwrap_or_default();

        let mut set = VersionedSet::new();
        let listing = response.kvs().iter().filter_map(|kv| {
            let key = kv.key_str().ok()?;
            let id = keys::item_id(key, &self.cluster_id)?;
            match (self.decode)(key, kv.value()) {
                Ok(item) => Some((
                    id.to_string(),
                    Version::new(kv.create_revision() as u64, kv.mod_revision() as u64),
                    item,
                )),
                Err(e) => {
                    warn!("skipping etcd value: {}", e);
                    None
                },
            }
        });
        set.reset(listing);
        Ok((set, revision))
    }

    async fn run(
        self,
        mut client: Client,
        mut set: VersionedSet<T>,
        mut revision: i64,
        mut supervisor: Supervisor,
    ) {
        supervisor.established();
        let mut relist = false;

        loop {
            if relist {
                match self.list(&mut client).await {
                    Ok((fresh, fresh_revision)) => {
                        revision = fresh_revision;
                        relist = false;
                        if replace_listing(&mut set, fresh) {
                            (self.callback)(set.sorted_payloads()).await;
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

            let err = match self.follow(&mut client, &mut set, &mut revision, &mut supervisor).await {
                Ok(()) => StoreError::WatchClosed(format!("watch on {} ended", self.prefix)),
                Err(e) => e,
            };
            relist = true;
            if !supervisor.retry(&err).await {
                return;
            }
        }
    }

    /// Consume one watch stream until it ends or fails.
    async fn follow(
        &self,
        client: &mut Client,
        set: &mut VersionedSet<T>,
        revision: &mut i64,
        supervisor: &mut Supervisor,
    ) -> StoreResult<()> {
        let options = WatchOptions::new().with_prefix().with_start_revision(*revision + 1);
        let (_watcher, mut stream) = client.watch(self.prefix.as_str(), Some(options)).await?;

        while let Some(response) = stream.message().await? {
            if response.created() {
                supervisor.established();
            }
            if response.canceled() {
                return Err(StoreError::WatchClosed(format!(
                    "watch canceled (compacted at {}): {}",
                    response.compact_revision(),
                    response.cancel_reason()
                )));
            }

            if self.apply(&response, set, revision) {
                (self.callback)(set.sorted_payloads()).await;
            }
        }
        Ok(())
    }

    fn apply(&self, response: &WatchResponse, set: &mut VersionedSet<T>, revision: &mut i64) -> bool {
        let mut changed = false;
        for event in response.events() {
            let Some(kv) = event.kv() else { continue };
            let Ok(key) = kv.key_str() else { continue };
            changed |= apply_event(
                set,
                revision,
                &self.cluster_id,
                self.decode,
                WatchEvent {
                    kind: event.event_type(),
                    key,
                    value: kv.value(),
                    create_revision: kv.create_revision(),
                    mod_revision: kv.mod_revision(),
                },
            );
        }
        changed
    }
}

/// One key change as delivered by a watch stream.
#[derive(Debug, Clone, Copy)]
struct WatchEvent<'a> {
    kind: EventType,
    key: &'a str,
    value: &'a [u8],
    create_revision: i64,
    mod_revision: i64,
}

/// Fold one event into `set`. The revision always advances, even for keys
/// that are skipped. Returns whether the set changed.
fn apply_event<T: Clone>(
    set: &mut VersionedSet<T>,
    revision: &mut i64,
    cluster_id: &str,
    decode: Decoder<T>,
    event: WatchEvent<'_>,
) -> bool {
    *revision = (*revision).max(event.mod_revision);
    let Some(id) = keys::item_id(event.key, cluster_id) else { return false };

    match event.kind {
        EventType::Put => match decode(event.key, event.value) {
            Ok(item) => set.apply_put(
                id,
                Version::new(event.create_revision as u64, event.mod_revision as u64),
                item,
            ),
            Err(e) => {
                warn!("ignoring etcd update: {}", e);
                false
            },
        },
        EventType::Delete => set.apply_delete(id, event.mod_revision as u64),
    }
}

/// Swap in a fresh listing taken after a broken watch. Returns whether the
/// visible snapshot differs from before.
fn replace_listing<T: Clone + PartialEq>(set: &mut VersionedSet<T>, fresh: VersionedSet<T>) -> bool {
    let before = set.sorted_payloads();
    *set = fresh;
    before != set.sorted_payloads()
}

async fn grant_and_put(client: &mut Client, key: &str, address: &str) -> StoreResult<i64> {
    let lease = client.lease_grant(LEASE_TTL_SECS, None).await?;
    client.put(key, address, Some(PutOptions::new().with_lease(lease.id()))).await?;
    Ok(lease.id())
}

/// Refresh the lease every third of its TTL until something fails.
async fn keep_lease(client: &mut Client, lease_id: i64, supervisor: &mut Supervisor) -> StoreError {
    let (mut keeper, mut stream) = match client.lease_keep_alive(lease_id).await {
        Ok(pair) => pair,
        Err(e) => return e.into(),
    };

    let mut ticker = interval(Duration::from_secs((LEASE_TTL_SECS / 3) as u64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if let Err(e) = keeper.keep_alive().await {
            return e.into();
        }
        match stream.message().await {
            Ok(Some(response)) if response.ttl() > 0 => supervisor.established(),
            Ok(Some(_)) => return StoreError::WatchClosed(format!("lease {lease_id} expired")),
            Ok(None) => return StoreError::WatchClosed("keep-alive stream ended".to_string()),
            Err(e) => return e.into(),
        }
    }
}

async fn run_lease(
    mut client: Client,
    key: String,
    address: String,
    mut lease_id: i64,
    mut supervisor: Supervisor,
) {
    supervisor.established();
    let mut regrant = false;

    loop {
        if regrant {
            match grant_and_put(&mut client, &key, &address).await {
                Ok(id) => {
                    info!(lease = id, %key, "re-registered instance");
                    lease_id = id;
                    regrant = false;
                },
                Err(e) => {
                    if !supervisor.retry(&e).await {
                        return;
                    }
                    continue;
                },
            }
        }

        let err = keep_lease(&mut client, lease_id, &mut supervisor).await;
        regrant = true;
        if !supervisor.retry(&err).await {
            return;
        }
    }
}

#[async_trait]
impl Store for EtcdStore {
    async fn register(&self) -> StoreResult<()> {
        let mut client = self.client.clone();
        let key = self.instance_key();
        let address = self.options.advertise_addr.clone();

        let lease_id = grant_and_put(&mut client, &key, &address).await?;
        info!(lease = lease_id, %key, "registered instance in etcd");

        let supervisor = Supervisor::new(
            "etcd:lease",
            self.options.reconnect.clone(),
            self.options.health.clone(),
        );
        tokio::spawn(run_lease(client, key, address, lease_id, supervisor));
        Ok(())
    }

    async fn watch_projects(&self, callback: SnapshotCallback<ProjectConfig>) -> StoreResult<()> {
        self.watch_prefix(keys::PROJECTS, decode_project, callback).await
    }

    async fn watch_services(&self, callback: SnapshotCallback<ClusterNode>) -> StoreResult<()> {
        self.watch_prefix(keys::INSTANCES, decode_instance, callback).await
    }

    async fn set_project(&self, project: &ProjectConfig) -> StoreResult<()> {
        let value = serde_json::to_vec(project)?;
        self.client.clone().put(self.project_key(&project.id), value, None).await?;
        Ok(())
    }

    async fn delete_project(&self, project_id: &str) -> StoreResult<()> {
        self.client.clone().delete(self.project_key(project_id), None).await?;
        Ok(())
    }
}
