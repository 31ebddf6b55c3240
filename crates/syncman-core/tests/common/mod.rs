#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use syncman_core::store::{snapshot_callback, KubeOptions, SnapshotCallback, StoreOptions};
use syncman_core::supervisor::{ExhaustedAction, HealthRegistry, ReconnectPolicy};

pub fn store_options() -> StoreOptions {
    StoreOptions {
        node_id: "node-a".to_string(),
        cluster_id: "prod".to_string(),
        advertise_addr: "10.0.0.1:4122".to_string(),
        config_path: std::env::temp_dir().join("syncman-integration-unused.json"),
        reconnect: ReconnectPolicy {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            max_attempts: 3,
            on_exhausted: ExhaustedAction::StayDegraded,
        },
        health: HealthRegistry::new(),
        kube: KubeOptions::default(),
    }
}

/// Callback collecting every delivered snapshot.
pub fn recorder<T: Send + 'static>() -> (SnapshotCallback<T>, Arc<Mutex<Vec<Vec<T>>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback = snapshot_callback(move |items| {
        let sink = sink.clone();
        async move {
            sink.lock().push(items);
        }
    });
    (callback, seen)
}

/// Poll until `count` snapshots were delivered or five seconds pass.
pub async fn wait_for<T>(seen: &Arc<Mutex<Vec<Vec<T>>>>, count: usize) -> bool {
    for _ in 0..100 {
        if seen.lock().len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
