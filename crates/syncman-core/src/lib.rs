//! # Syncman Core
//!
//! Cluster synchronization for the gateway control plane.
//!
//! ```text
//! syncman-core/src/
//! ├── store/          # Store trait + none/etcd/Consul/Kubernetes backends
//! ├── supervisor/     # reconnect backoff and component health
//! ├── cluster/        # service directory helpers, event-token sharding
//! ├── manager/        # the synchronization manager (config tree owner)
//! ├── collaborators.rs# admin + dependent-module interfaces
//! ├── runner.rs       # workload runner HTTP client
//! └── config_file.rs  # atomic JSON config file
//! ```
//!
//! The [`Manager`] owns the authoritative in-memory config and the service
//! directory. Local mutations are validated, pushed to the dependent modules and
//! persisted through the active [`Store`]; remote changes arrive as full
//! snapshots through the store's watch callbacks.

#![allow(
    clippy::significant_drop_tightening,
    reason = "RwLock guards in async code require careful lifetime management"
)]
#![allow(
    clippy::wildcard_enum_match_arm,
    reason = "Store events carry open-ended type strings"
)]
#![allow(clippy::needless_continue, reason = "Explicit continue improves loop readability")]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Some types intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::print_stdout,
        clippy::assertions_on_result_states
    )
)]

pub mod cluster;
pub mod collaborators;
pub mod config_file;
pub mod error;
pub mod manager;
pub mod runner;
pub mod store;
pub mod supervisor;

// Re-export commonly used types
pub use collaborators::{AdminManager, DependentModules, ModuleError};
pub use error::{SyncError, SyncResult};
pub use manager::{Manager, ManagerConfig};
pub use runner::{RunnerClient, RunnerError};
pub use store::{connect_store, Store, StoreError, StoreOptions, StoreType};
pub use supervisor::{HealthRegistry, HealthStatus, ReconnectPolicy};
