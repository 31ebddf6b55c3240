//! Syncman Server - cluster config synchronization daemon
//!
//! - Keeps every gateway node's project config in step through the chosen store
//! - Tracks cluster membership and shards the event-token space across nodes
//! - Exposes project and cluster endpoints on /v1/*, liveness on /health
//!
//! `syncman-server status` queries a running node instead of serving.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod collaborators;
mod commands;
mod router;
mod server_utils;
mod state;

#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use collaborators::{LocalAdmin, ModuleRegistry};
use state::AppState;
use syncman_core::config_file::load_config;
use syncman_core::store::KubeOptions;
use syncman_core::{
    connect_store, HealthRegistry, Manager, ManagerConfig, ReconnectPolicy, StoreOptions,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Status { url, json }) = &cli.command {
        return commands::handle_status(url, *json).await;
    }

    init_tracing(&cli.log_level)?;
    serve(cli).await
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init tracing: {e}"))
}

async fn serve(cli: Cli) -> Result<()> {
    let node_id = cli.resolved_node_id();
    let advertise_addr = cli.resolved_advertise_addr();

    info!("🚀 Syncman starting: node {} in cluster {}", node_id, cli.cluster_id);

    let initial = load_config(&cli.config_path)
        .with_context(|| format!("failed to load {}", cli.config_path.display()))?;
    info!("📂 Loaded {} projects from {}", initial.projects.len(), cli.config_path.display());

    let health = HealthRegistry::new();
    let store = connect_store(
        cli.store_type,
        StoreOptions {
            node_id: node_id.clone(),
            cluster_id: cli.cluster_id.clone(),
            advertise_addr: advertise_addr.clone(),
            config_path: cli.config_path.clone(),
            reconnect: ReconnectPolicy::default(),
            health: health.clone(),
            kube: KubeOptions {
                namespace: cli.kube_namespace.clone(),
                gateway_port: cli.port,
                ..KubeOptions::default()
            },
        },
    )
    .await?;

    let modules = Arc::new(ModuleRegistry::new());
    let admin = Arc::new(LocalAdmin::new(cli.max_projects, cli.internal_token.clone()));

    let manager = Manager::new(
        ManagerConfig {
            node_id,
            cluster_id: cli.cluster_id.clone(),
            advertise_addr,
            runner_addr: cli.runner_addr.clone(),
            store_type: cli.store_type,
            config_path: cli.config_path.clone(),
            join_policy: ReconnectPolicy::join(),
        },
        store,
        admin,
        modules.clone(),
        health,
    )?;
    manager.start(initial, cli.port).await?;

    info!(
        "✅ Synchronization manager running ({} store, {} nodes)",
        cli.store_type,
        manager.get_nodes_in_cluster().await
    );

    let app = router::build_router(AppState::new(manager, modules));
    let listener = server_utils::create_listener(cli.port).await?;

    axum::serve(listener, app).with_graceful_shutdown(server_utils::shutdown_signal()).await?;

    info!("👋 Syncman stopped");
    Ok(())
}
