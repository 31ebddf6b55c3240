use clap::{Parser, Subcommand};
use std::path::PathBuf;

use syncman_core::StoreType;

#[derive(Parser, Debug)]
#[command(
    name = "syncman",
    about = "Syncman - gateway cluster config synchronization",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Node id; defaults to the hostname
    #[arg(long, env = "NODE_ID")]
    pub node_id: Option<String>,

    #[arg(long, env = "CLUSTER_ID", default_value = "default")]
    pub cluster_id: String,

    /// Address peers use to reach this node; defaults to `<hostname>:<port>`
    #[arg(long, env = "ADVERTISE_ADDR")]
    pub advertise_addr: Option<String>,

    #[arg(long, env = "STORE_TYPE", default_value = "none", help = "none | etcd | consul | kube")]
    pub store_type: StoreType,

    /// Workload runner; projects are not provisioned on a runner when unset
    #[arg(long, env = "RUNNER_ADDR")]
    pub runner_addr: Option<String>,

    #[arg(short, long = "config", env = "CONFIG", default_value = "config.json")]
    pub config_path: PathBuf,

    #[arg(short, long, env = "PORT", default_value = "4122")]
    pub port: u16,

    /// Upper bound on the number of projects this cluster accepts
    #[arg(long, env = "MAX_PROJECTS")]
    pub max_projects: Option<usize>,

    /// Token presented to the runner; a random one is generated when unset
    #[arg(long, env = "INTERNAL_TOKEN", hide_env_values = true)]
    pub internal_token: Option<String>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "KUBE_NAMESPACE", default_value = "space-cloud")]
    pub kube_namespace: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Start the sync daemon (default if no command specified)")]
    Serve,

    #[command(about = "Show health and cluster membership of a running node")]
    Status {
        #[arg(long, default_value = "http://127.0.0.1:4122", help = "Base URL of the node")]
        url: String,

        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },
}

impl Cli {
    pub fn resolved_node_id(&self) -> String {
        self.node_id.clone().filter(|id| !id.trim().is_empty()).unwrap_or_else(local_hostname)
    }

    pub fn resolved_advertise_addr(&self) -> String {
        self.advertise_addr
            .clone()
            .filter(|addr| !addr.trim().is_empty())
            .unwrap_or_else(|| format!("{}:{}", local_hostname(), self.port))
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
