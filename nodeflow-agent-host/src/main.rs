//! NodeFlow Agent Host - simulated storage nodes
//!
//! Starts every configured node:
//! - synthetic resource activity
//! - a reporting loop against the kernel, one round per random delay from `reporting.jitter_*_ms`
//! - one shared dashboard with timeout-based fault detection
//!
//! Logs go to stderr so they do not tear up the dashboard on stdout.

use anyhow::{bail, Result};
use nodeflow_agent_host::metrics::simulated::spawn_activity;
use nodeflow_agent_host::{
    shutdown_channel, AgentConfig, Dashboard, FaultDetector, NodeClient, Reporter, SimulatedStorageNode,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    info!("NodeFlow agent host v{} starting", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::load().await?;
    if config.nodes.is_empty() {
        bail!("no nodes configured");
    }

    let coordinator = config.coordinator_addr();
    let (stop, shutdown) = shutdown_channel();
    let mut tasks = Vec::new();
    let mut clients = Vec::with_capacity(config.nodes.len());

    for conf in &config.nodes {
        let node = Arc::new(SimulatedStorageNode::from_conf(conf));
        tasks.push(spawn_activity(node.clone(), config.activity_interval(), shutdown.clone()));

        let client = Arc::new(NodeClient::new(&conf.node_id, node, coordinator.clone(), config.frame_limits()));
        clients.push(client.clone());

        let reporter = Reporter::new(client, config.jitter(), config.file_size_bytes());
        tasks.push(tokio::spawn(reporter.run(shutdown.clone())));
        info!(node_id = %conf.node_id, kernel = %coordinator, "node started");
    }

    let dashboard = Dashboard::new(clients, FaultDetector::new(config.fault_timeout()));
    tasks.push(tokio::spawn(dashboard.run(config.dashboard_interval(), std::io::stdout(), shutdown)));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    // receivers may already be gone
    let _ = stop.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "agent task ended abnormally");
        }
    }
    info!("agent host stopped");
    Ok(())
}
