/**
 * NODEFLOW KERNEL - process entry point
 *
 * Loads config (.env, kernel.yaml, NODEFLOW_HOST/NODEFLOW_PORT), starts the
 * health reporter and the TCP server, and stops both on Ctrl-C.
 */

use anyhow::{Context, Result};
use nodeflow_kernel::{bind, load_config, serve, shutdown_channel, HealthTracker, NodeRegistry, ServerContext};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("NodeFlow kernel v{} starting", env!("CARGO_PKG_VERSION"));

    let cfg = load_config().await;
    let registry = NodeRegistry::new();
    let health = HealthTracker::new();
    let (stop, shutdown) = shutdown_channel();

    let reporter = health.spawn_health_reporter(registry.clone(), &cfg.health, shutdown.clone());

    let listener = bind(&cfg)
        .await
        .with_context(|| format!("failed to start kernel on {}", cfg.listen_addr()))?;
    let ctx = ServerContext::from_config(&cfg, registry, health);
    let server = tokio::spawn(serve(listener, ctx, shutdown));

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("shutdown requested");
    // receivers may already be gone
    let _ = stop.send(true);

    server.await.context("server task panicked")??;
    reporter.await.ok();
    info!("kernel stopped");
    Ok(())
}
