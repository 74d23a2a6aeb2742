//! Kernel TCP server
//!
//! One connection carries one exchange: the node sends a report frame, the
//! kernel stores it, decides, answers with a directive frame and hangs up.
//! Handlers run as independent tasks; a semaphore caps how many run at once,
//! and the accept loop waits for a free slot before taking the next socket.
//!
//! Anything wrong with a connection (silence, garbage, oversized frame, peer
//! gone) only ends that connection. The accept loop survives everything but
//! the shutdown signal.

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::health::HealthTracker;
use crate::registry::NodeRegistry;
use crate::state::{wait_for_shutdown, Shutdown};
use nodeflow_contracts::{decide, read_frame, write_frame, Directive, DirectiveReply, FrameLimits, NodeReport};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Everything a connection handler needs, cheap to clone.
#[derive(Clone)]
pub struct ServerContext {
    pub registry: NodeRegistry,
    pub health: HealthTracker,
    pub limits: FrameLimits,
    pub max_connections: usize,
    pub shutdown_grace: Duration,
}

impl ServerContext {
    pub fn from_config(cfg: &KernelConfig, registry: NodeRegistry, health: HealthTracker) -> Self {
        Self {
            registry,
            health,
            limits: cfg.frame_limits(),
            max_connections: cfg.limits.max_connections,
            shutdown_grace: cfg.shutdown_grace(),
        }
    }
}

pub async fn bind(cfg: &KernelConfig) -> Result<TcpListener, KernelError> {
    let addr = cfg.listen_addr();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| KernelError::Bind { addr, source })
}

/// Accept until shutdown, then close the listener and give in-flight
/// handlers `shutdown_grace` to finish.
pub async fn serve(listener: TcpListener, ctx: ServerContext, mut shutdown: Shutdown) -> Result<(), KernelError> {
    let slots = ctx.max_connections.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize));
    let semaphore = Arc::new(Semaphore::new(slots));
    info!(addr = %listener.local_addr()?, max_connections = slots, "kernel listening");

    loop {
        let permit = tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let (stream, peer) = tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        let ctx = ctx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            handle_connection(stream, peer, &ctx).await;
        });
    }

    drop(listener);
    let in_flight = slots - semaphore.available_permits();
    info!(in_flight, "kernel stopped accepting");

    let drained = tokio::time::timeout(ctx.shutdown_grace, semaphore.acquire_many(slots as u32)).await;
    if drained.is_err() {
        warn!(grace = ?ctx.shutdown_grace, "handlers still running after grace period");
    }
    Ok(())
}

async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, ctx: &ServerContext) {
    match exchange(&mut stream, ctx).await {
        Ok(directive) => debug!(%peer, %directive, "exchange complete"),
        Err(KernelError::Frame(e)) if e.is_transport() => {
            ctx.health.record_failed_exchange();
            info!(%peer, error = %e, "peer gave up before a full exchange");
        }
        Err(e) => {
            ctx.health.record_failed_exchange();
            warn!(%peer, error = %e, "dropping connection without reply");
        }
    }
}

/// Serve one report on an accepted stream and return the directive sent back.
pub async fn exchange(stream: &mut TcpStream, ctx: &ServerContext) -> Result<Directive, KernelError> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    let report: NodeReport = read_frame(&mut reader, &ctx.limits).await?;
    let record = ctx.registry.upsert(report);
    let directive = decide(&record.telemetry);
    ctx.health.record_directive(directive);

    write_frame(&mut writer, &DirectiveReply { action: directive }, &ctx.limits).await?;
    debug!(
        node_id = %record.node_id,
        cpu = record.telemetry.cpu_percent,
        memory = record.telemetry.memory_percent,
        storage = record.telemetry.storage_percent,
        transfers = record.telemetry.active_transfers,
        file = record.last_file.as_ref().map(|f| f.name.as_str()).unwrap_or("-"),
        %directive,
        "report stored"
    );
    Ok(directive)
}
