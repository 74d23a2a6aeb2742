/*!
Test harness for NodeFlow

Starts a real kernel in-process on an ephemeral port and hands out agent
clients pointed at it, so a test drives the whole loop: telemetry snapshot,
framed exchange, registry update, decision, liveness state.
*/

use crate::fixtures::FixedCounters;
use anyhow::{Context, Result};
use nodeflow_agent_host::{NodeClient, ResourceCounters};
use nodeflow_contracts::{read_frame, write_frame, DirectiveReply, FrameLimits, NodeReport};
use nodeflow_kernel::{bind, serve, shutdown_channel, HealthTracker, KernelConfig, KernelError, NodeRegistry, ServerContext};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test writer. Safe to call many times.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init()
        .ok();
}

/// Poll `cond` every 10ms until it holds or `within` runs out.
pub async fn wait_until(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < within {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

pub struct TestHarness {
    pub addr: SocketAddr,
    pub registry: NodeRegistry,
    pub health: HealthTracker,
    limits: FrameLimits,
    stop: watch::Sender<bool>,
    server: JoinHandle<Result<(), KernelError>>,
}

impl TestHarness {
    /// Kernel with short deadlines, listening on 127.0.0.1 with a free port.
    pub async fn start() -> Result<Self> {
        let mut cfg = KernelConfig::default();
        cfg.listen.host = "127.0.0.1".to_string();
        cfg.listen.port = 0;
        cfg.limits.io_timeout_ms = 500;
        cfg.limits.shutdown_grace_ms = 500;
        Self::start_with(cfg).await
    }

    pub async fn start_with(cfg: KernelConfig) -> Result<Self> {
        init_tracing();

        let listener = bind(&cfg).await.context("test kernel failed to bind")?;
        let addr = listener.local_addr()?;
        let registry = NodeRegistry::new();
        let health = HealthTracker::new();
        let ctx = ServerContext::from_config(&cfg, registry.clone(), health.clone());
        let (stop, shutdown) = shutdown_channel();
        let server = tokio::spawn(serve(listener, ctx, shutdown));

        info!(%addr, "test kernel up");
        Ok(Self {
            addr,
            registry,
            health,
            limits: cfg.frame_limits(),
            stop,
            server,
        })
    }

    pub fn addr_string(&self) -> String {
        self.addr.to_string()
    }

    pub fn limits(&self) -> FrameLimits {
        self.limits
    }

    pub fn client(&self, node_id: &str, counters: Arc<dyn ResourceCounters>) -> NodeClient {
        NodeClient::new(node_id, counters, self.addr_string(), self.limits)
    }

    /// Client whose telemetry always reads the given percentages.
    pub fn fixed_client(&self, node_id: &str, cpu: f64, memory: f64, storage: f64) -> NodeClient {
        self.client(node_id, Arc::new(FixedCounters::new(cpu, memory, storage)))
    }

    /// Write `payload` as-is, half-close, and return whatever came back.
    pub async fn send_raw(&self, payload: &[u8]) -> Result<String> {
        let mut stream = TcpStream::connect(self.addr).await?;
        stream.write_all(payload).await?;
        // a kernel that already dropped us resets the socket: that is "no reply"
        let _ = stream.shutdown().await;
        let mut reply = String::new();
        let _ = stream.read_to_string(&mut reply).await;
        Ok(reply)
    }

    /// One protocol-level exchange, bypassing `NodeClient`.
    pub async fn send_report(&self, report: &NodeReport) -> Result<DirectiveReply> {
        let mut stream = TcpStream::connect(self.addr).await?;
        let (reader, mut writer) = stream.split();
        write_frame(&mut writer, report, &self.limits).await?;
        let mut reader = BufReader::new(reader);
        Ok(read_frame(&mut reader, &self.limits).await?)
    }

    /// Stop the kernel and wait for the server task to drain.
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop.send(true);
        self.server.await.context("server task panicked")??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ReportBuilder;
    use nodeflow_agent_host::{FaultDetector, NodeStatus, Reporter};
    use nodeflow_contracts::Directive;
    use std::time::Instant;

    #[tokio::test]
    async fn test_directive_follows_telemetry() {
        let harness = TestHarness::start().await.unwrap();

        let busy = harness.fixed_client("busy", 90.0, 50.0, 50.0);
        let idle = harness.fixed_client("idle", 10.0, 50.0, 50.0);
        let steady = harness.fixed_client("steady", 50.0, 50.0, 50.0);
        let full = harness.fixed_client("full", 50.0, 50.0, 95.0);

        assert_eq!(busy.send_report(None).await, Directive::ReduceLoad);
        assert_eq!(idle.send_report(None).await, Directive::IncreaseLoad);
        assert_eq!(steady.send_report(None).await, Directive::Stable);
        assert_eq!(full.send_report(None).await, Directive::ReduceLoad);

        assert_eq!(harness.registry.len(), 4);
        assert_eq!(busy.state().last_directive, Some(Directive::ReduceLoad));
        harness.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_reporter_round_end_to_end() {
        let harness = TestHarness::start().await.unwrap();
        let client = Arc::new(harness.fixed_client("node1", 10.0, 20.0, 30.0));
        let mut reporter = Reporter::new(client, (Duration::ZERO, Duration::ZERO), (50 << 20, 200 << 20));

        let outcome = reporter.run_round().await;

        assert_eq!(outcome.directive, Directive::IncreaseLoad);
        assert_eq!(outcome.chunks, 3);
        let record = harness.registry.get("node1").unwrap();
        assert_eq!(record.last_file, Some(outcome.file));
        harness.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_latest_report_wins() {
        let harness = TestHarness::start().await.unwrap();

        let first = ReportBuilder::new("node1").cpu(85.0).file("data_1.zip", 10).build();
        let reply = harness.send_report(&first).await.unwrap();
        assert_eq!(reply.action, Directive::ReduceLoad);

        let second = ReportBuilder::new("node1").cpu(20.0).build();
        let reply = harness.send_report(&second).await.unwrap();
        assert_eq!(reply.action, Directive::IncreaseLoad);

        let record = harness.registry.get("node1").unwrap();
        assert_eq!(record.telemetry, second.telemetry);
        assert_eq!(record.last_file, None, "reports replace, they do not merge");
        assert_eq!(harness.registry.len(), 1);
        harness.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_kernel_leaves_liveness_alone() {
        let harness = TestHarness::start().await.unwrap();
        let client = harness.fixed_client("node1", 50.0, 50.0, 50.0);
        harness.stop().await.unwrap();

        let before = client.state();
        assert_eq!(client.send_report(None).await, Directive::Offline);
        assert_eq!(client.state(), before);
    }

    #[tokio::test]
    async fn test_many_nodes_at_once() {
        let harness = TestHarness::start().await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..32 {
            let client = harness.fixed_client(&format!("node{i}"), (i * 3) as f64, 40.0, 40.0);
            tasks.push(tokio::spawn(async move { client.send_report(None).await }));
        }
        for task in tasks {
            assert_ne!(task.await.unwrap(), Directive::Offline);
        }

        assert_eq!(harness.registry.len(), 32);
        assert_eq!(harness.registry.get("node5").unwrap().telemetry.cpu_percent, 15.0);
        let health = harness.health.get_health(&harness.registry, Duration::from_secs(90));
        assert_eq!(health.reports_accepted, 32);
        harness.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_input_does_not_stop_the_kernel() {
        let harness = TestHarness::start().await.unwrap();

        assert_eq!(harness.send_raw(b"{\"node_id\": 7}\n").await.unwrap(), "");
        assert_eq!(harness.send_raw(b"\n").await.unwrap(), "");
        let oversized = vec![b'x'; harness.limits().max_frame_bytes + 10];
        assert_eq!(harness.send_raw(&oversized).await.unwrap(), "");

        let line = ReportBuilder::new("node1").cpu(50.0).to_line().unwrap();
        let reply = harness.send_raw(&line).await.unwrap();
        assert_eq!(reply.trim_end(), r#"{"action":"stable"}"#);

        let health = harness.health.get_health(&harness.registry, Duration::from_secs(90));
        assert_eq!(health.exchanges_failed, 3);
        assert_eq!(health.reports_accepted, 1);
        harness.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_node_goes_offline_then_recovers() {
        let harness = TestHarness::start().await.unwrap();
        let client = harness.fixed_client("node1", 50.0, 50.0, 50.0);
        let detector = FaultDetector::new(Duration::from_millis(200));

        assert_eq!(client.send_report(None).await, Directive::Stable);
        assert_eq!(detector.check(&client), NodeStatus::Active);

        let silent_for = client.state().last_successful_send + Duration::from_secs(1);
        assert_eq!(detector.check_at(&client, silent_for), NodeStatus::Offline);
        assert_eq!(detector.check(&client), NodeStatus::Offline, "the clock alone never revives");

        assert_eq!(client.send_report(None).await, Directive::Stable);
        assert_eq!(detector.check_at(&client, Instant::now()), NodeStatus::Active);
        harness.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_peer_does_not_block_others() {
        let harness = TestHarness::start().await.unwrap();
        let _idle = TcpStream::connect(harness.addr).await.unwrap();

        let client = harness.fixed_client("node1", 95.0, 10.0, 10.0);
        let reply = tokio::time::timeout(Duration::from_millis(400), client.send_report(None)).await;
        assert_eq!(reply.unwrap(), Directive::ReduceLoad);

        let health = harness.health.clone();
        let registry = harness.registry.clone();
        assert!(
            wait_until(Duration::from_secs(2), || {
                health.get_health(&registry, Duration::from_secs(90)).exchanges_failed == 1
            })
            .await,
            "idle connection should time out"
        );
        harness.stop().await.unwrap();
    }
}
