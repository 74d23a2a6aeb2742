//! Terminal dashboard
//!
//! Every refresh runs the fault check on each node, then redraws one line
//! per node with its liveness status and a fresh telemetry snapshot.

use crate::client::NodeClient;
use crate::fault::{FaultDetector, NodeStatus};
use crate::shutdown::{wait_for_shutdown, Shutdown};
use nodeflow_contracts::TelemetryReading;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

const RULE_WIDTH: usize = 50;
const CLEAR_SCREEN: &str = "\x1b[H\x1b[J";

#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatusLine {
    pub node_id: String,
    pub status: NodeStatus,
    pub telemetry: TelemetryReading,
}

impl fmt::Display for NodeStatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | Status: {} | CPU: {:.2}% | Memory: {:.2}% | Storage: {:.2}% | Active Transfers: {}",
            self.node_id,
            self.status,
            self.telemetry.cpu_percent,
            self.telemetry.memory_percent,
            self.telemetry.storage_percent,
            self.telemetry.active_transfers
        )
    }
}

pub struct Dashboard {
    clients: Vec<Arc<NodeClient>>,
    detector: FaultDetector,
}

impl Dashboard {
    pub fn new(clients: Vec<Arc<NodeClient>>, detector: FaultDetector) -> Self {
        Self { clients, detector }
    }

    pub fn collect(&self) -> Vec<NodeStatusLine> {
        self.collect_at(Instant::now())
    }

    /// Fault-check every node at `now` and snapshot it, in configuration order.
    pub fn collect_at(&self, now: Instant) -> Vec<NodeStatusLine> {
        self.clients
            .iter()
            .map(|client| NodeStatusLine {
                node_id: client.node_id().to_string(),
                status: self.detector.check_at(client, now),
                telemetry: client.telemetry(),
            })
            .collect()
    }

    pub fn render(lines: &[NodeStatusLine]) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = format!("{rule}\nNETWORK DASHBOARD\n{rule}\n");
        for line in lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out.push_str(&rule);
        out.push('\n');
        out
    }

    /// Redraw on `out` every `period` until shutdown. A failing writer is
    /// logged and the loop goes on.
    pub async fn run<W: Write + Send>(self, period: Duration, mut out: W, mut shutdown: Shutdown) {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let frame = Self::render(&self.collect());
                    if let Err(e) = draw(&mut out, &frame) {
                        warn!(error = %e, "dashboard write failed");
                    }
                }
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }
    }
}

fn draw<W: Write>(out: &mut W, frame: &str) -> std::io::Result<()> {
    out.write_all(CLEAR_SCREEN.as_bytes())?;
    out.write_all(frame.as_bytes())?;
    out.flush()
}
