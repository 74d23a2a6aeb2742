//! Per-node reporting loop
//!
//! Every round: make up the metadata of the next file to push, send the
//! node's telemetry with it, and turn the answer into a chunk count. Then
//! sleep a random delay so nodes do not report in lockstep. Rounds do not
//! retry and do not depend on each other.

use crate::client::NodeClient;
use crate::shutdown::{wait_for_shutdown, Shutdown};
use chrono::Utc;
use nodeflow_contracts::{Directive, FileDescriptor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Result of one round, as seen by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub file: FileDescriptor,
    pub directive: Directive,
    pub chunks: u32,
}

pub struct Reporter {
    client: Arc<NodeClient>,
    jitter: (Duration, Duration),
    file_size: (u64, u64),
    rng: StdRng,
}

impl Reporter {
    /// `jitter` and `file_size` are inclusive (min, max) ranges.
    pub fn new(client: Arc<NodeClient>, jitter: (Duration, Duration), file_size: (u64, u64)) -> Self {
        Self {
            client,
            jitter,
            file_size,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn next_file(&mut self) -> FileDescriptor {
        let (min, max) = self.file_size;
        let size_bytes = if max > min { self.rng.gen_range(min..=max) } else { min };
        FileDescriptor {
            name: format!("data_{}.zip", Utc::now().timestamp()),
            size_bytes,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let (min, max) = self.jitter;
        if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        }
    }

    pub async fn run_round(&mut self) -> RoundOutcome {
        let file = self.next_file();
        let directive = self.client.send_report(Some(file.clone())).await;
        let chunks = directive.chunks_per_round();

        info!(
            node_id = %self.client.node_id(),
            file = %file.name,
            size_mib = file.size_bytes / BYTES_PER_MIB,
            %directive,
            chunks,
            "round complete"
        );
        RoundOutcome { file, directive, chunks }
    }

    /// Report until shutdown. A round in flight finishes (its I/O is bounded
    /// by the client's deadlines) before the signal is noticed.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        loop {
            self.run_round().await;

            let delay = self.next_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }
        info!(node_id = %self.client.node_id(), "reporting stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SimulatedStorageNode;
    use crate::shutdown::shutdown_channel;
    use nodeflow_contracts::FrameLimits;
    use tokio::net::TcpListener;

    async fn offline_client() -> Arc<NodeClient> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let node = Arc::new(SimulatedStorageNode::new("node1", 4.0, 16.0, 500.0, 1000.0));
        let limits = FrameLimits {
            max_frame_bytes: 4096,
            io_timeout: Duration::from_millis(200),
        };
        Arc::new(NodeClient::new("node1", node, addr, limits))
    }

    fn mib(n: u64) -> u64 {
        n * BYTES_PER_MIB
    }

    #[tokio::test]
    async fn test_random_ranges_are_respected() {
        let client = offline_client().await;
        let mut reporter = Reporter::new(
            client,
            (Duration::from_secs(1), Duration::from_secs(3)),
            (mib(50), mib(200)),
        )
        .with_seed(42);

        for _ in 0..200 {
            let delay = reporter.next_delay();
            assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3));

            let file = reporter.next_file();
            assert!(file.size_bytes >= mib(50) && file.size_bytes <= mib(200));
            assert!(file.name.starts_with("data_") && file.name.ends_with(".zip"));
        }
    }

    #[tokio::test]
    async fn test_degenerate_ranges() {
        let client = offline_client().await;
        let mut reporter = Reporter::new(client, (Duration::from_millis(5), Duration::ZERO), (mib(1), mib(1)));
        assert_eq!(reporter.next_delay(), Duration::from_millis(5));
        assert_eq!(reporter.next_file().size_bytes, mib(1));
    }

    #[tokio::test]
    async fn test_round_against_dead_kernel() {
        let client = offline_client().await;
        let before = client.state().last_successful_send;
        let mut reporter = Reporter::new(client.clone(), (Duration::ZERO, Duration::ZERO), (mib(50), mib(200)));

        let outcome = reporter.run_round().await;

        assert_eq!(outcome.directive, Directive::Offline);
        assert_eq!(outcome.chunks, 3);
        assert_eq!(client.state().last_successful_send, before);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let client = offline_client().await;
        let reporter = Reporter::new(client, (Duration::from_secs(30), Duration::from_secs(30)), (mib(1), mib(1)));
        let (stop, shutdown) = shutdown_channel();
        let handle = tokio::spawn(reporter.run(shutdown));

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("reporter ignored shutdown")
            .unwrap();
    }
}
