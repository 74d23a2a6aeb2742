use crate::config::HealthConf;
use crate::registry::NodeRegistry;
use crate::state::{wait_for_shutdown, Shutdown};
use nodeflow_contracts::Directive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::task::{self, JoinHandle};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub nodes_tracked: usize,
    pub stale_nodes: usize,
    pub reports_accepted: u64,
    pub exchanges_failed: u64,
    pub directives: DirectiveCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectiveCounts {
    pub reduce_load: u64,
    pub increase_load: u64,
    pub stable: u64,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    exchanges_failed: AtomicU64,
    reduce_load: AtomicU64,
    increase_load: AtomicU64,
    stable: AtomicU64,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// One accepted report, answered with `directive`.
    pub fn record_directive(&self, directive: Directive) {
        let counter = match directive {
            Directive::ReduceLoad => &self.counters.reduce_load,
            Directive::IncreaseLoad => &self.counters.increase_load,
            Directive::Stable => &self.counters.stable,
            // the kernel never answers offline
            Directive::Offline => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_exchange(&self) {
        self.counters.exchanges_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_health(&self, registry: &NodeRegistry, stale_after: Duration) -> KernelHealth {
        let directives = DirectiveCounts {
            reduce_load: self.counters.reduce_load.load(Ordering::Relaxed),
            increase_load: self.counters.increase_load.load(Ordering::Relaxed),
            stable: self.counters.stable.load(Ordering::Relaxed),
        };
        let stale_after = time::Duration::try_from(stale_after).unwrap_or(time::Duration::MAX);

        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            nodes_tracked: registry.len(),
            stale_nodes: registry.count_stale(OffsetDateTime::now_utc(), stale_after),
            reports_accepted: directives.reduce_load + directives.increase_load + directives.stable,
            exchanges_failed: self.counters.exchanges_failed.load(Ordering::Relaxed),
            directives,
        }
    }

    /// Log a health summary on a fixed interval until shutdown.
    pub fn spawn_health_reporter(&self, registry: NodeRegistry, conf: &HealthConf, mut shutdown: Shutdown) -> JoinHandle<()> {
        let tracker = self.clone();
        let period = Duration::from_secs(conf.interval_secs.max(1));
        let stale_after = Duration::from_secs(conf.stale_after_secs);

        task::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // first tick fires immediately, nothing to say yet
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let health = tracker.get_health(&registry, stale_after);
                        info!(
                            uptime_s = health.uptime_seconds,
                            nodes = health.nodes_tracked,
                            stale = health.stale_nodes,
                            accepted = health.reports_accepted,
                            failed = health.exchanges_failed,
                            reduce_load = health.directives.reduce_load,
                            increase_load = health.directives.increase_load,
                            stable = health.directives.stable,
                            "kernel health"
                        );
                    }
                    _ = wait_for_shutdown(&mut shutdown) => break,
                }
            }
        })
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
