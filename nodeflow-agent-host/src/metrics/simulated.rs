//! In-process stand-in for a storage node
//!
//! Fixed capacities, with usage that moves around on every activity tick and
//! storage that fills as incoming files land. Good enough to drive the
//! control loop and the dashboard; not a model of a real node.

use super::{percent, ResourceCounters};
use crate::config::NodeConf;
use crate::shutdown::{wait_for_shutdown, Shutdown};
use nodeflow_contracts::TelemetryReading;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const MIB_PER_GB: f64 = 1024.0;
const MAX_TRANSFERS: usize = 4;

#[derive(Debug, Default, Clone, Copy)]
struct Usage {
    cpu_used: f64,
    memory_used: f64,
    storage_used: f64,
    active_transfers: usize,
}

#[derive(Debug)]
pub struct SimulatedStorageNode {
    node_id: String,
    cpu_cores: f64,
    memory_gb: f64,
    storage_gb: f64,
    bandwidth_mbps: f64,
    usage: Mutex<Usage>,
}

impl SimulatedStorageNode {
    pub fn new(node_id: impl Into<String>, cpu_cores: f64, memory_gb: f64, storage_gb: f64, bandwidth_mbps: f64) -> Self {
        Self {
            node_id: node_id.into(),
            cpu_cores,
            memory_gb,
            storage_gb,
            bandwidth_mbps,
            usage: Mutex::new(Usage::default()),
        }
    }

    pub fn from_conf(conf: &NodeConf) -> Self {
        Self::new(&conf.node_id, conf.cpu_cores, conf.memory_gb, conf.storage_gb, conf.bandwidth_mbps)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn bandwidth_mbps(&self) -> f64 {
        self.bandwidth_mbps
    }

    /// Store `size_mib` more data, never past the disk size.
    pub fn store(&self, size_mib: f64) {
        let mut usage = self.usage.lock();
        usage.storage_used = (usage.storage_used + size_mib / MIB_PER_GB).clamp(0.0, self.storage_gb.max(0.0));
    }

    /// One step of synthetic activity: new cpu/memory load, transfers
    /// starting or finishing, and possibly a file landing on disk.
    pub fn tick<R: Rng>(&self, rng: &mut R) {
        let landed_mib = {
            let mut usage = self.usage.lock();
            usage.cpu_used = up_to(rng, self.cpu_cores);
            usage.memory_used = up_to(rng, self.memory_gb);

            let finished = usage.active_transfers > 0 && rng.gen_bool(0.5);
            if finished {
                usage.active_transfers -= 1;
            }
            if usage.active_transfers < MAX_TRANSFERS && rng.gen_bool(0.5) {
                usage.active_transfers += 1;
            }
            finished.then(|| rng.gen_range(50.0..=200.0))
        };

        if let Some(mib) = landed_mib {
            self.store(mib);
            debug!(node_id = %self.node_id, mib, "transfer finished");
        }
    }
}

/// Uniform draw in `[0, capacity]`; 0 when the capacity is not a usable bound.
fn up_to<R: Rng>(rng: &mut R, capacity: f64) -> f64 {
    if capacity.is_finite() && capacity > 0.0 {
        rng.gen_range(0.0..=capacity)
    } else {
        0.0
    }
}

impl ResourceCounters for SimulatedStorageNode {
    fn cpu_used(&self) -> f64 {
        self.usage.lock().cpu_used
    }
    fn cpu_capacity(&self) -> f64 {
        self.cpu_cores
    }
    fn memory_used(&self) -> f64 {
        self.usage.lock().memory_used
    }
    fn memory_capacity(&self) -> f64 {
        self.memory_gb
    }
    fn storage_used(&self) -> f64 {
        self.usage.lock().storage_used
    }
    fn storage_total(&self) -> f64 {
        self.storage_gb
    }
    fn active_transfers(&self) -> usize {
        self.usage.lock().active_transfers
    }

    fn reading(&self) -> TelemetryReading {
        let usage = *self.usage.lock();
        TelemetryReading {
            cpu_percent: percent(usage.cpu_used, self.cpu_cores),
            memory_percent: percent(usage.memory_used, self.memory_gb),
            storage_percent: percent(usage.storage_used, self.storage_gb),
            active_transfers: usage.active_transfers as u64,
        }
    }
}

/// Drive `node.tick()` on a fixed period until shutdown.
pub fn spawn_activity(node: Arc<SimulatedStorageNode>, period: Duration, mut shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => node.tick(&mut rng),
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }
    })
}
