//! Telemetry snapshots for storage nodes
//!
//! A node's resource accounting is opaque here: anything that can tell
//! used/capacity for cpu, memory and storage plus its number of active
//! transfers can be reported. `snapshot` turns those counters into the
//! percentages the kernel decides on.

pub mod simulated;

pub use simulated::SimulatedStorageNode;

use nodeflow_contracts::TelemetryReading;

/// Resource counters of one storage node.
///
/// Sources that do not track usage of a resource may leave the `*_used`
/// default, which reads as 0.
pub trait ResourceCounters: Send + Sync {
    fn cpu_used(&self) -> f64 {
        0.0
    }
    fn cpu_capacity(&self) -> f64;

    fn memory_used(&self) -> f64 {
        0.0
    }
    fn memory_capacity(&self) -> f64;

    fn storage_used(&self) -> f64 {
        0.0
    }
    fn storage_total(&self) -> f64;

    fn active_transfers(&self) -> usize {
        0
    }

    /// One coherent reading. Sources whose counters move together should
    /// override this and read them under a single lock.
    fn reading(&self) -> TelemetryReading {
        snapshot(self)
    }
}

/// `100 * used / capacity`, or 0 when there is no usable capacity.
pub fn percent(used: f64, capacity: f64) -> f64 {
    if capacity.is_finite() && capacity > 0.0 && used.is_finite() {
        100.0 * used / capacity
    } else {
        0.0
    }
}

/// Build the reading sent to the kernel. Pure: reads counters, changes nothing.
pub fn snapshot<C: ResourceCounters + ?Sized>(counters: &C) -> TelemetryReading {
    TelemetryReading {
        cpu_percent: percent(counters.cpu_used(), counters.cpu_capacity()),
        memory_percent: percent(counters.memory_used(), counters.memory_capacity()),
        storage_percent: percent(counters.storage_used(), counters.storage_total()),
        active_transfers: counters.active_transfers() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        cpu: (f64, f64),
        memory: (f64, f64),
        storage: (f64, f64),
        transfers: usize,
    }

    impl ResourceCounters for Fixed {
        fn cpu_used(&self) -> f64 {
            self.cpu.0
        }
        fn cpu_capacity(&self) -> f64 {
            self.cpu.1
        }
        fn memory_used(&self) -> f64 {
            self.memory.0
        }
        fn memory_capacity(&self) -> f64 {
            self.memory.1
        }
        fn storage_used(&self) -> f64 {
            self.storage.0
        }
        fn storage_total(&self) -> f64 {
            self.storage.1
        }
        fn active_transfers(&self) -> usize {
            self.transfers
        }
    }

    /// Only capacities known, nothing in use yet.
    struct Idle;

    impl ResourceCounters for Idle {
        fn cpu_capacity(&self) -> f64 {
            4.0
        }
        fn memory_capacity(&self) -> f64 {
            16.0
        }
        fn storage_total(&self) -> f64 {
            500.0
        }
    }

    #[test]
    fn test_snapshot_percentages() {
        let node = Fixed {
            cpu: (1.0, 4.0),
            memory: (12.0, 16.0),
            storage: (450.0, 500.0),
            transfers: 3,
        };
        let reading = snapshot(&node);
        assert_eq!(reading.cpu_percent, 25.0);
        assert_eq!(reading.memory_percent, 75.0);
        assert_eq!(reading.storage_percent, 90.0);
        assert_eq!(reading.active_transfers, 3);
    }

    #[test]
    fn test_missing_usage_reads_as_zero() {
        assert_eq!(snapshot(&Idle), TelemetryReading::new(0.0, 0.0, 0.0, 0));
    }

    #[test]
    fn test_zero_capacity_is_zero_percent() {
        let node = Fixed {
            cpu: (2.0, 0.0),
            memory: (1.0, f64::NAN),
            storage: (10.0, -1.0),
            transfers: 0,
        };
        assert_eq!(snapshot(&node), TelemetryReading::new(0.0, 0.0, 0.0, 0));
    }

    #[test]
    fn test_over_capacity_is_not_clamped() {
        assert_eq!(percent(6.0, 4.0), 150.0);
    }
}
