//! Node registry - latest known state of every node that ever reported
//!
//! One record per node id, replaced whole on each report (last write wins,
//! nothing merged, no history). Records are never removed: a node that stops
//! reporting simply ages, and readers decide what "stale" means.

use crate::state::{new_state, Shared};
use nodeflow_contracts::{FileDescriptor, NodeReport, TelemetryReading};
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node_id: String,
    pub telemetry: TelemetryReading,
    pub last_seen: OffsetDateTime,
    pub last_file: Option<FileDescriptor>,
}

impl NodeRecord {
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.last_seen
    }

    pub fn is_stale(&self, now: OffsetDateTime, stale_after: Duration) -> bool {
        self.age(now) > stale_after
    }
}

pub type NodesMap = HashMap<String, NodeRecord>;

#[derive(Clone, Default)]
pub struct NodeRegistry {
    nodes: Shared<NodesMap>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: new_state(HashMap::new()),
        }
    }

    /// Store a report stamped with the current time. Returns the stored record.
    pub fn upsert(&self, report: NodeReport) -> NodeRecord {
        self.upsert_at(report, OffsetDateTime::now_utc())
    }

    pub fn upsert_at(&self, report: NodeReport, seen_at: OffsetDateTime) -> NodeRecord {
        let record = NodeRecord {
            node_id: report.node_id,
            telemetry: report.telemetry,
            last_seen: seen_at,
            last_file: report.file_descriptor,
        };
        self.nodes.lock().insert(record.node_id.clone(), record.clone());
        record
    }

    pub fn get(&self, node_id: &str) -> Option<NodeRecord> {
        self.nodes.lock().get(node_id).cloned()
    }

    pub fn snapshot(&self) -> NodesMap {
        self.nodes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_stale(&self, now: OffsetDateTime, stale_after: Duration) -> usize {
        self.nodes
            .lock()
            .values()
            .filter(|record| record.is_stale(now, stale_after))
            .count()
    }
}
