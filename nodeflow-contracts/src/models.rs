use serde::{Deserialize, Serialize};

/// Resource snapshot taken on a node right before a report.
///
/// Percentages are not clamped: a node over capacity reports more than 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub storage_percent: f64,
    pub active_transfers: u64,
}

impl TelemetryReading {
    pub fn new(cpu_percent: f64, memory_percent: f64, storage_percent: f64, active_transfers: u64) -> Self {
        Self {
            cpu_percent,
            memory_percent,
            storage_percent,
            active_transfers,
        }
    }
}

/// Metadata of the file a node is about to push this round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
}

/// One report per connection, node -> kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node_id: String,
    pub telemetry: TelemetryReading,
    #[serde(rename = "file_data", default, skip_serializing_if = "Option::is_none")]
    pub file_descriptor: Option<FileDescriptor>,
}

impl NodeReport {
    pub fn new(node_id: impl Into<String>, telemetry: TelemetryReading) -> Self {
        Self {
            node_id: node_id.into(),
            telemetry,
            file_descriptor: None,
        }
    }

    pub fn with_file(mut self, file: FileDescriptor) -> Self {
        self.file_descriptor = Some(file);
        self
    }
}
