/*!
Fixtures for building telemetry and reports

`FixedCounters` is a telemetry source that always reads the same
percentages, so a test can pick which directive the kernel should answer.
`ReportBuilder` builds wire-level reports without going through a client.
*/

use nodeflow_agent_host::ResourceCounters;
use nodeflow_contracts::{FileDescriptor, NodeReport, TelemetryReading};
use parking_lot::Mutex;

/// Counters expressed directly as percentages (capacity 100 everywhere).
#[derive(Debug)]
pub struct FixedCounters {
    reading: Mutex<TelemetryReading>,
}

impl FixedCounters {
    pub fn new(cpu_percent: f64, memory_percent: f64, storage_percent: f64) -> Self {
        Self::with_transfers(cpu_percent, memory_percent, storage_percent, 0)
    }

    pub fn with_transfers(cpu_percent: f64, memory_percent: f64, storage_percent: f64, transfers: u64) -> Self {
        Self {
            reading: Mutex::new(TelemetryReading::new(cpu_percent, memory_percent, storage_percent, transfers)),
        }
    }

    /// Change what the next snapshot reads.
    pub fn set(&self, reading: TelemetryReading) {
        *self.reading.lock() = reading;
    }
}

impl ResourceCounters for FixedCounters {
    fn cpu_used(&self) -> f64 {
        self.reading.lock().cpu_percent
    }
    fn cpu_capacity(&self) -> f64 {
        100.0
    }
    fn memory_used(&self) -> f64 {
        self.reading.lock().memory_percent
    }
    fn memory_capacity(&self) -> f64 {
        100.0
    }
    fn storage_used(&self) -> f64 {
        self.reading.lock().storage_percent
    }
    fn storage_total(&self) -> f64 {
        100.0
    }
    fn active_transfers(&self) -> usize {
        self.reading.lock().active_transfers as usize
    }
}

/// Fluent builder for `NodeReport`.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    report: NodeReport,
}

impl ReportBuilder {
    pub fn new(node_id: &str) -> Self {
        Self {
            report: NodeReport::new(node_id, TelemetryReading::new(50.0, 50.0, 50.0, 0)),
        }
    }

    pub fn cpu(mut self, percent: f64) -> Self {
        self.report.telemetry.cpu_percent = percent;
        self
    }

    pub fn memory(mut self, percent: f64) -> Self {
        self.report.telemetry.memory_percent = percent;
        self
    }

    pub fn storage(mut self, percent: f64) -> Self {
        self.report.telemetry.storage_percent = percent;
        self
    }

    pub fn transfers(mut self, n: u64) -> Self {
        self.report.telemetry.active_transfers = n;
        self
    }

    pub fn file(mut self, name: &str, size_bytes: u64) -> Self {
        self.report.file_descriptor = Some(FileDescriptor {
            name: name.to_string(),
            size_bytes,
        });
        self
    }

    pub fn build(self) -> NodeReport {
        self.report
    }

    /// The report as one newline-terminated frame.
    pub fn to_line(&self) -> anyhow::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(&self.report)?;
        line.push(b'\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_agent_host::snapshot;

    #[test]
    fn test_fixed_counters_read_back_as_given() {
        let counters = FixedCounters::with_transfers(91.5, 20.0, 10.0, 2);
        assert_eq!(snapshot(&counters), TelemetryReading::new(91.5, 20.0, 10.0, 2));

        counters.set(TelemetryReading::new(1.0, 2.0, 3.0, 0));
        assert_eq!(snapshot(&counters).cpu_percent, 1.0);
    }

    #[test]
    fn test_report_line() {
        let line = ReportBuilder::new("node9").cpu(12.0).file("data_7.zip", 99).to_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));

        let value: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(value["node_id"], "node9");
        assert_eq!(value["telemetry"]["cpu_percent"], 12.0);
        assert_eq!(value["file_data"]["size"], 99);
    }
}
