//! Agent host configuration
//!
//! Handles:
//! - kernel address (overridable with NODEFLOW_HOST / NODEFLOW_PORT)
//! - network deadlines and frame size
//! - reporting cadence and synthetic file sizes
//! - fault timeout and dashboard refresh
//! - the simulated nodes to run

use anyhow::{bail, Context, Result};
use nodeflow_contracts::FrameLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_PATH_VAR: &str = "NODEFLOW_AGENT_CONFIG";
pub const HOST_VAR: &str = "NODEFLOW_HOST";
pub const PORT_VAR: &str = "NODEFLOW_PORT";

const BYTES_PER_MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub coordinator: CoordinatorConfig,
    pub limits: LimitsConfig,
    pub reporting: ReportingConfig,
    pub fault: FaultConfig,
    pub dashboard: DashboardConfig,
    pub nodes: Vec<NodeConf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub io_timeout_ms: u64,
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    pub file_size_min_mib: u64,
    pub file_size_max_mib: u64,
    pub activity_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub interval_ms: u64,
}

/// One simulated storage node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConf {
    pub node_id: String,
    pub cpu_cores: f64,
    pub memory_gb: f64,
    pub storage_gb: f64,
    pub bandwidth_mbps: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            limits: LimitsConfig::default(),
            reporting: ReportingConfig::default(),
            fault: FaultConfig::default(),
            dashboard: DashboardConfig::default(),
            nodes: default_nodes(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            io_timeout_ms: 5_000,
            max_frame_bytes: 64 * 1024,
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            jitter_min_ms: 1_000,
            jitter_max_ms: 3_000,
            file_size_min_mib: 50,
            file_size_max_mib: 200,
            activity_interval_ms: 1_000,
        }
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { interval_ms: 2_000 }
    }
}

fn default_nodes() -> Vec<NodeConf> {
    vec![
        NodeConf {
            node_id: "node1".to_string(),
            cpu_cores: 4.0,
            memory_gb: 16.0,
            storage_gb: 500.0,
            bandwidth_mbps: 1000.0,
        },
        NodeConf {
            node_id: "node2".to_string(),
            cpu_cores: 8.0,
            memory_gb: 32.0,
            storage_gb: 1000.0,
            bandwidth_mbps: 2000.0,
        },
    ]
}

impl AgentConfig {
    pub fn coordinator_addr(&self) -> String {
        format!("{}:{}", self.coordinator.host, self.coordinator.port)
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_frame_bytes: self.limits.max_frame_bytes,
            io_timeout: Duration::from_millis(self.limits.io_timeout_ms),
        }
    }

    /// Delay between two rounds, as an inclusive (min, max) pair.
    pub fn jitter(&self) -> (Duration, Duration) {
        let min = self.reporting.jitter_min_ms;
        let max = self.reporting.jitter_max_ms.max(min);
        (Duration::from_millis(min), Duration::from_millis(max))
    }

    /// Synthetic file size bounds in bytes, inclusive.
    pub fn file_size_bytes(&self) -> (u64, u64) {
        let min = self.reporting.file_size_min_mib;
        let max = self.reporting.file_size_max_mib.max(min);
        (min * BYTES_PER_MIB, max * BYTES_PER_MIB)
    }

    pub fn activity_interval(&self) -> Duration {
        Duration::from_millis(self.reporting.activity_interval_ms.max(1))
    }

    pub fn fault_timeout(&self) -> Duration {
        Duration::from_millis(self.fault.timeout_ms)
    }

    pub fn dashboard_interval(&self) -> Duration {
        Duration::from_millis(self.dashboard.interval_ms.max(1))
    }

    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<String>) {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.coordinator.host = host.trim().to_string();
        }
        if let Some(port) = port {
            match port.trim().parse::<u16>() {
                Ok(p) => self.coordinator.port = p,
                Err(e) => warn!(value = %port, error = %e, "ignoring invalid {PORT_VAR}"),
            }
        }
    }

    pub fn parse(txt: &str) -> Result<Self> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(txt).context("invalid agent config")?;
        config.validate()?;
        Ok(config)
    }

    /// Capacities must be finite and not negative. Zero is allowed and reads as 0%.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            for (name, value) in [
                ("cpu_cores", node.cpu_cores),
                ("memory_gb", node.memory_gb),
                ("storage_gb", node.storage_gb),
                ("bandwidth_mbps", node.bandwidth_mbps),
            ] {
                if !value.is_finite() || value < 0.0 {
                    bail!("node {}: {name} must be a finite, non-negative number (got {value})", node.node_id);
                }
            }
        }
        Ok(())
    }

    /// Load from `$NODEFLOW_AGENT_CONFIG` (default `agent.yaml`), falling back
    /// to defaults when the file is absent, then apply environment overrides.
    pub async fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "agent.yaml".into());
        let mut config = Self::load_file(&path).await?;
        config.apply_overrides(std::env::var(HOST_VAR).ok(), std::env::var(PORT_VAR).ok());
        Ok(config)
    }

    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no agent config file, using defaults");
            return Ok(Self::default());
        }
        let txt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&txt).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.coordinator_addr(), "127.0.0.1:9000");
        assert_eq!(config.jitter(), (Duration::from_secs(1), Duration::from_secs(3)));
        assert_eq!(config.file_size_bytes(), (50 * BYTES_PER_MIB, 200 * BYTES_PER_MIB));
        assert_eq!(config.fault_timeout(), Duration::from_secs(5));
        assert_eq!(config.dashboard_interval(), Duration::from_secs(2));
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[1].storage_gb, 1000.0);
    }

    #[test]
    fn test_partial_yaml() {
        let config = AgentConfig::parse("coordinator:\n  port: 9300\nfault:\n  timeout_ms: 800\n").unwrap();
        assert_eq!(config.coordinator_addr(), "127.0.0.1:9300");
        assert_eq!(config.fault_timeout(), Duration::from_millis(800));
        assert_eq!(config.nodes.len(), 2, "nodes default when omitted");

        let custom = AgentConfig::parse(
            "nodes:\n  - node_id: edge\n    cpu_cores: 2\n    memory_gb: 4\n    storage_gb: 64\n    bandwidth_mbps: 100\n",
        )
        .unwrap();
        assert_eq!(custom.nodes.len(), 1);
        assert_eq!(custom.nodes[0].node_id, "edge");
    }

    #[test]
    fn test_unusable_capacities_are_rejected() {
        let node = |field: &str, value: &str| {
            let mut yaml = String::from("nodes:\n  - node_id: edge\n");
            for (name, default) in [("cpu_cores", "2"), ("memory_gb", "4"), ("storage_gb", "64"), ("bandwidth_mbps", "100")] {
                let v = if name == field { value } else { default };
                yaml.push_str(&format!("    {name}: {v}\n"));
            }
            yaml
        };

        for (field, value) in [
            ("storage_gb", "-1"),
            ("storage_gb", ".nan"),
            ("cpu_cores", ".inf"),
            ("memory_gb", "-.inf"),
            ("bandwidth_mbps", "-5"),
        ] {
            let err = AgentConfig::parse(&node(field, value)).unwrap_err();
            assert!(err.to_string().contains(field), "{field}={value}: {err}");
        }

        let zero = AgentConfig::parse(&node("storage_gb", "0")).unwrap();
        assert_eq!(zero.nodes[0].storage_gb, 0.0);
    }

    #[test]
    fn test_inverted_ranges_are_flattened() {
        let mut config = AgentConfig::default();
        config.reporting.jitter_min_ms = 500;
        config.reporting.jitter_max_ms = 100;
        assert_eq!(config.jitter(), (Duration::from_millis(500), Duration::from_millis(500)));
    }

    #[test]
    fn test_overrides() {
        let mut config = AgentConfig::default();
        config.apply_overrides(Some("10.1.1.1".into()), Some("70000".into()));
        assert_eq!(config.coordinator_addr(), "10.1.1.1:9000");
    }

    #[tokio::test]
    async fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dashboard:\n  interval_ms: 250").unwrap();
        let config = AgentConfig::load_file(file.path()).await.unwrap();
        assert_eq!(config.dashboard_interval(), Duration::from_millis(250));

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        writeln!(broken, "nodes: 12").unwrap();
        assert!(AgentConfig::load_file(broken.path()).await.is_err());

        let missing = AgentConfig::load_file("/nonexistent/agent.yaml").await.unwrap();
        assert_eq!(missing, AgentConfig::default());
    }
}
