use nodeflow_contracts::FrameLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

pub const CONFIG_PATH_VAR: &str = "NODEFLOW_KERNEL_CONFIG";
pub const HOST_VAR: &str = "NODEFLOW_HOST";
pub const PORT_VAR: &str = "NODEFLOW_PORT";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: ListenConf,
    pub limits: LimitsConf,
    pub health: HealthConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ListenConf {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LimitsConf {
    pub max_connections: usize,
    pub io_timeout_ms: u64,
    pub max_frame_bytes: usize,
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HealthConf {
    pub interval_secs: u64,
    pub stale_after_secs: u64,
}

impl Default for ListenConf {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9000,
        }
    }
}

impl Default for LimitsConf {
    fn default() -> Self {
        Self {
            max_connections: 256,
            io_timeout_ms: 5_000,
            max_frame_bytes: 64 * 1024,
            shutdown_grace_ms: 2_000,
        }
    }
}

impl Default for HealthConf {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            stale_after_secs: 90,
        }
    }
}

impl KernelConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen.host, self.listen.port)
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_frame_bytes: self.limits.max_frame_bytes,
            io_timeout: Duration::from_millis(self.limits.io_timeout_ms),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.limits.shutdown_grace_ms)
    }

    /// Host/port given on the environment win over the file.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<String>) {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.listen.host = host.trim().to_string();
        }
        if let Some(port) = port {
            match port.trim().parse::<u16>() {
                Ok(p) => self.listen.port = p,
                Err(e) => warn!(value = %port, error = %e, "ignoring invalid {PORT_VAR}"),
            }
        }
    }
}

pub fn parse_config(txt: &str) -> Result<KernelConfig, serde_yaml::Error> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    serde_yaml::from_str(txt)
}

/// Load from `$NODEFLOW_KERNEL_CONFIG` (default `kernel.yaml`), then apply
/// environment overrides. A missing or broken file falls back to defaults.
pub async fn load_config() -> KernelConfig {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "kernel.yaml".into());
    let mut cfg = load_config_file(&path).await;
    cfg.apply_overrides(std::env::var(HOST_VAR).ok(), std::env::var(PORT_VAR).ok());
    cfg
}

pub async fn load_config_file(path: impl AsRef<Path>) -> KernelConfig {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "no kernel config file, using defaults");
        return KernelConfig::default();
    }
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "kernel config unreadable, using defaults");
            return KernelConfig::default();
        }
    };
    parse_config(&txt).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "kernel config invalid, using defaults");
        KernelConfig::default()
    })
}
