//! NodeFlow agent host - the storage node side
//!
//! Runs one reporting loop per simulated node against the kernel, watches
//! node liveness with a timeout-based fault detector, and draws a small
//! terminal dashboard.

pub mod client;
pub mod config;
pub mod dashboard;
pub mod fault;
pub mod metrics;
pub mod reporter;
pub mod shutdown;

pub use client::{ClientState, ExchangeError, NodeClient};
pub use config::{AgentConfig, NodeConf};
pub use dashboard::{Dashboard, NodeStatusLine};
pub use fault::{check_fault, FaultDetector, NodeStatus};
pub use metrics::{snapshot, ResourceCounters, SimulatedStorageNode};
pub use reporter::{Reporter, RoundOutcome};
pub use shutdown::{shutdown_channel, wait_for_shutdown, Shutdown};
