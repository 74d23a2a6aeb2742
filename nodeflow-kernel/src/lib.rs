//! NodeFlow kernel - central point every storage node reports to
//!
//! Nodes connect, push one telemetry report, and get back the load directive
//! for their next round. The kernel keeps the latest report of every node
//! and periodically logs its own health.

pub mod config;
pub mod error;
pub mod health;
pub mod registry;
pub mod server;
pub mod state;

pub use config::{load_config, KernelConfig};
pub use error::KernelError;
pub use health::{HealthTracker, KernelHealth};
pub use registry::{NodeRecord, NodeRegistry};
pub use server::{bind, serve, ServerContext};
pub use state::{shutdown_channel, Shutdown};
