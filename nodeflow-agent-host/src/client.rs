//! Node side of the kernel exchange
//!
//! A `NodeClient` owns one node's telemetry source and liveness state. Each
//! call to `send_report` is a fresh connection: connect, write one report
//! frame, read one directive frame. Only a complete exchange counts as
//! success; anything else yields `Directive::Offline` for that round and
//! leaves the liveness state alone.

use crate::metrics::ResourceCounters;
use nodeflow_contracts::{
    read_frame, write_frame, Directive, DirectiveReply, FileDescriptor, FrameError, FrameLimits, NodeReport,
    TelemetryReading,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("cannot reach kernel at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no connection to kernel at {addr} within {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("kernel answered with {0}, which only nodes may use")]
    UnexpectedDirective(Directive),
}

/// Liveness bookkeeping of one node, shared with the fault detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientState {
    pub active: bool,
    pub last_successful_send: Instant,
    pub last_directive: Option<Directive>,
}

pub struct NodeClient {
    node_id: String,
    counters: Arc<dyn ResourceCounters>,
    coordinator: String,
    limits: FrameLimits,
    state: Mutex<ClientState>,
}

impl NodeClient {
    /// A new client counts as active and freshly heard from.
    pub fn new(
        node_id: impl Into<String>,
        counters: Arc<dyn ResourceCounters>,
        coordinator: impl Into<String>,
        limits: FrameLimits,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            counters,
            coordinator: coordinator.into(),
            limits,
            state: Mutex::new(ClientState {
                active: true,
                last_successful_send: Instant::now(),
                last_directive: None,
            }),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn coordinator(&self) -> &str {
        &self.coordinator
    }

    pub fn telemetry(&self) -> TelemetryReading {
        self.counters.reading()
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Run one exchange with the kernel.
    ///
    /// Never fails: an unreachable or misbehaving kernel comes back as
    /// `Directive::Offline`.
    pub async fn send_report(&self, file: Option<FileDescriptor>) -> Directive {
        let report = NodeReport {
            node_id: self.node_id.clone(),
            telemetry: self.telemetry(),
            file_descriptor: file,
        };

        match self.exchange(&report).await {
            Ok(directive) => {
                self.record_success(directive, Instant::now());
                debug!(node_id = %self.node_id, %directive, "kernel answered");
                directive
            }
            Err(e) => {
                warn!(node_id = %self.node_id, error = %e, "exchange with kernel failed");
                Directive::Offline
            }
        }
    }

    async fn exchange(&self, report: &NodeReport) -> Result<Directive, ExchangeError> {
        let mut stream = match timeout(self.limits.io_timeout, TcpStream::connect(&self.coordinator)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ExchangeError::Connect {
                    addr: self.coordinator.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ExchangeError::ConnectTimeout {
                    addr: self.coordinator.clone(),
                    timeout: self.limits.io_timeout,
                })
            }
        };

        let (reader, mut writer) = stream.split();
        write_frame(&mut writer, report, &self.limits).await?;

        let mut reader = BufReader::new(reader);
        let reply: DirectiveReply = read_frame(&mut reader, &self.limits).await?;
        match reply.action {
            Directive::Offline => Err(ExchangeError::UnexpectedDirective(Directive::Offline)),
            action => Ok(action),
        }
    }

    pub(crate) fn record_success(&self, directive: Directive, at: Instant) {
        let mut state = self.state.lock();
        state.active = true;
        state.last_successful_send = at;
        state.last_directive = Some(directive);
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut ClientState) -> R) -> R {
        f(&mut self.state.lock())
    }
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient")
            .field("node_id", &self.node_id)
            .field("coordinator", &self.coordinator)
            .field("state", &self.state())
            .finish()
    }
}
