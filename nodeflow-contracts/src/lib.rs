//! NodeFlow contracts - what travels between agent hosts and the kernel
//!
//! - `models`: the report a node sends and the telemetry it carries
//! - `directive`: the load directive and the decision engine that picks it
//! - `framing`: newline-delimited JSON frames with size bounds and deadlines

pub mod directive;
pub mod error;
pub mod framing;
pub mod models;

pub use directive::{decide, Directive, DirectiveReply};
pub use error::FrameError;
pub use framing::{read_frame, write_frame, FrameLimits};
pub use models::{FileDescriptor, NodeReport, TelemetryReading};
