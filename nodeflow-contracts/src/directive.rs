//! Load directives and the decision engine.

use crate::models::TelemetryReading;
use serde::{Deserialize, Serialize};
use std::fmt;

const CPU_HIGH: f64 = 80.0;
const MEMORY_HIGH: f64 = 80.0;
const STORAGE_HIGH: f64 = 90.0;
const CPU_LOW: f64 = 30.0;

/// Instruction for a node's next round.
///
/// `Offline` is never produced by the kernel; agent hosts synthesize it when
/// the exchange itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    ReduceLoad,
    IncreaseLoad,
    Stable,
    Offline,
}

impl Directive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::ReduceLoad => "reduce_load",
            Directive::IncreaseLoad => "increase_load",
            Directive::Stable => "stable",
            Directive::Offline => "offline",
        }
    }

    /// Parallel chunks a node pushes in the round following this directive.
    pub fn chunks_per_round(&self) -> u32 {
        match self {
            Directive::ReduceLoad => 1,
            Directive::Stable => 2,
            Directive::IncreaseLoad | Directive::Offline => 3,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kernel -> node reply body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveReply {
    pub action: Directive,
}

/// Pick the directive for a reading. First matching rule wins:
/// overload on any resource, then idle cpu, then stable.
///
/// Thresholds are strict, and NaN fails every comparison so it lands on `Stable`.
pub fn decide(reading: &TelemetryReading) -> Directive {
    if reading.cpu_percent > CPU_HIGH
        || reading.memory_percent > MEMORY_HIGH
        || reading.storage_percent > STORAGE_HIGH
    {
        Directive::ReduceLoad
    } else if reading.cpu_percent < CPU_LOW {
        Directive::IncreaseLoad
    } else {
        Directive::Stable
    }
}
