/*!
# NodeFlow DevKit - test harness and stubs

Helpers for exercising the kernel and the agent host without a deployment:
- an in-process kernel on an ephemeral port
- a scripted stub kernel that records what nodes send
- fixed telemetry sources and report builders
*/

pub mod fixtures;
pub mod kernel_stub;
pub mod test_utils;

pub use fixtures::{FixedCounters, ReportBuilder};
pub use kernel_stub::{StubKernel, StubReply};
pub use test_utils::{init_tracing, wait_until, TestHarness};
