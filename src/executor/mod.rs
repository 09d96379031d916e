//! Test execution engine
//!
//! Planning, scheduling and the per-attempt context handed to user code.

mod cancel;
mod context;
pub mod plan;
mod scheduler;
pub(crate) mod timeout;

pub use cancel::CancelSignal;
pub use context::{ClassContext, Skip, TestContext};
pub use plan::{PlannedUnit, TestPlan};
pub use scheduler::Scheduler;
