//! Data models for the execution engine
//!
//! Descriptors flow in, run contexts and summaries flow out.

mod descriptor;
mod run_context;
mod summary;

pub use descriptor::{ArgumentSource, ClassHook, Descriptor, Hook, OpFuture, TestHook};
pub use run_context::{FailureDetail, FailureKind, Outcome, RunContext, UnitReport};
pub use summary::{RunLevelFailure, RunSummary};
