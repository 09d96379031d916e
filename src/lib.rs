//! testrig - Concurrent test execution engine
//!
//! Runs registered test descriptors on a bounded worker pool while honoring
//! mutual-exclusion constraint keys, shared fixture scopes, one-time class
//! hooks, timeouts and retries.
//!
//! ## Features
//!
//! - Deterministic identity keys with duplicate detection before execution
//! - All-or-nothing constraint key reservation with FIFO tie-break
//! - Fixtures shared globally, per class or per key, constructed exactly once
//! - One-time class setup/cleanup with live-unit reference counting
//! - Cooperative timeouts with hang detection, retries and repetitions
//! - Result sinks for logs, console tables and JSON files
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use testrig::{Descriptor, EngineConfig, LogSink, Scheduler};
//!
//! # async fn example() -> Result<(), testrig::EngineError> {
//! let tests = vec![
//!     Descriptor::new("suite::Db", "writes", |_ctx| async { Ok(()) })
//!         .with_constraint_key("db")
//!         .with_timeout(Duration::from_secs(5)),
//!     Descriptor::new("suite::Db", "reads", |_ctx| async { Ok(()) })
//!         .with_constraint_key("db")
//!         .with_retries(2),
//! ];
//!
//! let config = EngineConfig::new().with_workers(4);
//! config.init_logging();
//!
//! let summary = Scheduler::new(config)
//!     .with_sink(Arc::new(LogSink))
//!     .run(tests)
//!     .await?;
//! std::process::exit(summary.exit_code());
//! # }
//! ```

pub mod config;
pub mod constraints;
pub mod error;
pub mod executor;
pub mod fixtures;
pub mod identity;
pub mod lifecycle;
pub mod models;
pub mod output;
pub mod utils;

pub use config::EngineConfig;
pub use error::{EngineError, FixtureError};
pub use executor::{CancelSignal, ClassContext, Scheduler, Skip, TestContext};
pub use fixtures::{Fixture, FixtureStore, Sharing};
pub use identity::IdentityKey;
pub use models::{Descriptor, Outcome, RunSummary, UnitReport};
pub use output::{CollectingSink, ConsoleSink, JsonFileSink, LogSink, ResultSink};
