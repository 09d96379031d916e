//! Shared utilities
//!
//! Logging setup, timing and panic containment helpers.

pub mod logger;
mod panic;
mod timer;

pub use logger::{init_logger, LogLevel};
pub use panic::{catch_panic, panic_message};
pub use timer::Timer;
