//! Output module
//!
//! Formatting of unit reports and run summaries, and the sinks that receive
//! them.

mod formatter;
mod sink;

pub use formatter::{OutputFormat, ResultFormatter};
pub use sink::{CollectingSink, ConsoleSink, JsonFileSink, LogSink, ResultSink};
