//! Result sinks
//!
//! A sink sees every terminal unit in completion order, then the run summary
//! once. Sinks cannot fail a run: `run_finished` errors are logged and
//! otherwise ignored.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{OutputFormat, ResultFormatter};
use crate::models::{Outcome, RunSummary, UnitReport};

/// Receiver of run results
pub trait ResultSink: Send + Sync {
    fn unit_finished(&self, report: &UnitReport);

    fn run_finished(&self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

/// Reports through `tracing`
#[derive(Debug, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn unit_finished(&self, report: &UnitReport) {
        match report.outcome {
            Outcome::Passed | Outcome::Skipped | Outcome::NotExecuted => info!("{}", report),
            Outcome::Failed | Outcome::Cancelled => warn!("{}", report),
        }
    }

    fn run_finished(&self, summary: &RunSummary) -> Result<()> {
        info!(
            "Run {} complete: {}/{} passed, {} failed, {} cancelled, {} skipped, {} not executed",
            summary.run_id,
            summary.passed,
            summary.total,
            summary.failed,
            summary.cancelled,
            summary.skipped,
            summary.not_executed
        );
        for failure in &summary.run_failures {
            warn!("{}: {}", failure.owner, failure.detail);
        }
        Ok(())
    }
}

/// Prints to stdout through a [`ResultFormatter`]
pub struct ConsoleSink {
    formatter: ResultFormatter,
    per_unit: bool,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            formatter: ResultFormatter::new(format),
            per_unit: matches!(format, OutputFormat::Table | OutputFormat::Summary),
        }
    }

    pub fn no_color(mut self) -> Self {
        self.formatter = self.formatter.no_color();
        self
    }
}

impl ResultSink for ConsoleSink {
    fn unit_finished(&self, report: &UnitReport) {
        if self.per_unit {
            println!("{}", self.formatter.format_unit(report));
        }
    }

    fn run_finished(&self, summary: &RunSummary) -> Result<()> {
        println!("{}", self.formatter.format_summary(summary));
        Ok(())
    }
}

/// Writes each run summary as `<run_id>.json` into a directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    base_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Under the platform data directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("testrig")
            .join("runs");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(format!("{run_id}.json"))
    }

    pub fn save(&self, summary: &RunSummary) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create directory: {}", self.base_dir.display())
        })?;

        let path = self.run_path(&summary.run_id);
        let file = File::create(&path).context("Failed to create results file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), summary)
            .context("Failed to write results")?;

        info!("Saved run results to {}", path.display());
        Ok(path)
    }

    pub fn load(&self, run_id: &str) -> Result<RunSummary> {
        let file = File::open(self.run_path(run_id)).context("Failed to open results file")?;
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse results")
    }
}

impl ResultSink for JsonFileSink {
    fn unit_finished(&self, _report: &UnitReport) {}

    fn run_finished(&self, summary: &RunSummary) -> Result<()> {
        self.save(summary).map(|_| ())
    }
}

/// Keeps everything in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    units: Mutex<Vec<UnitReport>>,
    summary: Mutex<Option<RunSummary>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units in the order they finished
    pub fn units(&self) -> Vec<UnitReport> {
        self.units.lock().clone()
    }

    pub fn summary(&self) -> Option<RunSummary> {
        self.summary.lock().clone()
    }
}

impl ResultSink for CollectingSink {
    fn unit_finished(&self, report: &UnitReport) {
        self.units.lock().push(report.clone());
    }

    fn run_finished(&self, summary: &RunSummary) -> Result<()> {
        *self.summary.lock() = Some(summary.clone());
        Ok(())
    }
}
