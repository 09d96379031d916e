//! Run summary model
//!
//! Aggregates unit reports into the counters handed to result sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::run_context::{FailureDetail, Outcome, UnitReport};

/// Failure reported against the run rather than a unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLevelFailure {
    /// Class, or fixture scope, the failure belongs to
    pub owner: String,
    pub detail: FailureDetail,
}

/// Summary of one engine run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub not_executed: usize,
    /// Wall-clock duration of the run
    pub total_duration_ms: u64,
    pub units: Vec<UnitReport>,
    /// One-time cleanup and fixture disposal failures
    pub run_failures: Vec<RunLevelFailure>,
}

impl RunSummary {
    pub fn new(
        started_at: DateTime<Utc>,
        units: Vec<UnitReport>,
        run_failures: Vec<RunLevelFailure>,
    ) -> Self {
        let count = |outcome: Outcome| units.iter().filter(|u| u.outcome == outcome).count();
        let completed_at = Utc::now();
        let total_duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;

        Self {
            run_id: generate_run_id(),
            started_at,
            completed_at,
            total: units.len(),
            passed: count(Outcome::Passed),
            failed: count(Outcome::Failed),
            cancelled: count(Outcome::Cancelled),
            skipped: count(Outcome::Skipped),
            not_executed: count(Outcome::NotExecuted),
            total_duration_ms,
            units,
            run_failures,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        let executed = self.total - self.not_executed;
        if executed == 0 {
            0.0
        } else {
            (self.passed as f64 / executed as f64) * 100.0
        }
    }

    /// No unit failed or was cancelled and no run-level failure was recorded
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0 && self.run_failures.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn unit(&self, identity: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.identity.as_str() == identity)
    }

    pub fn units_of<'a>(&'a self, method_name: &'a str) -> impl Iterator<Item = &'a UnitReport> {
        self.units.iter().filter(move |u| u.method_name == method_name)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.run_id)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for unit in &self.units {
            writeln!(f, "  {unit}")?;
        }
        for failure in &self.run_failures {
            writeln!(f, "  ! {}: {}", failure.owner, failure.detail)?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Cancelled: {} | Skip: {} | Not executed: {}",
            self.total, self.passed, self.failed, self.cancelled, self.skipped, self.not_executed
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.total_duration_ms
        )
    }
}

/// Generate unique run ID
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}
