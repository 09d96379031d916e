//! Per-attempt execution records
//!
//! Defines outcomes, failure detail and the run context a worker fills in
//! while it owns a unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::identity::IdentityKey;

/// Terminal outcome of an attempt or unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Cancelled,
    Skipped,
    NotExecuted,
}

impl Outcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Passed => "✓",
            Outcome::Failed => "✗",
            Outcome::Cancelled => "⧗",
            Outcome::Skipped => "○",
            Outcome::NotExecuted => "-",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// Whether another attempt may change this outcome
    pub fn is_retryable(&self) -> bool {
        matches!(self, Outcome::Failed | Outcome::Cancelled)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "PASS"),
            Outcome::Failed => write!(f, "FAIL"),
            Outcome::Cancelled => write!(f, "CANCELLED"),
            Outcome::Skipped => write!(f, "SKIP"),
            Outcome::NotExecuted => write!(f, "NOT EXECUTED"),
        }
    }
}

/// Failure classification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SetupFailure,
    BodyFailure,
    CleanupFailure,
    TimeoutCancellation,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::SetupFailure => "setup failure",
            FailureKind::BodyFailure => "body failure",
            FailureKind::CleanupFailure => "cleanup failure",
            FailureKind::TimeoutCancellation => "timeout",
        };
        f.write_str(label)
    }
}

/// One recorded failure, kept verbatim
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    /// Name of the hook or body that failed
    pub operation: String,
    pub message: String,
    /// Raised by a one-time (class-level) hook
    #[serde(default)]
    pub one_time: bool,
    /// Body ignored cancellation past the grace period
    #[serde(default)]
    pub hung: bool,
}

impl FailureDetail {
    pub fn new(kind: FailureKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
            one_time: false,
            hung: false,
        }
    }

    pub fn setup(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::SetupFailure, operation, message)
    }

    pub fn class_setup(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            one_time: true,
            ..Self::setup(operation, message)
        }
    }

    pub fn body(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::BodyFailure, operation, message)
    }

    pub fn cleanup(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::CleanupFailure, operation, message)
    }

    pub fn class_cleanup(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            one_time: true,
            ..Self::cleanup(operation, message)
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration, hung: bool) -> Self {
        let message = if hung {
            format!(
                "timed out after {}ms and did not observe cancellation",
                after.as_millis()
            )
        } else {
            format!("timed out after {}ms", after.as_millis())
        };
        Self {
            hung,
            ..Self::new(FailureKind::TimeoutCancellation, operation, message)
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {}", self.kind, self.operation, self.message)
    }
}

/// Mutable record of one attempt of one unit
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunContext {
    pub identity: IdentityKey,
    /// 1-based
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub outcome: Outcome,
    pub failures: Vec<FailureDetail>,
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl RunContext {
    pub fn start(identity: IdentityKey, attempt: u32) -> Self {
        Self {
            identity,
            attempt,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
            outcome: Outcome::Passed,
            failures: Vec::new(),
            skip_reason: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    pub fn record(&mut self, failure: FailureDetail) {
        self.failures.push(failure);
    }

    pub fn mark_skipped(&mut self, reason: impl Into<String>) {
        self.skip_reason = Some(reason.into());
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&FailureDetail> {
        self.failures.first()
    }

    /// Whether the attempt failed because the class never got set up
    pub fn is_class_setup_failure(&self) -> bool {
        self.first_failure()
            .map(|f| f.kind == FailureKind::SetupFailure && f.one_time)
            .unwrap_or(false)
    }

    /// Close the attempt; the first recorded failure decides the outcome
    pub fn finish(&mut self, duration_ms: u64) {
        self.ended_at = Some(Utc::now());
        self.duration_ms = duration_ms;
        self.outcome = match self.first_failure() {
            Some(failure) if failure.kind == FailureKind::TimeoutCancellation => Outcome::Cancelled,
            Some(_) => Outcome::Failed,
            None if self.skip_reason.is_some() => Outcome::Skipped,
            None => Outcome::Passed,
        };
    }
}

/// Final report for one unit, covering all of its attempts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitReport {
    pub identity: IdentityKey,
    pub class_name: String,
    pub method_name: String,
    pub repetition: u32,
    pub categories: Vec<String>,
    /// Outcome of the final attempt
    pub outcome: Outcome,
    pub attempts: Vec<RunContext>,
}

impl UnitReport {
    pub fn from_attempts(
        identity: IdentityKey,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        repetition: u32,
        categories: Vec<String>,
        attempts: Vec<RunContext>,
    ) -> Self {
        let outcome = attempts
            .last()
            .map(|a| a.outcome)
            .unwrap_or(Outcome::NotExecuted);
        Self {
            identity,
            class_name: class_name.into(),
            method_name: method_name.into(),
            repetition,
            categories,
            outcome,
            attempts,
        }
    }

    pub fn not_executed(
        identity: IdentityKey,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        repetition: u32,
        categories: Vec<String>,
    ) -> Self {
        Self::from_attempts(identity, class_name, method_name, repetition, categories, Vec::new())
    }

    pub fn duration_ms(&self) -> u64 {
        self.attempts.iter().map(|a| a.duration_ms).sum()
    }

    pub fn final_attempt(&self) -> Option<&RunContext> {
        self.attempts.last()
    }

    /// All failures across attempts, oldest first
    pub fn failures(&self) -> impl Iterator<Item = &FailureDetail> {
        self.attempts.iter().flat_map(|a| a.failures.iter())
    }

    /// Message of the deciding failure of the final attempt
    pub fn message(&self) -> Option<String> {
        let last = self.final_attempt()?;
        last.first_failure()
            .map(ToString::to_string)
            .or_else(|| last.skip_reason.clone())
    }
}

impl fmt::Display for UnitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}::{}#{} [{}ms]",
            self.outcome.symbol(),
            self.class_name,
            self.method_name,
            self.repetition,
            self.duration_ms()
        )?;
        if self.attempts.len() > 1 {
            write!(f, " ({} attempts)", self.attempts.len())?;
        }
        if let Some(msg) = self.message() {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}
