//! Output formatters for run results
//!
//! Provides JSON, Table, and summary output formats.

use crate::models::{Outcome, RunSummary, UnitReport};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a single unit report
    pub fn format_unit(&self, report: &UnitReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_unit_table(report),
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Summary => report.to_string(),
        }
    }

    fn outcome_label(&self, outcome: Outcome) -> String {
        let plain = format!("{} {}", outcome.symbol(), outcome);
        if !self.colorize {
            return plain;
        }
        let color = match outcome {
            Outcome::Passed => "32",
            Outcome::Failed => "31",
            Outcome::Cancelled => "35",
            Outcome::Skipped => "33",
            Outcome::NotExecuted => "90",
        };
        format!("\x1b[{color}m{plain}\x1b[0m")
    }

    fn format_unit_table(&self, report: &UnitReport) -> String {
        let mut line = format!(
            "{:<48} #{:<3} {:<16} [{:>6}ms]",
            format!("{}::{}", report.class_name, report.method_name),
            report.repetition,
            self.outcome_label(report.outcome),
            report.duration_ms()
        );
        if report.attempts.len() > 1 {
            line.push_str(&format!(" x{}", report.attempts.len()));
        }
        if let Some(message) = report.message() {
            line.push_str(&format!("\n      {message}"));
        }
        line
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        // Header
        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!("║  Run {:56} ║\n", summary.run_id));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        for unit in &summary.units {
            output.push_str(&format!("  {}\n", self.format_unit_table(unit)));
        }

        if !summary.run_failures.is_empty() {
            output.push_str("\n  Run-level failures:\n");
            for failure in &summary.run_failures {
                output.push_str(&format!("   - {}: {}\n", failure.owner, failure.detail));
            }
        }

        // Footer
        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", summary.passed)
        } else {
            summary.passed.to_string()
        };
        let fail_str = if self.colorize && summary.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.failed)
        } else {
            summary.failed.to_string()
        };

        output.push_str("────────────────────────────────────────────────────────────────\n");
        output.push_str(&format!(
            "  Total: {} | Pass: {} | Fail: {} | Cancelled: {} | Skip: {} | Not run: {}\n",
            summary.total,
            pass_str,
            fail_str,
            summary.cancelled,
            summary.skipped,
            summary.not_executed
        ));
        output.push_str(&format!(
            "  Pass Rate: {:5.1}% | Duration: {}ms\n",
            summary.pass_rate(),
            summary.total_duration_ms
        ));

        output
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "Run {}: {}/{} passed ({:.1}%), {} failed, {} cancelled in {}ms",
            summary.run_id,
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.failed,
            summary.cancelled,
            summary.total_duration_ms
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}
