//! Output formatters for run results
//!
//! Provides JSON, CSV, table and summary output formats.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{AggregateResult, Outcome, RunSummary, UnitResult};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Report format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(ReportFormat::Table),
            "json" => Some(ReportFormat::Json),
            "json-pretty" | "jsonpretty" => Some(ReportFormat::JsonPretty),
            "csv" => Some(ReportFormat::Csv),
            "summary" => Some(ReportFormat::Summary),
            _ => None,
        }
    }

    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json | ReportFormat::JsonPretty => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Table | ReportFormat::Summary => "txt",
        }
    }
}

const CSV_HEADER: [&str; 6] = ["index", "name", "status", "kind", "duration_ms", "message"];

/// One CSV row per unit result
#[derive(Serialize)]
struct CsvRow<'a> {
    index: usize,
    name: &'a str,
    status: String,
    kind: String,
    duration_ms: f64,
    message: &'a str,
}

impl<'a> From<&'a UnitResult> for CsvRow<'a> {
    fn from(result: &'a UnitResult) -> Self {
        Self {
            index: result.index,
            name: &result.name,
            status: result.outcome.to_string(),
            kind: result
                .failure_kind
                .map(|k| k.to_string())
                .unwrap_or_default(),
            duration_ms: result.duration.as_nanos() as f64 / 1_000_000.0,
            message: result.outcome.message().unwrap_or(""),
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: ReportFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Format a single unit result
    pub fn format_result(&self, result: &UnitResult) -> Result<String> {
        match self.format {
            ReportFormat::Table => Ok(self.format_result_table(result)),
            ReportFormat::Json => Ok(serde_json::to_string(result)?),
            ReportFormat::JsonPretty => Ok(serde_json::to_string_pretty(result)?),
            ReportFormat::Csv => write_csv(std::slice::from_ref(result), false),
            ReportFormat::Summary => Ok(result.to_string()),
        }
    }

    fn format_result_table(&self, result: &UnitResult) -> String {
        let status = match (&result.outcome, self.colorize) {
            (Outcome::Passed, true) => format!("{GREEN}✓ PASS{RESET}"),
            (Outcome::Failed(_), true) => format!("{RED}✗ FAIL{RESET}"),
            (Outcome::Pending, true) => format!("{YELLOW}○ PENDING{RESET}"),
            (Outcome::Passed, false) => "✓ PASS".to_string(),
            (Outcome::Failed(_), false) => "✗ FAIL".to_string(),
            (Outcome::Pending, false) => "○ PENDING".to_string(),
        };

        let mut line = format!(
            "{:3}. {:30} {} [{:>8.3}ms]",
            result.index + 1,
            result.name,
            status,
            result.duration.as_nanos() as f64 / 1_000_000.0
        );
        if let Some(message) = result.outcome.message() {
            line.push_str(&format!(" {message}"));
        }
        line
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        match self.format {
            ReportFormat::Table => Ok(self.format_summary_table(summary)),
            ReportFormat::Json => Ok(serde_json::to_string(summary)?),
            ReportFormat::JsonPretty => Ok(serde_json::to_string_pretty(summary)?),
            ReportFormat::Csv => write_csv(&summary.results, true),
            ReportFormat::Summary => Ok(self.format_summary_brief(summary)),
        }
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  Run {:3} - {:20} {:>28} ║\n",
            summary.run, summary.strategy, summary.run_id
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for result in &summary.results {
            output.push_str(&format!("  {}\n", self.format_result_table(result)));
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        let pass_str = if self.colorize {
            format!("{GREEN}{}{RESET}", summary.passed)
        } else {
            summary.passed.to_string()
        };
        let fail_str = if self.colorize && summary.failed > 0 {
            format!("{RED}{}{RESET}", summary.failed)
        } else {
            summary.failed.to_string()
        };

        output.push_str(&format!(
            "  Total: {} | Pass: {} | Fail: {} | Not run: {}\n",
            summary.total, pass_str, fail_str, summary.pending
        ));
        output.push_str(&format!(
            "  Pass Rate: {:5.1}% | Duration: {}ms{}\n",
            summary.pass_rate(),
            summary.wall_time.as_millis(),
            if summary.cancelled { " | cancelled" } else { "" }
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "Run {} ({}): {}/{} passed ({:.1}%) in {}ms",
            summary.run,
            summary.strategy,
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.wall_time.as_millis()
        )
    }

    /// Format statistics across several runs
    pub fn format_aggregate(&self, aggregate: &AggregateResult) -> Result<String> {
        match self.format {
            ReportFormat::Json => Ok(serde_json::to_string(aggregate)?),
            ReportFormat::JsonPretty => Ok(serde_json::to_string_pretty(aggregate)?),
            _ => Ok(self.format_aggregate_table(aggregate)),
        }
    }

    fn format_aggregate_table(&self, aggregate: &AggregateResult) -> String {
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Aggregate Results ({} runs)\n",
            aggregate.total_runs
        ));
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Overall Pass Rate: {:.1}%\n\n",
            aggregate.overall_pass_rate
        ));

        output.push_str(" Unit Pass Rates:\n");
        output.push_str(" ───────────────────────────────────────────────────────────\n");

        for (name, stats) in &aggregate.unit_stats {
            let rate = stats.pass_rate();
            let bar_len = ((rate / 5.0) as usize).min(20);
            output.push_str(&format!(
                " {:30} {}{} {}\n",
                name,
                "█".repeat(bar_len),
                "░".repeat(20 - bar_len),
                self.colored_rate(rate)
            ));
        }

        output.push_str(" ───────────────────────────────────────────────────────────\n");

        let flaky = aggregate.flaky_units();
        if !flaky.is_empty() {
            output.push_str("\n Flaky Units (< 100% pass rate):\n");
            for (name, rate) in flaky.iter().take(5) {
                output.push_str(&format!("   - {name} ({rate:.1}%)\n"));
            }
        }

        output
    }

    fn colored_rate(&self, rate: f64) -> String {
        if !self.colorize {
            return format!("{rate:5.1}%");
        }
        let color = if rate >= 90.0 {
            GREEN
        } else if rate >= 50.0 {
            YELLOW
        } else {
            RED
        };
        format!("{color}{rate:5.1}%{RESET}")
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(ReportFormat::Table)
    }
}

fn write_csv(results: &[UnitResult], headers: bool) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(headers)
        .from_writer(Vec::new());
    // serde writes the header with the first record only
    if headers && results.is_empty() {
        writer.write_record(CSV_HEADER)?;
    }
    for result in results {
        writer.serialize(CsvRow::from(result))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Write a run summary to a file
pub fn write_summary_to_file(
    path: impl AsRef<Path>,
    summary: &RunSummary,
    format: ReportFormat,
) -> Result<()> {
    let path = path.as_ref();
    let content = ResultFormatter::new(format).no_color().format_summary(summary)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;
    use chrono::Utc;
    use std::time::Duration;

    fn summary() -> RunSummary {
        let results = vec![
            UnitResult {
                index: 0,
                name: "A".to_string(),
                outcome: Outcome::Passed,
                failure_kind: None,
                duration: Duration::from_millis(2),
                started_at: Utc::now(),
            },
            UnitResult {
                index: 1,
                name: "B".to_string(),
                outcome: Outcome::Failed("boom, \"quoted\"".to_string()),
                failure_kind: Some(FailureKind::Fault),
                duration: Duration::from_millis(3),
                started_at: Utc::now(),
            },
        ];
        RunSummary::new(1, "local", 2, results)
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!(ReportFormat::from_str("json"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_str("TABLE"), Some(ReportFormat::Table));
        assert_eq!(
            ReportFormat::from_str("json-pretty"),
            Some(ReportFormat::JsonPretty)
        );
        assert_eq!(ReportFormat::from_str("unknown"), None);
        assert_eq!(ReportFormat::Csv.extension(), "csv");
    }

    #[test]
    fn test_formatter_creation() {
        let formatter = ResultFormatter::new(ReportFormat::Json).no_color();
        assert_eq!(formatter.format(), ReportFormat::Json);
        assert!(!formatter.colorize);
    }

    #[test]
    fn test_csv_quotes_messages() {
        let csv = ResultFormatter::new(ReportFormat::Csv)
            .format_summary(&summary())
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "index,name,status,kind,duration_ms,message");
        assert_eq!(lines[1], "0,A,Passed,,2.0,");
        assert_eq!(lines[2], "1,B,Failed,fault,3.0,\"boom, \"\"quoted\"\"\"");
    }

    #[test]
    fn test_csv_of_empty_run_keeps_header() {
        let empty = RunSummary::new(1, "local", 0, Vec::new());
        let csv = ResultFormatter::new(ReportFormat::Csv)
            .format_summary(&empty)
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["index,name,status,kind,duration_ms,message"]);
    }

    #[test]
    fn test_summary_and_table_output() {
        let brief = ResultFormatter::new(ReportFormat::Summary)
            .format_summary(&summary())
            .unwrap();
        assert!(brief.starts_with("Run 1 (local): 1/2 passed (50.0%)"));

        let table = ResultFormatter::new(ReportFormat::Table)
            .no_color()
            .format_summary(&summary())
            .unwrap();
        assert!(table.contains("✗ FAIL"));
        assert!(table.contains("Not run: 0"));
        assert!(!table.contains("\x1b["));
    }

    #[test]
    fn test_json_summary_parses_back() {
        let json = ResultFormatter::new(ReportFormat::Json)
            .format_summary(&summary())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["passed"], 1);
        assert_eq!(value["results"][1]["outcome"]["status"], "failed");
    }

    #[test]
    fn test_write_summary_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.csv");
        write_summary_to_file(&path, &summary(), ReportFormat::Csv).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("index,name"));
    }
}
