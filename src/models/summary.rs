//! Result models for test runs
//!
//! Defines per-unit results and the summary of a single run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{FailureKind, Outcome};

/// Result of one unit within one run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    /// Registration index of the unit in its runner
    pub index: usize,
    pub name: String,
    pub outcome: Outcome,
    pub failure_kind: Option<FailureKind>,
    #[serde(rename = "duration_ms", with = "duration_millis")]
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
}

impl UnitResult {
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

impl fmt::Display for UnitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {} (Duration: {:.4}s)",
            self.outcome.symbol(),
            self.name,
            self.outcome,
            self.duration.as_secs_f64()
        )?;
        if let Some(msg) = self.outcome.message() {
            write!(f, " - Error: {msg}")?;
        }
        Ok(())
    }
}

/// Summary of one `run()` invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    /// 1-based run counter of the runner that produced this summary
    pub run: u32,
    pub strategy: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Units that were never executed, e.g. after cancellation
    pub pending: usize,
    pub cancelled: bool,
    /// Names of the units that have no entry in `results`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    #[serde(rename = "wall_time_ms", with = "duration_millis")]
    pub wall_time: Duration,
    pub results: Vec<UnitResult>,
}

impl RunSummary {
    pub fn new(
        run: u32,
        strategy: impl Into<String>,
        total: usize,
        results: Vec<UnitResult>,
    ) -> Self {
        let passed = results.iter().filter(|r| r.outcome.is_passed()).count();
        let failed = results.iter().filter(|r| r.outcome.is_failed()).count();

        Self {
            run_id: generate_run_id(),
            run,
            strategy: strategy.into(),
            started_at: Utc::now(),
            total,
            passed,
            failed,
            pending: total.saturating_sub(passed + failed),
            cancelled: false,
            skipped: Vec::new(),
            wall_time: Duration::ZERO,
            results,
        }
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn with_wall_time(mut self, wall_time: Duration) -> Self {
        self.wall_time = wall_time;
        self
    }

    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_skipped(mut self, skipped: Vec<String>) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitResult> {
        self.results.iter().filter(|r| r.outcome.is_failed())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test Results - run {} ({})", self.run, self.strategy)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Not run: {}",
            self.total, self.passed, self.failed, self.pending
        )?;
        write!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.wall_time.as_millis()
        )?;
        if self.cancelled {
            write!(f, " | cancelled")?;
        }
        writeln!(f)
    }
}

/// Generate unique run ID
pub(crate) fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Durations travel as fractional milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        Ok(Duration::from_nanos((ms.max(0.0) * 1_000_000.0).round() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, name: &str, outcome: Outcome, ms: u64) -> UnitResult {
        UnitResult {
            index,
            name: name.to_string(),
            failure_kind: outcome.is_failed().then_some(FailureKind::Fault),
            outcome,
            duration: Duration::from_millis(ms),
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result(0, "A", Outcome::Passed, 10),
            result(1, "B", Outcome::Failed("boom".to_string()), 5),
        ];

        let summary = RunSummary::new(1, "local", 3, results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.pending, 1);
        assert!(!summary.is_all_passed());
        assert_eq!(summary.failures().count(), 1);
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::new(1, "local", 0, Vec::new());
        assert_eq!(summary.pass_rate(), 0.0);
        assert!(summary.is_all_passed());
    }

    #[test]
    fn test_result_display() {
        let failed = result(1, "B", Outcome::Failed("boom".to_string()), 5);
        let line = failed.to_string();
        assert!(line.starts_with("✗ B - Failed (Duration: 0.0050s)"));
        assert!(line.ends_with("- Error: boom"));

        let passed = result(0, "A", Outcome::Passed, 1);
        assert_eq!(passed.to_string(), "✓ A - Passed (Duration: 0.0010s)");
    }

    #[test]
    fn test_duration_serialized_as_millis() {
        let passed = result(0, "A", Outcome::Passed, 12);
        let value = serde_json::to_value(&passed).unwrap();
        assert_eq!(value["duration_ms"], 12.0);

        let back: UnitResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.duration_ms(), 12);
    }

    #[test]
    fn test_run_id_shape() {
        let id = generate_run_id();
        assert_eq!(id.len(), "20260101_120000_0000".len());
    }
}
