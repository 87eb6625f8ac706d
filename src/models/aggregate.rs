//! Statistics across repeated runs of the same units

use serde::Serialize;
use std::collections::BTreeMap;

use super::{Outcome, RunSummary};

/// Statistics for a single unit across runs
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UnitStats {
    pub passes: u32,
    pub failures: u32,
    /// Runs in which the unit never executed
    pub not_run: u32,
    pub total_duration_ms: f64,
}

impl UnitStats {
    pub fn executions(&self) -> u32 {
        self.passes + self.failures
    }

    pub fn avg_duration_ms(&self) -> f64 {
        match self.executions() {
            0 => 0.0,
            n => self.total_duration_ms / n as f64,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        match self.executions() {
            0 => 0.0,
            n => (self.passes as f64 / n as f64) * 100.0,
        }
    }
}

/// Aggregate results across multiple runs, keyed by unit name
#[derive(Clone, Debug, Serialize)]
pub struct AggregateResult {
    pub total_runs: u32,
    pub unit_stats: BTreeMap<String, UnitStats>,
    pub overall_pass_rate: f64,
}

impl AggregateResult {
    pub fn from_summaries(summaries: &[RunSummary]) -> Self {
        let mut unit_stats: BTreeMap<String, UnitStats> = BTreeMap::new();

        for summary in summaries {
            for result in &summary.results {
                let stats = unit_stats.entry(result.name.clone()).or_default();
                match result.outcome {
                    Outcome::Passed => stats.passes += 1,
                    Outcome::Failed(_) => stats.failures += 1,
                    Outcome::Pending => stats.not_run += 1,
                }
                stats.total_duration_ms += result.duration.as_nanos() as f64 / 1_000_000.0;
            }
            for name in &summary.skipped {
                unit_stats.entry(name.clone()).or_default().not_run += 1;
            }
        }

        let overall_pass_rate = if summaries.is_empty() {
            0.0
        } else {
            summaries.iter().map(|s| s.pass_rate()).sum::<f64>() / summaries.len() as f64
        };

        Self {
            total_runs: summaries.len() as u32,
            unit_stats,
            overall_pass_rate,
        }
    }

    /// Units that both passed and failed, lowest pass rate first
    pub fn flaky_units(&self) -> Vec<(&str, f64)> {
        let mut flaky: Vec<_> = self
            .unit_stats
            .iter()
            .filter(|(_, stats)| stats.passes > 0 && stats.failures > 0)
            .map(|(name, stats)| (name.as_str(), stats.pass_rate()))
            .collect();
        flaky.sort_by(|a, b| a.1.total_cmp(&b.1));
        flaky
    }

    /// Units that ran and passed in every run
    pub fn stable_units(&self) -> Vec<&str> {
        self.unit_stats
            .iter()
            .filter(|(_, stats)| stats.passes > 0 && stats.failures == 0 && stats.not_run == 0)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
