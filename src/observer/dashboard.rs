//! Live in-memory dashboard
//!
//! Keeps a snapshot that other threads can poll while a run is in progress.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ObserverError, ResultObserver, RunEvent};
use crate::models::Outcome;

const DEFAULT_HISTORY: usize = 20;

/// Point-in-time view of everything the dashboard has seen
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub completed: usize,
    pub passed: usize,
    pub failed: usize,
    pub batches_completed: usize,
    /// Most recent unit outcomes, newest last
    pub recent: Vec<(String, Outcome)>,
    pub last_pass_rate: Option<f64>,
}

/// Observer that maintains a [`DashboardSnapshot`]
pub struct DashboardObserver {
    state: Mutex<DashboardState>,
    history: usize,
}

#[derive(Default)]
struct DashboardState {
    completed: usize,
    passed: usize,
    failed: usize,
    batches_completed: usize,
    recent: VecDeque<(String, Outcome)>,
    last_pass_rate: Option<f64>,
}

impl DashboardObserver {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Keep the last `history` unit outcomes
    pub fn with_history(history: usize) -> Self {
        Self {
            state: Mutex::new(DashboardState::default()),
            history,
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        DashboardSnapshot {
            completed: state.completed,
            passed: state.passed,
            failed: state.failed,
            batches_completed: state.batches_completed,
            recent: state.recent.iter().cloned().collect(),
            last_pass_rate: state.last_pass_rate,
        }
    }
}

impl Default for DashboardObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultObserver for DashboardObserver {
    fn name(&self) -> &str {
        "dashboard"
    }

    fn notify(&self, event: &RunEvent<'_>) -> Result<(), ObserverError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ObserverError::Other("dashboard state poisoned".to_string()))?;

        match event {
            RunEvent::UnitCompleted(unit) => {
                state.completed += 1;
                match unit.outcome() {
                    Outcome::Passed => state.passed += 1,
                    Outcome::Failed(_) => state.failed += 1,
                    Outcome::Pending => {}
                }
                if self.history > 0 {
                    if state.recent.len() == self.history {
                        state.recent.pop_front();
                    }
                    state
                        .recent
                        .push_back((unit.name().to_string(), unit.outcome().clone()));
                }
            }
            RunEvent::UnitFailed(_) => {}
            RunEvent::BatchCompleted(summary) => {
                state.batches_completed += 1;
                state.last_pass_rate = Some(summary.pass_rate());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunSummary;
    use crate::unit::TestUnit;

    #[test]
    fn test_dashboard_tracks_counts_and_history() {
        let dashboard = DashboardObserver::with_history(2);

        let mut units = vec![
            TestUnit::new("A", || Ok(())),
            TestUnit::new("B", || anyhow::bail!("boom")),
            TestUnit::new("C", || Ok(())),
        ];
        for unit in &mut units {
            unit.execute();
            dashboard.notify(&RunEvent::UnitCompleted(unit)).unwrap();
        }
        dashboard
            .notify(&RunEvent::BatchCompleted(&RunSummary::new(1, "local", 0, Vec::new())))
            .unwrap();

        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.completed, 3);
        assert_eq!(snapshot.passed, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.batches_completed, 1);
        assert_eq!(
            snapshot.recent,
            vec![
                ("B".to_string(), Outcome::Failed("boom".to_string())),
                ("C".to_string(), Outcome::Passed),
            ]
        );
        assert_eq!(snapshot.last_pass_rate, Some(0.0));
    }
}
