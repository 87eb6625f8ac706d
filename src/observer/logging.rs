use tracing::{debug, info, warn};

use super::{ObserverError, ResultObserver, RunEvent};

/// Logs unit failures and run summaries through `tracing`
#[derive(Clone, Debug, Default)]
pub struct LoggingObserver {
    verbose: bool,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log every passing unit
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl ResultObserver for LoggingObserver {
    fn name(&self) -> &str {
        "logging"
    }

    fn notify(&self, event: &RunEvent<'_>) -> Result<(), ObserverError> {
        match event {
            RunEvent::UnitCompleted(unit) if self.verbose => {
                info!(
                    "{} {} ({}ms)",
                    unit.outcome().symbol(),
                    unit.name(),
                    unit.duration().unwrap_or_default().as_millis()
                );
            }
            RunEvent::UnitCompleted(unit) => {
                debug!("{} completed: {}", unit.name(), unit.outcome());
            }
            RunEvent::UnitFailed(unit) => {
                warn!(
                    "{} failed: {}",
                    unit.name(),
                    unit.outcome().message().unwrap_or("")
                );
            }
            RunEvent::BatchCompleted(summary) => {
                info!(
                    "Run {} completed in {}ms - Pass: {}/{} ({:.1}%)",
                    summary.run,
                    summary.wall_time.as_millis(),
                    summary.passed,
                    summary.total,
                    summary.pass_rate()
                );
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
    fn test_logging_observer_accepts_every_event() {
        let observer = LoggingObserver::new().verbose();
        let mut unit = TestUnit::new("B", || anyhow::bail!("boom"));
        unit.execute();
        let summary = RunSummary::new(1, "local", 1, Vec::new());

        assert!(observer.notify(&RunEvent::UnitCompleted(&unit)).is_ok());
        assert!(observer.notify(&RunEvent::UnitFailed(&unit)).is_ok());
        assert!(observer.notify(&RunEvent::BatchCompleted(&summary)).is_ok());
        assert_eq!(observer.name(), "logging");
    }
}
