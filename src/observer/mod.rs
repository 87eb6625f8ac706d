//! Result observers
//!
//! Observers are side-effecting sinks notified synchronously as units finish
//! and once per run when the batch completes. A misbehaving observer never
//! affects the run: errors and panics raised from `notify` are caught by the
//! registry, logged, and delivery continues with the next observer.

mod dashboard;
mod logging;
mod report;

pub use dashboard::{DashboardObserver, DashboardSnapshot};
pub use logging::LoggingObserver;
pub use report::ReportObserver;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::models::RunSummary;
use crate::unit::{panic_message, TestUnit};

/// Observer failures; always contained by the runner
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("{0}")]
    Other(String),
}

/// Lifecycle events delivered to observers
#[derive(Clone, Copy, Debug)]
pub enum RunEvent<'a> {
    /// Fired after every unit execution regardless of outcome
    UnitCompleted(&'a TestUnit),
    /// Fired after `UnitCompleted` when the unit failed
    UnitFailed(&'a TestUnit),
    /// Fired exactly once per run, after every unit event
    BatchCompleted(&'a RunSummary),
}

impl RunEvent<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::UnitCompleted(_) => "unit_completed",
            RunEvent::UnitFailed(_) => "unit_failed",
            RunEvent::BatchCompleted(_) => "batch_completed",
        }
    }
}

/// Sink for run events
pub trait ResultObserver: Send + Sync {
    /// Name used when reporting observer faults
    fn name(&self) -> &str {
        "observer"
    }

    fn notify(&self, event: &RunEvent<'_>) -> Result<(), ObserverError>;
}

/// Handle returned by registration, used to deregister
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered set of registered observers
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<(ObserverId, Arc<dyn ResultObserver>)>,
    next_id: u64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn ResultObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Deregister an observer; returns false for unknown ids
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(registered, _)| *registered != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver an event to every observer in registration order
    pub fn notify_all(&self, event: &RunEvent<'_>) {
        for (_, observer) in &self.observers {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| observer.notify(event)));
            match delivered {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    "Observer {} failed on {}: {}",
                    observer.name(),
                    event.kind(),
                    e
                ),
                Err(payload) => warn!(
                    "Observer {} panicked on {}: {}",
                    observer.name(),
                    event.kind(),
                    panic_message(payload.as_ref())
                ),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::recording::RecordingObserver;
    use super::*;

    struct Failing;

    impl ResultObserver for Failing {
        fn notify(&self, _event: &RunEvent<'_>) -> Result<(), ObserverError> {
            Err(ObserverError::Other("dashboard offline".to_string()))
        }
    }

    struct Panicking;

    impl ResultObserver for Panicking {
        fn notify(&self, _event: &RunEvent<'_>) -> Result<(), ObserverError> {
            panic!("observer bug")
        }
    }

    #[test]
    fn test_misbehaving_observers_do_not_block_delivery() {
        let recorder = Arc::new(RecordingObserver::default());
        let mut registry = ObserverRegistry::new();
        registry.register(Arc::new(Failing));
        registry.register(Arc::new(Panicking));
        registry.register(recorder.clone());

        let unit = TestUnit::new("A", || Ok(()));
        registry.notify_all(&RunEvent::UnitCompleted(&unit));

        assert_eq!(recorder.events(), vec!["unit_completed(A)"]);
    }

    #[test]
    fn test_remove_observer() {
        let recorder = Arc::new(RecordingObserver::default());
        let mut registry = ObserverRegistry::new();
        let id = registry.register(recorder.clone());
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());

        let unit = TestUnit::new("A", || Ok(()));
        registry.notify_all(&RunEvent::UnitCompleted(&unit));
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_event_kind() {
        let unit = TestUnit::new("A", || Ok(()));
        assert_eq!(RunEvent::UnitFailed(&unit).kind(), "unit_failed");
    }
}
