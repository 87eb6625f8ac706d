//! Outcome models
//!
//! Defines the tri-state unit outcome and the failure taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message recorded for a unit that exceeded its time budget
pub const TIMEOUT_MESSAGE: &str = "timeout";

/// Outcome of the last execution of a test unit
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Pending,
    Passed,
    Failed(String),
}

impl Outcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Pending => "○",
            Outcome::Passed => "✓",
            Outcome::Failed(_) => "✗",
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }

    /// Failure diagnostic, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => write!(f, "Pending"),
            Outcome::Passed => write!(f, "Passed"),
            Outcome::Failed(_) => write!(f, "Failed"),
        }
    }
}

/// What made a unit fail
///
/// All kinds collapse to [`Outcome::Failed`] for reporting; the kind is kept
/// alongside for diagnostics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The action panicked, typically from `assert!`
    Assertion,
    /// The action returned an error
    Fault,
    /// The action did not finish within the per-unit timeout
    Timeout,
    /// A before or after hook failed
    Hook,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Assertion => write!(f, "assertion"),
            FailureKind::Fault => write!(f, "fault"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Hook => write!(f, "hook"),
        }
    }
}

/// A classified failure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            message: if message.is_empty() {
                format!("{kind} with no message")
            } else {
                message
            },
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Assertion, message)
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Fault, message)
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Hook, message)
    }

    pub fn timeout() -> Self {
        Self::new(FailureKind::Timeout, TIMEOUT_MESSAGE)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Result of one execution attempt before it is recorded on a unit
pub type Verdict = Result<(), Failure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_default_is_pending() {
        let outcome = Outcome::default();
        assert!(outcome.is_pending());
        assert_eq!(outcome.message(), None);
    }

    #[test]
    fn test_failed_message() {
        let outcome = Outcome::Failed("boom".to_string());
        assert!(outcome.is_failed());
        assert_eq!(outcome.message(), Some("boom"));
        assert_eq!(outcome.symbol(), "✗");
    }

    #[test]
    fn test_empty_failure_message_is_filled() {
        let failure = Failure::fault("");
        assert_eq!(failure.message, "fault with no message");
    }

    #[test]
    fn test_timeout_failure() {
        let failure = Failure::timeout();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(failure.message, "timeout");
    }

    #[test]
    fn test_outcome_serde_shape() {
        let json = serde_json::to_string(&Outcome::Failed("boom".to_string())).unwrap();
        assert_eq!(json, r#"{"status":"failed","message":"boom"}"#);

        let passed: Outcome = serde_json::from_str(r#"{"status":"passed"}"#).unwrap();
        assert_eq!(passed, Outcome::Passed);
    }
}
