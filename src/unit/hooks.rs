//! Around-execution hooks
//!
//! A hook contributes an optional setup step and an optional teardown step
//! around a unit's action. For one execution the `before` steps run in
//! registration order and the `after` steps run in reverse, and only for
//! hooks whose `before` succeeded.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::models::{Failure, Verdict};

/// Setup/teardown callback, given the name of the unit being executed
pub type HookFn = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

/// A named (before, after) pair applied around unit execution
#[derive(Clone)]
pub struct ExecutionHook {
    name: String,
    before: Option<HookFn>,
    after: Option<HookFn>,
}

impl ExecutionHook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
            after: None,
        }
    }

    /// Set the step run before the action
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    /// Set the step run after the action
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn run_before(&self, unit: &str) -> Verdict {
        match &self.before {
            Some(step) => guarded(|| step(unit)).map_err(|f| {
                Failure::hook(format!("before hook '{}' failed: {}", self.name, f.message))
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn run_after(&self, unit: &str) -> Verdict {
        match &self.after {
            Some(step) => guarded(|| step(unit)).map_err(|f| {
                Failure::hook(format!("after hook '{}' failed: {}", self.name, f.message))
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ExecutionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionHook")
            .field("name", &self.name)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Run `f`, turning a returned error into a fault and a panic into an
/// assertion failure.
pub(crate) fn guarded<F>(f: F) -> Verdict
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Failure::fault(format!("{e:#}"))),
        Err(payload) => Err(Failure::assertion(panic_message(payload.as_ref()))),
    }
}

/// Extract the text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;

    #[test]
    fn test_guarded_pass() {
        assert!(guarded(|| Ok(())).is_ok());
    }

    #[test]
    fn test_guarded_error_is_fault() {
        let failure = guarded(|| Err(anyhow::anyhow!("disk on fire"))).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Fault);
        assert_eq!(failure.message, "disk on fire");
    }

    #[test]
    fn test_guarded_panic_is_assertion() {
        let failure = guarded(|| {
            assert_eq!(1 + 1, 3, "math is broken");
            Ok(())
        })
        .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Assertion);
        assert!(failure.message.contains("math is broken"));
    }

    #[test]
    fn test_hook_failure_is_tagged() {
        let hook = ExecutionHook::new("db").before(|_| anyhow::bail!("no connection"));
        let failure = hook.run_before("login").unwrap_err();
        assert_eq!(failure.kind, FailureKind::Hook);
        assert_eq!(failure.message, "before hook 'db' failed: no connection");
        assert!(hook.run_after("login").is_ok());
    }
}
