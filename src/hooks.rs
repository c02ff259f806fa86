//! Lifecycle hooks around mutations.
//!
//! Every record type carries the [`Hooks`] capability; the defaults do nothing, so a type only
//! overrides the stages it cares about. Before-hooks run on the value about to be written and may
//! adjust it; a failure stops the operation before storage is touched. After-hooks run once the
//! write is committed; a failure is reported but the write stays in place.

use crate::error::CrudError;
use std::fmt;

/// Failure reported by a hook. The message is surfaced to the client as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        HookError(message.into())
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HookError {}

pub type HookResult = Result<(), HookError>;

pub trait Hooks {
    fn before_create(&mut self) -> HookResult {
        Ok(())
    }
    fn after_create(&self) -> HookResult {
        Ok(())
    }
    fn before_update(&mut self) -> HookResult {
        Ok(())
    }
    fn after_update(&self) -> HookResult {
        Ok(())
    }
    fn before_patch(&mut self) -> HookResult {
        Ok(())
    }
    fn after_patch(&self) -> HookResult {
        Ok(())
    }
    fn before_delete(&mut self) -> HookResult {
        Ok(())
    }
    fn after_delete(&self) -> HookResult {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Patch,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Patch => "patch",
            Operation::Delete => "delete",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookStage {
    Before,
    After,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookStage::Before => "before",
            HookStage::After => "after",
        })
    }
}

/// Run the before-hook for `op`.
pub fn before<H: Hooks>(record: &mut H, op: Operation) -> Result<(), CrudError> {
    let result = match op {
        Operation::Create => record.before_create(),
        Operation::Update => record.before_update(),
        Operation::Patch => record.before_patch(),
        Operation::Delete => record.before_delete(),
    };
    result.map_err(|e| {
        tracing::debug!(operation = %op, error = %e, "before hook rejected");
        CrudError::Hook {
            stage: HookStage::Before,
            operation: op,
            message: e.0,
        }
    })
}

/// Run the after-hook for `op`. The storage write has already committed when this fails.
pub fn after<H: Hooks>(record: &H, op: Operation) -> Result<(), CrudError> {
    let result = match op {
        Operation::Create => record.after_create(),
        Operation::Update => record.after_update(),
        Operation::Patch => record.after_patch(),
        Operation::Delete => record.after_delete(),
    };
    result.map_err(|e| {
        tracing::warn!(operation = %op, error = %e, "after hook failed; write is not rolled back");
        CrudError::Hook {
            stage: HookStage::After,
            operation: op,
            message: e.0,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain;
    impl Hooks for Plain {}

    #[derive(Default)]
    struct Audited {
        name: String,
        calls: Vec<&'static str>,
    }

    impl Hooks for Audited {
        fn before_create(&mut self) -> HookResult {
            self.calls.push("before_create");
            if self.name.is_empty() {
                return Err(HookError::new("name is required"));
            }
            self.name = self.name.trim().to_string();
            Ok(())
        }

        fn after_delete(&self) -> HookResult {
            Err(HookError::new("audit sink unavailable"))
        }
    }

    #[test]
    fn defaults_pass_every_stage() {
        let mut p = Plain;
        for op in [Operation::Create, Operation::Update, Operation::Patch, Operation::Delete] {
            assert!(before(&mut p, op).is_ok());
            assert!(after(&p, op).is_ok());
        }
    }

    #[test]
    fn before_hook_can_mutate_and_reject() {
        let mut a = Audited {
            name: "  Alice ".into(),
            ..Default::default()
        };
        before(&mut a, Operation::Create).unwrap();
        assert_eq!(a.name, "Alice");

        let mut empty = Audited::default();
        let err = before(&mut empty, Operation::Create).unwrap_err();
        assert!(matches!(
            err,
            CrudError::Hook {
                stage: HookStage::Before,
                operation: Operation::Create,
                ..
            }
        ));
        assert_eq!(empty.calls, vec!["before_create"]);
    }

    #[test]
    fn only_the_matching_stage_runs() {
        let a = Audited::default();
        assert!(after(&a, Operation::Create).is_ok());
        let err = after(&a, Operation::Delete).unwrap_err();
        assert_eq!(err.to_string(), "after delete hook failed: audit sink unavailable");
    }
}
