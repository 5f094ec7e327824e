//! Execution status machine
//!
//! The allowed transitions of a [`crate::types::FixStatus`]; every status
//! change on a result is checked here.

use crate::error::LifecycleError;
use crate::types::FixStatus;

/// Validates an execution status transition.
///
/// Illegal transitions return an error; with the `strict-debug` feature they
/// panic instead so test runs surface the offending call site.
pub fn validate_transition(from: FixStatus, to: FixStatus) -> Result<(), LifecycleError> {
    if allowed(from, to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal status transition attempted: {from:?} -> {to:?}");

        #[cfg(not(feature = "strict-debug"))]
        Err(LifecycleError::IllegalTransition { from, to })
    }
}

#[must_use]
pub fn allowed_transitions(from: FixStatus) -> Vec<FixStatus> {
    use FixStatus::*;
    match from {
        Pending => vec![Validating, Aborted],
        Validating => vec![ValidationFailed, Running, Aborted],
        Running => vec![Success, PartialSuccess, Failed, Aborted],
        Failed => vec![RolledBack, RollbackFailed],
        ValidationFailed | Success | PartialSuccess | RolledBack | RollbackFailed | Aborted => vec![],
    }
}

fn allowed(from: FixStatus, to: FixStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
