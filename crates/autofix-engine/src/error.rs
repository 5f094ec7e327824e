//! Error types for the AutoFix engine
//!
//! Errors are split by where they surface:
//! - [`AutoFixError`]: returned by the manager before a plan is recorded
//!   (configuration and structural problems)
//! - [`PlanError`]: dependency graph failures at plan-build time
//! - [`CommandError`]: a single command run by a [`crate::executor::CommandRunner`]
//! - [`StoreError`]: audit record persistence
//! - [`ConfigError`]: loading engine configuration
//! - [`LifecycleError`]: illegal execution status transitions

use crate::types::{ActionId, ExecutionStrategy, FixStatus, RecordId};
use std::path::PathBuf;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum AutoFixError {
    /// Auto-fix has not been opted into
    #[error("auto-fix is disabled; set `enabled = true` to build or execute fix plans")]
    Disabled,

    /// No recommendation qualified for automatic remediation
    #[error("no auto-fixable recommendations for diagnosis {diagnosis_id}")]
    NoAutoFixableRecommendations {
        /// Diagnosis the recommendations came from
        diagnosis_id: String,
    },

    /// Plan could not be ordered
    #[error("plan construction failed: {0}")]
    Plan(#[from] PlanError),

    /// Strategy is declared but not executable
    #[error("unsupported execution strategy: {0}")]
    UnsupportedStrategy(ExecutionStrategy),

    /// Direct execution cannot simulate
    #[error("direct execution refused: dry_run is enabled; disable it to run commands for real")]
    DirectExecutionInDryRun,

    /// Status machine was driven illegally
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AutoFixError {
    /// Errors caused by how the engine was configured or fed
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Disabled
                | Self::NoAutoFixableRecommendations { .. }
                | Self::UnsupportedStrategy(_)
                | Self::DirectExecutionInDryRun
                | Self::Config(_)
        )
    }

    /// Errors in the shape of the plan itself
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Plan(_))
    }
}

/// Dependency graph errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// `depends_on` edges form at least one cycle
    #[error("dependency cycle detected between actions {}", join_ids(.actions))]
    CycleDetected {
        /// Actions that take part in a cycle
        actions: Vec<ActionId>,
    },

    /// `depends_on` references an action that is not in the plan
    #[error("action {action} depends on unknown action {dependency}")]
    UnknownDependency {
        /// Declaring action
        action: ActionId,
        /// Missing dependency
        dependency: ActionId,
    },

    /// Two actions share an ID
    #[error("duplicate action id {0}")]
    DuplicateActionId(ActionId),
}

fn join_ids(ids: &[ActionId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of one command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Command ran and reported failure
    #[error("command failed (exit code {}): {stderr}", .exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Failed {
        /// Process exit code, if it exited normally
        exit_code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// Command exceeded the action timeout
    #[error("command timed out after {after_ms}ms")]
    TimedOut {
        /// Timeout that elapsed
        after_ms: u64,
    },

    /// Execution context was cancelled
    #[error("command cancelled")]
    Cancelled,

    /// Command could not be started
    #[error("failed to spawn command: {0}")]
    Spawn(String),
}

/// Record store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record with this ID
    #[error("execution record {0} not found")]
    NotFound(RecordId),

    /// Records are write-once
    #[error("execution record {0} already exists and cannot be overwritten")]
    AlreadyExists(RecordId),

    /// Record could not be encoded
    #[error("failed to serialize record: {0}")]
    Serialization(String),

    /// Backend-specific failure
    #[error("record store backend error: {0}")]
    Backend(String),

    /// Stored digest chain does not match record contents
    #[error("integrity violation at record {0}")]
    IntegrityViolation(RecordId),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// Parsed values are unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Execution status machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// Transition not in the allowed table
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current status
        from: FixStatus,
        /// Requested status
        to: FixStatus,
    },
}
