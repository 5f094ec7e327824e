//! Execution outcomes

use super::validation::ValidationReport;
use super::{ActionId, ExecutionId, FixPlan, PlanId};
use crate::error::LifecycleError;
use crate::lifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of one execution attempt
///
/// `Pending → Validating → {ValidationFailed | Running} →
/// {Success | PartialSuccess | Failed → {RolledBack | RollbackFailed}} | Aborted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    Pending,
    Validating,
    ValidationFailed,
    Running,
    Success,
    /// Only `allow_failure` actions failed
    PartialSuccess,
    Failed,
    RolledBack,
    /// Manual remediation required
    RollbackFailed,
    Aborted,
}

impl FixStatus {
    /// No further transitions possible
    #[must_use]
    pub fn is_terminal(self) -> bool {
        lifecycle::allowed_transitions(self).is_empty()
    }
}

/// Status of one action within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    RolledBack,
}

/// Outcome of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: ActionId,
    pub sequence: u32,
    pub command: String,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: u64,
    /// Captured stdout
    #[serde(default)]
    pub output: String,
    /// Captured stderr
    #[serde(default)]
    pub error_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// What was mutated, for audit
    #[serde(default)]
    pub changes: Vec<String>,
}

impl ActionResult {
    /// A result that never ran
    #[must_use]
    pub fn pending(action_id: ActionId, sequence: u32, command: impl Into<String>) -> Self {
        Self {
            action_id,
            sequence,
            command: command.into(),
            status: ActionStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: 0,
            output: String::new(),
            error_output: String::new(),
            error: None,
            changes: Vec::new(),
        }
    }
}

/// One compensating attempt during rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackStep {
    pub action_id: ActionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// No rollback command was declared
    pub skipped: bool,
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured log line kept with the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,
    pub message: String,
}

/// Outcome of one execution attempt of a [`FixPlan`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    pub execution_id: ExecutionId,
    pub plan_id: PlanId,
    pub diagnosis_id: String,
    pub status: FixStatus,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub action_results: Vec<ActionResult>,
    /// Always set once validation has run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    pub rollback_performed: bool,
    pub rollback_success: bool,
    #[serde(default)]
    pub rollback_steps: Vec<RollbackStep>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl FixResult {
    /// Fresh `Pending` result for a plan
    #[must_use]
    pub fn new(plan: &FixPlan, dry_run: bool) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            plan_id: plan.id,
            diagnosis_id: plan.diagnosis_id.clone(),
            status: FixStatus::Pending,
            dry_run,
            started_at: Utc::now(),
            completed_at: None,
            action_results: Vec::new(),
            validation: None,
            rollback_performed: false,
            rollback_success: false,
            rollback_steps: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Move to a new status, stamping `completed_at` on terminal states
    pub fn transition(&mut self, to: FixStatus) -> Result<(), LifecycleError> {
        lifecycle::validate_transition(self.status, to)?;
        tracing::debug!(execution_id = %self.execution_id, from = ?self.status, to = ?to, "status transition");
        self.status = to;
        if to.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Stamp `completed_at`; `Failed` without rollback ends here too
    pub fn finish(&mut self) {
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Append a structured log entry and mirror it to `tracing`
    pub fn log(&mut self, level: LogLevel, action_id: Option<&ActionId>, message: impl Into<String>) {
        let message = message.into();
        let action = action_id.map(ToString::to_string).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(execution_id = %self.execution_id, action = %action, "{message}"),
            LogLevel::Info => tracing::info!(execution_id = %self.execution_id, action = %action, "{message}"),
            LogLevel::Warn => tracing::warn!(execution_id = %self.execution_id, action = %action, "{message}"),
            LogLevel::Error => tracing::error!(execution_id = %self.execution_id, action = %action, "{message}"),
        }
        self.logs.push(LogEntry {
            timestamp: Utc::now(),
            level,
            action_id: action_id.cloned(),
            message,
        });
    }

    /// Result for an action, if it was reached
    #[must_use]
    pub fn action_result(&self, id: &ActionId) -> Option<&ActionResult> {
        self.action_results.iter().find(|r| &r.action_id == id)
    }

    /// Whether the attempt ended without failures
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == FixStatus::Success
    }
}
