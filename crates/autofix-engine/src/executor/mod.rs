//! Serial plan execution
//!
//! The executor never validates. It runs an already validated plan one action
//! at a time, stops at the first blocking failure and compensates completed
//! actions in reverse order. Status changes go through [`FixResult::transition`].

pub mod direct;
pub mod shell;

pub use direct::{AlwaysConfirm, ConfirmationProvider, DirectExecutor};
pub use shell::ShellCommandRunner;

use crate::error::{CommandError, LifecycleError};
use crate::types::{
    ActionResult, ActionStatus, FixActionItem, FixPlan, FixResult, FixStatus, LogLevel, RollbackStep,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Prefix of every simulated action's output
pub const DRY_RUN_MARKER: &str = "[DRY RUN]";

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs one side-effecting command
///
/// Implementations should stop early when `cancel` fires.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, cancel: &CancellationToken) -> Result<CommandOutput, CommandError>;
}

/// Run `command` bounded by `timeout` and `cancel`
///
/// Cancellation is observed here too, so a runner that ignores the token
/// still cannot hold the executor.
pub(crate) async fn run_bounded(
    runner: &dyn CommandRunner,
    command: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CommandError> {
    let after_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CommandError::Cancelled),
        res = tokio::time::timeout(timeout, runner.run(command, cancel)) => {
            res.unwrap_or(Err(CommandError::TimedOut { after_ms }))
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

enum Halt {
    Failed,
    Aborted,
}

/// Serial executor with reverse-order rollback
#[derive(Clone)]
pub struct Executor {
    runner: Arc<dyn CommandRunner>,
    enable_rollback: bool,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("enable_rollback", &self.enable_rollback)
            .finish_non_exhaustive()
    }
}

impl Executor {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            enable_rollback: true,
        }
    }

    #[must_use]
    pub fn with_rollback(mut self, enabled: bool) -> Self {
        self.enable_rollback = enabled;
        self
    }

    /// Simulate every action; the runner is never called
    ///
    /// `result` must be `Running`; it ends `Success`.
    pub fn simulate(&self, plan: &FixPlan, result: &mut FixResult) -> Result<(), LifecycleError> {
        for item in &plan.actions {
            let now = Utc::now();
            let mut output = format!("{DRY_RUN_MARKER} would execute: {}", item.command());
            if let Some(rollback) = item.rollback_command() {
                output.push_str(&format!("\n{DRY_RUN_MARKER} rollback available: {rollback}"));
            }
            result.action_results.push(ActionResult {
                status: ActionStatus::Success,
                started_at: Some(now),
                completed_at: Some(now),
                output,
                ..ActionResult::pending(item.id.clone(), item.sequence, item.command())
            });
            result.log(
                LogLevel::Info,
                Some(&item.id),
                format!("{DRY_RUN_MARKER} simulated step {}", item.sequence),
            );
        }
        result.transition(FixStatus::Success)
    }

    /// Run the plan for real
    ///
    /// `result` must be `Running`; it ends in `Success`, `PartialSuccess`,
    /// `Failed`, `RolledBack`, `RollbackFailed` or `Aborted`.
    pub async fn execute(
        &self,
        plan: &FixPlan,
        result: &mut FixResult,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        result.action_results = plan
            .actions
            .iter()
            .map(|item| ActionResult::pending(item.id.clone(), item.sequence, item.command()))
            .collect();

        let mut completed: Vec<usize> = Vec::new();
        let mut tolerated = 0usize;
        let mut halt = None;

        for (idx, item) in plan.actions.iter().enumerate() {
            if cancel.is_cancelled() {
                result.log(LogLevel::Warn, Some(&item.id), "cancelled before step started");
                halt = Some(Halt::Aborted);
                break;
            }

            match self.run_action(idx, item, result, cancel).await {
                Ok(()) => completed.push(idx),
                Err(CommandError::Cancelled) => {
                    halt = Some(Halt::Aborted);
                    break;
                }
                Err(_) if item.allow_failure => {
                    tolerated += 1;
                    result.log(LogLevel::Warn, Some(&item.id), "failure tolerated, continuing");
                }
                Err(_) => {
                    halt = Some(Halt::Failed);
                    break;
                }
            }
        }

        for ar in &mut result.action_results {
            if ar.status == ActionStatus::Pending {
                ar.status = ActionStatus::Skipped;
            }
        }

        match halt {
            None if tolerated > 0 => {
                result.log(LogLevel::Warn, None, format!("{tolerated} tolerated failure(s)"));
                result.transition(FixStatus::PartialSuccess)
            }
            None => {
                result.log(LogLevel::Info, None, format!("all {} step(s) succeeded", plan.len()));
                result.transition(FixStatus::Success)
            }
            Some(Halt::Aborted) => {
                let done: Vec<&str> = completed.iter().map(|&i| plan.actions[i].id.as_str()).collect();
                result.log(
                    LogLevel::Warn,
                    None,
                    format!("execution aborted; completed steps left in place: [{}]", done.join(", ")),
                );
                result.transition(FixStatus::Aborted)
            }
            Some(Halt::Failed) => {
                result.transition(FixStatus::Failed)?;
                if !self.enable_rollback {
                    result.log(LogLevel::Warn, None, "execution failed; rollback disabled");
                } else if self.rollback(plan, result, &completed).await {
                    result.transition(FixStatus::RolledBack)?;
                } else {
                    result.transition(FixStatus::RollbackFailed)?;
                }
                result.finish();
                Ok(())
            }
        }
    }

    async fn run_action(
        &self,
        idx: usize,
        item: &FixActionItem,
        result: &mut FixResult,
        cancel: &CancellationToken,
    ) -> Result<(), CommandError> {
        result.log(
            LogLevel::Info,
            Some(&item.id),
            format!("step {}: {}", item.sequence, item.action.description),
        );
        let started_at = Utc::now();
        result.action_results[idx].started_at = Some(started_at);
        result.action_results[idx].status = ActionStatus::Running;

        let start = Instant::now();
        let outcome = run_bounded(self.runner.as_ref(), item.command(), item.timeout(), cancel).await;

        let ar = &mut result.action_results[idx];
        ar.completed_at = Some(Utc::now());
        ar.duration_ms = elapsed_ms(start);

        match outcome {
            Ok(output) => {
                ar.status = ActionStatus::Success;
                ar.output = output.stdout;
                ar.error_output = output.stderr;
                ar.changes.push(item.command().to_string());
                let ms = ar.duration_ms;
                result.log(LogLevel::Info, Some(&item.id), format!("succeeded in {ms}ms"));
                Ok(())
            }
            Err(err) => {
                ar.status = ActionStatus::Failed;
                if let CommandError::Failed { stderr, .. } = &err {
                    ar.error_output.clone_from(stderr);
                }
                ar.error = Some(err.to_string());
                result.log(LogLevel::Error, Some(&item.id), format!("failed: {err}"));
                Err(err)
            }
        }
    }

    /// Compensate `completed` in reverse; `true` when nothing failed
    ///
    /// Uses its own token so a cancelled execution cannot interrupt it.
    async fn rollback(&self, plan: &FixPlan, result: &mut FixResult, completed: &[usize]) -> bool {
        result.rollback_performed = true;
        result.log(
            LogLevel::Info,
            None,
            format!("rolling back {} completed step(s)", completed.len()),
        );
        let token = CancellationToken::new();

        for &idx in completed.iter().rev() {
            let item = &plan.actions[idx];
            let Some(command) = item.rollback_command() else {
                result.log(LogLevel::Warn, Some(&item.id), "no rollback command; skipped");
                result.rollback_steps.push(RollbackStep {
                    action_id: item.id.clone(),
                    command: None,
                    skipped: true,
                    success: true,
                    output: String::new(),
                    error: None,
                });
                continue;
            };

            match run_bounded(self.runner.as_ref(), command, item.timeout(), &token).await {
                Ok(output) => {
                    result.action_results[idx].status = ActionStatus::RolledBack;
                    result.rollback_steps.push(RollbackStep {
                        action_id: item.id.clone(),
                        command: Some(command.to_string()),
                        skipped: false,
                        success: true,
                        output: output.stdout,
                        error: None,
                    });
                    result.log(LogLevel::Info, Some(&item.id), "rolled back");
                }
                Err(err) => {
                    result.rollback_steps.push(RollbackStep {
                        action_id: item.id.clone(),
                        command: Some(command.to_string()),
                        skipped: false,
                        success: false,
                        output: String::new(),
                        error: Some(err.to_string()),
                    });
                    result.log(
                        LogLevel::Error,
                        Some(&item.id),
                        format!("rollback failed, manual remediation required: {err}"),
                    );
                    result.rollback_success = false;
                    return false;
                }
            }
        }

        result.rollback_success = true;
        true
    }
}
