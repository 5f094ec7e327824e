//! Human-in-the-loop execution outside the governed lifecycle
//!
//! Every step is confirmed before it runs. Declined steps are skipped and the
//! first failure stops the run. Nothing is rolled back or recorded.

use super::{elapsed_ms, run_bounded, CommandRunner};
use crate::types::{ActionResult, ActionStatus, FixActionItem};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Asks an operator whether to run a step
pub trait ConfirmationProvider: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> ConfirmationProvider for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Confirms everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl ConfirmationProvider for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

pub struct DirectExecutor {
    runner: Arc<dyn CommandRunner>,
    confirmation: Arc<dyn ConfirmationProvider>,
}

impl std::fmt::Debug for DirectExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectExecutor").finish_non_exhaustive()
    }
}

impl DirectExecutor {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, confirmation: Arc<dyn ConfirmationProvider>) -> Self {
        Self { runner, confirmation }
    }

    /// Run `actions` in order, one result per action
    pub async fn run(&self, actions: &[FixActionItem], cancel: &CancellationToken) -> Vec<ActionResult> {
        let total = actions.len();
        let mut results: Vec<ActionResult> = actions
            .iter()
            .map(|a| ActionResult::pending(a.id.clone(), a.sequence, a.command()))
            .collect();

        for (idx, item) in actions.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(action = %item.id, "direct execution cancelled");
                break;
            }

            let prompt = format!(
                "[{}/{total}] {}\n  $ {}\nRun this step?",
                idx + 1,
                item.action.description,
                item.command()
            );
            if !self.confirmation.confirm(&prompt) {
                tracing::info!(action = %item.id, "step declined");
                results[idx].status = ActionStatus::Skipped;
                continue;
            }

            let started_at = Utc::now();
            let start = Instant::now();
            let outcome = run_bounded(self.runner.as_ref(), item.command(), item.timeout(), cancel).await;

            let ar = &mut results[idx];
            ar.started_at = Some(started_at);
            ar.completed_at = Some(Utc::now());
            ar.duration_ms = elapsed_ms(start);
            match outcome {
                Ok(output) => {
                    ar.status = ActionStatus::Success;
                    ar.output = output.stdout;
                    ar.error_output = output.stderr;
                    tracing::info!(action = %item.id, "step succeeded");
                }
                Err(err) => {
                    ar.status = ActionStatus::Failed;
                    ar.error = Some(err.to_string());
                    tracing::warn!(action = %item.id, error = %err, "step failed; stopping");
                    break;
                }
            }
        }

        for ar in &mut results {
            if ar.status == ActionStatus::Pending {
                ar.status = ActionStatus::Skipped;
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use crate::executor::CommandOutput;
    use crate::types::FixAction;

    struct EchoRunner;

    #[async_trait::async_trait]
    impl CommandRunner for EchoRunner {
        async fn run(&self, command: &str, _cancel: &CancellationToken) -> Result<CommandOutput, CommandError> {
            if command.contains("fail") {
                Err(CommandError::Failed {
                    exit_code: Some(1),
                    stderr: String::new(),
                })
            } else {
                Ok(CommandOutput::stdout(command))
            }
        }
    }

    fn step(id: &str, command: &str) -> FixActionItem {
        FixActionItem::new(id, FixAction::new(id, command))
    }

    #[tokio::test]
    async fn declined_step_is_skipped() {
        let exec = DirectExecutor::new(
            Arc::new(EchoRunner),
            Arc::new(|prompt: &str| !prompt.contains("second")),
        );
        let results = exec
            .run(&[step("first", "one"), step("second", "two"), step("third", "three")], &CancellationToken::new())
            .await;
        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![ActionStatus::Success, ActionStatus::Skipped, ActionStatus::Success]
        );
    }

    #[tokio::test]
    async fn failure_stops_the_run() {
        let exec = DirectExecutor::new(Arc::new(EchoRunner), Arc::new(AlwaysConfirm));
        let results = exec
            .run(&[step("a", "fail"), step("b", "ok")], &CancellationToken::new())
            .await;
        assert_eq!(results[0].status, ActionStatus::Failed);
        assert_eq!(results[1].status, ActionStatus::Skipped);
    }
}
