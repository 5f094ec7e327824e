//! Testing utilities for the AutoFix workspace
//!
//! Shared fakes and fixtures for integration tests.

#![allow(missing_docs)]

use autofix_engine::types::{
    ActionCategory, ExecutionRecord, ExecutionStrategy, FixAction, FixActionItem, FixPlan, PlanId, RecordId,
    RiskAssessment, ValidationRule,
};
use autofix_engine::{
    AutoFixManager, AutoFixOptions, CommandError, CommandOutput, CommandRunner, InMemoryRecordStore, Issue,
    Recommendation, RecordFilter, RecordStore, RiskAssessor, StoreError,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runner that records every command and follows a script
///
/// Commands containing a failure fragment fail with exit code 1; commands
/// containing a delay fragment sleep first (cancellable). Everything else
/// succeeds and echoes the command on stdout.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    failures: Vec<String>,
    delays: Vec<(String, Duration)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.failures.push(fragment.into());
        self
    }

    #[must_use]
    pub fn delay_on(mut self, fragment: impl Into<String>, delay: Duration) -> Self {
        self.delays.push((fragment.into(), delay));
        self
    }

    /// Every command received, in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, cancel: &CancellationToken) -> Result<CommandOutput, CommandError> {
        self.calls.lock().push(command.to_string());

        if let Some((_, delay)) = self.delays.iter().find(|(f, _)| command.contains(f.as_str())) {
            tokio::select! {
                () = cancel.cancelled() => return Err(CommandError::Cancelled),
                () = tokio::time::sleep(*delay) => {}
            }
        }

        if self.failures.iter().any(|f| command.contains(f.as_str())) {
            return Err(CommandError::Failed {
                exit_code: Some(1),
                stderr: format!("scripted failure: {command}"),
            });
        }
        Ok(CommandOutput::stdout(command))
    }
}

/// Store whose writes always fail
#[derive(Debug, Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordStore for FailingStore {
    async fn store(&self, _record: ExecutionRecord) -> Result<RecordId, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Backend("disk full".to_string()))
    }

    async fn get(&self, id: RecordId) -> Result<ExecutionRecord, StoreError> {
        Err(StoreError::NotFound(id))
    }

    async fn list(&self, _filter: &RecordFilter) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(Vec::new())
    }
}

/// Auto-fixable recommendation with an explicit ID
#[must_use]
pub fn recommendation(id: &str, command: &str, category: &str) -> Recommendation {
    Recommendation::auto(command, category)
        .with_id(id)
        .with_description(format!("{id}: {command}"))
}

/// Same, with a compensating command
#[must_use]
pub fn reversible(id: &str, command: &str, category: &str, rollback: &str) -> Recommendation {
    recommendation(id, command, category).with_rollback(rollback)
}

#[must_use]
pub fn issue(id: &str, recommendations: Vec<Recommendation>) -> Issue {
    recommendations
        .into_iter()
        .fold(Issue::new(id, format!("issue {id}")), Issue::with_recommendation)
}

/// Plan item guarded by the safety rule
#[must_use]
pub fn item(id: &str, command: &str, category: ActionCategory) -> FixActionItem {
    FixActionItem::new(id, FixAction::new(id, command).with_category(category)).with_rule(ValidationRule::safety())
}

/// Risk-assessed serial plan over `actions`, kept in the given order
#[must_use]
pub fn plan(actions: Vec<FixActionItem>) -> FixPlan {
    let actions: Vec<FixActionItem> = actions
        .into_iter()
        .zip(1u32..)
        .map(|(mut a, seq)| {
            a.sequence = seq;
            a
        })
        .collect();
    let risk_assessment: RiskAssessment = RiskAssessor::default().assess(&actions);
    FixPlan {
        id: PlanId::new(),
        diagnosis_id: "diag-test".to_string(),
        created_at: Utc::now(),
        requires_approval: risk_assessment.requires_approval,
        actions,
        strategy: ExecutionStrategy::Serial,
        risk_assessment,
        dry_run: false,
        metadata: BTreeMap::new(),
    }
}

/// Everything a lifecycle test needs
pub struct Harness {
    pub manager: AutoFixManager,
    pub runner: Arc<ScriptedRunner>,
    pub store: Arc<InMemoryRecordStore>,
}

impl Harness {
    /// Enabled, live, no blanket approval demand
    #[must_use]
    pub fn live(runner: ScriptedRunner) -> Self {
        Self::with_options(AutoFixOptions::live(), runner)
    }

    #[must_use]
    pub fn with_options(options: AutoFixOptions, runner: ScriptedRunner) -> Self {
        let runner = Arc::new(runner);
        let store = Arc::new(InMemoryRecordStore::new());
        let manager = AutoFixManager::new(
            options,
            Arc::clone(&runner) as Arc<dyn CommandRunner>,
            Arc::clone(&store) as Arc<dyn RecordStore>,
        );
        Self { manager, runner, store }
    }
}
