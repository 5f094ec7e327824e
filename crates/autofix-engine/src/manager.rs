//! Orchestration façade
//!
//! [`AutoFixManager`] is the only entry point that runs side effects under
//! governance: every execution is validated first and recorded last, whatever
//! happens in between.

use crate::config::{AutoFixOptions, EngineConfig};
use crate::diagnosis::{Issue, Recommendation};
use crate::error::{AutoFixError, StoreError};
use crate::executor::{CommandRunner, ConfirmationProvider, DirectExecutor, Executor};
use crate::graph;
use crate::risk::{RiskAssessor, RiskRuleSet};
use crate::store::{RecordFilter, RecordStore};
use crate::types::{
    ActionCategory, ActionId, ExecutionRecord, ExecutionStrategy, FixAction, FixActionItem, FixPlan, FixResult,
    FixStatus, LogLevel, PlanId, RecordId, RiskAssessment, ValidationReport, ValidationRule, ValidationSeverity,
    ValidationType,
};
use crate::validator::{ValidationContext, Validator};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call execution inputs
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub cancel: CancellationToken,
    /// Copied onto the audit record
    pub tags: Vec<String>,
    pub system_state: BTreeMap<String, serde_json::Value>,
}

impl ExecutionRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve now on behalf of `approver`
    #[must_use]
    pub fn approved_by(mut self, approver: impl Into<String>) -> Self {
        self.approved_by = Some(approver.into());
        self.approved_at = Some(Utc::now());
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_system_state(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.system_state.insert(key.into(), value);
        self
    }

    fn approver(&self) -> Option<&str> {
        self.approved_by.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

/// What an execution produced
///
/// A store failure never hides the result.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub result: FixResult,
    pub record: Result<RecordId, StoreError>,
}

impl ExecutionOutcome {
    #[inline]
    #[must_use]
    pub fn status(&self) -> FixStatus {
        self.result.status
    }
}

pub struct AutoFixManager {
    options: AutoFixOptions,
    risk: RiskAssessor,
    validator: Validator,
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for AutoFixManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoFixManager")
            .field("options", &self.options)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl AutoFixManager {
    /// Manager with the default risk table and deny-list
    #[must_use]
    pub fn new(options: AutoFixOptions, runner: Arc<dyn CommandRunner>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            options,
            risk: RiskAssessor::default(),
            validator: Validator::default(),
            runner,
            store,
        }
    }

    /// Manager wired from a loaded configuration file
    #[must_use]
    pub fn from_config(config: &EngineConfig, runner: Arc<dyn CommandRunner>, store: Arc<dyn RecordStore>) -> Self {
        Self::new(config.autofix.clone(), runner, store)
            .with_risk_assessor(RiskAssessor::new(config.risk.rules.clone()))
            .with_validator(Validator::new(config.safety.deny_list.clone()))
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_risk_assessor(mut self, risk: RiskAssessor) -> Self {
        self.risk = risk;
        self
    }

    #[must_use]
    pub fn with_risk_rules(self, rules: RiskRuleSet) -> Self {
        self.with_risk_assessor(RiskAssessor::new(rules))
    }

    #[must_use]
    pub fn options(&self) -> &AutoFixOptions {
        &self.options
    }

    fn ensure_enabled(&self) -> Result<(), AutoFixError> {
        if self.options.enabled {
            Ok(())
        } else {
            Err(AutoFixError::Disabled)
        }
    }

    /// Turn a diagnosis into an ordered, risk-assessed plan
    pub fn build_plan(&self, diagnosis_id: &str, issues: &[Issue]) -> Result<FixPlan, AutoFixError> {
        self.ensure_enabled()?;
        self.options.validate()?;

        let items: Vec<FixActionItem> = issues
            .iter()
            .flat_map(|issue| {
                issue
                    .auto_fixable()
                    .map(move |(n, rec)| self.action_item(issue, n, rec))
            })
            .collect();

        if items.is_empty() {
            return Err(AutoFixError::NoAutoFixableRecommendations {
                diagnosis_id: diagnosis_id.to_string(),
            });
        }

        let mut actions = graph::sort_actions(items)?;
        for item in &mut actions {
            item.risk = Some(self.risk.assess_action(item));
        }

        let risk_assessment = self.risk.assess(&actions);
        let requires_approval = risk_assessment.requires_approval
            || self.options.require_approval
            || risk_assessment.level > self.options.max_risk_level;

        let mut metadata = BTreeMap::new();
        metadata.insert("issue_count".to_string(), issues.len().to_string());
        metadata.insert("max_risk_level".to_string(), self.options.max_risk_level.to_string());
        metadata.insert("engine_version".to_string(), crate::VERSION.to_string());

        let plan = FixPlan {
            id: PlanId::new(),
            diagnosis_id: diagnosis_id.to_string(),
            created_at: Utc::now(),
            actions,
            strategy: ExecutionStrategy::Serial,
            risk_assessment,
            requires_approval,
            dry_run: self.options.dry_run,
            metadata,
        };

        tracing::info!(
            plan_id = %plan.id,
            diagnosis_id,
            actions = plan.len(),
            risk = %plan.risk_assessment.level,
            requires_approval,
            "fix plan built"
        );
        Ok(plan)
    }

    fn action_item(&self, issue: &Issue, n: usize, rec: &Recommendation) -> FixActionItem {
        let id = if rec.id.trim().is_empty() {
            format!("{}-{n}", issue.id)
        } else {
            rec.id.clone()
        };
        let description = if rec.description.trim().is_empty() {
            issue.title.clone()
        } else {
            rec.description.clone()
        };

        let action = FixAction {
            description,
            command: rec.command.clone(),
            rollback_command: rec.rollback_command.clone(),
            category: ActionCategory::parse_or_infer(&rec.category, &rec.command),
            parameters: rec.parameters.clone(),
        };
        let timeout = rec
            .timeout_secs
            .map_or_else(|| self.options.action_timeout(), Duration::from_secs);

        FixActionItem::new(id, action)
            .depends_on(rec.depends_on.iter().map(|d| ActionId::from(d.as_str())))
            .with_timeout(timeout)
            .with_rule(ValidationRule::safety())
            .with_rule(
                ValidationRule::new("target_ready", ValidationType::Prerequisite, ValidationSeverity::Warning)
                    .with_description("target instance is reachable and healthy enough to change")
                    .with_parameter("instance", issue.instance.clone()),
            )
            .with_rule(
                ValidationRule::new("operator_authorized", ValidationType::Authorization, ValidationSeverity::Error)
                    .with_description("caller may change this component")
                    .with_parameter("component", issue.component.clone()),
            )
    }

    /// Re-assess a set of actions with this manager's rules
    #[must_use]
    pub fn assess_risk(&self, actions: &[FixActionItem]) -> RiskAssessment {
        self.risk.assess(actions)
    }

    /// Validate without executing
    #[must_use]
    pub fn validate_plan(&self, plan: &FixPlan, ctx: &ValidationContext) -> ValidationReport {
        self.validator.validate(plan, ctx)
    }

    /// Validate, execute (or simulate) and record a plan
    ///
    /// # Errors
    /// Only for problems found before validation: disabled engine or an
    /// unsupported strategy. Everything after that is in the outcome.
    pub async fn execute_fix_plan(
        &self,
        plan: &FixPlan,
        request: ExecutionRequest,
    ) -> Result<ExecutionOutcome, AutoFixError> {
        self.run(plan, request, false).await
    }

    /// Simulate a plan regardless of its `dry_run` flag
    pub async fn dry_run(&self, plan: &FixPlan) -> Result<ExecutionOutcome, AutoFixError> {
        self.run(plan, ExecutionRequest::new(), true).await
    }

    #[tracing::instrument(
        name = "execute_fix_plan",
        skip_all,
        fields(plan_id = %plan.id, diagnosis_id = %plan.diagnosis_id, execution_id = tracing::field::Empty)
    )]
    async fn run(
        &self,
        plan: &FixPlan,
        request: ExecutionRequest,
        force_dry_run: bool,
    ) -> Result<ExecutionOutcome, AutoFixError> {
        self.ensure_enabled()?;
        if plan.strategy != ExecutionStrategy::Serial {
            return Err(AutoFixError::UnsupportedStrategy(plan.strategy));
        }

        let dry_run = force_dry_run || plan.dry_run || self.options.dry_run;
        let mut result = FixResult::new(plan, dry_run);
        tracing::Span::current().record("execution_id", tracing::field::display(result.execution_id));

        result.transition(FixStatus::Validating)?;
        let ctx = ValidationContext {
            approved_by: request.approver().map(ToString::to_string),
            dry_run,
        };
        let report = self.validator.validate(plan, &ctx);
        result.validation = Some(report.clone());

        if report.all_passed {
            for warning in report.warnings() {
                result.log(
                    LogLevel::Warn,
                    warning.action_id.as_ref(),
                    format!("{}: {}", warning.rule_name, warning.message),
                );
            }
            result.transition(FixStatus::Running)?;
            let executor = Executor::new(Arc::clone(&self.runner)).with_rollback(self.options.enable_rollback);
            if dry_run {
                result.log(LogLevel::Info, None, "dry run: simulating plan");
                executor.simulate(plan, &mut result)?;
            } else {
                result.log(LogLevel::Info, None, format!("executing {} step(s)", plan.len()));
                executor.execute(plan, &mut result, &request.cancel).await?;
            }
        } else {
            for failure in report.blocking() {
                result.log(
                    LogLevel::Error,
                    failure.action_id.as_ref(),
                    format!("validation failed: {}: {}", failure.rule_name, failure.message),
                );
            }
            result.transition(FixStatus::ValidationFailed)?;
        }
        result.finish();

        tracing::info!(status = ?result.status, dry_run, "execution finished");
        let record = self.record_execution(plan, &result, &request).await;
        Ok(ExecutionOutcome { result, record })
    }

    /// Persist the audit record of one attempt
    pub async fn record_execution(
        &self,
        plan: &FixPlan,
        result: &FixResult,
        request: &ExecutionRequest,
    ) -> Result<RecordId, StoreError> {
        let mut record = ExecutionRecord::new(plan.clone(), result.clone())
            .with_tags(request.tags.iter().cloned())
            .with_system_state(request.system_state.clone());
        if let Some(approver) = request.approver() {
            record = record.approved_by(approver, request.approved_at.unwrap_or(result.started_at));
        }

        match self.store.store(record).await {
            Ok(id) => {
                tracing::info!(record_id = %id, "execution recorded");
                Ok(id)
            }
            Err(err) => {
                tracing::error!(error = %err, execution_id = %result.execution_id, "failed to record execution");
                Err(err)
            }
        }
    }

    pub async fn get_record(&self, id: RecordId) -> Result<ExecutionRecord, StoreError> {
        self.store.get(id).await
    }

    pub async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<ExecutionRecord>, StoreError> {
        self.store.list(filter).await
    }

    /// Ungoverned, confirmation-gated executor sharing this manager's runner
    ///
    /// Direct execution has no simulation mode, so it is refused unless the
    /// manager is enabled and `dry_run` is off.
    pub fn direct_executor(&self, confirmation: Arc<dyn ConfirmationProvider>) -> Result<DirectExecutor, AutoFixError> {
        self.ensure_enabled()?;
        if self.options.dry_run {
            return Err(AutoFixError::DirectExecutionInDryRun);
        }
        Ok(DirectExecutor::new(Arc::clone(&self.runner), confirmation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use crate::executor::{AlwaysConfirm, CommandOutput};
    use crate::store::InMemoryRecordStore;
    use crate::types::RiskLevel;

    struct OkRunner;

    #[async_trait::async_trait]
    impl CommandRunner for OkRunner {
        async fn run(&self, _command: &str, _cancel: &CancellationToken) -> Result<CommandOutput, CommandError> {
            Ok(CommandOutput::default())
        }
    }

    fn manager(options: AutoFixOptions) -> AutoFixManager {
        AutoFixManager::new(options, Arc::new(OkRunner), Arc::new(InMemoryRecordStore::new()))
    }

    fn issue() -> Issue {
        Issue::new("slow-queries", "slow queries")
            .with_recommendation(Recommendation::auto("systemctl restart mysql", "restart"))
            .with_recommendation(Recommendation::auto("mysql -e 'SET GLOBAL max_connections=500'", "config"))
    }

    #[test]
    fn disabled_manager_refuses_to_plan() {
        let err = manager(AutoFixOptions::default()).build_plan("d", &[issue()]).unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn plan_orders_config_before_restart() {
        let plan = manager(AutoFixOptions::live()).build_plan("d", &[issue()]).unwrap();
        let ids: Vec<_> = plan.actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["slow-queries-2", "slow-queries-1"]);
        assert!(plan.actions.iter().all(|a| a.risk.is_some() && a.validation_rules.len() == 3));
        assert_eq!(plan.metadata["issue_count"], "1");
    }

    #[test]
    fn exceeding_max_risk_level_requires_approval() {
        let restart_only = Issue::new("i", "restart")
            .with_recommendation(Recommendation::auto("systemctl restart mysql", "restart"));
        let opts = AutoFixOptions::live().with_max_risk_level(RiskLevel::Low);
        let plan = manager(opts).build_plan("d", &[restart_only]).unwrap();
        assert_eq!(plan.risk_assessment.level, RiskLevel::Medium);
        assert!(!plan.risk_assessment.requires_approval);
        assert!(plan.requires_approval);
    }

    #[test]
    fn nothing_eligible_is_an_error() {
        let manual = Issue::new("i", "manual").with_recommendation(Recommendation {
            can_auto_fix: false,
            ..Recommendation::auto("reboot", "restart")
        });
        let err = manager(AutoFixOptions::live()).build_plan("d", &[manual]).unwrap_err();
        assert!(matches!(err, AutoFixError::NoAutoFixableRecommendations { .. }));
    }

    #[test]
    fn direct_execution_requires_live_mode() {
        let enabled_dry = AutoFixOptions::default().with_enabled(true);
        let err = manager(enabled_dry).direct_executor(Arc::new(AlwaysConfirm)).unwrap_err();
        assert!(matches!(err, AutoFixError::DirectExecutionInDryRun));
        assert!(err.is_configuration());

        let disabled = AutoFixOptions::live().with_enabled(false);
        assert!(matches!(
            manager(disabled).direct_executor(Arc::new(AlwaysConfirm)),
            Err(AutoFixError::Disabled)
        ));

        assert!(manager(AutoFixOptions::live()).direct_executor(Arc::new(AlwaysConfirm)).is_ok());
    }

    #[test]
    fn dependency_on_manual_recommendation_fails_closed() {
        let issue = Issue::new("i", "mixed")
            .with_recommendation(Recommendation {
                can_auto_fix: false,
                ..Recommendation::auto("redis-cli config rewrite", "config").with_id("a")
            })
            .with_recommendation(Recommendation::auto("redis-cli ping", "validation").with_id("b").depends_on(["a"]));
        let err = manager(AutoFixOptions::live()).build_plan("d", &[issue]).unwrap_err();
        assert!(matches!(
            err,
            AutoFixError::Plan(crate::error::PlanError::UnknownDependency { ref action, ref dependency })
                if action.as_str() == "b" && dependency.as_str() == "a"
        ));
    }

    #[test]
    fn generated_ids_count_manual_recommendations() {
        let issue = Issue::new("i", "mixed")
            .with_recommendation(Recommendation::default())
            .with_recommendation(Recommendation::auto("redis-cli ping", "validation"));
        let plan = manager(AutoFixOptions::live()).build_plan("d", &[issue]).unwrap();
        assert_eq!(plan.actions[0].id.as_str(), "i-2");
    }

    #[test]
    fn recommendation_timeout_overrides_default() {
        let issue = Issue::new("i", "t").with_recommendation(Recommendation {
            timeout_secs: Some(5),
            ..Recommendation::auto("redis-cli ping", "validation")
        });
        let plan = manager(AutoFixOptions::live()).build_plan("d", &[issue]).unwrap();
        assert_eq!(plan.actions[0].timeout(), Duration::from_secs(5));
    }
}
