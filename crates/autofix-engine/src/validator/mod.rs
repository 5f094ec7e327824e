//! Pre-execution validation
//!
//! Safety rules are built in: a case-insensitive deny-list of destructive
//! command fragments. Prerequisite, authorization and capability checks are
//! hook points; a rule whose type has no registered [`ValidationCheck`] passes.

use crate::types::{
    FixActionItem, FixPlan, RiskLevel, ValidationReport, ValidationResult, ValidationRule, ValidationSeverity,
    ValidationType,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Fragments the safety rule rejects by default
pub const DEFAULT_DENY_LIST: &[&str] = &["rm -rf", "DROP DATABASE", "DELETE FROM"];

/// Pluggable check for a non-safety rule type
pub trait ValidationCheck: Send + Sync {
    /// `Err(reason)` fails the rule at its declared severity
    fn check(&self, action: &FixActionItem, rule: &ValidationRule) -> Result<(), String>;
}

impl<F> ValidationCheck for F
where
    F: Fn(&FixActionItem, &ValidationRule) -> Result<(), String> + Send + Sync,
{
    fn check(&self, action: &FixActionItem, rule: &ValidationRule) -> Result<(), String> {
        self(action, rule)
    }
}

/// Per-call inputs that are not part of the plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationContext {
    /// Human who approved this run
    pub approved_by: Option<String>,
    pub dry_run: bool,
}

impl ValidationContext {
    fn approver(&self) -> Option<&str> {
        self.approved_by.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

/// Runs each action's rules plus plan-level checks
#[derive(Clone)]
pub struct Validator {
    deny_list: Vec<String>,
    hooks: HashMap<ValidationType, Arc<dyn ValidationCheck>>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("deny_list", &self.deny_list)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_DENY_LIST.iter().map(ToString::to_string).collect())
    }
}

impl Validator {
    #[must_use]
    pub fn new(deny_list: Vec<String>) -> Self {
        Self {
            deny_list: deny_list.into_iter().filter(|f| !f.trim().is_empty()).collect(),
            hooks: HashMap::new(),
        }
    }

    /// Register the check for a rule type; [`ValidationType::Safety`] is built in and ignored
    #[must_use]
    pub fn with_check(mut self, rule_type: ValidationType, check: impl ValidationCheck + 'static) -> Self {
        if rule_type == ValidationType::Safety {
            tracing::warn!("safety checks are built in; ignoring registered hook");
        } else {
            self.hooks.insert(rule_type, Arc::new(check));
        }
        self
    }

    #[must_use]
    pub fn deny_list(&self) -> &[String] {
        &self.deny_list
    }

    /// First deny-list fragment contained in `command`
    #[must_use]
    pub fn denied_fragment(&self, command: &str) -> Option<&str> {
        let command = command.to_lowercase();
        self.deny_list
            .iter()
            .find(|f| command.contains(&f.to_lowercase()))
            .map(String::as_str)
    }

    /// Validate a whole plan
    #[must_use]
    pub fn validate(&self, plan: &FixPlan, ctx: &ValidationContext) -> ValidationReport {
        let mut results: Vec<ValidationResult> = plan
            .actions
            .iter()
            .flat_map(|action| {
                action
                    .validation_rules
                    .iter()
                    .map(move |rule| self.evaluate(action, rule))
            })
            .collect();

        if plan.risk_assessment.level == RiskLevel::Critical {
            results.push(ValidationResult {
                rule_name: "critical_risk".to_string(),
                rule_type: ValidationType::Safety,
                action_id: None,
                passed: false,
                severity: ValidationSeverity::Error,
                message: format!(
                    "plan risk is critical (score {}): {}",
                    plan.risk_assessment.score, plan.risk_assessment.summary
                ),
            });
        }

        if plan.requires_approval && !ctx.dry_run {
            let approver = ctx.approver();
            results.push(ValidationResult {
                rule_name: "approval_required".to_string(),
                rule_type: ValidationType::Authorization,
                action_id: None,
                passed: approver.is_some(),
                severity: ValidationSeverity::Error,
                message: approver.map_or_else(
                    || "plan requires approval but no approver was supplied".to_string(),
                    |who| format!("approved by {who}"),
                ),
            });
        }

        let report = ValidationReport::from_results(results);
        tracing::debug!(
            plan_id = %plan.id,
            checks = report.results.len(),
            blocking = report.blocking().count(),
            "plan validated"
        );
        report
    }

    fn evaluate(&self, action: &FixActionItem, rule: &ValidationRule) -> ValidationResult {
        let (passed, severity, message) = match rule.rule_type {
            ValidationType::Safety => match self.denied_fragment(action.command()) {
                Some(fragment) => (
                    false,
                    ValidationSeverity::Error,
                    format!("command contains denied fragment `{fragment}`"),
                ),
                None => (true, ValidationSeverity::Error, "no denied fragments".to_string()),
            },
            other => match self.hooks.get(&other) {
                Some(hook) => match hook.check(action, rule) {
                    Ok(()) => (true, rule.severity, "check passed".to_string()),
                    Err(reason) => (false, rule.severity, reason),
                },
                None => (true, rule.severity, "no check registered".to_string()),
            },
        };

        tracing::debug!(action = %action.id, rule = %rule.name, passed, "validation rule evaluated");

        ValidationResult {
            rule_name: rule.name.clone(),
            rule_type: rule.rule_type,
            action_id: Some(action.id.clone()),
            passed,
            severity,
            message,
        }
    }
}
