//! Fix plans and the actions they contain

use super::validation::ValidationRule;
use super::{ActionCategory, ActionId, PlanId, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// One executable remediation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixAction {
    /// Human-readable description
    pub description: String,
    /// Shell-like command
    pub command: String,
    /// Compensating command, if the step can be undone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_command: Option<String>,
    /// Category as declared by the recommendation
    #[serde(default)]
    pub category: ActionCategory,
    /// Free-form parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl FixAction {
    /// Create an action with no rollback path
    #[must_use]
    pub fn new(description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            command: command.into(),
            rollback_command: None,
            category: ActionCategory::Other,
            parameters: BTreeMap::new(),
        }
    }

    /// With a compensating command
    #[must_use]
    pub fn with_rollback(mut self, command: impl Into<String>) -> Self {
        self.rollback_command = Some(command.into());
        self
    }

    /// With category
    #[must_use]
    pub fn with_category(mut self, category: ActionCategory) -> Self {
        self.category = category;
        self
    }
}

/// A [`FixAction`] placed in a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixActionItem {
    pub id: ActionId,
    /// 1-based position in execution order
    pub sequence: u32,
    pub action: FixAction,
    pub category: ActionCategory,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
    pub timeout_ms: u64,
    #[serde(default)]
    pub depends_on: Vec<ActionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<ActionRisk>,
    /// A failure here does not stop the plan
    #[serde(default)]
    pub allow_failure: bool,
}

impl FixActionItem {
    /// Wrap an action; category is taken from the action
    #[must_use]
    pub fn new(id: impl Into<ActionId>, action: FixAction) -> Self {
        Self {
            id: id.into(),
            sequence: 0,
            category: action.category,
            action,
            validation_rules: Vec::new(),
            timeout_ms: 300_000,
            depends_on: Vec::new(),
            risk: None,
            allow_failure: false,
        }
    }

    /// With explicit dependencies
    #[must_use]
    pub fn depends_on<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ActionId>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    /// With a validation rule appended
    #[must_use]
    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    /// With timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Mark as non-blocking on failure
    #[must_use]
    pub fn allowing_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[inline]
    #[must_use]
    pub fn command(&self) -> &str {
        &self.action.command
    }

    #[inline]
    #[must_use]
    pub fn rollback_command(&self) -> Option<&str> {
        self.action
            .rollback_command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }
}

/// How a plan's actions are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// One action at a time in dependency order
    Serial,
    /// Declared, not executable
    Parallel,
    /// Declared, not executable
    Conditional,
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        ExecutionStrategy::Serial
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStrategy::Serial => "serial",
            ExecutionStrategy::Parallel => "parallel",
            ExecutionStrategy::Conditional => "conditional",
        };
        f.write_str(s)
    }
}

/// One matched risk rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub description: String,
    pub severity: RiskLevel,
    pub score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,
}

/// Risk of a single action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRisk {
    pub level: RiskLevel,
    pub score: u32,
    #[serde(default)]
    pub factors: Vec<RiskFactor>,
}

/// Plan-level risk
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Sum of all rule hits, raised to the floor of the most severe hit
    pub score: u32,
    /// Description of the most severe hit
    pub summary: String,
    #[serde(default)]
    pub factors: Vec<RiskFactor>,
    pub requires_approval: bool,
    #[serde(default)]
    pub mitigations: Vec<String>,
}

/// An ordered, risk-assessed set of actions for one diagnosis
///
/// Built by [`crate::manager::AutoFixManager::build_plan`]; `actions` is always
/// in a valid dependency order with `sequence` numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixPlan {
    pub id: PlanId,
    pub diagnosis_id: String,
    pub created_at: DateTime<Utc>,
    pub actions: Vec<FixActionItem>,
    #[serde(default)]
    pub strategy: ExecutionStrategy,
    pub risk_assessment: RiskAssessment,
    pub requires_approval: bool,
    pub dry_run: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl FixPlan {
    /// Look up an action by ID
    #[must_use]
    pub fn action(&self, id: &ActionId) -> Option<&FixActionItem> {
        self.actions.iter().find(|a| &a.id == id)
    }

    /// Number of actions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan has no actions
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions without a compensating command
    pub fn irreversible_actions(&self) -> impl Iterator<Item = &FixActionItem> + '_ {
        self.actions.iter().filter(|a| a.rollback_command().is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_takes_category_from_action() {
        let item = FixActionItem::new(
            "restart",
            FixAction::new("restart mysql", "systemctl restart mysql")
                .with_category(ActionCategory::Restart),
        );
        assert_eq!(item.category, ActionCategory::Restart);
        assert_eq!(item.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn blank_rollback_command_is_absent() {
        let item = FixActionItem::new("a", FixAction::new("noop", "true").with_rollback("  "));
        assert!(item.rollback_command().is_none());
    }

    #[test]
    fn plan_json_and_yaml_share_field_names() {
        let plan = FixPlan {
            id: PlanId::new(),
            diagnosis_id: "diag-1".to_string(),
            created_at: Utc::now(),
            actions: vec![FixActionItem::new("a", FixAction::new("check", "redis-cli ping"))],
            strategy: ExecutionStrategy::Serial,
            risk_assessment: RiskAssessment::default(),
            requires_approval: false,
            dry_run: true,
            metadata: BTreeMap::new(),
        };

        let json: serde_json::Value = serde_json::to_value(&plan).unwrap();
        let yaml: serde_yaml::Value = serde_yaml::to_value(&plan).unwrap();

        let json_keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        let yaml_keys: Vec<_> = yaml
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        let mut yaml_sorted = yaml_keys.clone();
        yaml_sorted.sort();
        let mut json_sorted = json_keys.clone();
        json_sorted.sort();
        assert_eq!(json_sorted, yaml_sorted);
        assert!(json_keys.contains(&"risk_assessment".to_string()));
        assert_eq!(json["strategy"], "serial");
    }
}
