//! Validation rules and reports

use super::ActionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a validation rule checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    /// Destructive command fragments
    Safety,
    /// Preconditions on the target system
    Prerequisite,
    /// Who may run this
    Authorization,
    /// Whether the target supports the operation
    Capability,
}

/// How much a failed check matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSeverity {
    Info,
    Warning,
    /// Blocks execution
    Error,
}

/// A named, severity-tagged precondition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub name: String,
    pub rule_type: ValidationType,
    pub severity: ValidationSeverity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ValidationRule {
    #[must_use]
    pub fn new(name: impl Into<String>, rule_type: ValidationType, severity: ValidationSeverity) -> Self {
        Self {
            name: name.into(),
            rule_type,
            severity,
            description: String::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// The destructive-command check
    #[must_use]
    pub fn safety() -> Self {
        Self::new("command_safety", ValidationType::Safety, ValidationSeverity::Error)
            .with_description("command must not contain destructive fragments")
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Outcome of one rule against one action (or the plan, when `action_id` is `None`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule_name: String,
    pub rule_type: ValidationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,
    pub passed: bool,
    pub severity: ValidationSeverity,
    pub message: String,
}

impl ValidationResult {
    /// Whether this result blocks execution
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        !self.passed && self.severity == ValidationSeverity::Error
    }
}

/// Aggregate of all validation results for one execution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub results: Vec<ValidationResult>,
    /// No result failed with `Error` severity
    pub all_passed: bool,
    pub validated_at: DateTime<Utc>,
}

impl ValidationReport {
    /// Build a report, deriving `all_passed` from the results
    #[must_use]
    pub fn from_results(results: Vec<ValidationResult>) -> Self {
        let all_passed = !results.iter().any(ValidationResult::is_blocking);
        Self {
            results,
            all_passed,
            validated_at: Utc::now(),
        }
    }

    /// Results that block execution
    pub fn blocking(&self) -> impl Iterator<Item = &ValidationResult> + '_ {
        self.results.iter().filter(|r| r.is_blocking())
    }

    /// Failed results that do not block
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationResult> + '_ {
        self.results.iter().filter(|r| !r.passed && !r.is_blocking())
    }
}
