//! Core data model
//!
//! Identifiers and the small enums shared across the engine live here; the
//! aggregates are split by lifecycle stage:
//! - [`plan`]: what will run
//! - [`validation`]: pre-execution checks
//! - [`result`]: what happened
//! - [`record`]: what was persisted

pub mod plan;
pub mod record;
pub mod result;
pub mod validation;

pub use plan::{ActionRisk, ExecutionStrategy, FixAction, FixActionItem, FixPlan, RiskAssessment, RiskFactor};
pub use record::ExecutionRecord;
pub use result::{ActionResult, ActionStatus, FixResult, FixStatus, LogEntry, LogLevel, RollbackStep};
pub use validation::{ValidationReport, ValidationResult, ValidationRule, ValidationSeverity, ValidationType};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fix plan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId(pub Uuid);

impl PlanId {
    /// Generate new plan ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    /// Generate new execution ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audit record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Generate new record ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Action identifier
///
/// String-typed so `depends_on` can name the recommendation an action came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub String);

impl ActionId {
    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ActionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Risk level, strictly ordered `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Read-only or trivially reversible
    Low,
    /// Brief service impact
    Medium,
    /// Data or availability at stake
    High,
    /// Destructive, irreversible
    Critical,
}

impl RiskLevel {
    /// Derive the level from an accumulated score
    ///
    /// `>70` Critical, `>40` High, `>20` Medium, otherwise Low.
    #[must_use]
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s > 70 => RiskLevel::Critical,
            s if s > 40 => RiskLevel::High,
            s if s > 20 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    /// Lowest score that maps to this level
    #[must_use]
    pub fn floor_score(self) -> u32 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 21,
            RiskLevel::High => 41,
            RiskLevel::Critical => 71,
        }
    }

    /// Default score contribution of a rule hit at this severity
    #[must_use]
    pub fn default_score(self) -> u32 {
        match self {
            RiskLevel::Low => 5,
            RiskLevel::Medium => 15,
            RiskLevel::High => 30,
            RiskLevel::Critical => 50,
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// Kind of remediation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// Read-only checks
    Validation,
    /// Configuration changes
    Configuration,
    /// Service restarts
    Restart,
    /// Capacity changes
    Scale,
    /// Removing stale data or files
    Cleanup,
    /// Anything else
    Other,
}

impl ActionCategory {
    /// Parse a recommendation's category, falling back to the command text
    ///
    /// Unknown non-empty categories map to [`ActionCategory::Other`].
    #[must_use]
    pub fn parse_or_infer(category: &str, command: &str) -> Self {
        if category.trim().is_empty() {
            Self::infer(command)
        } else {
            category.parse().unwrap_or(ActionCategory::Other)
        }
    }

    /// Best-effort category from command text
    #[must_use]
    pub fn infer(command: &str) -> Self {
        let cmd = command.to_ascii_lowercase();
        if cmd.contains("restart") || cmd.contains("reload") {
            ActionCategory::Restart
        } else if cmd.contains("config set")
            || cmd.contains("set global")
            || cmd.contains("sed -i")
            || cmd.contains("sysctl -w")
        {
            ActionCategory::Configuration
        } else if cmd.contains("scale") || cmd.contains("replicas") {
            ActionCategory::Scale
        } else if cmd.contains("purge") || cmd.contains("rm ") || cmd.contains("clean") {
            ActionCategory::Cleanup
        } else if cmd.contains("status") || cmd.contains("check") || cmd.starts_with("show ") {
            ActionCategory::Validation
        } else {
            ActionCategory::Other
        }
    }
}

impl Default for ActionCategory {
    fn default() -> Self {
        ActionCategory::Other
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionCategory::Validation => "validation",
            ActionCategory::Configuration => "configuration",
            ActionCategory::Restart => "restart",
            ActionCategory::Scale => "scale",
            ActionCategory::Cleanup => "cleanup",
            ActionCategory::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for ActionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "validation" | "validate" | "check" => Ok(ActionCategory::Validation),
            "configuration" | "config" => Ok(ActionCategory::Configuration),
            "restart" => Ok(ActionCategory::Restart),
            "scale" | "scaling" => Ok(ActionCategory::Scale),
            "cleanup" | "clean" => Ok(ActionCategory::Cleanup),
            "other" => Ok(ActionCategory::Other),
            other => Err(format!("unknown action category: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_from_score_thresholds() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(21), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(41), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(70), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(71), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(500), RiskLevel::Critical);
    }

    #[test]
    fn floor_score_maps_back_to_level() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical] {
            assert_eq!(RiskLevel::from_score(level.floor_score()), level);
        }
    }

    #[test]
    fn category_parsing_is_case_insensitive() {
        assert_eq!("Restart".parse::<ActionCategory>(), Ok(ActionCategory::Restart));
        assert_eq!("CONFIG".parse::<ActionCategory>(), Ok(ActionCategory::Configuration));
        assert_eq!(
            ActionCategory::parse_or_infer("tuning", "anything"),
            ActionCategory::Other
        );
        assert_eq!(
            ActionCategory::parse_or_infer("", "systemctl restart redis"),
            ActionCategory::Restart
        );
        assert_eq!(
            ActionCategory::parse_or_infer(" ", "redis-cli CONFIG SET maxmemory 2gb"),
            ActionCategory::Configuration
        );
    }
}
