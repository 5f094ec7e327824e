//! Risk rule table
//!
//! Rules are data: a tagged [`RiskMatcher`] plus severity, score and an
//! optional mitigation. [`RiskRuleSet::matching`] is the single interpreter
//! that evaluates them, so new rules never need code changes.

use crate::types::{ActionCategory, FixActionItem, RiskFactor, RiskLevel};
use serde::{Deserialize, Serialize};

/// Commands longer than this count as complex
pub const LONG_COMMAND_CHARS: usize = 120;

/// What a rule looks at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskMatcher {
    /// Case-insensitive substring of the command
    Contains { pattern: String },
    /// The action's category
    Category { category: ActionCategory },
    /// Command length in characters
    LongerThan { chars: usize },
    /// `&&`, `;` or pipes
    Chained,
}

impl RiskMatcher {
    fn matches(&self, category: ActionCategory, command_lower: &str) -> bool {
        match self {
            RiskMatcher::Contains { pattern } => {
                !pattern.is_empty() && command_lower.contains(&pattern.to_lowercase())
            }
            RiskMatcher::Category { category: c } => *c == category,
            RiskMatcher::LongerThan { chars } => command_lower.chars().count() > *chars,
            RiskMatcher::Chained => {
                command_lower.contains("&&") || command_lower.contains(';') || command_lower.contains('|')
            }
        }
    }
}

/// One entry of the risk table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRule {
    pub name: String,
    pub description: String,
    pub severity: RiskLevel,
    /// Score contribution; defaults by severity when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    pub matcher: RiskMatcher,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}

impl RiskRule {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        severity: RiskLevel,
        matcher: RiskMatcher,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            severity,
            score: None,
            matcher,
            mitigation: None,
        }
    }

    /// Command substring rule
    #[must_use]
    pub fn contains(name: &str, pattern: &str, severity: RiskLevel, description: &str) -> Self {
        Self::new(
            name,
            description,
            severity,
            RiskMatcher::Contains {
                pattern: pattern.to_string(),
            },
        )
    }

    #[must_use]
    pub fn with_score(mut self, score: u32) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn with_mitigation(mut self, mitigation: impl Into<String>) -> Self {
        self.mitigation = Some(mitigation.into());
        self
    }

    /// Effective score contribution
    #[inline]
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score.unwrap_or_else(|| self.severity.default_score())
    }

    fn factor(&self, item: &FixActionItem) -> RiskFactor {
        RiskFactor {
            name: self.name.clone(),
            description: format!("{}: {}", item.id, self.description),
            severity: self.severity,
            score: self.score(),
            action_id: Some(item.id.clone()),
        }
    }
}

/// Ordered risk table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskRuleSet {
    rules: Vec<RiskRule>,
}

impl RiskRuleSet {
    #[must_use]
    pub fn new(rules: Vec<RiskRule>) -> Self {
        Self { rules }
    }

    /// Empty table; every action scores zero
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule
    pub fn push(&mut self, rule: RiskRule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn with_rule(mut self, rule: RiskRule) -> Self {
        self.push(rule);
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[RiskRule] {
        &self.rules
    }

    /// Rules that match `item`, in table order
    pub fn matching<'a>(&'a self, item: &FixActionItem) -> impl Iterator<Item = &'a RiskRule> + 'a {
        let category = item.category;
        let command = item.command().to_lowercase();
        self.rules
            .iter()
            .filter(move |rule| rule.matcher.matches(category, &command))
    }

    /// Matched rules as risk factors
    #[must_use]
    pub fn evaluate(&self, item: &FixActionItem) -> Vec<RiskFactor> {
        self.matching(item).map(|rule| rule.factor(item)).collect()
    }
}

impl Default for RiskRuleSet {
    fn default() -> Self {
        use RiskLevel::{Critical, High, Low, Medium};

        const BACKUP: &str = "Take and verify a backup of affected data before executing";
        const WINDOW: &str = "Schedule during a maintenance window and drain traffic first";

        Self::new(vec![
            RiskRule::contains("recursive_delete", "rm -rf", Critical, "recursive forced delete")
                .with_mitigation(BACKUP),
            RiskRule::contains("filesystem_format", "mkfs", Critical, "formats a filesystem")
                .with_mitigation(BACKUP),
            RiskRule::contains("raw_disk_write", "dd if=", Critical, "raw block device write")
                .with_mitigation(BACKUP),
            RiskRule::contains("drop_database", "drop database", High, "drops a database")
                .with_mitigation(BACKUP),
            RiskRule::contains("drop_table", "drop table", High, "drops a table").with_mitigation(BACKUP),
            RiskRule::contains("truncate_table", "truncate table", High, "truncates a table")
                .with_mitigation(BACKUP),
            RiskRule::contains("bulk_delete", "delete from", High, "deletes rows").with_mitigation(BACKUP),
            RiskRule::contains("cache_flush_all", "flushall", High, "flushes every cache database")
                .with_mitigation("Confirm the cache can be rebuilt from its source of truth"),
            RiskRule::contains("cache_flush_db", "flushdb", High, "flushes a cache database")
                .with_mitigation("Confirm the cache can be rebuilt from its source of truth"),
            RiskRule::contains("service_stop", "systemctl stop", High, "stops a service")
                .with_mitigation(WINDOW),
            RiskRule::contains("force_kill", "kill -9", High, "force-kills a process")
                .with_mitigation(WINDOW),
            RiskRule::contains("host_reboot", "reboot", High, "reboots the host").with_mitigation(WINDOW),
            RiskRule::contains("service_restart", "systemctl restart", Medium, "restarts a service")
                .with_mitigation(WINDOW),
            RiskRule::contains("runtime_config_change", "set global", Medium, "changes runtime configuration")
                .with_mitigation("Record the current value so it can be restored"),
            RiskRule::new(
                "restart_category",
                "restart interrupts active connections",
                Medium,
                RiskMatcher::Category {
                    category: ActionCategory::Restart,
                },
            )
            .with_score(20)
            .with_mitigation(WINDOW),
            RiskRule::new(
                "scale_category",
                "capacity change",
                Low,
                RiskMatcher::Category {
                    category: ActionCategory::Scale,
                },
            )
            .with_score(10),
            RiskRule::new(
                "long_command",
                "long command is hard to review",
                Low,
                RiskMatcher::LongerThan {
                    chars: LONG_COMMAND_CHARS,
                },
            )
            .with_score(10),
            RiskRule::new("chained_command", "chained shell command", Low, RiskMatcher::Chained)
                .with_score(10)
                .with_mitigation("Split chained commands into separate actions"),
        ])
    }
}
