//! Risk assessment
//!
//! Every matched rule adds its score. The sum is then raised to the floor of
//! the most severe hit, so one Critical pattern can never be diluted into a
//! lower level, and the level is read off the final score.

pub mod rules;

pub use rules::{RiskMatcher, RiskRule, RiskRuleSet};

use crate::types::{ActionCategory, ActionRisk, FixActionItem, RiskAssessment, RiskFactor, RiskLevel};

/// Scores actions and plans against a [`RiskRuleSet`]
#[derive(Debug, Clone, Default)]
pub struct RiskAssessor {
    rules: RiskRuleSet,
}

impl RiskAssessor {
    #[must_use]
    pub fn new(rules: RiskRuleSet) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &RiskRuleSet {
        &self.rules
    }

    /// Risk of one action
    #[must_use]
    pub fn assess_action(&self, item: &FixActionItem) -> ActionRisk {
        let factors = self.rules.evaluate(item);
        let score = clamp_score(&factors);
        ActionRisk {
            level: RiskLevel::from_score(score),
            score,
            factors,
        }
    }

    /// Plan-level risk over all actions
    #[must_use]
    pub fn assess(&self, actions: &[FixActionItem]) -> RiskAssessment {
        let mut factors = Vec::new();
        let mut mitigations: Vec<String> = Vec::new();

        for item in actions {
            for rule in self.rules.matching(item) {
                if let Some(mitigation) = &rule.mitigation {
                    push_unique(&mut mitigations, mitigation.clone());
                }
            }
            factors.extend(self.rules.evaluate(item));
        }

        let score = clamp_score(&factors);
        let level = RiskLevel::from_score(score);

        // First hit wins ties: plan order, then table order
        let summary = factors
            .iter()
            .fold(None::<&RiskFactor>, |best, f| match best {
                Some(b) if b.severity >= f.severity => Some(b),
                _ => Some(f),
            })
            .map_or_else(|| "no risk patterns matched".to_string(), |f| f.description.clone());

        if level == RiskLevel::Critical {
            push_unique(
                &mut mitigations,
                "Critical risk: take a full backup and keep a human on the console".to_string(),
            );
        }
        if actions.iter().any(|a| a.category == ActionCategory::Restart) {
            push_unique(
                &mut mitigations,
                "Run restarts during a maintenance window".to_string(),
            );
        }
        let irreversible: Vec<&str> = actions
            .iter()
            .filter(|a| a.rollback_command().is_none())
            .map(|a| a.id.as_str())
            .collect();
        if !irreversible.is_empty() {
            mitigations.push(format!(
                "Define rollback commands for: {}",
                irreversible.join(", ")
            ));
        }

        tracing::debug!(score, ?level, factors = factors.len(), "risk assessed");

        RiskAssessment {
            level,
            score,
            summary,
            factors,
            requires_approval: level >= RiskLevel::High,
            mitigations,
        }
    }
}

/// Sum of hits, raised to the floor of the most severe one
fn clamp_score(factors: &[RiskFactor]) -> u32 {
    let sum = factors.iter().fold(0u32, |acc, f| acc.saturating_add(f.score));
    factors
        .iter()
        .map(|f| f.severity)
        .max()
        .map_or(sum, |worst| sum.max(worst.floor_score()))
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FixAction;

    fn item(id: &str, command: &str, category: ActionCategory) -> FixActionItem {
        FixActionItem::new(id, FixAction::new(id, command).with_category(category))
    }

    #[test]
    fn restart_of_mysql_is_medium() {
        let assessor = RiskAssessor::default();
        let risk = assessor.assess(&[item("r", "systemctl restart mysql", ActionCategory::Restart)]);
        assert_eq!(risk.score, 35);
        assert_eq!(risk.level, RiskLevel::Medium);
        assert!(!risk.requires_approval);
        assert!(risk.mitigations.iter().any(|m| m.contains("maintenance window")));
    }

    #[test]
    fn single_critical_hit_is_critical() {
        let assessor = RiskAssessor::default();
        let risk = assessor.assess(&[item("d", "rm -rf /tmp/data", ActionCategory::Cleanup)]);
        assert_eq!(risk.level, RiskLevel::Critical);
        assert_eq!(risk.score, RiskLevel::Critical.floor_score());
        assert!(risk.requires_approval);
        assert!(risk.summary.contains("recursive forced delete"));
    }

    #[test]
    fn no_hits_is_low() {
        let assessor = RiskAssessor::default();
        let risk = assessor.assess(&[item("p", "redis-cli ping", ActionCategory::Validation)]);
        assert_eq!(risk.level, RiskLevel::Low);
        assert_eq!(risk.score, 0);
        assert!(risk.factors.is_empty());
        assert_eq!(risk.summary, "no risk patterns matched");
    }

    #[test]
    fn summary_keeps_first_of_equal_severity() {
        let assessor = RiskAssessor::default();
        let risk = assessor.assess(&[
            item("a", "redis-cli flushall", ActionCategory::Cleanup),
            item("b", "mysql -e 'drop table t'", ActionCategory::Cleanup),
        ]);
        assert!(risk.summary.starts_with("a:"));
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn mitigations_are_deduplicated() {
        let assessor = RiskAssessor::default();
        let risk = assessor.assess(&[
            item("a", "mysql -e 'drop table a'", ActionCategory::Cleanup),
            item("b", "mysql -e 'drop table b'", ActionCategory::Cleanup),
        ]);
        let backups = risk
            .mitigations
            .iter()
            .filter(|m| m.contains("backup of affected data"))
            .count();
        assert_eq!(backups, 1);
        assert!(risk.mitigations.iter().any(|m| m == "Define rollback commands for: a, b"));
    }

    #[test]
    fn action_risk_matches_plan_risk_for_single_action() {
        let assessor = RiskAssessor::default();
        let a = item("x", "kill -9 1234 && systemctl restart kafka", ActionCategory::Restart);
        let action = assessor.assess_action(&a);
        let plan = assessor.assess(std::slice::from_ref(&a));
        assert_eq!(action.score, plan.score);
        assert_eq!(action.level, plan.level);
    }
}
