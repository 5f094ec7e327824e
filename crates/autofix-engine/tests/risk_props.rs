use autofix_engine::lifecycle::{allowed_transitions, validate_transition};
use autofix_engine::types::{ActionCategory, FixAction, FixActionItem, FixStatus, RiskLevel};
use autofix_engine::RiskAssessor;
use proptest::prelude::*;

const COMMANDS: &[&str] = &[
    "redis-cli ping",
    "systemctl restart mysql",
    "mysql -e 'SET GLOBAL max_connections=800'",
    "kubectl scale statefulset kafka --replicas=5",
    "redis-cli FLUSHALL",
    "rm -rf /var/lib/es/tmp",
    "ps aux | grep mongod",
    "systemctl stop nginx && systemctl start nginx",
    "psql -c 'TRUNCATE TABLE sessions'",
];

fn action() -> impl Strategy<Value = FixActionItem> {
    let category = prop_oneof![
        Just(ActionCategory::Validation),
        Just(ActionCategory::Configuration),
        Just(ActionCategory::Restart),
        Just(ActionCategory::Scale),
        Just(ActionCategory::Cleanup),
        Just(ActionCategory::Other),
    ];
    (0..COMMANDS.len(), category, any::<u16>()).prop_map(|(c, category, tag)| {
        FixActionItem::new(
            format!("a{tag}"),
            FixAction::new("generated", COMMANDS[c]).with_category(category),
        )
    })
}

fn status() -> impl Strategy<Value = FixStatus> {
    prop_oneof![
        Just(FixStatus::Pending),
        Just(FixStatus::Validating),
        Just(FixStatus::ValidationFailed),
        Just(FixStatus::Running),
        Just(FixStatus::Success),
        Just(FixStatus::PartialSuccess),
        Just(FixStatus::Failed),
        Just(FixStatus::RolledBack),
        Just(FixStatus::RollbackFailed),
        Just(FixStatus::Aborted),
    ]
}

proptest! {
    #[test]
    fn prop_adding_actions_never_lowers_level(
        base in proptest::collection::vec(action(), 0..6),
        more in proptest::collection::vec(action(), 1..6),
    ) {
        let assessor = RiskAssessor::default();
        let before = assessor.assess(&base);
        let mut all = base.clone();
        all.extend(more);
        let after = assessor.assess(&all);

        prop_assert!(after.level >= before.level);
        prop_assert!(after.score >= before.score);
    }

    #[test]
    fn prop_level_is_at_least_worst_hit(actions in proptest::collection::vec(action(), 1..8)) {
        let risk = RiskAssessor::default().assess(&actions);
        if let Some(worst) = risk.factors.iter().map(|f| f.severity).max() {
            prop_assert!(risk.level >= worst);
        } else {
            prop_assert_eq!(risk.level, RiskLevel::Low);
        }
        prop_assert_eq!(risk.level, RiskLevel::from_score(risk.score));
        prop_assert_eq!(risk.requires_approval, risk.level >= RiskLevel::High);
    }

    #[test]
    fn prop_assessment_is_deterministic(actions in proptest::collection::vec(action(), 0..8)) {
        let assessor = RiskAssessor::default();
        prop_assert_eq!(assessor.assess(&actions), assessor.assess(&actions));
    }

    #[test]
    fn prop_level_monotonic_in_score(a in 0u32..200, b in 0u32..200) {
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assert!(RiskLevel::from_score(lo) <= RiskLevel::from_score(hi));
    }

    #[test]
    fn prop_transition_table_is_authoritative(from in status(), to in status()) {
        let allowed = allowed_transitions(from).contains(&to);
        prop_assert_eq!(validate_transition(from, to).is_ok(), allowed);
        if from.is_terminal() {
            prop_assert!(!allowed);
        }
    }
}

#[test]
fn test_more_severe_hits_never_rank_lower() {
    let assessor = RiskAssessor::default();
    let item = |cmd: &str| FixActionItem::new("x", FixAction::new("x", cmd));

    let medium = assessor.assess(&[item("systemctl restart redis")]);
    let high = assessor.assess(&[item("redis-cli flushdb")]);
    let critical = assessor.assess(&[item("mkfs.ext4 /dev/sdb1")]);

    assert!(medium.level <= high.level);
    assert!(high.level <= critical.level);
    assert_eq!(critical.level, RiskLevel::Critical);
}

#[test]
fn test_running_only_after_validation() {
    let sources: Vec<FixStatus> = [
        FixStatus::Pending,
        FixStatus::Validating,
        FixStatus::ValidationFailed,
        FixStatus::Running,
        FixStatus::Failed,
    ]
    .into_iter()
    .filter(|s| allowed_transitions(*s).contains(&FixStatus::Running))
    .collect();
    assert_eq!(sources, vec![FixStatus::Validating]);
}
