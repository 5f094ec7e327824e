use autofix_engine::graph::sort_actions;
use autofix_engine::types::{ActionCategory, ActionId, FixAction, FixActionItem};
use autofix_engine::PlanError;
use proptest::prelude::*;
use std::collections::HashMap;

fn node(i: usize, category: ActionCategory, deps: &[usize]) -> FixActionItem {
    FixActionItem::new(format!("n{i}"), FixAction::new("step", format!("echo {i}")).with_category(category))
        .depends_on(deps.iter().map(|d| format!("n{d}")))
}

fn positions(sorted: &[FixActionItem]) -> HashMap<ActionId, usize> {
    sorted.iter().enumerate().map(|(p, a)| (a.id.clone(), p)).collect()
}

fn category() -> impl Strategy<Value = ActionCategory> {
    prop_oneof![
        Just(ActionCategory::Configuration),
        Just(ActionCategory::Restart),
        Just(ActionCategory::Validation),
        Just(ActionCategory::Other),
    ]
}

proptest! {
    #[test]
    fn prop_dependencies_precede_dependents(
        n in 1..16usize,
        raw_edges in proptest::collection::vec((0..16usize, 0..16usize), 0..40),
    ) {
        // Only edges from lower to higher index, so the input is acyclic
        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (a, b) in raw_edges {
            let (lo, hi) = (a.min(b), a.max(b));
            if hi < n && lo != hi && !deps[hi].contains(&lo) {
                deps[hi].push(lo);
            }
        }
        // Present them in reverse so ordering has to do real work
        let actions: Vec<_> = (0..n).rev().map(|i| node(i, ActionCategory::Other, &deps[i])).collect();

        let sorted = sort_actions(actions).unwrap();
        prop_assert_eq!(sorted.len(), n);

        let pos = positions(&sorted);
        for (i, ds) in deps.iter().enumerate() {
            let ip = pos[&ActionId(format!("n{}", i))];
            for d in ds {
                let dp = pos[&ActionId(format!("n{}", d))];
                prop_assert!(dp < ip, "n{} must run before n{}", d, i);
            }
        }
        for (expected, action) in (1u32..).zip(&sorted) {
            prop_assert_eq!(action.sequence, expected);
        }
    }

    #[test]
    fn prop_configuration_precedes_restart(categories in proptest::collection::vec(category(), 1..12)) {
        let actions: Vec<_> = categories.iter().enumerate().map(|(i, c)| node(i, *c, &[])).collect();
        let sorted = sort_actions(actions).unwrap();

        let last_config = sorted.iter().rposition(|a| a.category == ActionCategory::Configuration);
        let first_restart = sorted.iter().position(|a| a.category == ActionCategory::Restart);
        if let (Some(c), Some(r)) = (last_config, first_restart) {
            prop_assert!(c < r);
        }
    }

    #[test]
    fn prop_cycles_are_reported_never_truncated(ring in 1..8usize, extra in 0..5usize) {
        let mut actions: Vec<_> = (0..ring)
            .map(|i| node(i, ActionCategory::Other, &[(i + 1) % ring]))
            .collect();
        actions.extend((ring..ring + extra).map(|i| node(i, ActionCategory::Other, &[])));

        match sort_actions(actions) {
            Err(PlanError::CycleDetected { actions }) => {
                let expected: Vec<ActionId> = (0..ring).map(|i| ActionId(format!("n{i}"))).collect();
                prop_assert_eq!(actions, expected);
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other.map(|v| v.len())),
        }
    }
}

#[test]
fn test_explicit_reverse_dependency_beats_heuristic() {
    // n0 (config) declares it needs n1 (restart) first
    let actions = vec![
        node(0, ActionCategory::Configuration, &[1]),
        node(1, ActionCategory::Restart, &[]),
    ];
    let sorted = sort_actions(actions).unwrap();
    let ids: Vec<_> = sorted.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["n1", "n0"]);
}

#[test]
fn test_implicit_edge_completes_a_cycle() {
    // restart n1 -> n2 -> config n0 plus the implicit config -> restart edge
    let actions = vec![
        node(0, ActionCategory::Configuration, &[2]),
        node(1, ActionCategory::Restart, &[]),
        node(2, ActionCategory::Other, &[1]),
    ];
    assert!(matches!(sort_actions(actions), Err(PlanError::CycleDetected { .. })));
}
