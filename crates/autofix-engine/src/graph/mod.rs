//! Action dependency graph
//!
//! Edges point from a dependency to its dependent. Besides explicit
//! `depends_on`, every Restart action implicitly waits for every Configuration
//! action in the same plan, unless the Configuration action explicitly depends
//! on that Restart.

use crate::error::PlanError;
use crate::types::{ActionCategory, ActionId, FixActionItem};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

/// Dependency graph over a plan's actions, keyed by input position
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    actions: &'a [FixActionItem],
    inner: DiGraphMap<usize, ()>,
}

impl<'a> DependencyGraph<'a> {
    /// Build the graph, resolving `depends_on` and adding implicit edges
    pub fn build(actions: &'a [FixActionItem]) -> Result<Self, PlanError> {
        let mut index: HashMap<&ActionId, usize> = HashMap::with_capacity(actions.len());
        let mut inner = DiGraphMap::with_capacity(actions.len(), actions.len());

        for (i, action) in actions.iter().enumerate() {
            if index.insert(&action.id, i).is_some() {
                return Err(PlanError::DuplicateActionId(action.id.clone()));
            }
            inner.add_node(i);
        }

        for (i, action) in actions.iter().enumerate() {
            for dep in &action.depends_on {
                let &from = index.get(dep).ok_or_else(|| PlanError::UnknownDependency {
                    action: action.id.clone(),
                    dependency: dep.clone(),
                })?;
                inner.add_edge(from, i, ());
            }
        }

        for (c, config) in actions.iter().enumerate() {
            if config.category != ActionCategory::Configuration {
                continue;
            }
            for (r, restart) in actions.iter().enumerate() {
                if restart.category != ActionCategory::Restart || config.depends_on.contains(&restart.id) {
                    continue;
                }
                inner.add_edge(c, r, ());
            }
        }

        Ok(Self { actions, inner })
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Whether `dependent` must run after `dependency`
    #[must_use]
    pub fn has_edge(&self, dependency: &ActionId, dependent: &ActionId) -> bool {
        match (self.position(dependency), self.position(dependent)) {
            (Some(a), Some(b)) => self.inner.contains_edge(a, b),
            _ => false,
        }
    }

    fn position(&self, id: &ActionId) -> Option<usize> {
        self.actions.iter().position(|a| &a.id == id)
    }

    /// Kahn's algorithm; ready actions are taken in the order they became ready
    ///
    /// Returns input positions in execution order.
    pub fn topological_order(&self) -> Result<Vec<usize>, PlanError> {
        let mut in_degree: Vec<usize> = (0..self.actions.len())
            .map(|n| self.inner.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut queue: VecDeque<usize> = (0..self.actions.len()).filter(|&n| in_degree[n] == 0).collect();
        let mut order = Vec::with_capacity(self.actions.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            let mut successors: Vec<usize> = self.inner.neighbors_directed(node, Direction::Outgoing).collect();
            successors.sort_unstable();
            for next in successors {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() < self.actions.len() {
            return Err(PlanError::CycleDetected {
                actions: self.cycle_members(),
            });
        }
        Ok(order)
    }

    /// Actions in a non-trivial strongly connected component or on a self-loop
    fn cycle_members(&self) -> Vec<ActionId> {
        let mut members: Vec<usize> = tarjan_scc(&self.inner)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.inner.contains_edge(scc[0], scc[0]))
            .flatten()
            .collect();
        members.sort_unstable();
        members.into_iter().map(|i| self.actions[i].id.clone()).collect()
    }
}

/// Reorder actions into dependency order and number them `1..=n`
pub fn sort_actions(actions: Vec<FixActionItem>) -> Result<Vec<FixActionItem>, PlanError> {
    let order = DependencyGraph::build(&actions)?.topological_order()?;

    let mut slots: Vec<Option<FixActionItem>> = actions.into_iter().map(Some).collect();
    let mut sorted = Vec::with_capacity(slots.len());
    for (seq, i) in (1u32..).zip(order) {
        if let Some(mut item) = slots[i].take() {
            item.sequence = seq;
            sorted.push(item);
        }
    }
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FixAction;

    fn item(id: &str, category: ActionCategory) -> FixActionItem {
        FixActionItem::new(id, FixAction::new(id, format!("echo {id}")).with_category(category))
    }

    fn ids(actions: &[FixActionItem]) -> Vec<&str> {
        actions.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn independent_actions_keep_input_order() {
        let sorted = sort_actions(vec![
            item("a", ActionCategory::Other),
            item("b", ActionCategory::Other),
            item("c", ActionCategory::Other),
        ])
        .unwrap();
        assert_eq!(ids(&sorted), vec!["a", "b", "c"]);
        assert_eq!(sorted.iter().map(|a| a.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn explicit_dependency_reorders() {
        let sorted = sort_actions(vec![
            item("b", ActionCategory::Other).depends_on(["a"]),
            item("a", ActionCategory::Other),
        ])
        .unwrap();
        assert_eq!(ids(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn configuration_runs_before_restart() {
        let sorted = sort_actions(vec![
            item("restart", ActionCategory::Restart),
            item("config", ActionCategory::Configuration),
        ])
        .unwrap();
        assert_eq!(ids(&sorted), vec!["config", "restart"]);
    }

    #[test]
    fn explicit_dependency_overrides_implicit_rule() {
        let actions = vec![
            item("config", ActionCategory::Configuration).depends_on(["restart"]),
            item("restart", ActionCategory::Restart),
        ];
        let graph = DependencyGraph::build(&actions).unwrap();
        assert!(!graph.has_edge(&"config".into(), &"restart".into()));

        let sorted = sort_actions(actions).unwrap();
        assert_eq!(ids(&sorted), vec!["restart", "config"]);
    }

    #[test]
    fn cycle_is_reported_with_members() {
        let err = sort_actions(vec![
            item("free", ActionCategory::Other),
            item("a", ActionCategory::Other).depends_on(["b"]),
            item("b", ActionCategory::Other).depends_on(["a"]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::CycleDetected {
                actions: vec!["a".into(), "b".into()]
            }
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = sort_actions(vec![item("a", ActionCategory::Other).depends_on(["a"])]).unwrap_err();
        assert_eq!(err, PlanError::CycleDetected { actions: vec!["a".into()] });
    }

    #[test]
    fn unknown_and_duplicate_ids_are_rejected() {
        let err = sort_actions(vec![item("a", ActionCategory::Other).depends_on(["ghost"])]).unwrap_err();
        assert!(matches!(err, PlanError::UnknownDependency { .. }));

        let err = sort_actions(vec![item("a", ActionCategory::Other), item("a", ActionCategory::Other)])
            .unwrap_err();
        assert_eq!(err, PlanError::DuplicateActionId("a".into()));
    }

    #[test]
    fn empty_plan_sorts_to_empty() {
        assert!(sort_actions(Vec::new()).unwrap().is_empty());
    }
}
