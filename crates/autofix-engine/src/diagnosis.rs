//! Diagnosis input boundary
//!
//! Issues and recommendations are produced by the analysis pipeline; the engine
//! only reads them. A recommendation becomes a plan action when it is marked
//! auto-fixable and carries a command.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

/// A problem found on a middleware instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub severity: IssueSeverity,
    /// Middleware kind, e.g. `mysql`, `redis`, `kafka`
    pub component: String,
    pub instance: String,
    pub recommendations: Vec<Recommendation>,
}

impl Issue {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_recommendation(mut self, recommendation: Recommendation) -> Self {
        self.recommendations.push(recommendation);
        self
    }

    /// Recommendations eligible for automatic remediation, with their
    /// 1-based position among all of this issue's recommendations
    pub fn auto_fixable(&self) -> impl Iterator<Item = (usize, &Recommendation)> + '_ {
        self.recommendations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_auto_fixable())
            .map(|(i, r)| (i + 1, r))
    }
}

/// A suggested fix for an [`Issue`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendation {
    /// Becomes the action ID; generated from the issue when empty
    pub id: String,
    pub description: String,
    pub command: String,
    pub rollback_command: Option<String>,
    /// Free-form category; see [`crate::types::ActionCategory::parse_or_infer`]
    pub category: String,
    pub can_auto_fix: bool,
    /// IDs of recommendations that must run first
    ///
    /// Every ID must name another auto-fixable recommendation of the same
    /// diagnosis. A dependency on a manual or unknown recommendation fails
    /// plan building with `PlanError::UnknownDependency` rather than being
    /// dropped.
    pub depends_on: Vec<String>,
    pub parameters: BTreeMap<String, String>,
    /// Overrides the manager's per-action timeout
    pub timeout_secs: Option<u64>,
}

impl Recommendation {
    /// Auto-fixable recommendation running `command`
    #[must_use]
    pub fn auto(command: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            category: category.into(),
            can_auto_fix: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_rollback(mut self, command: impl Into<String>) -> Self {
        self.rollback_command = Some(command.into());
        self
    }

    #[must_use]
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    /// `can_auto_fix` and a non-blank command
    #[inline]
    #[must_use]
    pub fn is_auto_fixable(&self) -> bool {
        self.can_auto_fix && !self.command.trim().is_empty()
    }
}
