//! Persisted audit records

use super::{FixPlan, FixResult, PlanId, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The immutable audit artifact of one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: RecordId,
    pub recorded_at: DateTime<Utc>,
    pub plan_id: PlanId,
    pub diagnosis_id: String,
    /// Plan as it was executed
    pub plan: FixPlan,
    pub result: FixResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// Snapshot of relevant system state at execution time
    #[serde(default)]
    pub system_state: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Record this one corrects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<RecordId>,
}

impl ExecutionRecord {
    /// New record for a finished attempt; approval fields are left empty
    #[must_use]
    pub fn new(plan: FixPlan, result: FixResult) -> Self {
        Self {
            id: RecordId::new(),
            recorded_at: Utc::now(),
            plan_id: plan.id,
            diagnosis_id: plan.diagnosis_id.clone(),
            plan,
            result,
            approved_by: None,
            approved_at: None,
            system_state: BTreeMap::new(),
            tags: Vec::new(),
            supersedes: None,
        }
    }

    /// Attach the human approver
    #[must_use]
    pub fn approved_by(mut self, approver: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.approved_by = Some(approver.into());
        self.approved_at = Some(at);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_system_state(mut self, state: BTreeMap<String, serde_json::Value>) -> Self {
        self.system_state = state;
        self
    }

    /// Mark as a correction of an earlier record for the same plan
    #[must_use]
    pub fn superseding(mut self, previous: RecordId) -> Self {
        self.supersedes = Some(previous);
        self
    }
}
