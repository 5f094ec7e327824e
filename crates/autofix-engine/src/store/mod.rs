//! Audit record persistence
//!
//! Records are write-once. A store assigns nothing: the record carries its own
//! ID, and `store` either persists it atomically or fails.

pub mod memory;

pub use memory::InMemoryRecordStore;

use crate::error::StoreError;
use crate::types::{ExecutionRecord, FixStatus, PlanId, RecordId};
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] if the ID was stored before.
    async fn store(&self, record: ExecutionRecord) -> Result<RecordId, StoreError>;

    async fn get(&self, id: RecordId) -> Result<ExecutionRecord, StoreError>;

    /// Matching records, oldest first
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ExecutionRecord>, StoreError>;
}

/// Criteria for [`RecordStore::list`]; empty fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub plan_id: Option<PlanId>,
    pub diagnosis_id: Option<String>,
    pub status: Option<FixStatus>,
    pub tag: Option<String>,
    pub since: Option<DateTime<Utc>>,
    /// Keep only the newest `limit` matches
    pub limit: Option<usize>,
}

impl RecordFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn plan(mut self, plan_id: PlanId) -> Self {
        self.plan_id = Some(plan_id);
        self
    }

    #[must_use]
    pub fn diagnosis(mut self, diagnosis_id: impl Into<String>) -> Self {
        self.diagnosis_id = Some(diagnosis_id.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: FixStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.since = Some(at);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` satisfies every set criterion except `limit`
    #[must_use]
    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        self.plan_id.map_or(true, |id| record.plan_id == id)
            && self.diagnosis_id.as_ref().map_or(true, |d| &record.diagnosis_id == d)
            && self.status.map_or(true, |s| record.result.status == s)
            && self.tag.as_ref().map_or(true, |t| record.tags.contains(t))
            && self.since.map_or(true, |at| record.recorded_at >= at)
    }
}
