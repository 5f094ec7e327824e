//! In-process record store with a SHA-256 digest chain

use super::{RecordFilter, RecordStore};
use crate::error::StoreError;
use crate::types::{ExecutionRecord, RecordId};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug)]
struct Entry {
    record: ExecutionRecord,
    prev_hash: [u8; 32],
    hash: [u8; 32],
}

#[derive(Debug, Default)]
struct Inner {
    index: HashMap<RecordId, usize>,
    entries: Vec<Entry>,
}

/// Append-only store kept in process memory
///
/// Each record is chained to the previous one by a SHA-256 digest over its
/// JSON encoding, so [`InMemoryRecordStore::verify_integrity`] detects edits
/// made behind the store's back.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: Mutex<Inner>,
}

impl InMemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hex digest at the head of the chain
    #[must_use]
    pub fn head_digest(&self) -> Option<String> {
        self.inner.lock().entries.last().map(|e| hex::encode(e.hash))
    }

    /// Recompute the whole chain
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for entry in &guard.entries {
            if entry.prev_hash != prev || compute_hash(&prev, &entry.record)? != entry.hash {
                return Err(StoreError::IntegrityViolation(entry.record.id));
            }
            prev = entry.hash;
        }
        Ok(())
    }
}

fn compute_hash(prev: &[u8; 32], record: &ExecutionRecord) -> Result<[u8; 32], StoreError> {
    let bytes = serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(prev);
    hasher.update(&bytes);
    Ok(hasher.finalize().into())
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn store(&self, record: ExecutionRecord) -> Result<RecordId, StoreError> {
        let mut guard = self.inner.lock();
        let id = record.id;
        if guard.index.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }

        let prev_hash = guard.entries.last().map_or([0u8; 32], |e| e.hash);
        let hash = compute_hash(&prev_hash, &record)?;
        let position = guard.entries.len();
        guard.entries.push(Entry {
            record,
            prev_hash,
            hash,
        });
        guard.index.insert(id, position);

        tracing::debug!(record_id = %id, digest = %hex::encode(hash), "execution record stored");
        Ok(id)
    }

    async fn get(&self, id: RecordId) -> Result<ExecutionRecord, StoreError> {
        let guard = self.inner.lock();
        guard
            .index
            .get(&id)
            .map(|&i| guard.entries[i].record.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ExecutionRecord>, StoreError> {
        let guard = self.inner.lock();
        let matched: Vec<&ExecutionRecord> = guard
            .entries
            .iter()
            .map(|e| &e.record)
            .filter(|r| filter.matches(r))
            .collect();
        let skip = filter
            .limit
            .map_or(0, |limit| matched.len().saturating_sub(limit));
        Ok(matched.into_iter().skip(skip).cloned().collect())
    }
}
