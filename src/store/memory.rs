//! In-memory [`RecordStore`] for tests.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Fingerprints are
//! unique: a batch containing a known fingerprint is rejected whole, the
//! way a remote store rejects a batch. Specific create calls (by 0-based
//! call index) can be told to fail, and every call's size is recorded so
//! tests can check batching.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::STORE_MAX_BATCH;
use crate::dedup::fingerprint;
use crate::error::{StoreError, StoreResult};
use crate::models::{CaseRecord, NewRecord, PersistedRecord};

use super::{FingerprintPage, RecordStore};

pub struct MemoryStore {
    records: RwLock<Vec<PersistedRecord>>,
    failing_creates: RwLock<HashSet<usize>>,
    create_calls: RwLock<Vec<usize>>,
    list_calls: RwLock<usize>,
    fail_listing: RwLock<bool>,
    max_batch: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_batch(STORE_MAX_BATCH)
    }

    pub fn with_max_batch(max_batch: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            failing_creates: RwLock::new(HashSet::new()),
            create_calls: RwLock::new(Vec::new()),
            list_calls: RwLock::new(0),
            fail_listing: RwLock::new(false),
            max_batch,
        }
    }

    /// Make the `call_index`-th create call (0-based, counted from now on
    /// across the store's lifetime) fail with an API error.
    pub fn fail_create_call(&self, call_index: usize) {
        self.failing_creates.write().unwrap().insert(call_index);
    }

    /// Make every fingerprint listing fail.
    pub fn fail_listing(&self) {
        *self.fail_listing.write().unwrap() = true;
    }

    /// Size of every create call issued so far, failed ones included.
    pub fn create_call_sizes(&self) -> Vec<usize> {
        self.create_calls.read().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.read().unwrap()
    }

    pub fn records(&self) -> Vec<PersistedRecord> {
        self.records.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn max_batch(&self) -> usize {
        self.max_batch
    }

    async fn list_fingerprints(
        &self,
        page_size: usize,
        offset: Option<&str>,
    ) -> StoreResult<FingerprintPage> {
        *self.list_calls.write().unwrap() += 1;
        if *self.fail_listing.read().unwrap() {
            return Err(StoreError::Api {
                status: 503,
                message: "listing unavailable".to_string(),
            });
        }

        let start = match offset {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StoreError::Parse(format!("bad offset token '{}'", token)))?,
            None => 0,
        };
        let records = self.records.read().unwrap();
        let end = (start + page_size.max(1)).min(records.len());
        let fingerprints = records
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|r| r.fingerprint.clone())
            .collect();
        let offset = (end < records.len()).then(|| end.to_string());
        Ok(FingerprintPage {
            fingerprints,
            offset,
        })
    }

    async fn create_many(&self, records: &[NewRecord]) -> StoreResult<Vec<PersistedRecord>> {
        let call_index = {
            let mut calls = self.create_calls.write().unwrap();
            calls.push(records.len());
            calls.len() - 1
        };

        if records.len() > self.max_batch {
            return Err(StoreError::BatchTooLarge {
                got: records.len(),
                limit: self.max_batch,
            });
        }
        if self.failing_creates.read().unwrap().contains(&call_index) {
            return Err(StoreError::Api {
                status: 422,
                message: format!("injected failure for create call {}", call_index),
            });
        }

        let mut stored = self.records.write().unwrap();
        let mut seen: HashSet<&str> = stored.iter().map(|r| r.fingerprint.as_str()).collect();
        for r in records {
            if !seen.insert(r.fingerprint.as_str()) {
                return Err(StoreError::Api {
                    status: 422,
                    message: format!("duplicate fingerprint {}", r.fingerprint),
                });
            }
        }

        let created: Vec<PersistedRecord> = records
            .iter()
            .map(|r| PersistedRecord {
                id: format!("rec{}", Uuid::new_v4().simple()),
                fingerprint: r.fingerprint.clone(),
                record: r.record.clone(),
            })
            .collect();
        stored.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update(&self, id: &str, record: &CaseRecord) -> StoreResult<()> {
        let mut stored = self.records.write().unwrap();
        let existing = stored
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        existing.fingerprint = fingerprint(&record.prompt_text);
        existing.record = record.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut stored = self.records.write().unwrap();
        let before = stored.len();
        stored.retain(|r| r.id != id);
        if stored.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn sample_record(prompt: &str) -> CaseRecord {
        CaseRecord {
            title: "Sample".to_string(),
            prompt_text: prompt.to_string(),
            author: Some("@someone".to_string()),
            author_url: None,
            source_repo: "acme/prompts".to_string(),
            source_url: "https://github.com/acme/prompts".to_string(),
            reference_image_url: None,
            result_image_url: Some("https://img.example/r.png".to_string()),
            tags: vec!["3D".to_string()],
            category: "General".to_string(),
            reference_required: false,
            reference_note: None,
            scraped_at: Utc::now(),
        }
    }

    fn new_record(prompt: &str) -> NewRecord {
        NewRecord {
            fingerprint: fingerprint(prompt),
            record: sample_record(prompt),
        }
    }

    #[tokio::test]
    async fn rejects_known_fingerprint_as_whole_batch() {
        let store = MemoryStore::new();
        store.create_many(&[new_record("one prompt")]).await.unwrap();
        let err = store
            .create_many(&[new_record("two prompt"), new_record("one prompt")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 422, .. }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_target_one_call() {
        let store = MemoryStore::new();
        store.fail_create_call(1);
        assert!(store.create_many(&[new_record("a prompt")]).await.is_ok());
        assert!(store.create_many(&[new_record("b prompt")]).await.is_err());
        assert!(store.create_many(&[new_record("c prompt")]).await.is_ok());
        assert_eq!(store.create_call_sizes(), vec![1, 1, 1]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn enforces_batch_limit() {
        let store = MemoryStore::with_max_batch(2);
        let batch: Vec<NewRecord> = ["x1", "x2", "x3"].iter().map(|p| new_record(p)).collect();
        let err = store.create_many(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { got: 3, limit: 2 }));
    }

    #[tokio::test]
    async fn update_and_delete() {
        let store = MemoryStore::new();
        let created = store.create_many(&[new_record("before edit")]).await.unwrap();
        let id = created[0].id.clone();

        let mut edited = sample_record("after edit");
        edited.title = "Edited".to_string();
        store.update(&id, &edited).await.unwrap();
        let stored = store.records();
        assert_eq!(stored[0].record.title, "Edited");
        assert_eq!(stored[0].fingerprint, fingerprint("after edit"));

        store.delete(&id).await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.delete(&id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
