//! Batched, rate-limited writes of new records.
//!
//! New records are split into batches no larger than the store's
//! create-many limit and written one batch per call, sequentially. A fixed
//! delay separates consecutive calls. A failed batch is recorded with its
//! error and the writer moves on: none of that batch's records count as
//! created, and later batches are still attempted. There are no retries.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::models::{NewRecord, PersistedRecord};
use crate::progress::{RunProgressEvent, RunProgressReporter};
use crate::store::RecordStore;

#[derive(Debug)]
pub struct BatchFailure {
    /// 0-based index of the batch within this write.
    pub batch_index: usize,
    pub records: usize,
    pub error: StoreError,
}

#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub created: Vec<PersistedRecord>,
    pub failed: Vec<BatchFailure>,
    /// Create-many calls issued, failed ones included.
    pub calls: usize,
}

impl PersistOutcome {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn failed_records(&self) -> usize {
        self.failed.iter().map(|f| f.records).sum()
    }
}

pub struct BatchWriter<'a> {
    store: &'a dyn RecordStore,
    batch_size: usize,
    delay: Duration,
}

impl<'a> BatchWriter<'a> {
    /// `batch_size` is clamped to `1..=store.max_batch()`.
    pub fn new(store: &'a dyn RecordStore, batch_size: usize, delay: Duration) -> Self {
        Self {
            store,
            batch_size: batch_size.clamp(1, store.max_batch().max(1)),
            delay,
        }
    }

    pub fn from_config(store: &'a dyn RecordStore, config: &StoreConfig) -> Self {
        Self::new(
            store,
            config.batch_size,
            Duration::from_millis(config.batch_delay_ms),
        )
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write `records` in `ceil(len / batch_size)` calls.
    pub async fn write(
        &self,
        records: &[NewRecord],
        progress: &dyn RunProgressReporter,
    ) -> PersistOutcome {
        let mut outcome = PersistOutcome::default();
        let total = records.len().div_ceil(self.batch_size);

        for (batch_index, batch) in records.chunks(self.batch_size).enumerate() {
            if batch_index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            progress.report(RunProgressEvent::Persisting {
                batch: batch_index + 1,
                total,
                records: batch.len(),
            });

            outcome.calls += 1;
            match self.store.create_many(batch).await {
                Ok(created) => {
                    info!(
                        store = self.store.name(),
                        batch = batch_index + 1,
                        records = created.len(),
                        "batch created"
                    );
                    outcome.created.extend(created);
                }
                Err(error) => {
                    warn!(
                        store = self.store.name(),
                        batch = batch_index + 1,
                        records = batch.len(),
                        error = %error,
                        "batch failed"
                    );
                    progress.report(RunProgressEvent::BatchFailed {
                        batch: batch_index + 1,
                        error: error.to_string(),
                    });
                    outcome.failed.push(BatchFailure {
                        batch_index,
                        records: batch.len(),
                        error,
                    });
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::fingerprint;
    use crate::progress::NoProgress;
    use crate::store::memory::tests::sample_record;
    use crate::store::MemoryStore;
    use std::time::Instant;

    fn records(n: usize) -> Vec<NewRecord> {
        (0..n)
            .map(|i| {
                let prompt = format!("a distinct persisted prompt number {}", i);
                NewRecord {
                    fingerprint: fingerprint(&prompt),
                    record: sample_record(&prompt),
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn issues_ceil_m_over_b_calls() {
        for (m, b) in [(0usize, 10usize), (1, 10), (10, 10), (11, 10), (23, 4), (7, 1)] {
            let store = MemoryStore::new();
            let writer = BatchWriter::new(&store, b, Duration::ZERO);
            let outcome = writer.write(&records(m), &NoProgress).await;

            let sizes = store.create_call_sizes();
            assert_eq!(sizes.len(), m.div_ceil(b), "m={} b={}", m, b);
            assert!(sizes.iter().all(|s| *s <= b && *s > 0));
            assert_eq!(outcome.calls, sizes.len());
            assert_eq!(outcome.created_count(), m);
        }
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_later_batches() {
        let store = MemoryStore::new();
        store.fail_create_call(1);
        let writer = BatchWriter::new(&store, 10, Duration::ZERO);
        let outcome = writer.write(&records(25), &NoProgress).await;

        assert_eq!(outcome.calls, 3);
        assert_eq!(outcome.created_count(), 15);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].batch_index, 1);
        assert_eq!(outcome.failed_records(), 10);
        assert_eq!(store.len(), 15);
    }

    #[tokio::test]
    async fn batch_size_is_clamped_to_store_limit() {
        let store = MemoryStore::with_max_batch(3);
        let writer = BatchWriter::new(&store, 10, Duration::ZERO);
        assert_eq!(writer.batch_size(), 3);
        writer.write(&records(7), &NoProgress).await;
        assert_eq!(store.create_call_sizes(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn delay_separates_calls() {
        let store = MemoryStore::new();
        let writer = BatchWriter::new(&store, 2, Duration::from_millis(25));
        let started = Instant::now();
        writer.write(&records(6), &NoProgress).await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
