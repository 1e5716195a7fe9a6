//! Record store abstraction for harvested cases.
//!
//! The [`RecordStore`] trait is the only contract the pipeline has with
//! persistence: a paged, field-projected fingerprint listing with a
//! continuation token, bounded-size create-many, single-record update,
//! and single-record delete. A create-many call is all-or-nothing from the
//! caller's point of view.
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | Airtable REST | [`airtable`] | production table |
//! | SQLite | [`sqlite`] | local runs, offline inspection |
//! | In-memory | [`memory`] | tests |

pub mod airtable;
pub mod memory;
pub mod sqlite;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{StoreBackend, StoreConfig, STORE_MAX_BATCH};
use crate::dedup::FingerprintSet;
use crate::error::{StoreError, StoreResult};
use crate::models::{CaseRecord, NewRecord, PersistedRecord};

pub use airtable::{AirtableCredentials, AirtableStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One page of a fingerprint listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintPage {
    pub fingerprints: Vec<String>,
    /// Continuation token for the next page; `None` on the last page.
    pub offset: Option<String>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs and summaries.
    fn name(&self) -> &str;

    /// Largest batch one `create_many` call accepts.
    fn max_batch(&self) -> usize {
        STORE_MAX_BATCH
    }

    /// List one page of fingerprints, projected to the fingerprint field only.
    async fn list_fingerprints(
        &self,
        page_size: usize,
        offset: Option<&str>,
    ) -> StoreResult<FingerprintPage>;

    /// Create every record in one call. On error none of them may be
    /// assumed created.
    async fn create_many(&self, records: &[NewRecord]) -> StoreResult<Vec<PersistedRecord>>;

    async fn update(&self, id: &str, record: &CaseRecord) -> StoreResult<()>;

    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Read every fingerprint in the store, following continuation tokens
/// until the last page.
pub async fn load_known_fingerprints(
    store: &dyn RecordStore,
    page_size: usize,
) -> StoreResult<FingerprintSet> {
    let mut known = FingerprintSet::new();
    let mut offset: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store.list_fingerprints(page_size, offset.as_deref()).await?;
        pages += 1;
        known.extend(page.fingerprints);

        match page.offset {
            Some(next) if offset.as_deref() == Some(next.as_str()) => {
                return Err(StoreError::Parse(format!(
                    "continuation token '{}' did not advance",
                    next
                )));
            }
            Some(next) => {
                debug!(store = store.name(), page = pages, "following continuation token");
                offset = Some(next);
            }
            None => break,
        }
    }

    info!(
        store = store.name(),
        pages,
        fingerprints = known.len(),
        "loaded known fingerprints"
    );
    Ok(known)
}

/// Open the configured store for writing.
///
/// For the Airtable backend missing credentials surface as a
/// [`crate::error::ConfigError`] before any request is made.
pub async fn open_store(config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
    match config.backend {
        StoreBackend::Airtable => {
            let credentials = AirtableCredentials::from_env()?;
            Ok(Box::new(AirtableStore::new(config, credentials)?))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.db_path)
                .await
                .with_context(|| format!("Failed to open {}", config.db_path.display()))?;
            Ok(Box::new(store))
        }
    }
}

/// Open the configured store for a dry-run read, if it is reachable
/// without side effects: Airtable only when credentials are present,
/// SQLite only when the database file already exists.
pub async fn open_store_for_read(config: &StoreConfig) -> Result<Option<Box<dyn RecordStore>>> {
    match config.backend {
        StoreBackend::Airtable => match AirtableCredentials::from_env() {
            Ok(credentials) => Ok(Some(Box::new(AirtableStore::new(config, credentials)?))),
            Err(_) => Ok(None),
        },
        StoreBackend::Sqlite if config.db_path.exists() => {
            Ok(Some(Box::new(SqliteStore::open_read_only(&config.db_path).await?)))
        }
        StoreBackend::Sqlite => Ok(None),
    }
}
