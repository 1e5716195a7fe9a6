//! Run orchestration.
//!
//! Drives every selected source through fetch, extract, classify, and
//! dedup, strictly one source at a time in configured order, then
//! aggregates and (live mode only) persists the accumulated new records:
//!
//! ```text
//! Init → Fetching(source) → Extracting → Classifying → Deduping ─┐
//!          ▲                                                     │
//!          └──────────────────── next source ◀───────────────────┘
//!        → Aggregating → Persisting (live) → Done
//! ```
//!
//! A failed fetch marks only that source failed. A failed batch marks only
//! that batch failed. The only errors that end a run are raised before any
//! network activity (source selection, missing store in live mode) or while
//! loading the known-fingerprint set in live mode, without which writes
//! could break fingerprint uniqueness.
//!
//! State transitions are only traced at `debug` level
//! (`RUST_LOG=prompt_harvest=debug`); progress reporters see source and
//! batch events, not states.

use std::fmt;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::classify::Classifier;
use crate::config::{Config, SourceConfig, StoreConfig};
use crate::dedup::FingerprintSet;
use crate::error::ConfigError;
use crate::extract::Extractor;
use crate::fetch::{DocumentHost, Fetcher, GitHubRawHost};
use crate::models::{CaseRecord, NewRecord, SourceId};
use crate::persist::BatchWriter;
use crate::progress::{RunProgressEvent, RunProgressReporter};
use crate::store::{load_known_fingerprints, RecordStore};
use crate::summary::{RunSummary, SourceStatus, SourceSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Fetch, extract, classify, and dedup. No writes.
    DryRun,
    /// Additionally persist new records.
    Live,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::DryRun => f.write_str("dry-run"),
            RunMode::Live => f.write_str("live"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Init,
    Fetching(SourceId),
    Extracting,
    Classifying,
    Deduping,
    Aggregating,
    Persisting,
    Done,
}

/// Everything a run produced, available before any printing.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Records accepted as new this run, in source then document order.
    pub new_records: Vec<NewRecord>,
    /// Every classified draft that passed the image filter, duplicates
    /// included, in the same order.
    pub scraped: Vec<CaseRecord>,
}

/// Resolve `--source OWNER/REPO` against the configured sources.
pub fn select_sources(
    sources: &[SourceConfig],
    only: Option<&str>,
) -> std::result::Result<Vec<SourceConfig>, ConfigError> {
    let Some(spec) = only else {
        return Ok(sources.to_vec());
    };
    let wanted =
        SourceId::parse(spec).ok_or_else(|| ConfigError::InvalidSourceSpec(spec.to_string()))?;
    sources
        .iter()
        .find(|s| {
            s.owner.eq_ignore_ascii_case(&wanted.owner) && s.repo.eq_ignore_ascii_case(&wanted.repo)
        })
        .cloned()
        .map(|s| vec![s])
        .ok_or_else(|| ConfigError::UnknownSource(spec.to_string()))
}

pub struct Pipeline {
    fetcher: Fetcher,
    extractor: Extractor,
    classifier: Classifier,
    require_image: bool,
    store_config: StoreConfig,
}

struct Tracker {
    state: RunState,
}

impl Tracker {
    fn enter(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }
}

impl Pipeline {
    pub fn new(config: &Config, host: Box<dyn DocumentHost>) -> Self {
        Self {
            fetcher: Fetcher::new(host, config.fetch.clone()),
            extractor: Extractor::from_config(&config.extraction),
            classifier: Classifier::from_config(&config.classifier),
            require_image: config.extraction.require_image,
            store_config: config.store.clone(),
        }
    }

    /// Pipeline fetching from the configured raw content host.
    pub fn from_config(config: &Config) -> Result<Self> {
        let host = GitHubRawHost::new(&config.fetch)?;
        Ok(Self::new(config, Box::new(host)))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Run the pipeline over `sources`.
    ///
    /// In dry-run mode `store` is optional and only read; a listing failure
    /// degrades to an empty known set. In live mode `store` is required.
    pub async fn run(
        &self,
        sources: &[SourceConfig],
        mode: RunMode,
        store: Option<&dyn RecordStore>,
        progress: &dyn RunProgressReporter,
    ) -> Result<RunReport> {
        let mut tracker = Tracker {
            state: RunState::Init,
        };
        if mode == RunMode::Live && store.is_none() {
            return Err(ConfigError::Invalid("live mode requires a record store".to_string()).into());
        }

        let mut known = self.load_known(mode, store, progress).await?;
        let mut summary = RunSummary::new(mode, known.len());
        let mut accepted: Vec<NewRecord> = Vec::new();
        let mut scraped: Vec<CaseRecord> = Vec::new();

        info!(mode = %mode, sources = sources.len(), known = known.len(), "starting run");

        for (i, source) in sources.iter().enumerate() {
            let id = source.id();
            tracker.enter(RunState::Fetching(id.clone()));
            progress.report(RunProgressEvent::Fetching {
                source: id.to_string(),
                index: i + 1,
                total: sources.len(),
            });

            let doc = match self.fetcher.fetch(source).await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(source = %id, error = %e, "source failed");
                    progress.report(RunProgressEvent::SourceFailed {
                        source: id.to_string(),
                        error: e.to_string(),
                    });
                    summary.sources.push(SourceSummary::failed(id, e.to_string()));
                    continue;
                }
            };

            tracker.enter(RunState::Extracting);
            let extraction = self.extractor.extract(&doc);
            let found = extraction.records.len();

            tracker.enter(RunState::Classifying);
            let mut drafts = extraction.records;
            for draft in &mut drafts {
                self.classifier.apply(draft);
            }
            let before_filter = drafts.len();
            if self.require_image {
                drafts.retain(|d| d.has_image());
            }
            let filtered_no_image = before_filter - drafts.len();

            tracker.enter(RunState::Deduping);
            scraped.extend(drafts.iter().cloned());
            let partition = known.partition(drafts);

            info!(
                source = %id,
                strategy = extraction.strategy.map(|s| s.name()).unwrap_or("none"),
                records = found,
                new = partition.new.len(),
                duplicates = partition.duplicates,
                "source processed"
            );
            progress.report(RunProgressEvent::SourceDone {
                source: id.to_string(),
                strategy: extraction.strategy.map(|s| s.name().to_string()),
                found,
                new: partition.new.len(),
            });

            summary.sources.push(SourceSummary {
                source: id,
                status: SourceStatus::Scraped,
                variant: Some(doc.variant),
                served_from: Some(doc.served_from),
                strategy: extraction.strategy,
                found,
                filtered_no_image,
                duplicates: partition.duplicates,
                new: partition.new.len(),
            });
            accepted.extend(partition.new);
        }

        tracker.enter(RunState::Aggregating);
        summary.tally_categories(&accepted);

        if let (RunMode::Live, Some(store)) = (mode, store) {
            tracker.enter(RunState::Persisting);
            let writer = BatchWriter::from_config(store, &self.store_config);
            let outcome = writer.write(&accepted, progress).await;
            info!(
                created = outcome.created_count(),
                failed_batches = outcome.failed.len(),
                calls = outcome.calls,
                "persistence finished"
            );
            summary.persistence = Some(outcome);
        }

        tracker.enter(RunState::Done);
        Ok(RunReport {
            summary,
            new_records: accepted,
            scraped,
        })
    }

    async fn load_known(
        &self,
        mode: RunMode,
        store: Option<&dyn RecordStore>,
        progress: &dyn RunProgressReporter,
    ) -> Result<FingerprintSet> {
        let Some(store) = store else {
            info!("no store available, deduplicating within this run only");
            return Ok(FingerprintSet::new());
        };
        progress.report(RunProgressEvent::LoadingFingerprints {
            store: store.name().to_string(),
        });
        match load_known_fingerprints(store, self.store_config.page_size).await {
            Ok(known) => Ok(known),
            Err(e) if mode == RunMode::DryRun => {
                warn!(store = store.name(), error = %e, "could not load known fingerprints");
                Ok(FingerprintSet::new())
            }
            Err(e) => Err(e).context("Failed to load known fingerprints"),
        }
    }
}
