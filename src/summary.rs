//! Run summary: per-source tallies, category breakdown, persistence outcome.
//!
//! The summary is assembled in full before anything is printed, so callers
//! that want structured results can take the [`RunSummary`] from the
//! pipeline and skip [`print_summary`].

use std::collections::BTreeMap;

use crate::extract::Strategy;
use crate::models::{NewRecord, SourceId, Variant};
use crate::persist::PersistOutcome;
use crate::pipeline::RunMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Scraped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub source: SourceId,
    pub status: SourceStatus,
    pub variant: Option<Variant>,
    pub served_from: Option<String>,
    pub strategy: Option<Strategy>,
    /// Drafts the extractor produced.
    pub found: usize,
    pub filtered_no_image: usize,
    pub duplicates: usize,
    pub new: usize,
}

impl SourceSummary {
    pub fn failed(source: SourceId, error: String) -> Self {
        Self {
            source,
            status: SourceStatus::Failed(error),
            variant: None,
            served_from: None,
            strategy: None,
            found: 0,
            filtered_no_image: 0,
            duplicates: 0,
            new: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed(_))
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub mode: RunMode,
    pub known_fingerprints: usize,
    pub sources: Vec<SourceSummary>,
    /// New records per category, across all sources.
    pub categories: BTreeMap<String, usize>,
    /// Present only for live runs.
    pub persistence: Option<PersistOutcome>,
}

impl RunSummary {
    pub fn new(mode: RunMode, known_fingerprints: usize) -> Self {
        Self {
            mode,
            known_fingerprints,
            sources: Vec::new(),
            categories: BTreeMap::new(),
            persistence: None,
        }
    }

    pub fn scraped(&self) -> usize {
        self.sources.iter().filter(|s| !s.is_failed()).count()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.is_failed()).count()
    }

    pub fn found(&self) -> usize {
        self.sources.iter().map(|s| s.found).sum()
    }

    pub fn new_records(&self) -> usize {
        self.sources.iter().map(|s| s.new).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.sources.iter().map(|s| s.duplicates).sum()
    }

    pub fn filtered_no_image(&self) -> usize {
        self.sources.iter().map(|s| s.filtered_no_image).sum()
    }

    pub fn created(&self) -> usize {
        self.persistence
            .as_ref()
            .map(PersistOutcome::created_count)
            .unwrap_or(0)
    }

    pub fn failed_batches(&self) -> usize {
        self.persistence
            .as_ref()
            .map(|p| p.failed.len())
            .unwrap_or(0)
    }

    /// Records in batches whose create call failed.
    pub fn failed_records(&self) -> usize {
        self.persistence
            .as_ref()
            .map(PersistOutcome::failed_records)
            .unwrap_or(0)
    }

    /// Build the category breakdown from the run's accepted records.
    pub fn tally_categories(&mut self, records: &[NewRecord]) {
        self.categories.clear();
        for r in records {
            *self.categories.entry(r.record.category.clone()).or_insert(0) += 1;
        }
    }
}

/// Print the summary to stdout. `new_records` feeds the dry-run sample.
pub fn print_summary(summary: &RunSummary, new_records: &[NewRecord], sample_size: usize) {
    match summary.mode {
        RunMode::DryRun => println!("harvest (dry-run)"),
        RunMode::Live => println!("harvest"),
    }
    println!("  known fingerprints: {}", summary.known_fingerprints);

    for s in &summary.sources {
        match &s.status {
            SourceStatus::Failed(error) => {
                println!("  {}  FAILED", s.source);
                println!("    {}", error);
            }
            SourceStatus::Scraped => {
                let strategy = s.strategy.map(|st| st.name()).unwrap_or("none");
                let served = s.served_from.as_deref().unwrap_or("-");
                let variant = s.variant.map(|v| v.to_string()).unwrap_or_default();
                println!("  {}  [{}, {} {}]", s.source, strategy, served, variant);
                println!(
                    "    found: {}  no image: {}  duplicate: {}  new: {}",
                    s.found, s.filtered_no_image, s.duplicates, s.new
                );
            }
        }
    }

    if !summary.categories.is_empty() {
        println!("  categories:");
        for (category, count) in &summary.categories {
            println!("    {}: {}", category, count);
        }
    }

    match (summary.mode, &summary.persistence) {
        (RunMode::Live, Some(outcome)) => {
            println!("{}", persisted_line(summary, outcome));
            for failure in &outcome.failed {
                println!(
                    "    batch {} ({} records) failed: {}",
                    failure.batch_index + 1,
                    failure.records,
                    failure.error
                );
            }
        }
        (RunMode::DryRun, _) if !new_records.is_empty() => {
            let shown = sample_size.min(new_records.len());
            println!("  would create {} records, showing {}:", new_records.len(), shown);
            for r in new_records.iter().take(shown) {
                println!(
                    "    - {} [{}] {}",
                    r.record.title,
                    r.record.category,
                    snippet(&r.record.prompt_text, 80)
                );
            }
        }
        _ => {}
    }

    println!(
        "totals  sources: {} scraped, {} failed  found: {}  new: {}  duplicate: {}  failed batches: {}",
        summary.scraped(),
        summary.failed_sources(),
        summary.found(),
        summary.new_records(),
        summary.duplicates(),
        summary.failed_batches()
    );
    println!("ok");
}

fn persisted_line(summary: &RunSummary, outcome: &PersistOutcome) -> String {
    let mut line = format!(
        "  persisted: {} created in {} calls",
        outcome.created_count(),
        outcome.calls
    );
    let unwritten = summary.failed_records();
    if unwritten > 0 {
        line.push_str(&format!(", {} records not written", unwritten));
    }
    line
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraped(source: &str, found: usize, duplicates: usize, new: usize) -> SourceSummary {
        let (owner, repo) = source.split_once('/').unwrap();
        SourceSummary {
            source: SourceId::new(owner, repo),
            status: SourceStatus::Scraped,
            variant: Some(Variant::Primary),
            served_from: Some("main/README.md".to_string()),
            strategy: Some(Strategy::StructuredSection),
            found,
            filtered_no_image: found - duplicates - new,
            duplicates,
            new,
        }
    }

    #[test]
    fn totals_across_sources() {
        let mut summary = RunSummary::new(RunMode::DryRun, 4);
        summary.sources.push(scraped("a/one", 5, 2, 2));
        summary.sources.push(SourceSummary::failed(
            SourceId::new("b", "two"),
            "all 2 candidates failed".to_string(),
        ));
        summary.sources.push(scraped("c/three", 3, 0, 3));

        assert_eq!(summary.scraped(), 2);
        assert_eq!(summary.failed_sources(), 1);
        assert_eq!(summary.found(), 8);
        assert_eq!(summary.new_records(), 5);
        assert_eq!(summary.duplicates(), 2);
        assert_eq!(summary.filtered_no_image(), 1);
        assert_eq!(summary.created(), 0);
        assert_eq!(summary.failed_batches(), 0);
    }

    #[test]
    fn failed_batches_report_unwritten_records() {
        use crate::error::StoreError;
        use crate::persist::BatchFailure;

        let mut summary = RunSummary::new(RunMode::Live, 0);
        summary.sources.push(scraped("a/one", 12, 0, 12));
        summary.persistence = Some(PersistOutcome {
            created: Vec::new(),
            failed: vec![BatchFailure {
                batch_index: 0,
                records: 10,
                error: StoreError::Network("connection reset".to_string()),
            }],
            calls: 2,
        });

        assert_eq!(summary.failed_batches(), 1);
        assert_eq!(summary.failed_records(), 10);
        let outcome = summary.persistence.as_ref().unwrap();
        assert_eq!(
            persisted_line(&summary, outcome),
            "  persisted: 0 created in 2 calls, 10 records not written"
        );
    }

    #[test]
    fn persisted_line_without_failures() {
        let mut summary = RunSummary::new(RunMode::Live, 0);
        summary.persistence = Some(PersistOutcome::default());
        let outcome = summary.persistence.as_ref().unwrap();
        assert_eq!(summary.failed_records(), 0);
        assert_eq!(
            persisted_line(&summary, outcome),
            "  persisted: 0 created in 0 calls"
        );
    }

    #[test]
    fn snippet_flattens_and_truncates() {
        assert_eq!(snippet("a  b\nc", 80), "a b c");
        assert_eq!(snippet("abcdef", 3), "abc...");
    }
}
