//! Export a run's case records as JSON or CSV.
//!
//! By default only the records accepted as new are exported (in dry-run,
//! the ones that would be created). [`ExportScope::All`] exports every
//! scraped draft that passed extraction and the image filter, duplicates
//! included. Each record carries its fingerprint.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::dedup::fingerprint;
use crate::models::CaseRecord;
use crate::pipeline::{RunMode, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// Records accepted as new this run.
    New,
    /// Every scraped draft, duplicates included.
    All,
}

impl fmt::Display for ExportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportScope::New => f.write_str("new"),
            ExportScope::All => f.write_str("all"),
        }
    }
}

/// The records of `report` that `scope` selects, in run order.
pub fn records_for(report: &RunReport, scope: ExportScope) -> Vec<&CaseRecord> {
    match scope {
        ExportScope::New => report.new_records.iter().map(|r| &r.record).collect(),
        ExportScope::All => report.scraped.iter().collect(),
    }
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    fingerprint: String,
    #[serde(flatten)]
    record: &'a CaseRecord,
}

#[derive(Serialize)]
struct ExportData<'a> {
    mode: String,
    scope: String,
    exported_at: String,
    count: usize,
    records: Vec<ExportRecord<'a>>,
}

/// Column order of the CSV export; matches the field order of [`CsvRow`].
const CSV_HEADER: [&str; 14] = [
    "fingerprint",
    "title",
    "prompt_text",
    "author",
    "author_url",
    "source_repo",
    "source_url",
    "reference_image_url",
    "result_image_url",
    "tags",
    "category",
    "reference_required",
    "reference_note",
    "scraped_at",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    fingerprint: String,
    title: &'a str,
    prompt_text: &'a str,
    author: Option<&'a str>,
    author_url: Option<&'a str>,
    source_repo: &'a str,
    source_url: &'a str,
    reference_image_url: Option<&'a str>,
    result_image_url: Option<&'a str>,
    tags: String,
    category: &'a str,
    reference_required: bool,
    reference_note: Option<&'a str>,
    scraped_at: String,
}

impl<'a> CsvRow<'a> {
    fn new(record: &'a CaseRecord) -> Self {
        Self {
            fingerprint: fingerprint(&record.prompt_text),
            title: &record.title,
            prompt_text: &record.prompt_text,
            author: record.author.as_deref(),
            author_url: record.author_url.as_deref(),
            source_repo: &record.source_repo,
            source_url: &record.source_url,
            reference_image_url: record.reference_image_url.as_deref(),
            result_image_url: record.result_image_url.as_deref(),
            tags: record.tags.join(", "),
            category: &record.category,
            reference_required: record.reference_required,
            reference_note: record.reference_note.as_deref(),
            scraped_at: record.scraped_at.to_rfc3339(),
        }
    }
}

fn ensure_parent(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write `records` to `output` as pretty-printed JSON, creating parent
/// directories as needed.
pub fn write_records_json(
    output: &Path,
    mode: RunMode,
    scope: ExportScope,
    records: &[&CaseRecord],
) -> Result<()> {
    let data = ExportData {
        mode: mode.to_string(),
        scope: scope.to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        count: records.len(),
        records: records
            .iter()
            .map(|&record| ExportRecord {
                fingerprint: fingerprint(&record.prompt_text),
                record,
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&data)?;

    ensure_parent(output)?;
    fs::write(output, &json).with_context(|| format!("Failed to write {}", output.display()))?;
    eprintln!("Exported {} records to {}", records.len(), output.display());
    Ok(())
}

/// Write `records` to `output` as CSV with a header row. Tags are joined
/// with `, `; absent optional fields are empty cells.
pub fn write_records_csv(output: &Path, records: &[&CaseRecord]) -> Result<()> {
    ensure_parent(output)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(CsvRow::new(record))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", output.display()))?;
    eprintln!("Exported {} records to {}", records.len(), output.display());
    Ok(())
}
