//! Run progress reporting.
//!
//! Reports observable progress during `harvest run` so operators see which
//! source is being fetched, what each one yielded, and how persistence is
//! going. Progress is emitted on **stderr** so stdout holds only the final
//! summary.

use std::io::Write;

use tracing_subscriber::EnvFilter;

/// A single progress event for a run.
#[derive(Clone, Debug)]
pub enum RunProgressEvent {
    /// Loading the known-fingerprint set from the store.
    LoadingFingerprints { store: String },
    /// Fetching source `index` (1-based) of `total`.
    Fetching {
        source: String,
        index: usize,
        total: usize,
    },
    /// Source processed: records found, and how many of them are new.
    SourceDone {
        source: String,
        strategy: Option<String>,
        found: usize,
        new: usize,
    },
    /// Every candidate for the source failed.
    SourceFailed { source: String, error: String },
    /// Writing batch `batch` (1-based) of `total`.
    Persisting {
        batch: usize,
        total: usize,
        records: usize,
    },
    /// A batch failed; its records were not created.
    BatchFailed { batch: usize, error: String },
}

/// Reports run progress. Implementations write to stderr (human or JSON).
pub trait RunProgressReporter: Send + Sync {
    fn report(&self, event: RunProgressEvent);
}

/// Human-friendly progress on stderr: "fetch [2/5] ZeroLu/awesome-nanobanana-pro".
pub struct StderrProgress;

impl RunProgressReporter for StderrProgress {
    fn report(&self, event: RunProgressEvent) {
        let line = match &event {
            RunProgressEvent::LoadingFingerprints { store } => {
                format!("store {}  loading known fingerprints...\n", store)
            }
            RunProgressEvent::Fetching {
                source,
                index,
                total,
            } => format!("fetch [{}/{}] {}\n", index, total, source),
            RunProgressEvent::SourceDone {
                source,
                strategy,
                found,
                new,
            } => format!(
                "  {}  {} found, {} new ({})\n",
                source,
                format_number(*found as u64),
                format_number(*new as u64),
                strategy.as_deref().unwrap_or("no strategy matched")
            ),
            RunProgressEvent::SourceFailed { source, error } => {
                format!("  {}  FAILED: {}\n", source, error)
            }
            RunProgressEvent::Persisting {
                batch,
                total,
                records,
            } => format!(
                "persist  batch {} / {}  ({} records)\n",
                format_number(*batch as u64),
                format_number(*total as u64),
                records
            ),
            RunProgressEvent::BatchFailed { batch, error } => {
                format!("persist  batch {} FAILED: {}\n", batch, error)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl RunProgressReporter for JsonProgress {
    fn report(&self, event: RunProgressEvent) {
        let obj = match &event {
            RunProgressEvent::LoadingFingerprints { store } => serde_json::json!({
                "event": "progress",
                "phase": "loading_fingerprints",
                "store": store
            }),
            RunProgressEvent::Fetching {
                source,
                index,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "fetching",
                "source": source,
                "n": index,
                "total": total
            }),
            RunProgressEvent::SourceDone {
                source,
                strategy,
                found,
                new,
            } => serde_json::json!({
                "event": "source_done",
                "source": source,
                "strategy": strategy,
                "found": found,
                "new": new
            }),
            RunProgressEvent::SourceFailed { source, error } => serde_json::json!({
                "event": "source_failed",
                "source": source,
                "error": error
            }),
            RunProgressEvent::Persisting {
                batch,
                total,
                records,
            } => serde_json::json!({
                "event": "progress",
                "phase": "persisting",
                "n": batch,
                "total": total,
                "records": records
            }),
            RunProgressEvent::BatchFailed { batch, error } => serde_json::json!({
                "event": "batch_failed",
                "batch": batch,
                "error": error
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl RunProgressReporter for NoProgress {
    fn report(&self, _event: RunProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value.
    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}'; expected human, json, or off",
                other
            )),
        }
    }

    /// Default log directive: `info` unless a reporter already narrates the run.
    pub fn default_log_directive(&self) -> &'static str {
        match self {
            ProgressMode::Off => "prompt_harvest=info",
            ProgressMode::Human | ProgressMode::Json => "prompt_harvest=warn",
        }
    }

    /// Log filter for this mode. A non-empty, parseable `rust_log` (the
    /// `RUST_LOG` value) replaces the default entirely.
    pub fn log_filter(&self, rust_log: Option<&str>) -> EnvFilter {
        rust_log
            .map(str::trim)
            .filter(|directives| !directives.is_empty())
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(self.default_log_directive()))
    }

    pub fn reporter(&self) -> Box<dyn RunProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
