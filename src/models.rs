//! Core data models used throughout the harvest pipeline.
//!
//! These types represent the source documents, draft case records, and
//! persisted records that flow from the fetcher through extraction,
//! classification, and deduplication into the record store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one external repository that publishes prompt cases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    pub owner: String,
    pub repo: String,
}

impl SourceId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parse an `owner/repo` specifier as accepted by `--source`.
    pub fn parse(spec: &str) -> Option<Self> {
        let (owner, repo) = spec.trim().split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self::new(owner, repo))
    }

    /// Browsable repository URL, used as the default `source_url`.
    pub fn repo_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Which language variant of a source document was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// The target-language document.
    Primary,
    /// A fallback document in another language.
    Localized,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Primary => f.write_str("primary"),
            Variant::Localized => f.write_str("localized"),
        }
    }
}

/// Raw text fetched for one source. Never persisted.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: SourceId,
    pub raw_content: String,
    pub variant: Variant,
    /// `branch/filename` that answered.
    pub served_from: String,
    pub fetched_at: DateTime<Utc>,
}

/// A draft prompt case produced by the extractor.
///
/// `category`, `tags` and `reference_required` are filled in by the
/// classifier; the extractor leaves them at their defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseRecord {
    pub title: String,
    pub prompt_text: String,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub source_repo: String,
    pub source_url: String,
    pub reference_image_url: Option<String>,
    pub result_image_url: Option<String>,
    pub tags: Vec<String>,
    pub category: String,
    pub reference_required: bool,
    pub reference_note: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl CaseRecord {
    pub fn has_image(&self) -> bool {
        self.result_image_url.is_some() || self.reference_image_url.is_some()
    }
}

/// A case record accepted as new, paired with its fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRecord {
    pub fingerprint: String,
    #[serde(flatten)]
    pub record: CaseRecord,
}

/// A record as it exists in the backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    pub id: String,
    pub fingerprint: String,
    pub record: CaseRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_source_spec() {
        let id = SourceId::parse("JimmyLv/awesome-nano-banana").unwrap();
        assert_eq!(id.owner, "JimmyLv");
        assert_eq!(id.repo, "awesome-nano-banana");
        assert_eq!(id.to_string(), "JimmyLv/awesome-nano-banana");
    }

    #[test]
    fn parse_rejects_malformed_specs() {
        assert!(SourceId::parse("no-slash").is_none());
        assert!(SourceId::parse("/repo").is_none());
        assert!(SourceId::parse("owner/").is_none());
        assert!(SourceId::parse("a/b/c").is_none());
    }
}
