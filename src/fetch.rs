//! Source document retrieval.
//!
//! A source is fetched by walking an ordered list of `(branch, filename)`
//! candidates and returning the first one that answers. Each candidate is
//! tried exactly once, bounded by the configured timeout; only when every
//! candidate fails does the source fail with a [`FetchError`].
//!
//! Sources flagged with `primary_file` publish their target-language
//! document under a different name. Their candidate list tries that file
//! on every branch first and only then falls back to the default file,
//! which is reported as the [`Variant::Localized`] variant.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::config::{FetchConfig, SourceConfig};
use crate::error::FetchError;
use crate::models::{SourceDocument, SourceId, Variant};

/// One location a source document may live at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub branch: String,
    pub filename: String,
    pub variant: Variant,
}

impl Candidate {
    pub fn location(&self) -> String {
        format!("{}/{}", self.branch, self.filename)
    }
}

/// Why a single candidate did not produce a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    NotFound,
    Status(u16),
    Network(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::NotFound => f.write_str("not found"),
            HostError::Status(code) => write!(f, "HTTP {}", code),
            HostError::Network(msg) => write!(f, "network error: {}", msg),
        }
    }
}

/// Read-only access to raw files addressed by `(owner, repo, branch, filename)`.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    async fn get_raw(
        &self,
        source: &SourceId,
        branch: &str,
        filename: &str,
    ) -> std::result::Result<String, HostError>;
}

/// Fetches raw files from a GitHub-style raw content host.
pub struct GitHubRawHost {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubRawHost {
    /// Build a host client from configuration.
    ///
    /// `GITHUB_TOKEN` is attached when present; it only raises rate limits
    /// and is never required.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: config.raw_base_url.trim_end_matches('/').to_string(),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }

    fn url(&self, source: &SourceId, branch: &str, filename: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.base_url, source.owner, source.repo, branch, filename
        )
    }
}

#[async_trait]
impl DocumentHost for GitHubRawHost {
    async fn get_raw(
        &self,
        source: &SourceId,
        branch: &str,
        filename: &str,
    ) -> std::result::Result<String, HostError> {
        let mut req = self.client.get(self.url(source, branch, filename));
        if let Some(ref token) = self.token {
            req = req.header("Authorization", format!("token {}", token));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| HostError::Network(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(HostError::NotFound);
        }
        if !status.is_success() {
            return Err(HostError::Status(status.as_u16()));
        }

        resp.text()
            .await
            .map_err(|e| HostError::Network(e.to_string()))
    }
}

/// Build the ordered candidate list for one source.
pub fn candidates(source: &SourceConfig, config: &FetchConfig) -> Vec<Candidate> {
    let on_every_branch = |filename: &str, variant: Variant| {
        config
            .branches
            .iter()
            .map(|branch| Candidate {
                branch: branch.clone(),
                filename: filename.to_string(),
                variant,
            })
            .collect::<Vec<_>>()
    };

    match source.primary_file.as_deref() {
        Some(primary) if primary != config.default_file => {
            let mut list = on_every_branch(primary, Variant::Primary);
            list.extend(on_every_branch(&config.default_file, Variant::Localized));
            list
        }
        _ => on_every_branch(&config.default_file, Variant::Primary),
    }
}

pub struct Fetcher {
    host: Box<dyn DocumentHost>,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(host: Box<dyn DocumentHost>, config: FetchConfig) -> Self {
        Self { host, config }
    }

    /// Fetch a source document, returning the first candidate that answers.
    pub async fn fetch(&self, source: &SourceConfig) -> std::result::Result<SourceDocument, FetchError> {
        let id = source.id();
        let mut attempts = Vec::new();

        for candidate in candidates(source, &self.config) {
            match self
                .host
                .get_raw(&id, &candidate.branch, &candidate.filename)
                .await
            {
                Ok(raw_content) => {
                    debug!(
                        source = %id,
                        location = %candidate.location(),
                        variant = %candidate.variant,
                        bytes = raw_content.len(),
                        "fetched source document"
                    );
                    return Ok(SourceDocument {
                        source: id,
                        raw_content,
                        variant: candidate.variant,
                        served_from: candidate.location(),
                        fetched_at: Utc::now(),
                    });
                }
                Err(e) => {
                    debug!(source = %id, location = %candidate.location(), error = %e, "candidate failed");
                    attempts.push((candidate.location(), e.to_string()));
                }
            }
        }

        warn!(source = %id, attempts = attempts.len(), "every candidate failed");
        Err(FetchError {
            source_id: id,
            attempts,
        })
    }
}
