//! Typed errors for the pipeline stages that can fail.
//!
//! Only [`ConfigError`] is fatal to a run. [`FetchError`] is scoped to one
//! source and [`StoreError`] to one batch (or to the initial fingerprint
//! load); the orchestrator catches both and keeps going.

use thiserror::Error;

use crate::models::SourceId;

/// Every candidate location for a source failed.
#[derive(Debug, Error)]
#[error("all {} candidates failed for {source_id}: {}", .attempts.len(), summarize(.attempts))]
pub struct FetchError {
    pub source_id: SourceId,
    /// `(location, reason)` for each candidate tried, in order.
    pub attempts: Vec<(String, String)>,
}

fn summarize(attempts: &[(String, String)]) -> String {
    attempts
        .iter()
        .map(|(location, reason)| format!("{} ({})", location, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),

    #[error("store API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("batch of {got} records exceeds the store limit of {limit}")]
    BatchTooLarge { got: usize, limit: usize },
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Parse(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Raised before any network activity; aborts the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("live mode requires {0} to be set in the environment")]
    MissingCredential(&'static str),

    #[error("unknown source '{0}'; run `harvest sources` to list configured sources")]
    UnknownSource(String),

    #[error("invalid source specifier '{0}', expected OWNER/REPO")]
    InvalidSourceSpec(String),

    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_lists_every_attempt() {
        let err = FetchError {
            source_id: SourceId::new("owner", "repo"),
            attempts: vec![
                ("main/README.md".to_string(), "HTTP 404".to_string()),
                ("master/README.md".to_string(), "timed out".to_string()),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("all 2 candidates failed for owner/repo"));
        assert!(msg.contains("main/README.md (HTTP 404)"));
        assert!(msg.contains("master/README.md (timed out)"));
    }
}
