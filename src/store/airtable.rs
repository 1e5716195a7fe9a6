//! Airtable REST backend.
//!
//! Records are rows of one table addressed as `{api_url}/{base_id}/{table}`.
//! Authentication is a bearer token. Listing projects to the fingerprint
//! field (`fields[]=...`) and pages with Airtable's opaque `offset` token.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::StoreConfig;
use crate::dedup::fingerprint;
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::models::{CaseRecord, NewRecord, PersistedRecord};

use super::{FingerprintPage, RecordStore};

pub const API_KEY_ENV: &str = "AIRTABLE_API_KEY";
pub const BASE_ID_ENV: &str = "AIRTABLE_BASE_ID";

/// Airtable rejects pages larger than this.
const MAX_PAGE_SIZE: usize = 100;

/// Column names of the cases table. The fingerprint column is configurable.
pub mod field {
    pub const TITLE: &str = "Title";
    pub const PROMPT: &str = "Prompt";
    pub const AUTHOR: &str = "Author";
    pub const AUTHOR_URL: &str = "Author URL";
    pub const SOURCE_REPO: &str = "Source Repo";
    pub const SOURCE_URL: &str = "Source URL";
    pub const REFERENCE_IMAGE_URL: &str = "Reference Image URL";
    pub const RESULT_IMAGE_URL: &str = "Result Image URL";
    pub const REFERENCE_IMAGE: &str = "Reference Image";
    pub const RESULT_IMAGE: &str = "Result Image";
    pub const REFERENCE_REQUIRED: &str = "Reference Required";
    pub const REFERENCE_NOTE: &str = "Reference Note";
    pub const TAGS: &str = "Tags";
    pub const CATEGORY: &str = "Category";
    pub const SCRAPED_AT: &str = "Scraped At";
}

#[derive(Debug, Clone)]
pub struct AirtableCredentials {
    pub api_key: String,
    pub base_id: String,
}

impl AirtableCredentials {
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            api_key: non_empty_env(API_KEY_ENV)?,
            base_id: non_empty_env(BASE_ID_ENV)?,
        })
    }
}

fn non_empty_env(name: &'static str) -> std::result::Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingCredential(name))
}

pub struct AirtableStore {
    client: reqwest::Client,
    table_url: String,
    api_key: String,
    fingerprint_field: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<RemoteRecord>,
    offset: Option<String>,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(default)]
    records: Vec<RemoteRecord>,
}

#[derive(Deserialize)]
struct RemoteRecord {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl AirtableStore {
    pub fn new(config: &StoreConfig, credentials: AirtableCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            table_url: format!(
                "{}/{}/{}",
                config.api_url.trim_end_matches('/'),
                credentials.base_id,
                config.table
            ),
            api_key: credentials.api_key,
            fingerprint_field: config.fingerprint_field.clone(),
        })
    }

    /// Field map for one record, as sent on create and update.
    pub fn record_fields(&self, fingerprint: &str, record: &CaseRecord) -> Value {
        let mut fields = Map::new();
        fields.insert(field::TITLE.into(), json!(record.title));
        fields.insert(field::PROMPT.into(), json!(record.prompt_text));
        fields.insert(field::SOURCE_REPO.into(), json!(record.source_repo));
        fields.insert(field::SOURCE_URL.into(), json!(record.source_url));
        fields.insert(field::REFERENCE_REQUIRED.into(), json!(record.reference_required));
        fields.insert(field::TAGS.into(), json!(record.tags.join(", ")));
        fields.insert(field::CATEGORY.into(), json!(record.category));
        fields.insert(field::SCRAPED_AT.into(), json!(record.scraped_at.to_rfc3339()));
        fields.insert(self.fingerprint_field.clone(), json!(fingerprint));

        let optional = [
            (field::AUTHOR, &record.author),
            (field::AUTHOR_URL, &record.author_url),
            (field::REFERENCE_IMAGE_URL, &record.reference_image_url),
            (field::RESULT_IMAGE_URL, &record.result_image_url),
            (field::REFERENCE_NOTE, &record.reference_note),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                fields.insert(name.into(), json!(v));
            }
        }
        if let Some(ref url) = record.reference_image_url {
            fields.insert(field::REFERENCE_IMAGE.into(), json!([{ "url": url }]));
        }
        if let Some(ref url) = record.result_image_url {
            fields.insert(field::RESULT_IMAGE.into(), json!([{ "url": url }]));
        }
        Value::Object(fields)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.table_url, id)
    }
}

/// Turn a non-success response into [`StoreError::Api`], preferring the
/// message from Airtable's `{"error": {"message": ...}}` envelope.
async fn check(resp: reqwest::Response) -> StoreResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    match parsed.as_ref().and_then(|v| v.get("error")) {
        Some(Value::String(kind)) => kind.clone(),
        Some(err) => err
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| err.get("type").and_then(Value::as_str))
            .unwrap_or(body)
            .to_string(),
        None => body.to_string(),
    }
}

#[async_trait]
impl RecordStore for AirtableStore {
    fn name(&self) -> &str {
        "airtable"
    }

    async fn list_fingerprints(
        &self,
        page_size: usize,
        offset: Option<&str>,
    ) -> StoreResult<FingerprintPage> {
        let mut query = vec![
            ("pageSize", page_size.clamp(1, MAX_PAGE_SIZE).to_string()),
            ("fields[]", self.fingerprint_field.clone()),
        ];
        if let Some(token) = offset {
            query.push(("offset", token.to_string()));
        }

        let resp = self
            .client
            .get(&self.table_url)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;
        let page: ListResponse = check(resp).await?.json().await?;

        let fingerprints = page
            .records
            .into_iter()
            .filter_map(|r| {
                r.fields
                    .get(&self.fingerprint_field)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .collect();
        Ok(FingerprintPage {
            fingerprints,
            offset: page.offset.filter(|o| !o.is_empty()),
        })
    }

    async fn create_many(&self, records: &[NewRecord]) -> StoreResult<Vec<PersistedRecord>> {
        if records.len() > self.max_batch() {
            return Err(StoreError::BatchTooLarge {
                got: records.len(),
                limit: self.max_batch(),
            });
        }
        let payload = json!({
            "records": records
                .iter()
                .map(|r| json!({ "fields": self.record_fields(&r.fingerprint, &r.record) }))
                .collect::<Vec<_>>(),
            "typecast": true,
        });

        let resp = self
            .client
            .post(&self.table_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let created: CreateResponse = check(resp).await?.json().await?;

        if created.records.len() != records.len() {
            return Err(StoreError::Parse(format!(
                "sent {} records, store acknowledged {}",
                records.len(),
                created.records.len()
            )));
        }
        debug!(records = records.len(), "airtable create-many acknowledged");

        Ok(created
            .records
            .into_iter()
            .zip(records)
            .map(|(remote, sent)| PersistedRecord {
                id: remote.id,
                fingerprint: sent.fingerprint.clone(),
                record: sent.record.clone(),
            })
            .collect())
    }

    async fn update(&self, id: &str, record: &CaseRecord) -> StoreResult<()> {
        let payload = json!({
            "fields": self.record_fields(&fingerprint(&record.prompt_text), record),
            "typecast": true,
        });
        let resp = self
            .client
            .patch(self.record_url(id))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let resp = self
            .client
            .delete(self.record_url(id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}
