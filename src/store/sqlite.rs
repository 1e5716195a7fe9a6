//! Local SQLite backend.
//!
//! One `cases` table keyed by `UNIQUE(fingerprint)`. Each `create_many`
//! runs in a single transaction, so a conflicting or failing row rolls the
//! whole batch back. Continuation tokens are numeric row offsets.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db;
use crate::dedup::fingerprint;
use crate::error::{StoreError, StoreResult};
use crate::migrate;
use crate::models::{CaseRecord, NewRecord, PersistedRecord};

use super::{FingerprintPage, RecordStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and make sure the schema exists.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Open an existing database without creating or migrating it.
    pub async fn open_read_only(db_path: &Path) -> Result<Self> {
        let pool = db::connect_read_only(db_path).await?;
        Ok(Self { pool })
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cases")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<PersistedRecord>> {
        let row = sqlx::query(
            "SELECT id, fingerprint, title, prompt_text, author, author_url, source_repo, \
             source_url, reference_image_url, result_image_url, tags_json, category, \
             reference_required, reference_note, scraped_at FROM cases WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_record(&r)).transpose()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_record(row: &SqliteRow) -> StoreResult<PersistedRecord> {
    let tags_json: String = row.get("tags_json");
    let scraped_at: i64 = row.get("scraped_at");
    Ok(PersistedRecord {
        id: row.get("id"),
        fingerprint: row.get("fingerprint"),
        record: CaseRecord {
            title: row.get("title"),
            prompt_text: row.get("prompt_text"),
            author: row.get("author"),
            author_url: row.get("author_url"),
            source_repo: row.get("source_repo"),
            source_url: row.get("source_url"),
            reference_image_url: row.get("reference_image_url"),
            result_image_url: row.get("result_image_url"),
            tags: serde_json::from_str(&tags_json)?,
            category: row.get("category"),
            reference_required: row.get("reference_required"),
            reference_note: row.get("reference_note"),
            scraped_at: DateTime::<Utc>::from_timestamp(scraped_at, 0).unwrap_or_default(),
        },
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list_fingerprints(
        &self,
        page_size: usize,
        offset: Option<&str>,
    ) -> StoreResult<FingerprintPage> {
        let start: i64 = match offset {
            Some(token) => token
                .parse()
                .map_err(|_| StoreError::Parse(format!("bad offset token '{}'", token)))?,
            None => 0,
        };
        let limit = page_size.max(1) as i64;

        let fingerprints: Vec<String> =
            sqlx::query_scalar("SELECT fingerprint FROM cases ORDER BY rowid LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(start)
                .fetch_all(&self.pool)
                .await?;

        let offset = (fingerprints.len() as i64 == limit)
            .then(|| (start + limit).to_string());
        Ok(FingerprintPage {
            fingerprints,
            offset,
        })
    }

    async fn create_many(&self, records: &[NewRecord]) -> StoreResult<Vec<PersistedRecord>> {
        if records.len() > self.max_batch() {
            return Err(StoreError::BatchTooLarge {
                got: records.len(),
                limit: self.max_batch(),
            });
        }

        let now = Utc::now().timestamp();
        let mut created = Vec::with_capacity(records.len());
        let mut tx = self.pool.begin().await?;

        for new in records {
            let id = Uuid::new_v4().to_string();
            let r = &new.record;
            sqlx::query(
                r#"
                INSERT INTO cases (id, fingerprint, title, prompt_text, author, author_url, source_repo, source_url, reference_image_url, result_image_url, tags_json, category, reference_required, reference_note, scraped_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&new.fingerprint)
            .bind(&r.title)
            .bind(&r.prompt_text)
            .bind(&r.author)
            .bind(&r.author_url)
            .bind(&r.source_repo)
            .bind(&r.source_url)
            .bind(&r.reference_image_url)
            .bind(&r.result_image_url)
            .bind(serde_json::to_string(&r.tags)?)
            .bind(&r.category)
            .bind(r.reference_required)
            .bind(&r.reference_note)
            .bind(r.scraped_at.timestamp())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            created.push(PersistedRecord {
                id,
                fingerprint: new.fingerprint.clone(),
                record: r.clone(),
            });
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn update(&self, id: &str, record: &CaseRecord) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cases SET
                fingerprint = ?, title = ?, prompt_text = ?, author = ?, author_url = ?,
                source_repo = ?, source_url = ?, reference_image_url = ?, result_image_url = ?,
                tags_json = ?, category = ?, reference_required = ?, reference_note = ?,
                scraped_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(fingerprint(&record.prompt_text))
        .bind(&record.title)
        .bind(&record.prompt_text)
        .bind(&record.author)
        .bind(&record.author_url)
        .bind(&record.source_repo)
        .bind(&record.source_url)
        .bind(&record.reference_image_url)
        .bind(&record.result_image_url)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(&record.category)
        .bind(record.reference_required)
        .bind(&record.reference_note)
        .bind(record.scraped_at.timestamp())
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM cases WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
