use anyhow::Result;
use sqlx::SqlitePool;

/// Create the local cases schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cases (
            id TEXT PRIMARY KEY,
            fingerprint TEXT NOT NULL,
            title TEXT NOT NULL,
            prompt_text TEXT NOT NULL,
            author TEXT,
            author_url TEXT,
            source_repo TEXT NOT NULL,
            source_url TEXT NOT NULL,
            reference_image_url TEXT,
            result_image_url TEXT,
            tags_json TEXT NOT NULL DEFAULT '[]',
            category TEXT NOT NULL,
            reference_required INTEGER NOT NULL DEFAULT 0,
            reference_note TEXT,
            scraped_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(fingerprint)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cases_source_repo ON cases(source_repo)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cases_category ON cases(category)")
        .execute(pool)
        .await?;

    Ok(())
}
