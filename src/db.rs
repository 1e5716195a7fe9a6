//! SQLite connection setup for the local record store.
//!
//! Live runs and `harvest init` open the database read-write, creating the
//! file and its parent directory on demand. Dry-runs open an existing file
//! read-only, so they never create a database or change its journal mode.

use anyhow::{bail, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

fn options(db_path: &Path) -> Result<SqliteConnectOptions> {
    Ok(SqliteConnectOptions::from_str(&format!(
        "sqlite:{}",
        db_path.display()
    ))?)
}

async fn pool(options: SqliteConnectOptions) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Open `db_path` read-write in WAL mode, creating it if missing.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = options(db_path)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    pool(options).await
}

/// Open an existing `db_path` read-only.
pub async fn connect_read_only(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        bail!("database {} does not exist", db_path.display());
    }
    let options = options(db_path)?.read_only(true);
    pool(options).await
}
