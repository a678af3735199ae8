//! Database initialization
//!
//! The catalog is a single `mp3` table keyed by file path. Creating it is
//! idempotent, so every entry point may call [`create_schema`].

use crate::{Error, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Poll interval while waiting for the database file to appear
const DB_WAIT_POLL: Duration = Duration::from_secs(2);

/// Open the database at `db_path`, creating the file and schema if needed.
pub async fn init_database(db_path: &Path, max_connections: u32) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Open an existing database, waiting up to `wait` for the file to be created
/// by someone else (for example a scanner run from a different process).
///
/// A zero `wait` opens immediately and fails if the file is missing.
pub async fn open_database(db_path: &Path, wait: Duration, max_connections: u32) -> Result<SqlitePool> {
    let start = Instant::now();

    while !db_path.exists() {
        if start.elapsed() >= wait {
            return Err(Error::DatabaseMissing(db_path.to_path_buf()));
        }
        warn!(
            "Database file {} doesn't exist. Will retry in {}s",
            db_path.display(),
            DB_WAIT_POLL.as_secs()
        );
        tokio::time::sleep(DB_WAIT_POLL).await;
    }

    init_database(db_path, max_connections).await
}

/// In-memory catalog. A single connection, since every sqlite memory
/// connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create the `mp3` table if it does not exist
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mp3 (
            path TEXT NOT NULL PRIMARY KEY,
            artist TEXT,
            album TEXT,
            title TEXT,
            tracknum INTEGER,
            scanned_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
