//! Database connection and schema management.
//!
//! This module provides SQLite connectivity for the catalog store with:
//! - Connection pool management
//! - WAL mode for file databases
//! - Automatic migration execution
//!
//! # Example
//!
//! ```no_run
//! use catalog_sync_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open(Path::new("./videos")).await?;
//! println!("WAL enabled: {}", db.is_wal_enabled().await?);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, instrument};

/// File name of the catalog database inside the target directory.
pub const DATABASE_FILE_NAME: &str = "catalog.db";

/// Single writer, single reader: the run is strictly sequential.
const DEFAULT_MAX_CONNECTIONS: u32 = 2;

/// SQLite busy timeout in milliseconds.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// The target directory does not exist; the caller decides whether to create it.
    #[error("target directory does not exist: {}", path.display())]
    DirectoryMissing {
        /// The directory that was expected to hold the database.
        path: PathBuf,
    },

    /// Failed to connect to or query the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Database connection wrapper with connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (or creates) the catalog database inside `directory`.
    ///
    /// The directory itself is never created here: a missing directory is
    /// reported as [`DbError::DirectoryMissing`] so the orchestration layer
    /// can ask the operator.
    ///
    /// # Errors
    ///
    /// Returns `DbError::DirectoryMissing` if `directory` is absent,
    /// `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(directory), fields(directory = %directory.display()))]
    pub async fn open(directory: &Path) -> Result<Self, DbError> {
        if !directory.is_dir() {
            return Err(DbError::DirectoryMissing {
                path: directory.to_path_buf(),
            });
        }

        let db_path = directory.join(DATABASE_FILE_NAME);
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        Self::initialize(pool).await
    }

    /// Creates an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::initialize(pool).await
    }

    async fn initialize(pool: SqlitePool) -> Result<Self, DbError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("catalog schema ready");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.eq_ignore_ascii_case("wal"))
    }

    /// Gracefully closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_catalog_table_exists_after_migration() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO catalog_items (id, file_name, published_at, source_url) \
             VALUES (1, 'a.mp4', '2021-01-01 10:00:00', 'https://example.com/a_4000.mp4')",
        )
        .execute(db.pool())
        .await;

        assert!(result.is_ok(), "catalog table should exist after migration");
    }

    #[tokio::test]
    async fn test_database_open_missing_directory_is_typed_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("not-there");

        let result = Database::open(&missing).await;

        match result {
            Err(DbError::DirectoryMissing { path }) => assert_eq!(path, missing),
            other => panic!("expected DirectoryMissing, got {other:?}"),
        }
        assert!(!missing.exists(), "open must not create the directory");
    }

    #[tokio::test]
    async fn test_database_reopen_keeps_rows() {
        let temp_dir = tempfile::tempdir().unwrap();

        let first = Database::open(temp_dir.path()).await.unwrap();
        assert!(first.is_wal_enabled().await.unwrap());
        sqlx::query("INSERT INTO sync_state (id, backfilled_at) VALUES (1, '2021-01-01 10:00:00')")
            .execute(first.pool())
            .await
            .unwrap();
        first.close().await;

        let second = Database::open(temp_dir.path()).await.unwrap();
        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_state")
            .fetch_one(second.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert!(temp_dir.path().join(DATABASE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_database_primary_key_rejects_duplicate_id() {
        let db = Database::new_in_memory().await.unwrap();
        let insert = "INSERT INTO catalog_items (id, file_name, published_at, source_url) \
                      VALUES (7, 'a.mp4', '2021-01-01 10:00:00', 'u')";

        sqlx::query(insert).execute(db.pool()).await.unwrap();
        let duplicate = sqlx::query(insert).execute(db.pool()).await;

        assert!(duplicate.is_err(), "duplicate id should violate primary key");
    }
}
