//! Catalog store: durable record of every item that has been handled.
//!
//! Presence of a row for an item id means the item was downloaded to
//! completion, explicitly skipped by the operator, or recorded as history
//! during the first-run backfill. Rows are only ever inserted; there is no
//! update or delete path.
//!
//! The backfill commits its rows together with a one-row `sync_state`
//! marker, so a store stays in first-run state until that commit lands.
//!
//! # Example
//!
//! ```ignore
//! use catalog_sync_core::store::CatalogStore;
//! use std::path::Path;
//!
//! let store = CatalogStore::open(Path::new("./videos")).await?;
//! if !store.contains(42).await? {
//!     // ... transfer item 42 ...
//! }
//! ```

mod error;
mod repository;

pub use error::{StoreDbErrorKind, StoreError};
pub use repository::CatalogRepository;

use std::path::Path;

use chrono::NaiveDateTime;
use sqlx::Row;
use tracing::{debug, instrument};

use crate::catalog::{format_publish_date, parse_publish_date};
use crate::db::Database;

/// A persisted catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    /// Remote item id (primary key).
    pub id: i64,
    /// Sanitized file name, extension included.
    pub file_name: String,
    /// Remote publish timestamp.
    pub published_at: NaiveDateTime,
    /// Resolved source URL, without credentials.
    pub source_url: String,
}

/// `SQLite`-backed catalog store.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    db: Database,
}

impl CatalogStore {
    /// Wraps an already-open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens the store kept in `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the directory is missing,
    /// or a database/schema error when the database cannot be prepared.
    #[instrument(skip(directory), fields(directory = %directory.display()))]
    pub async fn open(directory: &Path) -> Result<Self, StoreError> {
        let db = Database::open(directory).await?;
        Ok(Self::new(db))
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns a database/schema error when the database cannot be prepared.
    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let db = Database::new_in_memory().await?;
        Ok(Self::new(db))
    }

    /// Returns true until a backfill has been committed with
    /// [`CatalogStore::record_backfill`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn is_first_run(&self) -> Result<bool, StoreError> {
        let marker = sqlx::query("SELECT 1 FROM sync_state WHERE id = 1")
            .fetch_optional(self.db.pool())
            .await?;
        Ok(marker.is_none())
    }

    /// Records `records` as handled and marks the backfill as done, all in
    /// one transaction. Returns how many rows were new.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if any statement fails; nothing is
    /// committed in that case.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn record_backfill(&self, records: &[StoreRecord]) -> Result<usize, StoreError> {
        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0;
        for record in records {
            let result = sqlx::query(
                r"INSERT OR IGNORE INTO catalog_items (id, file_name, published_at, source_url)
                  VALUES (?, ?, ?, ?)",
            )
            .bind(record.id)
            .bind(&record.file_name)
            .bind(format_publish_date(&record.published_at))
            .bind(&record.source_url)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
        sqlx::query(
            "INSERT OR REPLACE INTO sync_state (id, backfilled_at) VALUES (1, datetime('now'))",
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(inserted, "backfill committed");
        Ok(inserted)
    }

    /// Checks whether `id` has already been handled.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn contains(&self, id: i64) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM catalog_items WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    /// Inserts a new record.
    ///
    /// An existing row for the same id is left untouched and `false` is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    #[instrument(skip(self, record), fields(id = record.id, file_name = %record.file_name))]
    pub async fn insert(&self, record: &StoreRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"INSERT OR IGNORE INTO catalog_items (id, file_name, published_at, source_url)
              VALUES (?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.file_name)
        .bind(format_publish_date(&record.published_at))
        .bind(&record.source_url)
        .execute(self.db.pool())
        .await?;

        let inserted = result.rows_affected() > 0;
        debug!(inserted, "catalog record written");
        Ok(inserted)
    }

    /// Fetches a single record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails, or
    /// [`StoreError::CorruptRecord`] if the stored timestamp is unreadable.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<StoreRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, file_name, published_at, source_url FROM catalog_items WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw_date: String = row.get("published_at");
        let published_at =
            parse_publish_date(&raw_date).map_err(|error| StoreError::CorruptRecord {
                id,
                reason: error.to_string(),
            })?;

        Ok(Some(StoreRecord {
            id: row.get("id"),
            file_name: row.get("file_name"),
            published_at,
            source_url: row.get("source_url"),
        }))
    }

    /// Returns the number of handled items.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM catalog_items")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Closes the underlying connection pool.
    pub async fn close(self) {
        self.db.close().await;
    }
}
