//! Error types for catalog store operations.

use std::fmt;

use thiserror::Error;

use crate::db::DbError;

/// Structured classification for store/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDbErrorKind {
    /// `SQLite` returned busy/locked.
    BusyOrLocked,
    /// Constraint failure (primary key, not-null).
    ConstraintViolation,
    /// Connection pool timed out or is closed.
    Pool,
    /// Filesystem or transport IO failure.
    Io,
    /// Unclassified database failure.
    Other,
}

impl StoreDbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::Pool,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StoreDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::Pool => "pool",
            Self::Io => "io",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StoreDbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StoreDbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT") || value == "1555")
    {
        return StoreDbErrorKind::ConstraintViolation;
    }

    StoreDbErrorKind::Other
}

/// Errors that can occur while opening or using the catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configured directory is absent; nothing was created.
    #[error(
        "store unavailable: directory {} does not exist\n  Suggestion: create it or pass a different --directory",
        path.display()
    )]
    Unavailable {
        /// Missing directory.
        path: std::path::PathBuf,
    },

    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification.
        kind: StoreDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// Schema setup failed while opening the store.
    #[error("failed to prepare catalog schema: {0}")]
    Schema(String),

    /// A persisted value could not be decoded.
    #[error("corrupt record for id {id}: {reason}")]
    CorruptRecord {
        /// Item id of the offending row.
        id: i64,
        /// What failed to decode.
        reason: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: StoreDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DirectoryMissing { path } => Self::Unavailable { path },
            DbError::Connection(source) => Self::from(source),
            DbError::Migration(source) => Self::Schema(source.to_string()),
        }
    }
}

impl StoreError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<StoreDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::Unavailable { .. } | Self::Schema(_) | Self::CorruptRecord { .. } => None,
        }
    }

    /// Returns true when the store directory is missing.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
