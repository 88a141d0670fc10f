//! Error types for the transfer engine.
//!
//! Every variant is per-item: the run logs it and moves on. A partial
//! artifact written before the failure is left in place for the next run.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while transferring one item.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Network-level error (DNS resolution, connection refused, TLS, reset mid-stream).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// No data arrived within the idle interval.
    #[error("timeout downloading {url}: no data for {idle_secs}s")]
    Timeout {
        /// The URL that timed out.
        url: String,
        /// The idle interval that elapsed.
        idle_secs: u64,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while writing, renaming or deleting artifacts.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The server answered a ranged request with a different range.
    #[error("unexpected range from {url}: requested offset {requested}, got {received}")]
    UnexpectedRange {
        /// The URL that was requested.
        url: String,
        /// Offset sent in the Range header.
        requested: u64,
        /// Offset the response starts at.
        received: u64,
    },

    /// The server reports a total size smaller than the partial artifact.
    #[error("partial artifact {} holds {on_disk} bytes but {url} has only {total}", path.display())]
    OversizedPartial {
        /// The URL that was requested.
        url: String,
        /// Partial artifact that was discarded.
        path: PathBuf,
        /// Bytes the partial held.
        on_disk: u64,
        /// Total size reported by the server.
        total: u64,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The artifact reached its final state but the record could not be written.
    #[error("failed to record item {id}: {source}")]
    Store {
        /// Catalog item id.
        id: i64,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },
}

impl TransferError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error, idle_secs: u64) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url, idle_secs }
        } else {
            Self::Network {
                url,
                source: source.without_url(),
            }
        }
    }

    /// Creates an idle timeout error.
    pub fn timeout(url: impl Into<String>, idle_secs: u64) -> Self {
        Self::Timeout {
            url: url.into(),
            idle_secs,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a store error for item `id`.
    pub fn store(id: i64, source: StoreError) -> Self {
        Self::Store { id, source }
    }

    /// Returns true for failures a later run may resume from.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::Io { .. }
            | Self::Store { .. }
            | Self::UnexpectedRange { .. }
            | Self::OversizedPartial { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidUrl { .. } => false,
        }
    }
}
