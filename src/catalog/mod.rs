//! Remote catalog access and incremental synchronization.
//!
//! - [`CatalogClient`] - queries the remote videos endpoint
//! - [`CatalogSource`] - seam over the remote query (mocked in tests)
//! - [`sync`] - turns one page of remote entries into an ordered list of
//!   [`PendingTransfer`]s, consulting the catalog store

mod client;
mod error;
mod sync;

pub use client::{
    CatalogClient, CatalogPage, CatalogSource, DEFAULT_API_BASE_URL, DEFAULT_QUERY_TIMEOUT_SECS,
    PAGE_LIMIT,
};
pub use error::CatalogError;
pub use sync::{PendingTransfer, SyncError, SyncOptions, SyncReport, Unresolved, sync};

use chrono::NaiveDateTime;

use crate::resolver::Quality;

/// Wire and storage format of publish timestamps.
pub const PUBLISH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a publish timestamp in [`PUBLISH_DATE_FORMAT`].
///
/// # Errors
///
/// Returns the chrono parse error for malformed input.
pub fn parse_publish_date(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value.trim(), PUBLISH_DATE_FORMAT)
}

/// Formats a publish timestamp in [`PUBLISH_DATE_FORMAT`].
#[must_use]
pub fn format_publish_date(value: &NaiveDateTime) -> String {
    value.format(PUBLISH_DATE_FORMAT).to_string()
}

/// Per-tier download URLs of a catalog entry. Any tier may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateUrls {
    pub hd: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
}

impl CandidateUrls {
    /// Returns the URL for `quality` when present and non-empty.
    #[must_use]
    pub fn get(&self, quality: Quality) -> Option<&str> {
        let slot = match quality {
            Quality::Hd => &self.hd,
            Quality::High => &self.high,
            Quality::Low => &self.low,
        };
        slot.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }
}

/// One item as published by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Stable remote identifier.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Publish timestamp.
    pub published_at: NaiveDateTime,
    /// Show title, used for category exclusion.
    pub category: Option<String>,
    /// Download URLs per quality tier.
    pub candidate_urls: CandidateUrls,
}
