//! Incremental catalog synchronization.
//!
//! The store, not a timestamp, is the high-water mark: every fetched entry
//! whose id already has a record is dropped. Remote ordering and paging are
//! not stable enough to act as the only cursor.

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::client::CatalogSource;
use super::error::CatalogError;
use super::{CatalogEntry, format_publish_date};
use crate::download::filename::{extension_from_url, sanitize};
use crate::resolver::{Quality, ResolveError, resolve_url};
use crate::store::{CatalogRepository, StoreError, StoreRecord};

/// Options shared by every sync of a run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Requested quality tier.
    pub quality: Quality,
    /// Show titles to skip. Compared by exact string equality.
    pub excluded_categories: Vec<String>,
}

impl SyncOptions {
    fn is_excluded(&self, entry: &CatalogEntry) -> bool {
        entry.category.as_deref().is_some_and(|category| {
            self.excluded_categories
                .iter()
                .any(|excluded| excluded == category)
        })
    }
}

/// An entry that survived filtering and resolution, ready to transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub id: i64,
    /// Sanitized file name including extension.
    pub file_name: String,
    pub published_at: NaiveDateTime,
    /// Resolved URL for the configured quality. Never empty.
    pub source_url: String,
    pub category: Option<String>,
}

impl PendingTransfer {
    /// Returns the record that marks this item as handled.
    #[must_use]
    pub fn to_record(&self) -> StoreRecord {
        StoreRecord {
            id: self.id,
            file_name: self.file_name.clone(),
            published_at: self.published_at,
            source_url: self.source_url.clone(),
        }
    }
}

/// An entry dropped because no URL could be resolved for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub id: i64,
    pub title: String,
    pub reason: ResolveError,
}

/// Result of one sync.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Items to transfer, oldest first.
    pub pending: Vec<PendingTransfer>,
    /// Total results reported by the remote.
    pub total_results: u64,
    /// Entries returned on the page.
    pub fetched: usize,
    /// Entries dropped by category exclusion.
    pub excluded: usize,
    /// Entries dropped because the store already has them.
    pub already_handled: usize,
    /// Entries dropped because no URL resolved. Never persisted.
    pub unresolved: Vec<Unresolved>,
}

/// Errors that abort a sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote query failed.
    #[error(transparent)]
    Remote(#[from] CatalogError),

    /// The store could not be consulted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Queries the remote and builds the ordered list of pending transfers.
///
/// With `apply_filter` set, excluded categories and already-recorded ids are
/// dropped. Without it (first-run backfill) every fetched entry is kept.
///
/// # Errors
///
/// Returns [`SyncError::Remote`] when the remote query fails and
/// [`SyncError::Store`] when the store lookup fails. Unresolvable entries
/// are reported in [`SyncReport::unresolved`], not as errors.
#[instrument(skip(source, store, options), fields(quality = %options.quality))]
pub async fn sync(
    source: &impl CatalogSource,
    store: &impl CatalogRepository,
    cutoff: Option<NaiveDateTime>,
    apply_filter: bool,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let page = source.fetch_recent(cutoff).await?;

    let mut report = SyncReport {
        total_results: page.total_results,
        fetched: page.entries.len(),
        ..SyncReport::default()
    };

    for entry in page.entries {
        if apply_filter {
            if options.is_excluded(&entry) {
                debug!(id = entry.id, category = ?entry.category, "excluded category");
                report.excluded += 1;
                continue;
            }
            if store.contains(entry.id).await? {
                report.already_handled += 1;
                continue;
            }
        }

        let source_url = match resolve_url(&entry, options.quality) {
            Ok(url) => url,
            Err(reason) => {
                warn!(id = entry.id, title = %entry.title, error = %reason, "no download URL, skipping for this run");
                report.unresolved.push(Unresolved {
                    id: entry.id,
                    title: entry.title,
                    reason,
                });
                continue;
            }
        };

        let extension = extension_from_url(&source_url).unwrap_or_default();
        report.pending.push(PendingTransfer {
            id: entry.id,
            file_name: sanitize(&entry.title, &extension),
            published_at: entry.published_at,
            source_url,
            category: entry.category,
        });
    }

    // Remote order is newest first; the stable sort keeps that reversal for ties.
    report.pending.reverse();
    report.pending.sort_by_key(|item| item.published_at);

    info!(
        fetched = report.fetched,
        pending = report.pending.len(),
        excluded = report.excluded,
        already_handled = report.already_handled,
        unresolved = report.unresolved.len(),
        oldest = ?report.pending.first().map(|item| format_publish_date(&item.published_at)),
        "catalog sync complete"
    );

    Ok(report)
}
