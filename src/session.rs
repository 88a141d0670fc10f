//! One complete run: open the store, backfill on first use, sync, transfer.
//!
//! Items are processed strictly one after another in ascending publish
//! order. Only a failed remote query, a store that cannot be opened, or a
//! declined directory creation end the run early; every per-item failure is
//! logged and counted, and the loop moves on.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeDelta};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::catalog::{CatalogSource, PendingTransfer, SyncError, SyncOptions, SyncReport, sync};
use crate::download::{TransferEngine, TransferOutcome};
use crate::interrupt::{InterruptOutcome, InterruptSignal, resolve_interrupt};
use crate::operator::Operator;
use crate::resolver::Quality;
use crate::store::{CatalogStore, StoreError};

/// Default first-run backfill window.
pub const DEFAULT_BACKFILL_DAYS: u32 = 7;

/// Plain values a run is configured with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub directory: PathBuf,
    pub quality: Quality,
    pub excluded_categories: Vec<String>,
    /// How far back the first run marks items as already handled.
    pub backfill_days: u32,
}

impl SessionConfig {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            quality: Quality::default(),
            excluded_categories: Vec::new(),
            backfill_days: DEFAULT_BACKFILL_DAYS,
        }
    }

    fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            quality: self.quality,
            excluded_categories: self.excluded_categories.clone(),
        }
    }

    fn backfill_cutoff(&self, now: NaiveDateTime) -> NaiveDateTime {
        now - TimeDelta::days(i64::from(self.backfill_days))
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items recorded without download during first-run backfill.
    pub backfilled: usize,
    /// Items the sync handed to the transfer loop.
    pub pending: usize,
    pub completed: usize,
    /// Streams that ended short; resumed next run.
    pub partial: usize,
    /// Per-item errors; resumed or retried next run.
    pub failed: usize,
    /// Entries with no resolvable URL.
    pub unresolved: usize,
    /// Items skipped permanently by the operator.
    pub skipped: usize,
    /// Cancellation ended the run.
    pub interrupted: bool,
}

impl RunSummary {
    /// Returns true if some pending items are still unfinished.
    #[must_use]
    pub fn has_unfinished(&self) -> bool {
        self.partial > 0 || self.failed > 0
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operator declined to create the missing target directory.
    #[error("target directory {} does not exist", path.display())]
    DirectoryDeclined {
        /// The missing directory.
        path: PathBuf,
    },

    /// The target directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirectory {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The store could not be opened or written during backfill.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The remote query failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Opens the store in `directory`, asking the operator to create the
/// directory when it is missing.
///
/// # Errors
///
/// Returns [`SessionError::DirectoryDeclined`] when the operator says no or
/// cannot be asked, [`SessionError::CreateDirectory`] when creation fails,
/// and [`SessionError::Store`] for any other store failure.
#[instrument(skip_all, fields(directory = %directory.display()))]
pub async fn open_store(
    directory: &Path,
    operator: &dyn Operator,
) -> Result<CatalogStore, SessionError> {
    match CatalogStore::open(directory).await {
        Ok(store) => return Ok(store),
        Err(error) if error.is_unavailable() => {}
        Err(error) => return Err(error.into()),
    }

    let prompt = format!(
        "Directory {} does not exist. Create it?",
        directory.display()
    );
    let create = operator.confirm(&prompt).await.unwrap_or_else(|error| {
        warn!(error = %error, "cannot ask to create directory");
        false
    });
    if !create {
        return Err(SessionError::DirectoryDeclined {
            path: directory.to_path_buf(),
        });
    }

    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|source| SessionError::CreateDirectory {
            path: directory.to_path_buf(),
            source,
        })?;
    info!("created target directory");
    Ok(CatalogStore::open(directory).await?)
}

/// Collaborators of a run.
pub struct Session<'a, S> {
    pub config: &'a SessionConfig,
    pub source: &'a S,
    pub store: &'a CatalogStore,
    pub engine: &'a TransferEngine,
    pub operator: &'a dyn Operator,
    pub signal: &'a InterruptSignal,
}

impl<S: CatalogSource> Session<'_, S> {
    /// Runs backfill (first run only), sync and the transfer loop.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] for a failed remote query or a store failure
    /// during backfill. Per-item failures are counted in the summary.
    #[instrument(skip_all, fields(directory = %self.config.directory.display(), quality = %self.config.quality))]
    pub async fn run(&self) -> Result<RunSummary, SessionError> {
        let mut summary = RunSummary::default();
        let options = self.config.sync_options();

        if self.store.is_first_run().await? {
            let cutoff = self.config.backfill_cutoff(Local::now().naive_local());
            info!(backfill_days = self.config.backfill_days, %cutoff, "first run, backfilling history");
            let Some(report) = self.sync_or_interrupt(Some(cutoff), false, &options).await? else {
                summary.interrupted = true;
                return Ok(summary);
            };
            summary.backfilled = self.backfill(&report.pending).await?;
        }

        let Some(report) = self.sync_or_interrupt(None, true, &options).await? else {
            summary.interrupted = true;
            return Ok(summary);
        };
        summary.pending = report.pending.len();
        summary.unresolved = report.unresolved.len();

        for item in &report.pending {
            if self.signal.is_triggered() {
                info!("cancellation between items, stopping");
                summary.interrupted = true;
                break;
            }
            match self.engine.transfer(item, self.store, self.signal).await {
                Ok(TransferOutcome::Completed { .. }) => summary.completed += 1,
                Ok(TransferOutcome::PartiallyDownloaded(state)) => {
                    warn!(
                        id = item.id,
                        file_name = %item.file_name,
                        bytes_on_disk = state.bytes_on_disk,
                        expected = ?state.expected_total_bytes,
                        "incomplete, will resume next run"
                    );
                    summary.partial += 1;
                }
                Ok(TransferOutcome::Interrupted(ctx)) => {
                    summary.interrupted = true;
                    match resolve_interrupt(&ctx, self.store, self.operator, self.signal).await {
                        Ok(InterruptOutcome::Skipped) => summary.skipped += 1,
                        Ok(InterruptOutcome::Resumable) => {}
                        Err(err) => {
                            error!(id = item.id, error = %err, "could not skip item");
                            summary.failed += 1;
                        }
                    }
                    break;
                }
                Err(err) => {
                    error!(
                        id = item.id,
                        file_name = %item.file_name,
                        error = %err,
                        retryable = err.is_retryable(),
                        "transfer failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            backfilled = summary.backfilled,
            pending = summary.pending,
            completed = summary.completed,
            partial = summary.partial,
            failed = summary.failed,
            unresolved = summary.unresolved,
            skipped = summary.skipped,
            interrupted = summary.interrupted,
            "run finished"
        );
        Ok(summary)
    }

    /// Runs one sync; `None` when cancellation arrived first.
    async fn sync_or_interrupt(
        &self,
        cutoff: Option<NaiveDateTime>,
        apply_filter: bool,
        options: &SyncOptions,
    ) -> Result<Option<SyncReport>, SessionError> {
        tokio::select! {
            biased;
            () = self.signal.triggered() => {
                info!("cancelled during catalog query");
                Ok(None)
            }
            report = sync(self.source, self.store, cutoff, apply_filter, options) => Ok(Some(report?)),
        }
    }

    /// Records every item as handled without downloading it and marks the
    /// backfill as done.
    async fn backfill(&self, items: &[PendingTransfer]) -> Result<usize, SessionError> {
        let records: Vec<_> = items.iter().map(PendingTransfer::to_record).collect();
        let inserted = self.store.record_backfill(&records).await?;
        info!(inserted, "backfill complete");
        Ok(inserted)
    }
}
