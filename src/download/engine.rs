//! Resumable transfer engine.
//!
//! Streams one item at a time into a partial artifact next to its final
//! path, resuming from whatever is already on disk. The artifact is promoted
//! (renamed) only once its size matches what the server advertised, and only
//! then is the item recorded in the store.
//!
//! # Lifecycle of one transfer
//!
//! ```text
//! final exists ─────────────────────────────▶ record ─▶ Completed (already present)
//! partial N bytes ─▶ GET Range: bytes=N- ─┬─ 206 ─▶ append
//!                                         ├─ 200 ─▶ truncate, write from 0
//!                                         └─ 416 ─▶ total == N ? promote : error
//! stream ends ─▶ size == expected ? rename + record ─▶ Completed
//!                                 : PartiallyDownloaded (partial kept)
//! ```
//!
//! Cancellation is observed between reads. Bytes already received are
//! flushed before [`TransferOutcome::Interrupted`] is returned so the
//! partial artifact reflects everything that arrived.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::CONTENT_RANGE;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::constants::{CHUNK_SIZE, IDLE_TIMEOUT_SECS};
use super::error::TransferError;
use super::filename::partial_path;
use super::progress::{NoProgress, TransferProgress};
use crate::catalog::PendingTransfer;
use crate::interrupt::InterruptSignal;
use crate::resolver::Quality;
use crate::store::CatalogRepository;

/// Where and how items are written.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Target directory; must already exist.
    pub directory: PathBuf,
    /// Tier the source URLs were resolved for. Part of the partial name.
    pub quality: Quality,
    /// Longest wait for the response head or the next body chunk.
    pub idle_timeout: Duration,
}

impl TransferSettings {
    /// Settings with the default idle timeout.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, quality: Quality) -> Self {
        Self {
            directory: directory.into(),
            quality,
            idle_timeout: Duration::from_secs(IDLE_TIMEOUT_SECS),
        }
    }
}

/// Whether bytes were appended to an existing partial or written from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Fresh,
    Resuming,
}

/// Progress of a single transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    /// Length of the partial artifact.
    pub bytes_on_disk: u64,
    /// Full size advertised by the server, when known.
    pub expected_total_bytes: Option<u64>,
    pub mode: TransferMode,
}

/// Everything needed to finish or abandon one transfer.
#[derive(Debug, Clone)]
pub struct TransferContext {
    pub item: PendingTransfer,
    pub final_path: PathBuf,
    pub partial_path: PathBuf,
    pub state: TransferState,
}

/// Result of one [`TransferEngine::transfer`] call.
#[derive(Debug)]
pub enum TransferOutcome {
    /// The final artifact exists and the item is recorded.
    Completed {
        /// Size of the final artifact.
        bytes: u64,
        /// The final artifact was already on disk before this call.
        already_present: bool,
    },
    /// The stream ended short of the advertised size. Nothing was recorded.
    PartiallyDownloaded(TransferState),
    /// Cancellation was observed. Nothing was recorded.
    Interrupted(TransferContext),
}

/// Parsed `Content-Range` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    start: Option<u64>,
    total: Option<u64>,
}

/// Parses `bytes 0-99/200`, `bytes */200` and `bytes 0-99/*`.
fn parse_content_range(value: &str) -> Option<ContentRange> {
    let body = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = body.split_once('/')?;
    let total = match total.trim() {
        "*" => None,
        digits => Some(digits.parse().ok()?),
    };
    let start = match range.trim() {
        "*" => None,
        bounds => {
            let (start, _end) = bounds.split_once('-')?;
            Some(start.trim().parse().ok()?)
        }
    };
    Some(ContentRange { start, total })
}

fn content_range(response: &reqwest::Response) -> Option<ContentRange> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_range)
}

async fn file_len(path: &Path) -> Result<Option<u64>, TransferError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(TransferError::io(path, error)),
    }
}

/// Sequential, resumable downloader for pending items.
pub struct TransferEngine {
    client: HttpClient,
    settings: TransferSettings,
    progress: Arc<dyn TransferProgress>,
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("client", &self.client)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TransferEngine {
    /// Creates an engine that reports no progress.
    #[must_use]
    pub fn new(client: HttpClient, settings: TransferSettings) -> Self {
        Self {
            client,
            settings,
            progress: Arc::new(NoProgress),
        }
    }

    /// Replaces the progress observer.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn TransferProgress>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Final and partial paths for `item`, with an empty state.
    #[must_use]
    pub fn context_for(&self, item: &PendingTransfer) -> TransferContext {
        let final_path = self.settings.directory.join(&item.file_name);
        let partial_path = partial_path(&final_path, self.settings.quality);
        TransferContext {
            item: item.clone(),
            final_path,
            partial_path,
            state: TransferState {
                bytes_on_disk: 0,
                expected_total_bytes: None,
                mode: TransferMode::Fresh,
            },
        }
    }

    /// Transfers one item, resuming any partial artifact.
    ///
    /// The store is written only after the final artifact is in place.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] for network, HTTP, filesystem and store
    /// failures. Any partial artifact written so far is left on disk.
    #[instrument(skip_all, fields(id = item.id, file_name = %item.file_name))]
    pub async fn transfer(
        &self,
        item: &PendingTransfer,
        store: &impl CatalogRepository,
        interrupt: &InterruptSignal,
    ) -> Result<TransferOutcome, TransferError> {
        let result = self.run(item, store, interrupt).await;
        self.progress.finished();
        result
    }

    async fn run(
        &self,
        item: &PendingTransfer,
        store: &impl CatalogRepository,
        interrupt: &InterruptSignal,
    ) -> Result<TransferOutcome, TransferError> {
        let mut ctx = self.context_for(item);

        if let Some(bytes) = file_len(&ctx.final_path).await? {
            info!(bytes, "final artifact already present");
            record(store, item).await?;
            return Ok(TransferOutcome::Completed {
                bytes,
                already_present: true,
            });
        }

        let offset = file_len(&ctx.partial_path).await?.unwrap_or(0);
        ctx.state.bytes_on_disk = offset;
        if offset > 0 {
            ctx.state.mode = TransferMode::Resuming;
        }

        if interrupt.is_triggered() {
            return Ok(TransferOutcome::Interrupted(ctx));
        }

        let idle = self.settings.idle_timeout;
        let idle_secs = idle.as_secs();
        let response = tokio::select! {
            biased;
            () = interrupt.triggered() => return Ok(TransferOutcome::Interrupted(ctx)),
            response = tokio::time::timeout(idle, self.client.get_from(&item.source_url, offset, idle_secs)) => {
                response.map_err(|_| TransferError::timeout(&item.source_url, idle_secs))??
            }
        };

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return handle_unsatisfiable(ctx, &response, store).await;
        }

        let file = if status == StatusCode::PARTIAL_CONTENT && offset > 0 {
            let range = content_range(&response);
            if let Some(start) = range.and_then(|r| r.start)
                && start != offset
            {
                return Err(TransferError::UnexpectedRange {
                    url: item.source_url.clone(),
                    requested: offset,
                    received: start,
                });
            }
            ctx.state.expected_total_bytes = range
                .and_then(|r| r.total)
                .or_else(|| response.content_length().map(|len| offset + len));
            ctx.state.mode = TransferMode::Resuming;
            OpenOptions::new()
                .append(true)
                .open(&ctx.partial_path)
                .await
                .map_err(|e| TransferError::io(&ctx.partial_path, e))?
        } else {
            if offset > 0 {
                warn!(offset, status = status.as_u16(), "server ignored range, restarting from zero");
            }
            ctx.state.bytes_on_disk = 0;
            ctx.state.mode = TransferMode::Fresh;
            ctx.state.expected_total_bytes = response.content_length();
            File::create(&ctx.partial_path)
                .await
                .map_err(|e| TransferError::io(&ctx.partial_path, e))?
        };

        debug!(
            offset = ctx.state.bytes_on_disk,
            expected = ?ctx.state.expected_total_bytes,
            mode = ?ctx.state.mode,
            "streaming body"
        );
        self.progress.started(item, &ctx.state);

        let mut writer = ChunkWriter {
            file,
            path: ctx.partial_path.clone(),
            buffer: Vec::with_capacity(CHUNK_SIZE),
            progress: Arc::clone(&self.progress),
        };
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                () = interrupt.triggered() => None,
                next = tokio::time::timeout(idle, stream.next()) => Some(next),
            };
            let Some(next) = next else {
                writer.flush(&mut ctx.state).await?;
                info!(bytes_on_disk = ctx.state.bytes_on_disk, "transfer interrupted");
                return Ok(TransferOutcome::Interrupted(ctx));
            };
            match next {
                Err(_elapsed) => {
                    writer.flush(&mut ctx.state).await?;
                    return Err(TransferError::timeout(&item.source_url, idle_secs));
                }
                Ok(Some(Err(error))) => {
                    writer.flush(&mut ctx.state).await?;
                    return Err(TransferError::network(&item.source_url, error, idle_secs));
                }
                Ok(Some(Ok(chunk))) => writer.push(&chunk, &mut ctx.state).await?,
                Ok(None) => break,
            }
        }
        writer.flush(&mut ctx.state).await?;
        writer.close().await?;

        match ctx.state.expected_total_bytes {
            Some(expected) if expected != ctx.state.bytes_on_disk => {
                warn!(
                    bytes_on_disk = ctx.state.bytes_on_disk,
                    expected, "stream ended before the advertised size"
                );
                return Ok(TransferOutcome::PartiallyDownloaded(ctx.state));
            }
            Some(_) => {}
            None => warn!(
                bytes = ctx.state.bytes_on_disk,
                "server sent no length, accepting end of stream as complete"
            ),
        }

        promote(&ctx).await?;
        record(store, item).await?;
        info!(bytes = ctx.state.bytes_on_disk, "transfer completed");
        Ok(TransferOutcome::Completed {
            bytes: ctx.state.bytes_on_disk,
            already_present: false,
        })
    }
}

/// 416: the partial is either already complete or larger than the source.
async fn handle_unsatisfiable(
    mut ctx: TransferContext,
    response: &reqwest::Response,
    store: &impl CatalogRepository,
) -> Result<TransferOutcome, TransferError> {
    let on_disk = ctx.state.bytes_on_disk;
    let total = content_range(response).and_then(|r| r.total);
    match total {
        Some(total) if on_disk > 0 && total == on_disk => {
            info!(bytes = on_disk, "partial artifact already complete");
            ctx.state.expected_total_bytes = Some(total);
            promote(&ctx).await?;
            record(store, &ctx.item).await?;
            Ok(TransferOutcome::Completed {
                bytes: on_disk,
                already_present: false,
            })
        }
        Some(total) if total < on_disk => {
            warn!(on_disk, total, "partial artifact larger than source, discarding");
            tokio::fs::remove_file(&ctx.partial_path)
                .await
                .map_err(|e| TransferError::io(&ctx.partial_path, e))?;
            Err(TransferError::OversizedPartial {
                url: ctx.item.source_url.clone(),
                path: ctx.partial_path,
                on_disk,
                total,
            })
        }
        _ => Err(TransferError::http_status(
            &ctx.item.source_url,
            StatusCode::RANGE_NOT_SATISFIABLE.as_u16(),
        )),
    }
}

/// Buffers body chunks and writes them to the partial artifact in
/// [`CHUNK_SIZE`] pieces.
struct ChunkWriter {
    file: File,
    path: PathBuf,
    buffer: Vec<u8>,
    progress: Arc<dyn TransferProgress>,
}

impl ChunkWriter {
    async fn push(&mut self, chunk: &[u8], state: &mut TransferState) -> Result<(), TransferError> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() >= CHUNK_SIZE {
            self.flush(state).await?;
        }
        Ok(())
    }

    /// Writes and flushes whatever is buffered; `bytes_on_disk` follows.
    async fn flush(&mut self, state: &mut TransferState) -> Result<(), TransferError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file
            .write_all(&self.buffer)
            .await
            .map_err(|e| TransferError::io(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| TransferError::io(&self.path, e))?;
        let written = self.buffer.len() as u64;
        state.bytes_on_disk += written;
        self.progress.advanced(written);
        self.buffer.clear();
        Ok(())
    }

    async fn close(mut self) -> Result<(), TransferError> {
        self.file
            .sync_all()
            .await
            .map_err(|e| TransferError::io(&self.path, e))
    }
}

async fn promote(ctx: &TransferContext) -> Result<(), TransferError> {
    tokio::fs::rename(&ctx.partial_path, &ctx.final_path)
        .await
        .map_err(|e| TransferError::io(&ctx.final_path, e))
}

async fn record(
    store: &impl CatalogRepository,
    item: &PendingTransfer,
) -> Result<(), TransferError> {
    let inserted = store.record(&item.to_record()).await.map_err(|e| {
        warn!(kind = ?e.database_kind(), error = %e, "catalog record failed");
        TransferError::store(item.id, e)
    })?;
    if !inserted {
        debug!("item was already recorded");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::parse_publish_date;
    use crate::store::{CatalogStore, StoreDbErrorKind, StoreError, StoreRecord};

    fn item(file_name: &str) -> PendingTransfer {
        PendingTransfer {
            id: 7,
            file_name: file_name.to_string(),
            published_at: parse_publish_date("2020-05-01 12:00:00").unwrap(),
            source_url: "http://127.0.0.1:9/clip_4000.mp4".to_string(),
            category: None,
        }
    }

    fn engine(dir: &Path) -> TransferEngine {
        TransferEngine::new(
            HttpClient::new().unwrap(),
            TransferSettings::new(dir, Quality::Hd),
        )
    }

    #[test]
    fn test_parse_content_range_variants() {
        assert_eq!(
            parse_content_range("bytes 100-199/200"),
            Some(ContentRange {
                start: Some(100),
                total: Some(200)
            })
        );
        assert_eq!(
            parse_content_range("bytes */200"),
            Some(ContentRange {
                start: None,
                total: Some(200)
            })
        );
        assert_eq!(
            parse_content_range("bytes 0-99/*"),
            Some(ContentRange {
                start: Some(0),
                total: None
            })
        );
        assert_eq!(parse_content_range("items 0-1/2"), None);
        assert_eq!(parse_content_range("bytes x-1/2"), None);
    }

    #[test]
    fn test_context_for_derives_paths() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = engine(dir.path()).context_for(&item("clip.mp4"));
        assert_eq!(ctx.final_path, dir.path().join("clip.mp4"));
        assert_eq!(ctx.partial_path, dir.path().join("clip.mp4_hd.part"));
        assert_eq!(ctx.state.bytes_on_disk, 0);
        assert_eq!(ctx.state.mode, TransferMode::Fresh);
    }

    #[tokio::test]
    async fn test_existing_final_artifact_is_recorded_without_network() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"0123456789").unwrap();
        let store = CatalogStore::new_in_memory().await.unwrap();

        let outcome = engine(dir.path())
            .transfer(&item("clip.mp4"), &store, &InterruptSignal::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            TransferOutcome::Completed {
                bytes: 10,
                already_present: true
            }
        ));
        assert!(store.contains(7).await.unwrap());
    }

    struct LockedStore;

    #[async_trait::async_trait]
    impl CatalogRepository for LockedStore {
        async fn contains(&self, _id: i64) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn record(&self, _record: &StoreRecord) -> Result<bool, StoreError> {
            Err(StoreError::Database {
                kind: StoreDbErrorKind::BusyOrLocked,
                message: "database is locked".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_record_failure_is_store_error_with_kind() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"0123").unwrap();

        let err = engine(dir.path())
            .transfer(&item("clip.mp4"), &LockedStore, &InterruptSignal::new())
            .await
            .unwrap_err();

        let TransferError::Store { id, source } = &err else {
            panic!("expected store error, got {err:?}");
        };
        assert_eq!(*id, 7);
        assert_eq!(source.database_kind(), Some(StoreDbErrorKind::BusyOrLocked));
        assert!(err.is_retryable());
        assert!(dir.path().join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_interrupt_before_request_keeps_partial_untouched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4_hd.part"), b"abc").unwrap();
        let store = CatalogStore::new_in_memory().await.unwrap();
        let signal = InterruptSignal::new();
        signal.trigger();

        let outcome = engine(dir.path())
            .transfer(&item("clip.mp4"), &store, &signal)
            .await
            .unwrap();

        let TransferOutcome::Interrupted(ctx) = outcome else {
            panic!("expected interrupted outcome");
        };
        assert_eq!(ctx.state.bytes_on_disk, 3);
        assert_eq!(ctx.state.mode, TransferMode::Resuming);
        assert_eq!(std::fs::read(&ctx.partial_path).unwrap(), b"abc");
        assert!(!store.contains(7).await.unwrap());
    }
}
