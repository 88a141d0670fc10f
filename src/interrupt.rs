//! Cancellation signal and the decision taken when it interrupts a transfer.
//!
//! The signal is raised asynchronously (Ctrl+C) but only observed by the
//! single run loop: inside the engine's chunk loop and between items. Once a
//! transfer reports [`TransferOutcome::Interrupted`](crate::download::TransferOutcome),
//! [`resolve_interrupt`] asks the operator whether to skip the item for good.
//!
//! ```text
//! Active ──skip──────────────▶ Skipped    record written, partial deleted
//!    └────decline / repeat ──▶ Resumable  nothing written, partial kept
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{info, instrument, warn};

use crate::download::{TransferContext, TransferError};
use crate::operator::Operator;
use crate::store::CatalogRepository;

/// Shared, clonable cancellation signal. Counts how many times it fired.
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    count: AtomicUsize,
    notify: Notify,
}

impl InterruptSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal and wakes every waiter.
    pub fn trigger(&self) {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Number of times the signal has fired.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Returns true once the signal has fired at least once.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.count() > 0
    }

    /// Completes once the signal has fired at least once.
    pub async fn triggered(&self) {
        self.fired_beyond(0).await;
    }

    /// Completes once the signal has fired more than `seen` times.
    pub async fn fired_beyond(&self, seen: usize) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() > seen {
                return;
            }
            notified.await;
        }
    }
}

/// Terminal state of an interrupted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// Item recorded as handled, partial artifact removed.
    Skipped,
    /// Nothing recorded, partial artifact kept for the next run.
    Resumable,
}

/// Errors while carrying out the operator's skip decision.
#[derive(Debug, Error)]
pub enum InterruptError {
    /// The partial artifact could not be removed; no record was written.
    #[error(transparent)]
    Cleanup(TransferError),

    /// The skip record could not be written; the partial is already gone.
    #[error(transparent)]
    Record(TransferError),
}

/// Asks the operator what to do with the interrupted transfer and applies it.
///
/// Declining, a failed prompt, or another interrupt while the prompt is
/// open all leave the item resumable.
///
/// # Errors
///
/// Returns [`InterruptError`] only when a skip was chosen and could not be
/// carried out.
#[instrument(skip_all, fields(id = ctx.item.id, file_name = %ctx.item.file_name))]
pub async fn resolve_interrupt(
    ctx: &TransferContext,
    store: &impl CatalogRepository,
    operator: &dyn Operator,
    signal: &InterruptSignal,
) -> Result<InterruptOutcome, InterruptError> {
    let prompt = format!(
        "Download of \"{}\" was interrupted. Skip it permanently?",
        ctx.item.file_name
    );
    let seen = signal.count();

    let skip = tokio::select! {
        answer = operator.confirm(&prompt) => match answer {
            Ok(choice) => choice,
            Err(error) => {
                warn!(error = %error, "no answer from operator, keeping item resumable");
                false
            }
        },
        () = signal.fired_beyond(seen) => {
            info!("interrupted again while prompting, keeping item resumable");
            false
        }
    };

    if !skip {
        info!(
            partial = %ctx.partial_path.display(),
            bytes_on_disk = ctx.state.bytes_on_disk,
            "leaving item resumable"
        );
        return Ok(InterruptOutcome::Resumable);
    }

    match tokio::fs::remove_file(&ctx.partial_path).await {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => {
            return Err(InterruptError::Cleanup(TransferError::io(
                ctx.partial_path.clone(),
                error,
            )));
        }
    }

    store
        .record(&ctx.item.to_record())
        .await
        .map_err(|error| InterruptError::Record(TransferError::store(ctx.item.id, error)))?;

    info!("item skipped permanently");
    Ok(InterruptOutcome::Skipped)
}
