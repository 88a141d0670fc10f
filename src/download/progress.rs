//! Progress observer seam for the transfer engine.
//!
//! Rendering lives in the binary; the engine only reports events.

use super::engine::TransferState;
use crate::catalog::PendingTransfer;

/// Receives progress events for the item currently being transferred.
pub trait TransferProgress: Send + Sync {
    /// A transfer opened its response; `state` holds resume offset and expected size.
    fn started(&self, _item: &PendingTransfer, _state: &TransferState) {}

    /// `bytes` more bytes were durably written.
    fn advanced(&self, _bytes: u64) {}

    /// The transfer stopped, for any reason.
    fn finished(&self) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl TransferProgress for NoProgress {}
