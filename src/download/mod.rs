//! Resumable media transfers.
//!
//! Each pending item is streamed into `<name>_<quality>.part` beside its
//! final path and renamed once complete. A partial artifact left by an
//! earlier run is resumed with an HTTP Range request.
//!
//! # Example
//!
//! ```no_run
//! use catalog_sync_core::download::{HttpClient, TransferEngine, TransferSettings};
//! use catalog_sync_core::interrupt::InterruptSignal;
//! use catalog_sync_core::resolver::Quality;
//! use catalog_sync_core::store::CatalogStore;
//! use std::path::Path;
//!
//! # async fn example(item: catalog_sync_core::catalog::PendingTransfer) -> Result<(), Box<dyn std::error::Error>> {
//! let dir = Path::new("./videos");
//! let store = CatalogStore::open(dir).await?;
//! let engine = TransferEngine::new(
//!     HttpClient::new()?.with_api_key("key"),
//!     TransferSettings::new(dir, Quality::Hd),
//! );
//! let outcome = engine.transfer(&item, &store, &InterruptSignal::new()).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
pub mod filename;
mod progress;

pub use client::HttpClient;
pub use constants::{CHUNK_SIZE, CONNECT_TIMEOUT_SECS, IDLE_TIMEOUT_SECS};
pub use engine::{
    TransferContext, TransferEngine, TransferMode, TransferOutcome, TransferSettings,
    TransferState,
};
pub use error::TransferError;
pub use progress::{NoProgress, TransferProgress};
