//! Catalog Sync Core Library
//!
//! Incrementally mirrors a remote video catalog into a local directory.
//! Each run asks the remote for its most recent items, drops the ones the
//! local store has already handled, and downloads the rest oldest first,
//! resuming any partially written file left by an earlier run.
//!
//! # Architecture
//!
//! - [`db`] - SQLite connection and schema migrations
//! - [`store`] - Record of handled item ids (the high-water mark)
//! - [`catalog`] - Remote catalog client and the sync step
//! - [`resolver`] - Quality tiers and download URL resolution
//! - [`download`] - Resumable transfer engine and file naming
//! - [`interrupt`] - Cancellation signal and skip-or-resume decision
//! - [`session`] - One complete run: backfill, sync, transfers

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod db;
pub mod download;
pub mod interrupt;
pub mod operator;
pub mod resolver;
pub mod session;
pub mod store;
mod user_agent;

// Re-export commonly used types
pub use catalog::{CatalogClient, CatalogEntry, CatalogError, PendingTransfer, SyncReport};
pub use db::Database;
pub use download::{HttpClient, TransferEngine, TransferError, TransferOutcome};
pub use interrupt::{InterruptOutcome, InterruptSignal};
pub use operator::{FixedAnswer, Operator, OperatorError};
pub use resolver::Quality;
pub use session::{RunSummary, SessionConfig, SessionError};
pub use store::{CatalogStore, StoreError, StoreRecord};
