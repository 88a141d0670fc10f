//! Repository seam for catalog store operations.
//!
//! Catalog sync, the transfer engine and the interrupt coordinator depend on
//! this trait rather than on [`CatalogStore`] directly.

use async_trait::async_trait;

use super::{CatalogStore, StoreError, StoreRecord};

/// Data-access contract for the "has this item been handled?" store.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Returns true when a record exists for `id`.
    async fn contains(&self, id: i64) -> Result<bool, StoreError>;

    /// Inserts a record, returning false when `id` was already present.
    async fn record(&self, record: &StoreRecord) -> Result<bool, StoreError>;
}

#[async_trait]
impl CatalogRepository for CatalogStore {
    async fn contains(&self, id: i64) -> Result<bool, StoreError> {
        CatalogStore::contains(self, id).await
    }

    async fn record(&self, record: &StoreRecord) -> Result<bool, StoreError> {
        CatalogStore::insert(self, record).await
    }
}
