//! Record store contract.
//!
//! The store is the source of truth. Mutations report the number of affected
//! rows; callers treat `0` as a no-op failure (nothing found, nothing
//! written), never as an error. Transport failures surface as
//! [`StoreError::Unavailable`](devmgr_core::StoreError::Unavailable) and are
//! not retried here.

pub mod memory;

pub use memory::InMemoryRecordStore;

use async_trait::async_trait;
use devmgr_core::{PageResult, Pages, Predicate, Record, RecordId, StoreError};

/// Result of a record store call.
pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed record store with predicate scans.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Insert a record, assigning its id and creation timestamps.
    async fn insert(&self, record: &mut R) -> StoreResult<u64>;

    /// Apply a partial update to the record the patch targets.
    async fn update_by_id(&self, patch: &R::Patch) -> StoreResult<u64>;

    /// Delete a record by id.
    async fn delete_by_id(&self, id: RecordId) -> StoreResult<u64>;

    /// Get a record by id.
    async fn select_by_id(&self, id: RecordId) -> StoreResult<Option<R>>;

    /// Get the single record matching a predicate.
    ///
    /// Fails with [`StoreError::AmbiguousResult`] when more than one record
    /// matches; callers build predicates that are unique by construction.
    async fn select_one(&self, predicate: &Predicate) -> StoreResult<Option<R>>;

    /// One page of matching records, ordered by id.
    async fn select_page(&self, page: &Pages, predicate: &Predicate) -> StoreResult<PageResult<R>>;

    /// Every matching record, ordered by id.
    async fn select_list(&self, predicate: &Predicate) -> StoreResult<Vec<R>>;
}
