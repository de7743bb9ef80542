//! In-memory record store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use devmgr_core::{
    now, NaturalKey, PageResult, Pages, Predicate, Record, RecordId, RecordPatch, StoreError,
};

use super::{RecordStore, StoreResult};

#[derive(Debug)]
struct Table<R> {
    rows: BTreeMap<RecordId, R>,
    next_id: RecordId,
}

impl<R: Record> Table<R> {
    fn key_taken(&self, key: &NaturalKey, except: Option<RecordId>) -> bool {
        self.rows
            .iter()
            .any(|(id, row)| Some(*id) != except && row.natural_key() == *key)
    }

    fn matching<'a>(&'a self, predicate: &'a Predicate) -> impl Iterator<Item = &'a R> + 'a {
        self.rows.values().filter(move |row| predicate.matches(*row))
    }
}

/// Ordered in-memory store with auto-increment ids starting at 1.
///
/// Enforces natural-key uniqueness on insert and update, the row-level
/// backstop for concurrent writers that both passed a duplicate pre-check.
/// Locks are held only for the synchronous body of each call.
#[derive(Debug)]
pub struct InMemoryRecordStore<R> {
    table: RwLock<Table<R>>,
}

impl<R: Record> Default for InMemoryRecordStore<R> {
    fn default() -> Self {
        Self {
            table: RwLock::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl<R: Record> InMemoryRecordStore<R> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Table<R>>> {
        self.table.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Table<R>>> {
        self.table.write().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for InMemoryRecordStore<R> {
    async fn insert(&self, record: &mut R) -> StoreResult<u64> {
        let mut table = self.write()?;
        let key = record.natural_key();
        if table.key_taken(&key, None) {
            return Err(StoreError::UniqueViolation { key });
        }
        let id = table.next_id;
        table.next_id += 1;
        record.assign_id(id);
        record.stamp_created(now());
        table.rows.insert(id, record.clone());
        Ok(1)
    }

    async fn update_by_id(&self, patch: &R::Patch) -> StoreResult<u64> {
        let mut table = self.write()?;
        let id = patch.target_id();
        let Some(current) = table.rows.get(&id) else {
            return Ok(0);
        };
        let mut updated = current.clone();
        updated.apply_patch(patch, now());
        let key = updated.natural_key();
        if key != current.natural_key() && table.key_taken(&key, Some(id)) {
            return Err(StoreError::UniqueViolation { key });
        }
        table.rows.insert(id, updated);
        Ok(1)
    }

    async fn delete_by_id(&self, id: RecordId) -> StoreResult<u64> {
        let mut table = self.write()?;
        Ok(u64::from(table.rows.remove(&id).is_some()))
    }

    async fn select_by_id(&self, id: RecordId) -> StoreResult<Option<R>> {
        Ok(self.read()?.rows.get(&id).cloned())
    }

    async fn select_one(&self, predicate: &Predicate) -> StoreResult<Option<R>> {
        let table = self.read()?;
        let mut matches = table.matching(predicate);
        let first = matches.next().cloned();
        let extra = matches.count();
        if extra > 0 {
            return Err(StoreError::AmbiguousResult {
                predicate: predicate.signature(),
                matched: extra + 1,
            });
        }
        Ok(first)
    }

    async fn select_page(&self, page: &Pages, predicate: &Predicate) -> StoreResult<PageResult<R>> {
        let table = self.read()?;
        let total = table.matching(predicate).count() as u64;
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.size).unwrap_or(usize::MAX);
        let records = table
            .matching(predicate)
            .skip(skip)
            .take(take)
            .cloned()
            .collect();
        Ok(PageResult::new(records, total, *page))
    }

    async fn select_list(&self, predicate: &Predicate) -> StoreResult<Vec<R>> {
        Ok(self.read()?.matching(predicate).cloned().collect())
    }
}
