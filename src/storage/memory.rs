//! In-process snapshot store
//!
//! Same transaction semantics as the Postgres store: each transaction works on
//! a private copy of its table, commit publishes it, rollback discards it.
//! Failures can be injected at any step.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AlertStore, AlertTable, StoreError};
use crate::alerts::{AlertRecord, Category};

/// Step at which an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    OpenIds,
    Get,
    Insert,
    Delete,
    Commit,
}

/// Committed mutation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    pub inserts: usize,
    pub deletes: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    category: Category,
    point: FailPoint,
    /// Calls that still succeed before the failure fires
    skip: usize,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<Category, BTreeMap<i64, AlertRecord>>,
    failure: Option<Failure>,
    stats: MutationStats,
}

impl Inner {
    fn check(&mut self, category: Category, point: FailPoint) -> Result<(), StoreError> {
        match &mut self.failure {
            Some(f) if f.category == category && f.point == point => {
                if f.skip > 0 {
                    f.skip -= 1;
                    return Ok(());
                }
                Err(StoreError::Unavailable(format!(
                    "injected {:?} failure on {}",
                    point,
                    category.table()
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with committed rows
    pub fn with_records(records: impl IntoIterator<Item = AlertRecord>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            for record in records {
                inner
                    .tables
                    .entry(record.category)
                    .or_default()
                    .insert(record.id, record);
            }
        }
        store
    }

    /// Committed rows of a category, in id order
    pub fn records(&self, category: Category) -> Vec<AlertRecord> {
        let inner = self.inner.lock();
        inner
            .tables
            .get(&category)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn ids(&self, category: Category) -> BTreeSet<i64> {
        let inner = self.inner.lock();
        inner
            .tables
            .get(&category)
            .map(|t| t.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Make the given step fail for `category` until cleared with `None`
    pub fn fail_at(&self, failure: Option<(Category, FailPoint)>) {
        self.inner.lock().failure = failure.map(|(category, point)| Failure {
            category,
            point,
            skip: 0,
        });
    }

    /// Let `skip` calls of the step succeed, then fail every later one
    pub fn fail_after(&self, category: Category, point: FailPoint, skip: usize) {
        self.inner.lock().failure = Some(Failure {
            category,
            point,
            skip,
        });
    }

    pub fn stats(&self) -> MutationStats {
        self.inner.lock().stats
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    type Table = MemoryTable;

    async fn begin(&self, category: Category) -> Result<MemoryTable, StoreError> {
        let mut inner = self.inner.lock();
        inner.check(category, FailPoint::Begin)?;
        let working = inner.tables.get(&category).cloned().unwrap_or_default();
        Ok(MemoryTable {
            category,
            inner: Arc::clone(&self.inner),
            working,
            inserts: 0,
            deletes: 0,
            finished: false,
        })
    }
}

/// Private working copy of one category table
pub struct MemoryTable {
    category: Category,
    inner: Arc<Mutex<Inner>>,
    working: BTreeMap<i64, AlertRecord>,
    inserts: usize,
    deletes: usize,
    finished: bool,
}

impl MemoryTable {
    fn step(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Finished);
        }
        self.inner.lock().check(self.category, point)
    }
}

#[async_trait]
impl AlertTable for MemoryTable {
    fn category(&self) -> Category {
        self.category
    }

    async fn open_ids(&mut self) -> Result<BTreeSet<i64>, StoreError> {
        self.step(FailPoint::OpenIds)?;
        Ok(self.working.keys().copied().collect())
    }

    async fn get(&mut self, id: i64) -> Result<Option<AlertRecord>, StoreError> {
        self.step(FailPoint::Get)?;
        Ok(self.working.get(&id).cloned())
    }

    async fn insert(&mut self, record: &AlertRecord) -> Result<(), StoreError> {
        self.step(FailPoint::Insert)?;
        if record.category != self.category {
            return Err(StoreError::WrongCategory {
                table: self.category.table(),
                record: record.category,
            });
        }
        if self.working.contains_key(&record.id) {
            return Err(StoreError::Duplicate {
                table: self.category.table(),
                id: record.id,
            });
        }
        self.working.insert(record.id, record.clone());
        self.inserts += 1;
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> Result<(), StoreError> {
        self.step(FailPoint::Delete)?;
        if self.working.remove(&id).is_some() {
            self.deletes += 1;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.step(FailPoint::Commit).map_err(|e| {
            // A failed commit ends the transaction, like a server-side abort
            self.finished = true;
            e
        })?;
        self.finished = true;

        let mut inner = self.inner.lock();
        inner
            .tables
            .insert(self.category, std::mem::take(&mut self.working));
        inner.stats.inserts += self.inserts;
        inner.stats.deletes += self.deletes;
        inner.stats.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Finished);
        }
        self.finished = true;
        self.working.clear();
        self.inner.lock().stats.rollbacks += 1;
        Ok(())
    }
}
