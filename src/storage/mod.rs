//! Durable snapshot of alerts that are open and already announced
//!
//! One table per category. A row exists exactly while its alert is open and
//! has been notified. All mutations of a category run go through one
//! [`AlertTable`] transaction that is committed or rolled back as a whole.

pub mod memory;
pub mod postgres;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::alerts::{AlertRecord, Category};

pub use memory::MemoryStore;
pub use postgres::PgAlertStore;

/// Opens per-category transactions
#[async_trait]
pub trait AlertStore: Send + Sync {
    type Table: AlertTable;

    async fn begin(&self, category: Category) -> Result<Self::Table, StoreError>;
}

/// One category's table inside an open transaction
#[async_trait]
pub trait AlertTable: Send {
    fn category(&self) -> Category;

    /// Ids of every stored alert
    async fn open_ids(&mut self) -> Result<BTreeSet<i64>, StoreError>;

    /// Stored row for `id`
    async fn get(&mut self, id: i64) -> Result<Option<AlertRecord>, StoreError>;

    async fn insert(&mut self, record: &AlertRecord) -> Result<(), StoreError>;

    async fn delete(&mut self, id: i64) -> Result<(), StoreError>;

    /// Publish every mutation made through this table
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard every mutation made through this table
    async fn rollback(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Alert {id} already stored in {table}")]
    Duplicate { table: &'static str, id: i64 },

    #[error("Record for category {record} written to {table}")]
    WrongCategory { table: &'static str, record: Category },

    #[error("Transaction already finished")]
    Finished,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
