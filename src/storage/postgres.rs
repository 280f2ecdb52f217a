//! Postgres-backed snapshot tables

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::{AlertStore, AlertTable, StoreError};
use crate::alerts::{AlertRecord, Category};
use crate::config::DatabaseConfig;

/// Snapshot store on a single pooled connection
#[derive(Clone)]
pub struct PgAlertStore {
    pool: PgPool,
}

impl PgAlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with the configured parameters. One connection is enough, the
    /// relay never touches the database concurrently.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the three snapshot tables if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for category in Category::ALL {
            let site_column = if category.has_site() {
                "site VARCHAR(50) NOT NULL,"
            } else {
                ""
            };
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    eventid INTEGER PRIMARY KEY,
                    name VARCHAR(250) NOT NULL,
                    clock VARCHAR(50) NOT NULL,
                    {site_column}
                    hostname VARCHAR(250) NOT NULL
                )
                "#,
                table = category.table(),
                site_column = site_column,
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
            tracing::info!(table = category.table(), "Snapshot table ready");
        }
        Ok(())
    }

    /// Insert records that are not stored yet, leaving existing rows alone.
    /// Returns how many rows were added.
    pub async fn seed(&self, category: Category, records: &[AlertRecord]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0;
        for record in records {
            check_category(category, record)?;
            let sql = format!("{} ON CONFLICT (eventid) DO NOTHING", insert_sql(category));
            added += bind_record(sqlx::query(&sql), record)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(added)
    }
}

#[async_trait]
impl AlertStore for PgAlertStore {
    type Table = PgAlertTable;

    async fn begin(&self, category: Category) -> Result<PgAlertTable, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgAlertTable {
            category,
            tx: Some(tx),
        })
    }
}

/// A category table inside an open Postgres transaction. Dropping it without
/// committing rolls the transaction back.
pub struct PgAlertTable {
    category: Category,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgAlertTable {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::Finished)
    }
}

#[async_trait]
impl AlertTable for PgAlertTable {
    fn category(&self) -> Category {
        self.category
    }

    async fn open_ids(&mut self) -> Result<BTreeSet<i64>, StoreError> {
        // The deployed schema uses INTEGER ids, widen on read
        let sql = format!("SELECT eventid::BIGINT FROM {}", self.category.table());
        let ids: Vec<i64> = sqlx::query_scalar(&sql)
            .fetch_all(&mut **self.tx()?)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn get(&mut self, id: i64) -> Result<Option<AlertRecord>, StoreError> {
        let category = self.category;
        let site = if category.has_site() { "site, " } else { "" };
        let sql = format!(
            "SELECT eventid::BIGINT AS eventid, name, clock, {}hostname FROM {} WHERE eventid = $1",
            site,
            category.table()
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut **self.tx()?)
            .await?;

        row.map(|row| -> Result<AlertRecord, StoreError> {
            Ok(AlertRecord {
                id: row.try_get("eventid")?,
                name: row.try_get("name")?,
                clock: row.try_get("clock")?,
                category,
                site: if category.has_site() {
                    Some(row.try_get("site")?)
                } else {
                    None
                },
                hostname: row.try_get("hostname")?,
            })
        })
        .transpose()
    }

    async fn insert(&mut self, record: &AlertRecord) -> Result<(), StoreError> {
        let category = self.category;
        check_category(category, record)?;
        let sql = insert_sql(category);
        bind_record(sqlx::query(&sql), record)
            .execute(&mut **self.tx()?)
            .await?;
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE eventid = $1", self.category.table());
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut **self.tx()?)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::Finished)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::Finished)?;
        tx.rollback().await?;
        Ok(())
    }
}

fn insert_sql(category: Category) -> String {
    if category.has_site() {
        format!(
            "INSERT INTO {} (eventid, name, clock, site, hostname) VALUES ($1, $2, $3, $4, $5)",
            category.table()
        )
    } else {
        format!(
            "INSERT INTO {} (eventid, name, clock, hostname) VALUES ($1, $2, $3, $4)",
            category.table()
        )
    }
}

fn bind_record<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    record: &'q AlertRecord,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    let query = query
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.clock);
    let query = if record.category.has_site() {
        query.bind(record.site_or_unknown())
    } else {
        query
    };
    query.bind(&record.hostname)
}

fn check_category(category: Category, record: &AlertRecord) -> Result<(), StoreError> {
    if record.category != category {
        return Err(StoreError::WrongCategory {
            table: category.table(),
            record: record.category,
        });
    }
    Ok(())
}
