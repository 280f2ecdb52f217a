//! alertrelay: monitoring alerts to chat rooms
//!
//! Polls the monitoring backend for open high-severity problems, diffs them
//! against a durable snapshot of alerts that were already announced, and
//! posts a chat message for every alert that was raised or cleared since the
//! last run.
//!
//! # Flow
//!
//! For each category (hypervisor hosts, sites, operational center):
//!
//! - **Fetch** the open problems and flatten their tags into [`AlertRecord`]s
//! - **Diff** the fetched ids against the stored ids
//! - **Raise**: insert the row, then send the routed message
//! - **Clear**: read the stored row, send the resolution, then delete it
//! - **Commit** the category's rows in one transaction
//!
//! Rows are transactional, messages are not. A failure rolls the category's
//! rows back while messages already sent stay sent, so the next run announces
//! them again (at-least-once delivery).
//!
//! # Example
//!
//! ```no_run
//! use alertrelay::alerts::{Relay, Router};
//! use alertrelay::config::Config;
//! use alertrelay::monitor::ZabbixClient;
//! use alertrelay::notify::WebexClient;
//! use alertrelay::storage::PgAlertStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let relay = Relay::new(
//!     ZabbixClient::connect(&config.zabbix).await?,
//!     PgAlertStore::connect(&config.database).await?,
//!     WebexClient::new(&config.webex)?,
//!     Router::new(&config.routing),
//!     config.query.clone(),
//! );
//! let summary = relay.run().await;
//! println!("{} categories failed", summary.failed());
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod config;
pub mod monitor;
pub mod notify;
pub mod storage;

// Re-export commonly used types
pub use alerts::{AlertRecord, Category, Relay, RelayError, RunSummary};
pub use config::{Config, ConfigError};
