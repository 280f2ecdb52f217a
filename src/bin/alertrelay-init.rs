//! One-time setup for alertrelay
//!
//! Creates the snapshot tables and seeds them with the alerts that are open
//! right now, without sending any message. Run it once before the first relay
//! run so already-open alerts are not announced as new. Re-running is safe:
//! existing tables and rows are left as they are.

use alertrelay::alerts::{Category, Fetcher};
use alertrelay::config::Config;
use alertrelay::monitor::ZabbixClient;
use alertrelay::storage::PgAlertStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alertrelay=info,alertrelay_init=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let zabbix = ZabbixClient::connect(&config.zabbix).await?;
    zabbix.check_authentication().await?;

    let store = PgAlertStore::connect(&config.database).await?;
    store.ensure_schema().await?;

    let fetcher = Fetcher::new(&zabbix, &config.query);
    for category in Category::ALL {
        let records = fetcher.fetch(category).await?;
        let added = store.seed(category, &records).await?;
        tracing::info!(
            table = category.table(),
            open = records.len(),
            added,
            "Seeded snapshot table"
        );
    }

    store.pool().close().await;
    tracing::info!("Database initialized");
    Ok(())
}
