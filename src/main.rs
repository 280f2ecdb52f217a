//! alertrelay
//!
//! Run with: cargo run
//!
//! Reads its settings from the environment (a `.env` file in the working
//! directory is merged first):
//! - Zabbix_URL, Zabbix_API_Token: monitoring backend
//! - Webex_Api_Token, Webex_Room_Id: chat backend and general room
//! - Database_Ip, Database_Port, Database_Name, Database_Username, Database_Password
//! - <SITE>_Room_Id, ZabbixURL_<SITE>: per-site room and dashboard (optional)
//! - ADMIN_Room_Id, CPOC_Room_Id, ZabbixURL_ADMIN, ZabbixURL_CPOC (optional)
//! - ALERTRELAY_POLL_INTERVAL_SECS: keep running and poll at this interval
//!   instead of exiting after one pass (optional)
//! - RUST_LOG: Log level (default: alertrelay=info)

use alertrelay::alerts::{Category, Relay, Router};
use alertrelay::config::Config;
use alertrelay::monitor::ZabbixClient;
use alertrelay::notify::WebexClient;
use alertrelay::storage::PgAlertStore;
use tokio::time::{interval, MissedTickBehavior};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alertrelay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration and credential problems are fatal before any category runs
    let config = Config::from_env()?;

    tracing::info!("alertrelay {} configuration:", env!("CARGO_PKG_VERSION"));
    tracing::info!("  Monitoring API: {}", config.zabbix.url);
    tracing::info!("  Chat API: {}", config.webex.url);
    tracing::info!(
        "  Database: {}@{}:{}/{}",
        config.database.user,
        config.database.host,
        config.database.port,
        config.database.name
    );
    tracing::info!(
        "  Severity: {}, site group: {}, CPOC group: {}",
        config.query.severity,
        config.query.site_group_id,
        config.query.cpoc_group_id
    );
    tracing::info!("  Site rooms: {}", config.routing.site_rooms.len());
    match config.poll_interval {
        Some(every) => tracing::info!("  Mode: poll every {} seconds", every.as_secs()),
        None => tracing::info!("  Mode: single pass"),
    }

    let zabbix = ZabbixClient::connect(&config.zabbix).await?;
    zabbix.check_authentication().await?;

    let webex = WebexClient::new(&config.webex)?;
    let store = PgAlertStore::connect(&config.database).await?;

    let relay = Relay::new(
        zabbix,
        store,
        webex,
        Router::new(&config.routing),
        config.query.clone(),
    );

    let Some(every) = config.poll_interval else {
        let summary = relay.run().await;
        if summary.is_success() {
            return Ok(());
        }
        return Err(format!(
            "{} of {} categories failed",
            summary.failed(),
            Category::ALL.len()
        )
        .into());
    };

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = relay.run().await;
                if !summary.is_success() {
                    tracing::warn!(failed = summary.failed(), "Run finished with failures");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Relay shutting down");
                break;
            }
        }
    }

    relay.store().pool().close().await;
    Ok(())
}
