//! Trade flow reporter service.
//!
//! Wires the feed connection, stall watchdog, report schedule, heartbeat
//! and health endpoint together and runs them until shutdown.

mod health;

use std::{error::Error, sync::Arc};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tradeflow_data::{
    Config, EmailNotifier, FeedConfig, FeedConnection, FeedHealth, Notifier, RemoteStore,
    ReportSchedule, ReportSource, TradeBuffer, TradeSink, TradeSource,
    feed::watchdog::run_stall_watchdog,
    schedule::{run_heartbeat, run_report_loop},
};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    init_logging();

    info!("starting tradeflow reporter");

    // Misconfiguration is the only thing allowed to kill the process, and
    // only here, before any run loop starts.
    let config = Config::from_env()?;
    let notifier: Arc<dyn Notifier> = Arc::new(EmailNotifier::new(&config.smtp)?);

    let buffer = Arc::new(TradeBuffer::new(config.retention));
    let store = match &config.db_path {
        Some(path) => Some(Arc::new(RemoteStore::open(path, config.symbol.clone())?)),
        None => None,
    };

    let health = Arc::new(FeedHealth::new());
    let (reconnect_tx, reconnect_rx) = mpsc::channel(1);

    let sink = TradeSink::new(Arc::clone(&buffer), store.clone(), Arc::clone(&health));
    let feed_config = FeedConfig::new(config.ws_url.clone(), config.symbol.clone())
        .with_reconnect_delay(config.reconnect_delay)
        .with_ping_interval(config.ping_interval);
    let feed = FeedConnection::new(feed_config, sink, Arc::clone(&health), reconnect_rx);

    let source: Arc<dyn TradeSource> = match (config.report_source, &store) {
        (ReportSource::Store, Some(store)) => Arc::clone(store) as Arc<dyn TradeSource>,
        _ => Arc::clone(&buffer) as Arc<dyn TradeSource>,
    };
    let schedule = ReportSchedule::new(config.report_times.clone(), config.timezone);

    tokio::spawn(feed.run());
    tokio::spawn(run_stall_watchdog(
        Arc::clone(&health),
        reconnect_tx,
        config.watchdog_tick,
        config.stall_threshold,
    ));
    tokio::spawn(run_report_loop(
        schedule,
        source,
        notifier,
        config.symbol.clone(),
    ));
    tokio::spawn(run_heartbeat(config.heartbeat_tick));
    tokio::spawn(health::serve(config.health_port));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping");
    Ok(())
}
