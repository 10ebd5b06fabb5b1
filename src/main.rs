mod aggregator;
mod api;
mod config;
mod converter;
mod db;
mod fetcher;
mod models;
mod registry;

use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::aggregator::Aggregator;
use crate::api::AppState;
use crate::fetcher::BlockchairClient;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // RUST_LOG overrides, e.g. RUST_LOG=portfolio_tracker=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Portfolio tracker starting...");

    let cfg = config::load()?;
    info!("  Provider: {}", cfg.blockchair_url);
    info!("  API key: {}", if cfg.blockchair_api_key.is_some() { "set" } else { "none" });
    info!("  DB Path: {}", cfg.db_path);
    info!("  Port: {}", cfg.port);
    info!("  Lookup timeout: {:?}", cfg.lookup_timeout);
    info!("  Concurrent lookups: {}", cfg.max_concurrent_lookups);

    // Run DB migrations once at startup
    let conn = db::connect(&cfg.db_path)?;
    db::run_migrations(&conn)?;
    let shared_conn = Arc::new(Mutex::new(conn));

    let provider = BlockchairClient::new(
        &cfg.blockchair_url,
        cfg.blockchair_api_key.clone(),
        cfg.lookup_timeout,
    )?;
    let aggregator = Aggregator::new(
        Arc::new(provider),
        cfg.lookup_timeout,
        cfg.max_concurrent_lookups,
    );

    let state = AppState {
        conn: shared_conn,
        aggregator,
    };

    let api_handle = tokio::spawn({
        let cfg = cfg.clone();
        async move { api::serve(cfg, state).await }
    });

    // Graceful shutdown
    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Portfolio tracker stopped.");
    Ok(())
}
