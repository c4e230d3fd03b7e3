//! Hosts the durable store and its background compactor. There is no
//! transport here: `Engine` is used as a library by the embedding service.

use std::sync::Arc;

use tracing::info;

use innkeep::compactor;
use innkeep::config::{Config, RateSource};
use innkeep::engine::Engine;
use innkeep::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    innkeep::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let wal_path = config.data_dir.join("innkeep.wal");
    let store = Arc::new(MemoryStore::open(&wal_path)?);
    let engine = Engine::with_store(store.clone(), config.engine.clone());

    info!("innkeep started");
    info!("  wal: {}", wal_path.display());
    info!(
        "  rooms: {}, bookings: {}, reviews: {}",
        store.room_count(),
        store.booking_count(),
        store.review_count()
    );
    info!("  date format: {}", engine.config().date_format);
    info!(
        "  rates: {}",
        match engine.config().rate_source {
            RateSource::Catalog => "room catalog".to_string(),
            RateSource::Flat(cents) => format!("flat {cents}"),
        }
    );
    info!(
        "  compaction: every {:?} past {} appends",
        config.compact_interval, config.compact_threshold
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let compactor_store = store.clone();
    let (threshold, every) = (config.compact_threshold, config.compact_interval);
    tokio::spawn(async move {
        compactor::run_compactor(compactor_store, threshold, every).await;
    });

    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    info!("shutdown signal received, compacting WAL");
    if let Err(e) = store.compact().await {
        tracing::error!("final compaction failed: {e}");
    }
    info!("innkeep stopped");
    Ok(())
}
