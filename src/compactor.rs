use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::store::MemoryStore;

/// Run one compaction if at least `threshold` appends have accumulated.
/// Returns whether it compacted.
pub async fn compact_if_due(store: &MemoryStore, threshold: u64) -> bool {
    if !store.is_durable() {
        return false;
    }
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    debug!("compacting WAL after {appends} appends");
    match store.compact().await {
        Ok(()) => true,
        Err(e) => {
            error!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that compacts the store's WAL every `every` once the
/// append count passes `threshold`.
pub async fn run_compactor(store: Arc<MemoryStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick fires immediately; nothing has been appended yet.
    interval.tick().await;
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}
