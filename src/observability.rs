use std::net::SocketAddr;

use crate::engine::ErrorKind;

// ── Engine outcomes ─────────────────────────────────────────────

/// Counter: bookings accepted.
pub const BOOKINGS_CREATED_TOTAL: &str = "innkeep_bookings_created_total";

/// Counter: booking attempts rejected because the room was taken. Labels: source.
pub const BOOKING_CONFLICTS_TOTAL: &str = "innkeep_booking_conflicts_total";

/// Counter: bookings moved to cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "innkeep_bookings_cancelled_total";

/// Counter: admin payment status writes. Labels: status.
pub const PAYMENT_UPDATES_TOTAL: &str = "innkeep_payment_updates_total";

/// Counter: reviews accepted.
pub const REVIEWS_CREATED_TOTAL: &str = "innkeep_reviews_created_total";

/// Counter: reviews filed by someone other than the booking owner.
pub const REVIEWS_ON_BEHALF_TOTAL: &str = "innkeep_reviews_on_behalf_total";

/// Counter: failed operations. Labels: kind.
pub const ERRORS_TOTAL: &str = "innkeep_errors_total";

// ── Persistence ─────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "innkeep_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for an error kind.
pub fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "not_found",
        ErrorKind::Validation => "validation",
        ErrorKind::Conflict => "conflict",
        ErrorKind::Permission => "permission",
        ErrorKind::State => "state",
        ErrorKind::Storage => "storage",
    }
}

/// Count a failed engine operation by kind.
pub fn record_error(kind: ErrorKind) {
    metrics::counter!(ERRORS_TOTAL, "kind" => kind_label(kind)).increment(1);
}
