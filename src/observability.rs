use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total statements executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "resbook_queries_total";

/// Histogram: statement latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "resbook_query_duration_seconds";

/// Counter: booking creates rejected for overlapping a confirmed booking.
pub const BOOKING_CONFLICTS_TOTAL: &str = "resbook_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "resbook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "resbook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "resbook_connections_rejected_total";

/// Counter: store calls abandoned after the configured timeout.
pub const STORE_TIMEOUTS_TOTAL: &str = "resbook_store_timeouts_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "resbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (ops per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "resbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::SelectResources { .. } => "select_resources",
        Command::InsertResource(_) => "insert_resource",
        Command::UpdateResource { .. } => "update_resource",
        Command::DeleteResource { .. } => "delete_resource",
        Command::SelectBookings(_) => "select_bookings",
        Command::InsertBooking(_) => "insert_booking",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::SelectUtilization => "select_utilization",
    }
}
