//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Account balance in quote currency
    Balance,
    /// Realized PnL since the start of the trading day
    DailyPnl,
    /// Open position count
    OpenPositions,
    /// Symbols currently on the hotlist
    HotlistSize,
    /// Pending 5m confirmations
    PendingConfirmations,
    /// Circuit breaker state as an ordinal
    BreakerState,
    /// Live stream subscriptions
    Subscriptions,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    TradesOpened,
    TradesClosed,
    /// Candidates rejected by the entry gate
    GateRejections,
    /// Feed reconnections
    FeedReconnects,
    /// Malformed inbound messages discarded
    MalformedMessages,
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::Balance => "hotlist_balance_usd",
        GaugeMetric::DailyPnl => "hotlist_daily_pnl_usd",
        GaugeMetric::OpenPositions => "hotlist_open_positions",
        GaugeMetric::HotlistSize => "hotlist_hotlist_size",
        GaugeMetric::PendingConfirmations => "hotlist_pending_confirmations",
        GaugeMetric::BreakerState => "hotlist_circuit_breaker_state",
        GaugeMetric::Subscriptions => "hotlist_stream_subscriptions",
    }
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::TradesOpened => "hotlist_trades_opened_total",
        CounterMetric::TradesClosed => "hotlist_trades_closed_total",
        CounterMetric::GateRejections => "hotlist_gate_rejections_total",
        CounterMetric::FeedReconnects => "hotlist_feed_reconnects_total",
        CounterMetric::MalformedMessages => "hotlist_malformed_messages_total",
    }
}

/// Start the Prometheus HTTP exporter on the given port
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;
    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    metrics::counter!(counter_name(metric)).increment(1);
}
