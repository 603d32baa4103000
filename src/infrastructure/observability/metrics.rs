//! Prometheus metrics definitions for the trading backend.
//!
//! All metrics use the `mt5backend_` prefix and are read-only from the
//! application's perspective — mutated in-line as ingress, decision and
//! worker-supervisor code runs.

use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
};
use std::sync::Arc;

/// Prometheus metrics for the trading backend
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Accounts currently considered connected (heartbeat within the watchdog window).
    pub connected_accounts: GenericGauge<AtomicF64>,
    /// Ticks ingested, per symbol.
    pub ticks_ingested_total: CounterVec,
    /// Candles persisted, per symbol and timeframe.
    pub candles_persisted_total: CounterVec,
    /// Commands by type and terminal status.
    pub commands_total: CounterVec,
    /// Commands currently pending delivery.
    pub commands_pending: GenericGauge<AtomicF64>,
    /// Decision pipeline outcomes by reason code.
    pub decisions_total: CounterVec,
    /// Trades opened/closed, by symbol and side.
    pub trades_total: CounterVec,
    /// Open trades, per account.
    pub open_trades: GenericGaugeVec<AtomicF64>,
    /// Circuit breaker status per account (0=normal, 1=tripped).
    pub circuit_breaker_status: GenericGaugeVec<AtomicF64>,
    /// Worker health (1=healthy, 0=degraded), per worker name.
    pub worker_health: GenericGaugeVec<AtomicF64>,
    /// HTTP request latency in seconds, per port label and route.
    pub http_latency_seconds: HistogramVec,
    /// Uptime in seconds.
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let connected_accounts = Gauge::with_opts(Opts::new(
            "mt5backend_connected_accounts",
            "Accounts currently considered connected",
        ))?;
        registry.register(Box::new(connected_accounts.clone()))?;

        let ticks_ingested_total = CounterVec::new(
            Opts::new("mt5backend_ticks_ingested_total", "Ticks ingested by symbol"),
            &["symbol"],
        )?;
        registry.register(Box::new(ticks_ingested_total.clone()))?;

        let candles_persisted_total = CounterVec::new(
            Opts::new(
                "mt5backend_candles_persisted_total",
                "OHLC candles persisted by symbol and timeframe",
            ),
            &["symbol", "timeframe"],
        )?;
        registry.register(Box::new(candles_persisted_total.clone()))?;

        let commands_total = CounterVec::new(
            Opts::new("mt5backend_commands_total", "Commands by type and terminal status"),
            &["command_type", "status"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let commands_pending = Gauge::with_opts(Opts::new(
            "mt5backend_commands_pending",
            "Commands currently pending delivery",
        ))?;
        registry.register(Box::new(commands_pending.clone()))?;

        let decisions_total = CounterVec::new(
            Opts::new(
                "mt5backend_decisions_total",
                "Decision pipeline outcomes by reason code",
            ),
            &["outcome", "reason"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let trades_total = CounterVec::new(
            Opts::new("mt5backend_trades_total", "Trades opened/closed by symbol and direction"),
            &["symbol", "direction", "event"],
        )?;
        registry.register(Box::new(trades_total.clone()))?;

        let open_trades = GaugeVec::new(
            Opts::new("mt5backend_open_trades", "Open trades per account"),
            &["account_number"],
        )?;
        registry.register(Box::new(open_trades.clone()))?;

        let circuit_breaker_status = GaugeVec::new(
            Opts::new(
                "mt5backend_circuit_breaker_status",
                "Circuit breaker status per account (0=normal, 1=tripped)",
            ),
            &["account_number"],
        )?;
        registry.register(Box::new(circuit_breaker_status.clone()))?;

        let worker_health = GaugeVec::new(
            Opts::new("mt5backend_worker_health", "Worker health (1=healthy, 0=degraded)"),
            &["worker"],
        )?;
        registry.register(Box::new(worker_health.clone()))?;

        let http_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mt5backend_http_latency_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["port", "route"],
        )?;
        registry.register(Box::new(http_latency_seconds.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "mt5backend_uptime_seconds",
            "Server uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_accounts,
            ticks_ingested_total,
            candles_persisted_total,
            commands_total,
            commands_pending,
            decisions_total,
            trades_total,
            open_trades,
            circuit_breaker_status,
            worker_health,
            http_latency_seconds,
            uptime_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    pub fn inc_tick(&self, symbol: &str) {
        self.ticks_ingested_total.with_label_values(&[symbol]).inc();
    }

    pub fn inc_candles(&self, symbol: &str, timeframe: &str, n: usize) {
        self.candles_persisted_total
            .with_label_values(&[symbol, timeframe])
            .inc_by(n as f64);
    }

    pub fn inc_command(&self, command_type: &str, status: &str) {
        self.commands_total.with_label_values(&[command_type, status]).inc();
    }

    pub fn inc_decision(&self, outcome: &str, reason: &str) {
        self.decisions_total.with_label_values(&[outcome, reason]).inc();
    }

    pub fn inc_trade(&self, symbol: &str, direction: &str, event: &str) {
        self.trades_total.with_label_values(&[symbol, direction, event]).inc();
    }

    pub fn set_worker_health(&self, worker: &str, healthy: bool) {
        self.worker_health
            .with_label_values(&[worker])
            .set(if healthy { 1.0 } else { 0.0 });
    }

    pub fn set_circuit_breaker(&self, account_number: i64, tripped: bool) {
        self.circuit_breaker_status
            .with_label_values(&[&account_number.to_string()])
            .set(if tripped { 1.0 } else { 0.0 });
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create default Metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        assert!(metrics.render().contains("mt5backend_"));
    }

    #[test]
    fn test_decision_counter_labels() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_decision("rejected", "CIRCUIT_BREAKER");
        metrics.inc_decision("approved", "CONDITIONS_MET");
        let output = metrics.render();
        assert!(output.contains("mt5backend_decisions_total"));
        assert!(output.contains("CIRCUIT_BREAKER"));
    }

    #[test]
    fn test_trade_counter() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_trade("EURUSD", "buy", "opened");
        let output = metrics.render();
        assert!(output.contains("mt5backend_trades_total"));
        assert!(output.contains("EURUSD"));
    }
}
