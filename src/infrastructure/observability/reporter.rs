//! Push-based metrics reporter.
//!
//! Periodically outputs a structured JSON snapshot to stdout. No HTTP
//! server, no incoming connections — only outbound data, same posture as
//! the Prometheus registry in [`super::metrics`].

use crate::domain::ports::{AccountRepository, CommandRepository, TradeRepository};
use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub connected_accounts: usize,
    pub open_trades: usize,
    pub commands_pending: usize,
}

/// Push-based metrics reporter.
pub struct MetricsReporter {
    accounts: Arc<dyn AccountRepository>,
    trades: Arc<dyn TradeRepository>,
    commands: Arc<dyn CommandRepository>,
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        trades: Arc<dyn TradeRepository>,
        commands: Arc<dyn CommandRepository>,
        metrics: Metrics,
        interval_seconds: u64,
    ) -> Self {
        Self {
            accounts,
            trades,
            commands,
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    /// Run the reporter in a loop, outputting metrics periodically. Intended
    /// to run as one of the supervised workers (§4.14).
    pub async fn run(self) {
        info!("MetricsReporter: starting push-based metrics (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.collect_snapshot().await {
                Ok(snapshot) => match serde_json::to_string(&snapshot) {
                    Ok(json) => {
                        println!("METRICS_JSON:{}", json);
                        info!(
                            "connected_accounts={} open_trades={} commands_pending={} uptime={}s",
                            snapshot.connected_accounts,
                            snapshot.open_trades,
                            snapshot.commands_pending,
                            snapshot.uptime_seconds
                        );
                    }
                    Err(e) => warn!("failed to serialize metrics: {}", e),
                },
                Err(e) => warn!("failed to collect metrics: {}", e),
            }
        }
    }

    async fn collect_snapshot(&self) -> anyhow::Result<MetricsSnapshot> {
        let uptime = self.start_time.elapsed().as_secs();
        let now = chrono::Utc::now();

        // best-effort: a transient DB error here shouldn't take the reporter
        // down, just report zero for this tick.
        let connected = self
            .accounts
            .count_connected(now, chrono::Duration::seconds(120))
            .await
            .unwrap_or(0);
        let open_trades = self.trades.count_all_open().await.unwrap_or(0);
        let pending = self.commands.count_pending().await.unwrap_or(0);

        self.metrics.uptime_seconds.set(uptime as f64);
        self.metrics.commands_pending.set(pending as f64);
        self.metrics.connected_accounts.set(connected as f64);

        Ok(MetricsSnapshot {
            timestamp: now.to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            connected_accounts: connected,
            open_trades,
            commands_pending: pending,
        })
    }
}
