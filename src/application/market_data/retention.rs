//! Retention sweeper (§4.4). Runs daily: deletes ticks older than
//! `TICK_RETENTION_DAYS` and OHLC bars older than their timeframe-specific
//! horizon (§3 `Timeframe::retention_days`).

use crate::domain::ports::{CandleRepository, TickRepository};
use crate::domain::timeframe::Timeframe;
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

pub struct RetentionSweeper {
    ticks: Arc<dyn TickRepository>,
    candles: Arc<dyn CandleRepository>,
    tick_retention_days: i64,
}

impl RetentionSweeper {
    pub fn new(ticks: Arc<dyn TickRepository>, candles: Arc<dyn CandleRepository>, tick_retention_days: i64) -> Self {
        Self { ticks, candles, tick_retention_days }
    }

    pub async fn run(self: Arc<Self>, interval: StdDuration) {
        info!("RetentionSweeper: running every {:?}", interval);
        loop {
            if let Err(e) = self.sweep_once().await {
                warn!("retention sweep failed: {}", e);
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn sweep_once(&self) -> anyhow::Result<()> {
        let now = Utc::now();

        let tick_cutoff = now - Duration::days(self.tick_retention_days);
        let deleted_ticks = self.ticks.delete_older_than(tick_cutoff).await?;
        if deleted_ticks > 0 {
            info!("retention: deleted {} ticks older than {}", deleted_ticks, tick_cutoff);
        }

        for timeframe in Timeframe::all() {
            let cutoff = now - Duration::days(timeframe.retention_days());
            let deleted = self.candles.delete_older_than(timeframe, cutoff).await?;
            if deleted > 0 {
                info!("retention: deleted {} {} candles older than {}", deleted, timeframe, cutoff);
            }
        }

        Ok(())
    }
}
