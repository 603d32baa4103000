//! Tick batch writer (§4.4). Accumulates ticks from `/api/ticks` into an
//! in-memory buffer keyed by `(symbol, timestamp)` — the key itself is the
//! dedupe — and flushes periodically in batched inserts.

use crate::domain::ports::TickRepository;
use crate::domain::types::Tick;
use crate::infrastructure::observability::metrics::Metrics;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TickWriter {
    repo: Arc<dyn TickRepository>,
    buffer: Mutex<HashMap<(String, DateTime<Utc>), Tick>>,
    metrics: Metrics,
}

impl TickWriter {
    pub fn new(repo: Arc<dyn TickRepository>, metrics: Metrics) -> Self {
        Self { repo, buffer: Mutex::new(HashMap::new()), metrics }
    }

    /// Called synchronously from the `/api/ticks` handler — never touches
    /// the database on the request path.
    pub fn ingest(&self, ticks: Vec<Tick>) {
        let mut buffer = self.buffer.lock().unwrap();
        for tick in ticks {
            buffer.insert((tick.symbol.clone(), tick.timestamp), tick);
        }
    }

    pub async fn run(self: Arc<Self>, flush_interval: Duration) {
        info!("TickWriter: flushing every {:?}", flush_interval);
        loop {
            tokio::time::sleep(flush_interval).await;
            if let Err(e) = self.flush().await {
                warn!("tick flush failed: {}", e);
            }
        }
    }

    /// Also called directly by graceful shutdown to drain the buffer one
    /// last time before the process exits.
    pub async fn flush(&self) -> anyhow::Result<()> {
        let drained: Vec<Tick> = {
            let mut buffer = self.buffer.lock().unwrap();
            if buffer.is_empty() {
                return Ok(());
            }
            buffer.drain().map(|(_, t)| t).collect()
        };

        let mut per_symbol: HashMap<String, usize> = HashMap::new();
        for tick in &drained {
            *per_symbol.entry(tick.symbol.clone()).or_default() += 1;
        }

        self.repo.insert_batch(&drained).await?;

        for (symbol, count) in per_symbol {
            for _ in 0..count {
                self.metrics.inc_tick(&symbol);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRepo {
        inserted: AtomicUsize,
    }

    #[async_trait]
    impl TickRepository for CountingRepo {
        async fn insert_batch(&self, ticks: &[Tick]) -> anyhow::Result<usize> {
            self.inserted.fetch_add(ticks.len(), Ordering::SeqCst);
            Ok(ticks.len())
        }
        async fn latest(&self, _symbol: &str) -> anyhow::Result<Option<Tick>> {
            Ok(None)
        }
        async fn recent(&self, _symbol: &str, _since: DateTime<Utc>) -> anyhow::Result<Vec<Tick>> {
            Ok(vec![])
        }
        async fn delete_older_than(&self, _cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn duplicate_symbol_timestamp_collapses_to_one() {
        let repo = Arc::new(CountingRepo { inserted: AtomicUsize::new(0) });
        let writer = TickWriter::new(repo.clone(), Metrics::default());
        let ts = Utc::now();
        let tick = Tick::new("EURUSD".into(), dec!(1.1), dec!(1.1002), dec!(1), ts, true);
        writer.ingest(vec![tick.clone(), tick]);
        writer.flush().await.unwrap();
        assert_eq!(repo.inserted.load(Ordering::SeqCst), 1);
    }
}
