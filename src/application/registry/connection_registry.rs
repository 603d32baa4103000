//! Connection registry & watchdog (§4.3). In-memory liveness map, one entry
//! per connected account, refreshed on every heartbeat and tick. The
//! watchdog sweep (driven by a supervisor worker every 60s) pauses
//! auto-trading on accounts that have gone quiet and resumes it when they
//! come back, grounded in the teacher's broadcast-on-change
//! `ConnectionHealthService`, generalized from two fixed components
//! (market data / execution) to one entry per account.

use crate::domain::ports::{AccountRepository, DecisionLogRepository, SymbolRepository, TickRepository};
use crate::domain::types::{AiDecisionLog, DecisionType, ImpactLevel};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub last_heartbeat_utc: Option<DateTime<Utc>>,
    pub last_tick_utc: Option<DateTime<Utc>>,
    pub avg_latency_ms: f64,
    pub health_score: f64,
    pub online: bool,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self {
            last_heartbeat_utc: None,
            last_tick_utc: None,
            avg_latency_ms: 0.0,
            health_score: 0.0,
            online: true,
        }
    }
}

const LATENCY_WINDOW: usize = 20;

struct Entry {
    snapshot: HealthSnapshot,
    latency_samples: Vec<f64>,
}

impl Default for Entry {
    fn default() -> Self {
        Self { snapshot: HealthSnapshot::default(), latency_samples: Vec::new() }
    }
}

fn health_score(heartbeat_age_secs: Option<i64>, avg_latency_ms: f64, hb_lost_secs: i64) -> f64 {
    let freshness = match heartbeat_age_secs {
        Some(age) => (1.0 - (age as f64 / hb_lost_secs as f64)).clamp(0.0, 1.0),
        None => 0.0,
    };
    // Latency above 2s is treated as fully degraded; below that, linear falloff.
    let latency_score = (1.0 - (avg_latency_ms / 2000.0)).clamp(0.0, 1.0);
    (freshness * 0.7 + latency_score * 0.3) * 100.0
}

/// Tracks per-account liveness and runs the 60s watchdog sweep.
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<i64, Entry>>,
    pub hb_lost_secs: i64,
    pub tick_stale_secs: i64,
}

impl ConnectionRegistry {
    pub fn new(hb_lost_secs: i64, tick_stale_secs: i64) -> Self {
        Self { entries: RwLock::new(HashMap::new()), hb_lost_secs, tick_stale_secs }
    }

    /// Called on every `/api/heartbeat`.
    pub async fn record_heartbeat(&self, account_number: i64, now: DateTime<Utc>, latency_ms: Option<f64>) {
        let mut map = self.entries.write().await;
        let entry = map.entry(account_number).or_default();
        entry.snapshot.last_heartbeat_utc = Some(now);
        if let Some(l) = latency_ms {
            entry.latency_samples.push(l);
            if entry.latency_samples.len() > LATENCY_WINDOW {
                entry.latency_samples.remove(0);
            }
            entry.snapshot.avg_latency_ms = entry.latency_samples.iter().sum::<f64>() / entry.latency_samples.len() as f64;
        }
        entry.snapshot.health_score = health_score(Some(0), entry.snapshot.avg_latency_ms, self.hb_lost_secs);
    }

    /// Called whenever a tick lands for a symbol this account subscribes to.
    pub async fn record_tick(&self, account_number: i64, now: DateTime<Utc>) {
        let mut map = self.entries.write().await;
        map.entry(account_number).or_default().snapshot.last_tick_utc = Some(now);
    }

    pub async fn snapshot(&self, account_number: i64) -> HealthSnapshot {
        self.entries.read().await.get(&account_number).map(|e| e.snapshot.clone()).unwrap_or_default()
    }

    /// §4.3 watchdog sweep: runs over every known account, trips/restores
    /// auto-trading, and emits `MT5_DISCONNECT`/`MT5_RECONNECT` decision-log
    /// entries on transition.
    pub async fn sweep(
        &self,
        accounts: &Arc<dyn AccountRepository>,
        symbols: &Arc<dyn SymbolRepository>,
        ticks: &Arc<dyn TickRepository>,
        decision_log: &Arc<dyn DecisionLogRepository>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let all = accounts.list_all().await?;
        for account in all {
            let hb_age = account.last_heartbeat.map(|hb| (now - hb).num_seconds());
            let hb_lost = hb_age.map(|a| a > self.hb_lost_secs).unwrap_or(true);

            let mut map = self.entries.write().await;
            let entry = map.entry(account.account_number).or_default();
            let was_online = entry.snapshot.online;
            entry.snapshot.health_score = health_score(hb_age, entry.snapshot.avg_latency_ms, self.hb_lost_secs);
            entry.snapshot.online = !hb_lost;
            let became_offline = was_online && hb_lost;
            let became_online = !was_online && !hb_lost;
            drop(map);

            if became_offline {
                accounts.set_auto_trading_enabled(account.account_number, false).await?;
                warn!(account_number = account.account_number, "watchdog: MT5 heartbeat lost, pausing auto-trading");
                let log = connection_event(&account.account_number.to_string(), "MT5_DISCONNECT", ImpactLevel::High, now);
                decision_log.append(&log).await?;
            } else if became_online {
                accounts.set_auto_trading_enabled(account.account_number, true).await?;
                info!(account_number = account.account_number, "watchdog: MT5 heartbeat restored, resuming auto-trading");
                let log = connection_event(&account.account_number.to_string(), "MT5_RECONNECT", ImpactLevel::Low, now);
                decision_log.append(&log).await?;
            }

            // Tick staleness is advisory only: alert, don't pause trading.
            let subscribed = symbols.subscribed_for_account(account.account_number).await?;
            let mut any_fresh = subscribed.is_empty();
            for sub in &subscribed {
                if let Some(tick) = ticks.latest(&sub.symbol).await? {
                    if (now - tick.timestamp) <= Duration::seconds(self.tick_stale_secs) {
                        any_fresh = true;
                        break;
                    }
                }
            }
            if !subscribed.is_empty() && !any_fresh {
                warn!(account_number = account.account_number, "watchdog: no fresh ticks for any subscribed symbol");
            }
        }
        Ok(())
    }
}

fn connection_event(symbol: &str, reason_code: &str, impact: ImpactLevel, now: DateTime<Utc>) -> AiDecisionLog {
    AiDecisionLog {
        id: Uuid::new_v4(),
        decision_type: DecisionType::ConnectionEvent,
        decision: reason_code.to_string(),
        symbol: symbol.to_string(),
        timeframe: None,
        primary_reason: reason_code.to_string(),
        detailed_reasoning: serde_json::json!({}),
        impact_level: impact,
        confidence_score: None,
        risk_score: None,
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_heartbeat_tracks_latency_average() {
        let registry = ConnectionRegistry::new(300, 180);
        registry.record_heartbeat(1, Utc::now(), Some(100.0)).await;
        registry.record_heartbeat(1, Utc::now(), Some(200.0)).await;
        let snap = registry.snapshot(1).await;
        assert_eq!(snap.avg_latency_ms, 150.0);
    }

    #[test]
    fn health_score_degrades_with_stale_heartbeat() {
        let fresh = health_score(Some(5), 50.0, 300);
        let stale = health_score(Some(290), 50.0, 300);
        assert!(fresh > stale);
    }

    #[test]
    fn health_score_is_zero_when_never_seen() {
        assert_eq!(health_score(None, 0.0, 300), 0.0);
    }
}
