//! 15s TTL cache in front of [`super::engine::compute_votes`] (§4.5: "the
//! full indicator computation is cached per `(symbol, timeframe)` for 15s
//! so that concurrent signal/decision requests don't recompute it").

use super::engine::{compute_votes, IndicatorOutput, IndicatorReadings, IndicatorVote};
use crate::domain::market_regime::Regime;
use crate::domain::types::OhlcCandle;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

#[derive(Clone)]
pub struct CachedIndicators {
    pub votes: HashMap<String, IndicatorVote>,
    pub readings: IndicatorReadings,
    pub regime: Regime,
}

impl From<IndicatorOutput> for CachedIndicators {
    fn from(o: IndicatorOutput) -> Self {
        Self { votes: o.votes, readings: o.readings, regime: o.regime }
    }
}

struct Entry {
    value: CachedIndicators,
    computed_at: DateTime<Utc>,
}

pub struct RegimeCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), Entry>>,
}

impl RegimeCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    /// Returns the cached computation for `(symbol, timeframe)` if still
    /// fresh, else runs [`compute_votes`] on `candles`, caches, and returns it.
    pub fn get_or_compute(&self, symbol: &str, timeframe: &str, candles: &[OhlcCandle]) -> CachedIndicators {
        let key = (symbol.to_string(), timeframe.to_string());
        let now = Utc::now();

        if let Some(entry) = self.entries.read().expect("regime cache lock poisoned").get(&key) {
            let age = now.signed_duration_since(entry.computed_at);
            if age.to_std().map(|d| d < self.ttl).unwrap_or(false) {
                return entry.value.clone();
            }
        }

        let value: CachedIndicators = compute_votes(candles).into();
        self.entries.write().expect("regime cache lock poisoned").insert(key, Entry { value: value.clone(), computed_at: now });
        value
    }

    pub fn invalidate(&self, symbol: &str, timeframe: &str) {
        self.entries.write().expect("regime cache lock poisoned").remove(&(symbol.to_string(), timeframe.to_string()));
    }
}

impl Default for RegimeCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use chrono::Duration as ChronoDuration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candles(n: usize) -> Vec<OhlcCandle> {
        let now = Utc::now();
        let mut price = dec!(1.1000);
        (0..n)
            .map(|i| {
                let open = price;
                price += dec!(0.0003);
                OhlcCandle {
                    symbol: "EURUSD".into(),
                    timeframe: Timeframe::H1,
                    open,
                    high: price + dec!(0.0002),
                    low: open - dec!(0.0002),
                    close: price,
                    volume: Decimal::from(100 + i as i64),
                    timestamp: now - ChronoDuration::hours((n - i) as i64),
                }
            })
            .collect()
    }

    #[test]
    fn second_call_within_ttl_hits_cache() {
        let cache = RegimeCache::new(Duration::from_secs(15));
        let window = candles(60);
        let first = cache.get_or_compute("EURUSD", "H1", &window);
        let second = cache.get_or_compute("EURUSD", "H1", &[]);
        assert_eq!(first.votes.len(), second.votes.len());
    }

    #[test]
    fn different_timeframe_is_a_separate_key() {
        let cache = RegimeCache::new(Duration::from_secs(15));
        let window = candles(60);
        cache.get_or_compute("EURUSD", "H1", &window);
        let m1 = cache.get_or_compute("EURUSD", "M1", &[]);
        assert!(m1.votes.is_empty());
    }
}
