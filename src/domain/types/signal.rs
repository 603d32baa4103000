use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    Active,
    Expired,
    Executed,
    Ignored,
}

/// One directional trading signal. Global. Invariant: at most one `active`
/// signal per `(symbol, timeframe)` — enforced at the repository layer by a
/// unique conditional index (§3, §5). Default lifetime 24h.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub signal_type: SignalType,
    pub confidence: f64,
    pub entry_price: Decimal,
    pub sl: Decimal,
    pub tp: Decimal,
    /// Full indicator map + regime + spread, never a hand-curated subset
    /// (§4.6 step 7).
    pub indicator_snapshot: Value,
    pub patterns: Vec<String>,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TradingSignal {
    pub const DEFAULT_LIFETIME_HOURS: i64 = 24;

    pub fn new(
        symbol: String,
        timeframe: Timeframe,
        signal_type: SignalType,
        confidence: f64,
        entry_price: Decimal,
        sl: Decimal,
        tp: Decimal,
        indicator_snapshot: Value,
        patterns: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            timeframe,
            signal_type,
            confidence,
            entry_price,
            sl,
            tp,
            indicator_snapshot,
            patterns,
            status: SignalStatus::Active,
            created_at: now,
            expires_at: now + Duration::hours(Self::DEFAULT_LIFETIME_HOURS),
        }
    }

    /// §8 boundary behavior: exactly at `MAX_SIGNAL_AGE` the signal is still
    /// fresh — the comparison is `<=`.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.created_at) <= max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_exactly_at_boundary_is_still_fresh() {
        let now = Utc::now();
        let sig = TradingSignal::new(
            "EURUSD".into(),
            Timeframe::H1,
            SignalType::Buy,
            72.0,
            Decimal::ONE,
            Decimal::ONE,
            Decimal::ONE,
            Value::Null,
            vec![],
            now - Duration::seconds(300),
        );
        assert!(sig.is_fresh(now, Duration::seconds(300)));
        assert!(!sig.is_fresh(now + Duration::seconds(1), Duration::seconds(300)));
    }

    #[test]
    fn default_lifetime_is_24_hours() {
        let now = Utc::now();
        let sig = TradingSignal::new(
            "EURUSD".into(),
            Timeframe::H1,
            SignalType::Sell,
            60.0,
            Decimal::ONE,
            Decimal::ONE,
            Decimal::ONE,
            Value::Null,
            vec![],
            now,
        );
        assert_eq!(sig.expires_at - sig.created_at, Duration::hours(24));
    }
}
