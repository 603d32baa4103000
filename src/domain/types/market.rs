use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single tick. Global (shared across accounts). Timestamp is UTC;
/// conversion from broker-local (EET/EEST) happens once, at ingress (§6,
/// §9). Invariant: `spread == ask - bid` and `spread >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub spread: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
    pub tradeable: bool,
}

impl Tick {
    pub fn new(symbol: String, bid: Decimal, ask: Decimal, volume: Decimal, timestamp: DateTime<Utc>, tradeable: bool) -> Self {
        let spread = ask - bid;
        Self {
            symbol,
            bid,
            ask,
            spread,
            volume,
            timestamp,
            tradeable,
        }
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// Aggregated OHLC bar. Unique on `(symbol, timeframe, timestamp)`. Global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhlcCandle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tick_spread_is_ask_minus_bid() {
        let t = Tick::new("EURUSD".into(), dec!(1.1000), dec!(1.1002), dec!(1), Utc::now(), true);
        assert_eq!(t.spread, dec!(0.0002));
        assert!(t.spread >= Decimal::ZERO);
    }
}
