//! Candlestick pattern detection (§4.5: "candlestick patterns" alongside
//! the indicator vote set). Pure functions over the last few bars of a
//! window — no state carried between calls.

use crate::domain::types::OhlcCandle;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

fn f(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn body(c: &OhlcCandle) -> f64 {
    (f(c.close) - f(c.open)).abs()
}

fn range(c: &OhlcCandle) -> f64 {
    (f(c.high) - f(c.low)).max(1e-9)
}

fn upper_wick(c: &OhlcCandle) -> f64 {
    f(c.high) - f(c.close).max(f(c.open))
}

fn lower_wick(c: &OhlcCandle) -> f64 {
    f(c.open).min(f(c.close)) - f(c.low)
}

fn is_bullish(c: &OhlcCandle) -> bool {
    c.close > c.open
}

fn is_bearish(c: &OhlcCandle) -> bool {
    c.close < c.open
}

/// Name of every pattern detected in the last bar(s) of `candles`. Empty if
/// the window is too short or nothing qualifies.
pub fn detect(candles: &[OhlcCandle]) -> Vec<String> {
    let mut found = Vec::new();
    let n = candles.len();
    if n < 1 {
        return found;
    }
    let last = &candles[n - 1];

    if is_doji(last) {
        found.push("doji".into());
    }
    if is_hammer(last) {
        found.push("hammer".into());
    }
    if is_shooting_star(last) {
        found.push("shooting_star".into());
    }

    if n >= 2 {
        let prev = &candles[n - 2];
        if is_bullish_engulfing(prev, last) {
            found.push("bullish_engulfing".into());
        }
        if is_bearish_engulfing(prev, last) {
            found.push("bearish_engulfing".into());
        }
    }

    if n >= 3 {
        let c1 = &candles[n - 3];
        let c2 = &candles[n - 2];
        let c3 = &candles[n - 1];
        if is_morning_star(c1, c2, c3) {
            found.push("morning_star".into());
        }
        if is_evening_star(c1, c2, c3) {
            found.push("evening_star".into());
        }
    }

    found
}

fn is_doji(c: &OhlcCandle) -> bool {
    body(c) / range(c) < 0.1
}

fn is_hammer(c: &OhlcCandle) -> bool {
    let b = body(c).max(1e-9);
    lower_wick(c) >= 2.0 * b && upper_wick(c) <= b * 0.5
}

fn is_shooting_star(c: &OhlcCandle) -> bool {
    let b = body(c).max(1e-9);
    upper_wick(c) >= 2.0 * b && lower_wick(c) <= b * 0.5
}

fn is_bullish_engulfing(prev: &OhlcCandle, cur: &OhlcCandle) -> bool {
    is_bearish(prev) && is_bullish(cur) && cur.open <= prev.close && cur.close >= prev.open
}

fn is_bearish_engulfing(prev: &OhlcCandle, cur: &OhlcCandle) -> bool {
    is_bullish(prev) && is_bearish(cur) && cur.open >= prev.close && cur.close <= prev.open
}

fn is_morning_star(c1: &OhlcCandle, c2: &OhlcCandle, c3: &OhlcCandle) -> bool {
    is_bearish(c1) && body(c1) / range(c1) > 0.5 && body(c2) / range(c2) < 0.3 && is_bullish(c3) && f(c3.close) > (f(c1.open) + f(c1.close)) / 2.0
}

fn is_evening_star(c1: &OhlcCandle, c2: &OhlcCandle, c3: &OhlcCandle) -> bool {
    is_bullish(c1) && body(c1) / range(c1) > 0.5 && body(c2) / range(c2) < 0.3 && is_bearish(c3) && f(c3.close) < (f(c1.open) + f(c1.close)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> OhlcCandle {
        OhlcCandle {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::H1,
            open,
            high,
            low,
            close,
            volume: dec!(100),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn detects_hammer() {
        let c = candle(dec!(1.1010), dec!(1.1012), dec!(1.0980), dec!(1.1011));
        assert!(detect(&[c]).contains(&"hammer".to_string()));
    }

    #[test]
    fn detects_bullish_engulfing() {
        let prev = candle(dec!(1.1020), dec!(1.1022), dec!(1.1000), dec!(1.1002));
        let cur = candle(dec!(1.1000), dec!(1.1030), dec!(1.0998), dec!(1.1025));
        assert!(detect(&[prev, cur]).contains(&"bullish_engulfing".to_string()));
    }

    #[test]
    fn detects_doji() {
        let c = candle(dec!(1.1000), dec!(1.1015), dec!(1.0985), dec!(1.1001));
        assert!(detect(&[c]).contains(&"doji".to_string()));
    }
}
