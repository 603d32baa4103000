//! Smart TP/SL calculator (§4.6.1). Pure function: given an entry,
//! direction and the indicator readings for the bar, returns a TP/SL pair
//! or `None` if no R:R-valid placement exists.

use crate::domain::types::{BrokerSymbol, OhlcCandle, SignalType};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetClass {
    ForexMajor,
    Metals,
    Indices,
    Crypto,
}

impl AssetClass {
    /// (tp_atr_multiplier, sl_atr_multiplier) — §4.6.1 step 1.
    fn multipliers(self) -> (f64, f64) {
        match self {
            AssetClass::ForexMajor => (2.5, 1.0),
            AssetClass::Metals => (0.8, 0.5),
            AssetClass::Indices => (4.5, 3.0),
            AssetClass::Crypto => (1.8, 1.0),
        }
    }
}

fn classify(symbol: &str) -> AssetClass {
    let s = symbol.to_ascii_uppercase();
    if s.contains("BTC") || s.contains("ETH") || s.contains("XRP") || s.contains("SOL") || s.contains("DOGE") {
        AssetClass::Crypto
    } else if s.contains("XAU") || s.contains("XAG") || s.starts_with("GOLD") || s.starts_with("SILVER") {
        AssetClass::Metals
    } else if s.contains("40") || s.contains("30") || s.contains("500") || s.contains("100") || s.contains("NAS") || s.contains("SPX") || s.contains("DAX") {
        AssetClass::Indices
    } else {
        AssetClass::ForexMajor
    }
}

pub struct SmartTpSlInput<'a> {
    pub symbol: &'a str,
    pub direction: SignalType,
    pub entry: Decimal,
    pub atr: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    pub supertrend_level: f64,
    pub candles: &'a [OhlcCandle],
    pub broker: &'a BrokerSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TpSl {
    pub tp: Decimal,
    pub sl: Decimal,
}

fn f64_to_dec(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or_default()
}

fn entry_f64(entry: Decimal) -> f64 {
    entry.to_f64().unwrap_or(0.0)
}

/// Last 5 swing highs/lows over the window: a simple 3-bar local extremum
/// scan, most recent five kept.
fn swing_levels(candles: &[OhlcCandle], highs: bool) -> Vec<f64> {
    let mut levels = Vec::new();
    if candles.len() < 3 {
        return levels;
    }
    for w in candles.windows(3) {
        let (a, b, c) = (&w[0], &w[1], &w[2]);
        let is_swing = if highs {
            b.high > a.high && b.high > c.high
        } else {
            b.low < a.low && b.low < c.low
        };
        if is_swing {
            levels.push(if highs { b.high.to_f64().unwrap_or(0.0) } else { b.low.to_f64().unwrap_or(0.0) });
        }
    }
    levels.reverse();
    levels.truncate(5);
    levels
}

/// Nearest psychological round number beyond `entry` in `direction`, at a
/// granularity implied by the symbol's digits (e.g. 0.0050 for a 5-digit FX
/// pair, 1.0 for a 2-digit instrument).
fn round_number_candidate(entry: f64, direction: SignalType, broker: &BrokerSymbol) -> f64 {
    let step = match broker.digits {
        0 | 1 => 1.0,
        2 | 3 => 0.5,
        _ => 0.0050,
    };
    match direction {
        SignalType::Buy => ((entry / step).floor() + 1.0) * step,
        _ => ((entry / step).ceil() - 1.0) * step,
    }
}

/// §4.6.1: full TP/SL selection including asymmetric adjustment, R:R
/// validation and broker clamps. `None` if no valid placement exists.
pub fn compute_tp_sl(input: &SmartTpSlInput) -> Option<TpSl> {
    if input.atr <= 0.0 || input.direction == SignalType::Hold {
        return None;
    }

    let class = classify(input.symbol);
    let (tp_mult, sl_mult) = class.multipliers();
    let entry = entry_f64(input.entry);
    let point = input.broker.point().to_f64().unwrap_or(0.0001);
    let is_buy = input.direction == SignalType::Buy;
    let sign = if is_buy { 1.0 } else { -1.0 };

    // TP candidates, as absolute price levels.
    let mut tp_candidates: Vec<f64> = vec![
        entry + sign * tp_mult * input.atr,
        if is_buy { input.bollinger_upper } else { input.bollinger_lower },
        input.supertrend_level,
        round_number_candidate(entry, input.direction, input.broker),
    ];
    tp_candidates.extend(swing_levels(input.candles, is_buy));

    // SL candidates.
    let bollinger_offset = if is_buy { input.bollinger_lower * 0.998 } else { input.bollinger_upper * 1.002 };
    let mut sl_candidates: Vec<f64> = vec![entry - sign * sl_mult * input.atr, bollinger_offset, input.supertrend_level];

    let min_tp_distance = 1.5 * input.atr;
    let min_sl_distance = 1.0 * input.atr;

    // Select TP: nearest valid candidate at >= min_tp_distance in the trade direction.
    let mut tp_valid: Vec<f64> = tp_candidates
        .into_iter()
        .filter(|&level| {
            let distance = (level - entry) * sign;
            distance >= min_tp_distance
        })
        .collect();
    tp_valid.sort_by(|a, b| ((a - entry) * sign).partial_cmp(&((b - entry) * sign)).unwrap());
    let mut tp = tp_valid.into_iter().next().unwrap_or(entry + sign * tp_mult * input.atr);

    // Select SL: tightest valid candidate at >= min_sl_distance against the trade.
    let mut sl_valid: Vec<f64> = sl_candidates
        .drain(..)
        .filter(|&level| {
            let distance = (entry - level) * sign;
            distance >= min_sl_distance
        })
        .collect();
    sl_valid.sort_by(|a, b| ((entry - a) * sign).partial_cmp(&((entry - b) * sign)).unwrap());
    let mut sl = sl_valid.into_iter().next().unwrap_or(entry - sign * sl_mult * input.atr);

    // Asymmetric BUY adjustment (§4.6.1 step 6): widen TP, tighten SL.
    if is_buy {
        tp = entry + (tp - entry) * 1.2;
        sl = entry - (entry - sl) * 0.9;
    }

    // R:R validation.
    let required_rr = if is_buy { 2.0 } else { 1.5 };
    let tp_distance = (tp - entry).abs();
    let sl_distance = (entry - sl).abs();
    if sl_distance <= 0.0 {
        return None;
    }
    let rr = tp_distance / sl_distance;
    if rr < required_rr {
        let widened_tp = entry + sign * required_rr * sl_distance;
        let widened_rr_ok = (widened_tp - entry).abs() / sl_distance >= required_rr - 1e-9;
        if widened_rr_ok {
            tp = widened_tp;
        } else {
            return None;
        }
    }

    // Broker clamps: minimum distance from market (stops_level, freeze_level).
    let min_broker_distance = (input.broker.stops_level.max(input.broker.freeze_level) as f64) * point;
    if tp_distance.max((tp - entry).abs()) < min_broker_distance || sl_distance < min_broker_distance {
        let bump = min_broker_distance;
        if (tp - entry).abs() < bump {
            tp = entry + sign * bump;
        }
        if (entry - sl).abs() < bump {
            sl = entry - sign * bump;
        }
    }

    // Sanity clamp: never let TP/SL exceed 10% / fall under 0.05% of entry price.
    let max_distance = entry.abs() * 0.10;
    let min_distance = entry.abs() * 0.0005;
    let tp_distance_final = (tp - entry).abs().clamp(min_distance, max_distance);
    let sl_distance_final = (entry - sl).abs().clamp(min_distance, max_distance);
    tp = entry + sign * tp_distance_final;
    sl = entry - sign * sl_distance_final;

    Some(TpSl { tp: f64_to_dec(tp), sl: f64_to_dec(sl) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn broker() -> BrokerSymbol {
        BrokerSymbol {
            symbol: "EURUSD".into(),
            volume_min: dec!(0.01),
            volume_max: dec!(100),
            volume_step: dec!(0.01),
            stops_level: 10,
            freeze_level: 5,
            digits: 5,
            point_value: dec!(1),
            trade_mode: "full".into(),
        }
    }

    fn candles() -> Vec<OhlcCandle> {
        let now = Utc::now();
        (0..10)
            .map(|i| OhlcCandle {
                symbol: "EURUSD".into(),
                timeframe: Timeframe::H1,
                open: dec!(1.1000),
                high: dec!(1.1010),
                low: dec!(1.0990),
                close: dec!(1.1000),
                volume: dec!(100),
                timestamp: now - chrono::Duration::hours(10 - i),
            })
            .collect()
    }

    #[test]
    fn buy_signal_produces_tp_above_and_sl_below_entry() {
        let broker = broker();
        let candles = candles();
        let input = SmartTpSlInput {
            symbol: "EURUSD",
            direction: SignalType::Buy,
            entry: dec!(1.1000),
            atr: 0.0020,
            bollinger_upper: 1.1050,
            bollinger_lower: 1.0950,
            supertrend_level: 1.0970,
            candles: &candles,
            broker: &broker,
        };
        let result = compute_tp_sl(&input).expect("buy should produce a valid TP/SL");
        assert!(result.tp > input.entry);
        assert!(result.sl < input.entry);
    }

    #[test]
    fn sell_signal_produces_tp_below_and_sl_above_entry() {
        let broker = broker();
        let candles = candles();
        let input = SmartTpSlInput {
            symbol: "EURUSD",
            direction: SignalType::Sell,
            entry: dec!(1.1000),
            atr: 0.0020,
            bollinger_upper: 1.1050,
            bollinger_lower: 1.0950,
            supertrend_level: 1.1030,
            candles: &candles,
            broker: &broker,
        };
        let result = compute_tp_sl(&input).expect("sell should produce a valid TP/SL");
        assert!(result.tp < input.entry);
        assert!(result.sl > input.entry);
    }

    #[test]
    fn zero_atr_is_rejected() {
        let broker = broker();
        let candles = candles();
        let input = SmartTpSlInput {
            symbol: "EURUSD",
            direction: SignalType::Buy,
            entry: dec!(1.1000),
            atr: 0.0,
            bollinger_upper: 1.1050,
            bollinger_lower: 1.0950,
            supertrend_level: 1.0970,
            candles: &candles,
            broker: &broker,
        };
        assert!(compute_tp_sl(&input).is_none());
    }
}
