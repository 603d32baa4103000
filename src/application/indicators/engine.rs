//! Indicator engine (§4.5). Stateless: every call rebuilds its indicators
//! from the supplied window and walks the whole window once — no indicator
//! state survives across calls (the 15s cache in [`super::RegimeCache`]
//! sits in front of this, not inside it).
//!
//! Grounded in the teacher's `TechnicalFeatureEngineeringService`
//! (`ta::indicators` fed via `Next`), extended to the indicator set named
//! in the spec.

use crate::domain::market_regime::{detect_regime, rsi_bands, Regime};
use crate::domain::types::{OhlcCandle, SignalType};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex, SlowStochastic,
};
use ta::{DataItem, Next};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorVote {
    pub direction: SignalType,
    pub strength: f64, // [0,1]
    pub reasoning: String,
}

impl IndicatorVote {
    fn neutral(reasoning: impl Into<String>) -> Self {
        Self { direction: SignalType::Hold, strength: 0.0, reasoning: reasoning.into() }
    }
}

/// Raw indicator readings a caller might need beyond the vote (e.g. ATR for
/// position sizing and smart TP/SL, §4.6.1).
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndicatorReadings {
    pub atr: f64,
    pub adx: f64,
    pub bollinger_bandwidth_pct: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    pub supertrend_level: f64,
}

pub struct IndicatorOutput {
    pub votes: HashMap<String, IndicatorVote>,
    pub readings: IndicatorReadings,
    pub regime: Regime,
}

fn to_f64(d: rust_decimal::Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn data_items(candles: &[OhlcCandle]) -> Vec<DataItem> {
    candles
        .iter()
        .filter_map(|c| {
            DataItem::builder()
                .high(to_f64(c.high))
                .low(to_f64(c.low))
                .close(to_f64(c.close))
                .open(to_f64(c.open))
                .volume(to_f64(c.volume))
                .build()
                .ok()
        })
        .collect()
}

/// Wilder's ADX/+DI/-DI over the full window, period 14. Returns
/// `(adx, plus_di, minus_di)` at the end of the window, or zeros if the
/// window is too short.
fn wilder_adx(candles: &[OhlcCandle], period: usize) -> (f64, f64, f64) {
    if candles.len() < period + 1 {
        return (0.0, 0.0, 0.0);
    }
    let highs: Vec<f64> = candles.iter().map(|c| to_f64(c.high)).collect();
    let lows: Vec<f64> = candles.iter().map(|c| to_f64(c.low)).collect();
    let closes: Vec<f64> = candles.iter().map(|c| to_f64(c.close)).collect();

    let mut plus_dm = Vec::with_capacity(candles.len());
    let mut minus_dm = Vec::with_capacity(candles.len());
    let mut tr = Vec::with_capacity(candles.len());

    for i in 1..candles.len() {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });

        let range = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        tr.push(range);
    }

    let smooth = |series: &[f64]| -> Vec<f64> {
        let mut out = Vec::with_capacity(series.len());
        let mut running: f64 = series.iter().take(period).sum();
        out.push(running);
        for &v in series.iter().skip(period) {
            running = running - (running / period as f64) + v;
            out.push(running);
        }
        out
    };

    let smoothed_tr = smooth(&tr);
    let smoothed_plus = smooth(&plus_dm);
    let smoothed_minus = smooth(&minus_dm);

    let mut dx_series = Vec::with_capacity(smoothed_tr.len());
    for i in 0..smoothed_tr.len() {
        if smoothed_tr[i] == 0.0 {
            dx_series.push(0.0);
            continue;
        }
        let plus_di = 100.0 * smoothed_plus[i] / smoothed_tr[i];
        let minus_di = 100.0 * smoothed_minus[i] / smoothed_tr[i];
        let sum = plus_di + minus_di;
        let dx = if sum == 0.0 { 0.0 } else { 100.0 * (plus_di - minus_di).abs() / sum };
        dx_series.push(dx);
    }

    let adx = if dx_series.len() >= period {
        dx_series[dx_series.len() - period..].iter().sum::<f64>() / period as f64
    } else {
        dx_series.iter().sum::<f64>() / dx_series.len().max(1) as f64
    };

    let last_tr = *smoothed_tr.last().unwrap_or(&0.0);
    let (plus_di, minus_di) = if last_tr == 0.0 {
        (0.0, 0.0)
    } else {
        (100.0 * smoothed_plus.last().unwrap_or(&0.0) / last_tr, 100.0 * smoothed_minus.last().unwrap_or(&0.0) / last_tr)
    };

    (adx, plus_di, minus_di)
}

/// SuperTrend level (ATR multiplier 3, period 10): the nearer band to
/// price, flipping side when price crosses it.
fn supertrend(candles: &[OhlcCandle], atr: f64, multiplier: f64) -> (f64, bool /* is_uptrend */) {
    if candles.is_empty() {
        return (0.0, true);
    }
    let last = candles.last().unwrap();
    let hl2 = (to_f64(last.high) + to_f64(last.low)) / 2.0;
    let upper = hl2 + multiplier * atr;
    let lower = hl2 - multiplier * atr;
    let close = to_f64(last.close);
    if close > upper {
        (lower, true)
    } else if close < lower {
        (upper, false)
    } else {
        (lower, close >= hl2)
    }
}

/// Heiken-Ashi trend over the last `lookback` bars: counts consecutive
/// bullish/bearish synthetic candles.
fn heiken_ashi_trend(candles: &[OhlcCandle], lookback: usize) -> (SignalType, f64) {
    if candles.len() < 2 {
        return (SignalType::Hold, 0.0);
    }
    let mut ha_close = (to_f64(candles[0].open) + to_f64(candles[0].high) + to_f64(candles[0].low) + to_f64(candles[0].close)) / 4.0;
    let mut ha_open = (to_f64(candles[0].open) + to_f64(candles[0].close)) / 2.0;
    let mut bullish_run = 0i32;
    let mut bearish_run = 0i32;

    for c in candles.iter().skip(1) {
        let next_ha_close = (to_f64(c.open) + to_f64(c.high) + to_f64(c.low) + to_f64(c.close)) / 4.0;
        let next_ha_open = (ha_open + ha_close) / 2.0;
        if next_ha_close > next_ha_open {
            bullish_run += 1;
            bearish_run = 0;
        } else {
            bearish_run += 1;
            bullish_run = 0;
        }
        ha_close = next_ha_close;
        ha_open = next_ha_open;
    }

    let run = bullish_run.max(bearish_run).min(lookback as i32);
    let strength = (run as f64 / lookback as f64).clamp(0.0, 1.0);
    if bullish_run > bearish_run {
        (SignalType::Buy, strength)
    } else if bearish_run > bullish_run {
        (SignalType::Sell, strength)
    } else {
        (SignalType::Hold, 0.0)
    }
}

/// On-Balance Volume trend over the window, compared against price trend
/// to detect divergence (§4.6 step 3: "+2 if OBV divergence confirms").
fn obv_trend(candles: &[OhlcCandle]) -> (SignalType, f64, bool /* divergence */) {
    if candles.len() < 2 {
        return (SignalType::Hold, 0.0, false);
    }
    let mut obv = 0.0;
    let mut series = Vec::with_capacity(candles.len());
    series.push(obv);
    for w in candles.windows(2) {
        let prev_close = to_f64(w[0].close);
        let close = to_f64(w[1].close);
        let volume = to_f64(w[1].volume);
        if close > prev_close {
            obv += volume;
        } else if close < prev_close {
            obv -= volume;
        }
        series.push(obv);
    }
    let obv_rising = series.last().unwrap_or(&0.0) > series.first().unwrap_or(&0.0);
    let price_rising = to_f64(candles.last().unwrap().close) > to_f64(candles.first().unwrap().close);
    let divergence = obv_rising != price_rising;
    let direction = if obv_rising { SignalType::Buy } else { SignalType::Sell };
    (direction, 0.5, divergence)
}

/// Volume-weighted average price over the whole window, and whether the
/// last close sits above or below it.
fn vwap_vote(candles: &[OhlcCandle]) -> IndicatorVote {
    let mut cum_pv = 0.0;
    let mut cum_v = 0.0;
    for c in candles {
        let typical = (to_f64(c.high) + to_f64(c.low) + to_f64(c.close)) / 3.0;
        let volume = to_f64(c.volume);
        cum_pv += typical * volume;
        cum_v += volume;
    }
    if cum_v == 0.0 || candles.is_empty() {
        return IndicatorVote::neutral("no volume in window");
    }
    let vwap = cum_pv / cum_v;
    let last_close = to_f64(candles.last().unwrap().close);
    let distance_pct = ((last_close - vwap) / vwap).abs() * 100.0;
    let strength = (distance_pct / 0.5).clamp(0.0, 1.0);
    if last_close > vwap {
        IndicatorVote { direction: SignalType::Buy, strength, reasoning: format!("close {:.5} above VWAP {:.5}", last_close, vwap) }
    } else {
        IndicatorVote { direction: SignalType::Sell, strength, reasoning: format!("close {:.5} below VWAP {:.5}", last_close, vwap) }
    }
}

fn volume_analysis_vote(candles: &[OhlcCandle], lookback: usize) -> IndicatorVote {
    if candles.len() < lookback + 1 {
        return IndicatorVote::neutral("insufficient window for volume analysis");
    }
    let window = &candles[candles.len() - lookback - 1..candles.len() - 1];
    let avg_volume: f64 = window.iter().map(|c| to_f64(c.volume)).sum::<f64>() / lookback as f64;
    let last = candles.last().unwrap();
    let last_volume = to_f64(last.volume);
    if avg_volume == 0.0 {
        return IndicatorVote::neutral("no historical volume");
    }
    let surge_ratio = last_volume / avg_volume;
    if surge_ratio < 1.5 {
        return IndicatorVote::neutral("no volume surge");
    }
    let strength = ((surge_ratio - 1.5) / 2.0).clamp(0.0, 1.0);
    if last.close > last.open {
        IndicatorVote { direction: SignalType::Buy, strength, reasoning: format!("volume surge {:.1}x on bullish bar", surge_ratio) }
    } else if last.close < last.open {
        IndicatorVote { direction: SignalType::Sell, strength, reasoning: format!("volume surge {:.1}x on bearish bar", surge_ratio) }
    } else {
        IndicatorVote::neutral("volume surge but indecisive bar")
    }
}

/// Rolling Ichimoku cloud: tenkan(9)/kijun(26) midpoints, senkou A/B
/// projected. Vote by price position relative to the (unshifted) cloud.
fn ichimoku_vote(candles: &[OhlcCandle]) -> IndicatorVote {
    let midpoint = |window: &[OhlcCandle]| -> f64 {
        let high = window.iter().map(|c| to_f64(c.high)).fold(f64::MIN, f64::max);
        let low = window.iter().map(|c| to_f64(c.low)).fold(f64::MAX, f64::min);
        (high + low) / 2.0
    };

    if candles.len() < 52 {
        return IndicatorVote::neutral("insufficient window for Ichimoku");
    }
    let n = candles.len();
    let tenkan = midpoint(&candles[n - 9..]);
    let kijun = midpoint(&candles[n - 26..]);
    let senkou_a = (tenkan + kijun) / 2.0;
    let senkou_b = midpoint(&candles[n - 52..]);
    let (cloud_top, cloud_bottom) = (senkou_a.max(senkou_b), senkou_a.min(senkou_b));
    let price = to_f64(candles.last().unwrap().close);

    if price > cloud_top {
        IndicatorVote { direction: SignalType::Buy, strength: 0.6, reasoning: "price above Ichimoku cloud".into() }
    } else if price < cloud_bottom {
        IndicatorVote { direction: SignalType::Sell, strength: 0.6, reasoning: "price below Ichimoku cloud".into() }
    } else {
        IndicatorVote::neutral("price inside Ichimoku cloud")
    }
}

pub fn compute_votes(candles: &[OhlcCandle]) -> IndicatorOutput {
    let mut votes = HashMap::new();
    let mut readings = IndicatorReadings::default();

    if candles.len() < 20 {
        return IndicatorOutput { votes, readings, regime: Regime::TooWeak };
    }

    let closes: Vec<f64> = candles.iter().map(|c| to_f64(c.close)).collect();
    let items = data_items(candles);

    // ADX / regime
    let (adx, plus_di, minus_di) = wilder_adx(candles, 14);
    readings.adx = adx;

    // ATR (period 14)
    let mut atr_ind = AverageTrueRange::new(14).expect("valid ATR period");
    let mut atr_val = 0.0;
    for item in &items {
        atr_val = atr_ind.next(item);
    }
    readings.atr = atr_val;

    // Bollinger Bands (20, 2.0) — also drives the regime tie-break.
    let mut bb = BollingerBands::new(20, 2.0).expect("valid Bollinger params");
    let mut bb_out = None;
    for &c in &closes {
        bb_out = Some(bb.next(c));
    }
    if let Some(bb) = &bb_out {
        readings.bollinger_upper = bb.upper;
        readings.bollinger_lower = bb.lower;
        if bb.average > 0.0 {
            readings.bollinger_bandwidth_pct = ((bb.upper - bb.lower) / bb.average) * 100.0;
        }
        let last_close = *closes.last().unwrap();
        let band_width = (bb.upper - bb.lower).max(1e-9);
        let position = (last_close - bb.lower) / band_width;
        if position <= 0.1 {
            votes.insert("bollinger".into(), IndicatorVote { direction: SignalType::Buy, strength: 1.0 - position, reasoning: "price at lower Bollinger band".into() });
        } else if position >= 0.9 {
            votes.insert("bollinger".into(), IndicatorVote { direction: SignalType::Sell, strength: position, reasoning: "price at upper Bollinger band".into() });
        } else {
            votes.insert("bollinger".into(), IndicatorVote::neutral("price inside Bollinger bands"));
        }
    }

    let regime = detect_regime(adx, readings.bollinger_bandwidth_pct);
    let (oversold, overbought) = rsi_bands(regime);

    if regime == Regime::TooWeak {
        return IndicatorOutput { votes: HashMap::new(), readings, regime };
    }

    // RSI (14), regime-aware bands.
    let mut rsi_ind = RelativeStrengthIndex::new(14).expect("valid RSI period");
    let mut rsi_val = 50.0;
    for &c in &closes {
        rsi_val = rsi_ind.next(c);
    }
    votes.insert(
        "rsi".into(),
        if rsi_val <= oversold {
            IndicatorVote { direction: SignalType::Buy, strength: ((oversold - rsi_val) / oversold).clamp(0.0, 1.0), reasoning: format!("RSI {:.1} <= oversold {:.0}", rsi_val, oversold) }
        } else if rsi_val >= overbought {
            IndicatorVote { direction: SignalType::Sell, strength: ((rsi_val - overbought) / (100.0 - overbought)).clamp(0.0, 1.0), reasoning: format!("RSI {:.1} >= overbought {:.0}", rsi_val, overbought) }
        } else {
            IndicatorVote::neutral(format!("RSI {:.1} neutral", rsi_val))
        },
    );

    // MACD (12, 26, 9).
    let mut macd_ind = MovingAverageConvergenceDivergence::new(12, 26, 9).expect("valid MACD params");
    let mut macd_val = None;
    for &c in &closes {
        macd_val = Some(macd_ind.next(c));
    }
    if let Some(macd) = macd_val {
        votes.insert(
            "macd".into(),
            if macd.histogram > 0.0 {
                IndicatorVote { direction: SignalType::Buy, strength: (macd.histogram.abs() / readings.atr.max(1e-9)).clamp(0.0, 1.0), reasoning: "MACD histogram positive".into() }
            } else if macd.histogram < 0.0 {
                IndicatorVote { direction: SignalType::Sell, strength: (macd.histogram.abs() / readings.atr.max(1e-9)).clamp(0.0, 1.0), reasoning: "MACD histogram negative".into() }
            } else {
                IndicatorVote::neutral("MACD flat")
            },
        );
    }

    // Stochastic (14, slow 3).
    let mut stoch = SlowStochastic::new(14, 3).expect("valid stochastic params");
    let mut stoch_val = 50.0;
    for item in &items {
        stoch_val = stoch.next(item);
    }
    votes.insert(
        "stochastic".into(),
        if stoch_val <= 20.0 {
            IndicatorVote { direction: SignalType::Buy, strength: ((20.0 - stoch_val) / 20.0).clamp(0.0, 1.0), reasoning: format!("stochastic {:.1} oversold", stoch_val) }
        } else if stoch_val >= 80.0 {
            IndicatorVote { direction: SignalType::Sell, strength: ((stoch_val - 80.0) / 20.0).clamp(0.0, 1.0), reasoning: format!("stochastic {:.1} overbought", stoch_val) }
        } else {
            IndicatorVote::neutral(format!("stochastic {:.1} neutral", stoch_val))
        },
    );

    // ADX direction (strong trend confirms whichever DI leads).
    votes.insert(
        "adx".into(),
        if adx <= 20.0 {
            IndicatorVote::neutral(format!("ADX {:.1} weak trend", adx))
        } else if plus_di > minus_di {
            IndicatorVote { direction: SignalType::Buy, strength: (adx / 50.0).clamp(0.0, 1.0), reasoning: format!("ADX {:.1}, +DI leads", adx) }
        } else {
            IndicatorVote { direction: SignalType::Sell, strength: (adx / 50.0).clamp(0.0, 1.0), reasoning: format!("ADX {:.1}, -DI leads", adx) }
        },
    );

    // EMA(9)/EMA(21) crossover.
    let mut ema_fast = ExponentialMovingAverage::new(9).expect("valid EMA period");
    let mut ema_slow = ExponentialMovingAverage::new(21).expect("valid EMA period");
    let (mut fast_val, mut slow_val) = (0.0, 0.0);
    for &c in &closes {
        fast_val = ema_fast.next(c);
        slow_val = ema_slow.next(c);
    }
    let separation = ((fast_val - slow_val) / readings.atr.max(1e-9)).abs().clamp(0.0, 1.0);
    votes.insert(
        "ema_cross".into(),
        if fast_val > slow_val {
            IndicatorVote { direction: SignalType::Buy, strength: separation, reasoning: "EMA9 above EMA21".into() }
        } else if fast_val < slow_val {
            IndicatorVote { direction: SignalType::Sell, strength: separation, reasoning: "EMA9 below EMA21".into() }
        } else {
            IndicatorVote::neutral("EMA9/EMA21 flat")
        },
    );

    // SuperTrend.
    let (level, is_uptrend) = supertrend(candles, readings.atr, 3.0);
    readings.supertrend_level = level;
    votes.insert(
        "supertrend".into(),
        IndicatorVote {
            direction: if is_uptrend { SignalType::Buy } else { SignalType::Sell },
            strength: 0.5,
            reasoning: format!("SuperTrend level {:.5} ({})", level, if is_uptrend { "uptrend" } else { "downtrend" }),
        },
    );

    // Ichimoku cloud.
    votes.insert("ichimoku".into(), ichimoku_vote(candles));

    // Heiken-Ashi trend.
    let (ha_dir, ha_strength) = heiken_ashi_trend(candles, 5);
    votes.insert("heiken_ashi".into(), IndicatorVote { direction: ha_dir, strength: ha_strength, reasoning: "Heiken-Ashi consecutive-run trend".into() });

    // OBV.
    let (obv_dir, obv_strength, obv_divergence) = obv_trend(candles);
    votes.insert(
        "obv".into(),
        IndicatorVote { direction: obv_dir, strength: obv_strength, reasoning: if obv_divergence { "OBV diverges from price".into() } else { "OBV confirms price".into() } },
    );

    // VWAP.
    votes.insert("vwap".into(), vwap_vote(candles));

    // Volume analysis.
    votes.insert("volume".into(), volume_analysis_vote(candles, 20));

    // Regime suppression: in RANGING, down-weight trend-following votes.
    if regime == Regime::Ranging {
        for key in ["ema_cross", "supertrend", "macd", "ichimoku"] {
            if let Some(vote) = votes.get_mut(key) {
                vote.strength *= 0.5;
            }
        }
    }

    IndicatorOutput { votes, readings, regime }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::Timeframe;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn synthetic_uptrend(n: usize) -> Vec<OhlcCandle> {
        let mut candles = Vec::with_capacity(n);
        let mut price = dec!(1.1000);
        let now = Utc::now();
        for i in 0..n {
            let open = price;
            price += dec!(0.0005);
            let close = price;
            candles.push(OhlcCandle {
                symbol: "EURUSD".into(),
                timeframe: Timeframe::H1,
                open,
                high: close + dec!(0.0002),
                low: open - dec!(0.0002),
                close,
                volume: Decimal::from(100 + i as i64),
                timestamp: now - Duration::hours((n - i) as i64),
            });
        }
        candles
    }

    #[test]
    fn strong_uptrend_produces_buy_leaning_votes() {
        let candles = synthetic_uptrend(80);
        let output = compute_votes(&candles);
        assert!(!output.votes.is_empty());
        let buy_votes = output.votes.values().filter(|v| v.direction == SignalType::Buy).count();
        let sell_votes = output.votes.values().filter(|v| v.direction == SignalType::Sell).count();
        assert!(buy_votes >= sell_votes);
    }

    #[test]
    fn short_window_is_too_weak() {
        let candles = synthetic_uptrend(5);
        let output = compute_votes(&candles);
        assert_eq!(output.regime, Regime::TooWeak);
        assert!(output.votes.is_empty());
    }
}
