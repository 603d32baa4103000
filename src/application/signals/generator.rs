//! Signal generator (§4.6). Fires per (subscribed symbol, configured
//! timeframe) once a minute from the worker supervisor.

use crate::application::indicators::engine::IndicatorVote;
use crate::application::indicators::{patterns, RegimeCache};
use crate::application::signals::smart_tp_sl::{compute_tp_sl, SmartTpSlInput};
use crate::domain::market_regime::Regime;
use crate::domain::ports::{CandleRepository, IndicatorScoreRepository, SignalRepository, SymbolRepository, TickRepository};
use crate::domain::timeframe::Timeframe;
use crate::domain::types::{SignalType, TradingSignal};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Empirically BUY has underperformed SELL; the asymmetry is a documented
/// correction, not an oversight (§4.6 step 2).
const BUY_ADVANTAGE: usize = 2;
const BUY_CONFIDENCE_PENALTY: f64 = 3.0;
const MIN_GENERATION_CONFIDENCE: f64 = 50.0;
const CANDLE_WINDOW: usize = 200;
/// Per-indicator base confluence contribution, scaled by that indicator's
/// historical `confluence_weight()` (§4.6 step 3).
const BASE_CONFLUENCE_PER_INDICATOR: f64 = 4.0;

pub struct GeneratedSignal {
    pub signal: TradingSignal,
}

fn aggregate_direction(votes: &std::collections::HashMap<String, IndicatorVote>) -> Option<SignalType> {
    let buy_count = votes.values().filter(|v| v.direction == SignalType::Buy).count();
    let sell_count = votes.values().filter(|v| v.direction == SignalType::Sell).count();

    if buy_count >= sell_count + BUY_ADVANTAGE {
        Some(SignalType::Buy)
    } else if sell_count > buy_count {
        Some(SignalType::Sell)
    } else {
        None
    }
}

/// Weighted indicator confluence (≤40) plus pattern and strength terms
/// (§4.6 step 3). The base term is each confirming indicator's historical
/// `IndicatorScore::confluence_weight()`, not a flat count; on top of that,
/// extra confirming indicators beyond the first add a small bonus (+2 each,
/// capped at +10), as do a strong ADX reading (+3) and OBV divergence
/// confirmation (+2).
#[allow(clippy::too_many_arguments)]
async fn compute_confidence(
    indicator_scores: &Arc<dyn IndicatorScoreRepository>,
    symbol: &str,
    timeframe: Timeframe,
    votes: &std::collections::HashMap<String, IndicatorVote>,
    direction: SignalType,
    patterns_found: usize,
    adx: f64,
) -> anyhow::Result<f64> {
    let pattern_score = (patterns_found as f64 * 10.0).min(30.0);

    let confirming: Vec<(&String, &IndicatorVote)> = votes.iter().filter(|(_, v)| v.direction == direction).collect();

    let mut weighted_base = 0.0;
    for (name, _) in &confirming {
        let weight = indicator_scores.get(symbol, timeframe, name).await?.map(|s| s.confluence_weight()).unwrap_or(1.0);
        weighted_base += BASE_CONFLUENCE_PER_INDICATOR * weight;
    }

    let extra_confirming_bonus = (confirming.len().saturating_sub(1) as f64 * 2.0).min(10.0);
    let adx_bonus = if adx > 25.0 { 3.0 } else { 0.0 };
    let obv_bonus = votes
        .get("obv")
        .map(|v| v.direction == direction && v.reasoning.contains("confirms"))
        .unwrap_or(false);
    let obv_bonus = if obv_bonus { 2.0 } else { 0.0 };

    let confluence = (weighted_base + extra_confirming_bonus + adx_bonus + obv_bonus).min(40.0);

    let avg_strength = if confirming.is_empty() {
        0.0
    } else {
        confirming.iter().map(|(_, v)| v.strength).sum::<f64>() / confirming.len() as f64
    };
    let strength_score = (avg_strength * 30.0).min(30.0);

    let penalty = if direction == SignalType::Buy { BUY_CONFIDENCE_PENALTY } else { 0.0 };

    Ok((pattern_score + confluence + strength_score - penalty).clamp(0.0, 100.0))
}

/// Generates (and persists) a new signal for `(symbol, timeframe)`, or
/// returns `Ok(None)` if the conditions in §4.6 don't produce one.
#[allow(clippy::too_many_arguments)]
pub async fn generate_signal(
    candles_repo: &Arc<dyn CandleRepository>,
    ticks_repo: &Arc<dyn TickRepository>,
    symbols_repo: &Arc<dyn SymbolRepository>,
    signals_repo: &Arc<dyn SignalRepository>,
    indicator_scores_repo: &Arc<dyn IndicatorScoreRepository>,
    cache: &RegimeCache,
    symbol: &str,
    timeframe: Timeframe,
) -> anyhow::Result<Option<GeneratedSignal>> {
    let mut candles = candles_repo.latest_n(symbol, timeframe, CANDLE_WINDOW).await?;
    candles.sort_by_key(|c| c.timestamp);

    if candles.len() < 20 {
        debug!(symbol, ?timeframe, "signal generator: insufficient candle history");
        return Ok(None);
    }

    let indicators = cache.get_or_compute(symbol, timeframe.as_str(), &candles);
    if indicators.regime == Regime::TooWeak {
        debug!(symbol, ?timeframe, "signal generator: regime too weak, aborting");
        return Ok(None);
    }

    let direction = match aggregate_direction(&indicators.votes) {
        Some(d) => d,
        None => {
            debug!(symbol, ?timeframe, "signal generator: no consensus");
            return Ok(None);
        }
    };

    let detected_patterns = patterns::detect(&candles);
    let confidence = compute_confidence(
        indicator_scores_repo,
        symbol,
        timeframe,
        &indicators.votes,
        direction,
        detected_patterns.len(),
        indicators.readings.adx,
    )
    .await?;
    if confidence < MIN_GENERATION_CONFIDENCE {
        debug!(symbol, ?timeframe, confidence, "signal generator: confidence below threshold");
        return Ok(None);
    }

    let broker_symbol = match symbols_repo.find_symbol(symbol).await? {
        Some(spec) => spec,
        None => {
            debug!(symbol, "signal generator: no broker symbol spec, cannot size TP/SL");
            return Ok(None);
        }
    };

    let latest_tick = ticks_repo.latest(symbol).await?;
    let entry = match &latest_tick {
        Some(tick) => tick.mid(),
        None => candles.last().unwrap().close,
    };
    let spread = latest_tick.as_ref().map(|t| t.spread).unwrap_or_default();

    let tp_sl = match compute_tp_sl(&SmartTpSlInput {
        symbol,
        direction,
        entry,
        atr: indicators.readings.atr,
        bollinger_upper: indicators.readings.bollinger_upper,
        bollinger_lower: indicators.readings.bollinger_lower,
        supertrend_level: indicators.readings.supertrend_level,
        candles: &candles,
        broker: &broker_symbol,
    }) {
        Some(tp_sl) => tp_sl,
        None => {
            debug!(symbol, ?timeframe, "signal generator: no valid R:R TP/SL placement");
            return Ok(None);
        }
    };

    let now = Utc::now();
    let snapshot = json!({
        "votes": indicators.votes,
        "regime": indicators.regime,
        "spread": spread,
        "patterns": detected_patterns,
        "readings": indicators.readings,
    });

    let signal = TradingSignal::new(
        symbol.to_string(),
        timeframe,
        direction,
        confidence,
        entry,
        tp_sl.sl,
        tp_sl.tp,
        snapshot,
        detected_patterns,
        now,
    );

    signals_repo.expire_active_and_insert(&signal).await?;
    info!(symbol, ?timeframe, confidence, ?direction, "signal generated");

    Ok(Some(GeneratedSignal { signal }))
}
