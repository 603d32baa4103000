//! Trailing-stop manager (§4.10): a progress-to-TP staged tightener. No
//! per-trade state is kept in memory, every call recomputes the target SL
//! from `Trade` + current tick and either emits a move or does nothing.
//! Rate limiting lives in the caller, keyed off the trade's last-modified
//! timestamp.

use crate::domain::types::{BrokerSymbol, Direction, Tick, Trade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Minimum seconds between two trailing-stop updates on the same trade.
pub const MIN_UPDATE_INTERVAL_SECS: i64 = 5;

const BREAKEVEN_AT_PCT: Decimal = dec!(0.30);
const PARTIAL_AT_PCT: Decimal = dec!(0.50);
const AGGRESSIVE_AT_PCT: Decimal = dec!(0.75);
const NEAR_TP_AT_PCT: Decimal = dec!(0.90);

const MIN_TRAIL_PIPS: f64 = 5.0;
const MAX_TRAIL_PIPS: f64 = 100.0;

/// A proposed SL move, named by the stage that produced it. The stage name
/// feeds directly into the `TradeHistoryEvent.reason` field.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailMove {
    pub new_sl: Decimal,
    pub stage: &'static str,
}

/// Lot/balance-scaled trail distance in pips, clamped to
/// `[MIN_TRAIL_PIPS, MAX_TRAIL_PIPS]`. Larger trades relative to balance get
/// a wider trail so ordinary noise doesn't stop them out early.
fn trail_pips(volume: Decimal, balance: Decimal) -> f64 {
    let volume = volume.to_f64().unwrap_or(0.01);
    let balance = balance.to_f64().unwrap_or(1.0).max(1.0);
    let exposure_ratio = (volume * 10_000.0) / balance;
    (10.0 + exposure_ratio * 20.0).clamp(MIN_TRAIL_PIPS, MAX_TRAIL_PIPS)
}

/// Evaluate one trade against the current tick and return a move if any
/// stage's condition is newly satisfied. Returns `None` if the trade has no
/// TP, progress hasn't reached stage 1, or the computed SL would not be an
/// improvement (the "never moves backward" invariant, §8 invariant 8).
pub fn evaluate(trade: &Trade, tick: &Tick, broker: &BrokerSymbol, balance: Decimal) -> Option<TrailMove> {
    if trade.tp.is_zero() || trade.open_price.is_zero() {
        return None;
    }
    let current_price = match trade.direction {
        Direction::Buy => tick.bid,
        Direction::Sell => tick.ask,
    };
    if !trade.is_profitable_side(current_price) {
        return None;
    }
    let progress = trade.progress_to_tp(current_price);
    if progress < BREAKEVEN_AT_PCT {
        return None;
    }

    let point = broker.point();
    let pips = trail_pips(trade.volume, balance);
    let trail_distance = Decimal::try_from(pips).unwrap_or(dec!(10)) * point * dec!(10);

    let (distance, stage): (Decimal, &'static str) = if progress >= NEAR_TP_AT_PCT {
        (trail_distance * dec!(0.4), "NEAR_TP_TRAIL")
    } else if progress >= AGGRESSIVE_AT_PCT {
        (trail_distance * dec!(0.6), "AGGRESSIVE_TRAIL")
    } else if progress >= PARTIAL_AT_PCT {
        (trail_distance, "PARTIAL_TRAIL")
    } else {
        // Stage 1: break-even. Offset by spread plus a small buffer so the
        // move itself doesn't immediately get stopped out by spread noise.
        let offset = tick.spread + point * dec!(2);
        let breakeven = match trade.direction {
            Direction::Buy => trade.open_price + offset,
            Direction::Sell => trade.open_price - offset,
        };
        return improve_if_valid(trade, breakeven, current_price, "BREAKEVEN");
    };

    let candidate = match trade.direction {
        Direction::Buy => current_price - distance,
        Direction::Sell => current_price + distance,
    };
    improve_if_valid(trade, candidate, current_price, stage)
}

/// Applies the "only move forward", "never cross entry in the losing
/// direction", and "must clear the chatter floor" invariants shared by all
/// four stages.
fn improve_if_valid(trade: &Trade, candidate: Decimal, current_price: Decimal, stage: &'static str) -> Option<TrailMove> {
    let improves = match trade.direction {
        Direction::Buy => candidate > trade.sl,
        Direction::Sell => candidate < trade.sl,
    };
    if !improves {
        return None;
    }

    let past_entry = match trade.direction {
        Direction::Buy => candidate >= trade.open_price,
        Direction::Sell => candidate <= trade.open_price,
    };
    if !past_entry && stage != "BREAKEVEN" {
        return None;
    }

    let current_profit_distance = (current_price - trade.open_price).abs();
    let move_size = (candidate - trade.sl).abs();
    let min_delta = (current_profit_distance * dec!(0.30)).max(chatter_floor(trade));
    if move_size < min_delta {
        return None;
    }

    Some(TrailMove { new_sl: candidate, stage })
}

/// Minimum absolute move (anti-chatter floor): roughly 3 points, scaled for
/// symbols quoted above 100 (indices, some metals) vs. forex-style symbols.
fn chatter_floor(trade: &Trade) -> Decimal {
    if trade.open_price >= dec!(100) {
        dec!(0.03)
    } else {
        dec!(0.0003)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

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

    fn buy_trade(sl: Decimal, tp: Decimal) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            account_number: 1,
            ticket: 100,
            symbol: "EURUSD".into(),
            direction: Direction::Buy,
            volume: dec!(0.1),
            open_price: dec!(1.1000),
            open_time: Utc::now(),
            close_price: None,
            close_time: None,
            sl,
            tp,
            initial_sl: sl,
            initial_tp: tp,
            profit: Decimal::ZERO,
            commission: Decimal::ZERO,
            swap: Decimal::ZERO,
            status: crate::domain::types::TradeStatus::Open,
            source: crate::domain::types::TradeSource::Autotrade,
            command_id: None,
            signal_id: None,
            entry_confidence: Some(70.0),
            timeframe: Some("H1".into()),
            close_reason: None,
            mfe: Decimal::ZERO,
            mae: Decimal::ZERO,
            trailing_stop_active: false,
            trailing_stop_moves: 0,
            entry_bid: None,
            entry_ask: None,
            entry_spread: None,
            session: None,
        }
    }

    fn tick(bid: Decimal) -> Tick {
        Tick {
            symbol: "EURUSD".into(),
            bid,
            ask: bid + dec!(0.0001),
            spread: dec!(0.0001),
            volume: dec!(1),
            timestamp: Utc::now(),
            tradeable: true,
        }
    }

    #[test]
    fn below_breakeven_progress_does_nothing() {
        let trade = buy_trade(dec!(1.0980), dec!(1.1040));
        let move_ = evaluate(&trade, &tick(dec!(1.1005)), &broker(), dec!(1000));
        assert!(move_.is_none());
    }

    #[test]
    fn thirty_percent_progress_moves_sl_to_breakeven() {
        // entry 1.1000, tp 1.1040 -> 30% = 1.1012
        let trade = buy_trade(dec!(1.0980), dec!(1.1040));
        let move_ = evaluate(&trade, &tick(dec!(1.1013)), &broker(), dec!(1000)).expect("should trail");
        assert_eq!(move_.stage, "BREAKEVEN");
        assert!(move_.new_sl > trade.open_price);
    }

    #[test]
    fn sl_never_moves_backward() {
        let mut trade = buy_trade(dec!(1.0980), dec!(1.1040));
        let first = evaluate(&trade, &tick(dec!(1.1013)), &broker(), dec!(1000)).unwrap();
        trade.sl = first.new_sl;
        // Price retraces; a candidate worse than the current SL must be rejected.
        let second = evaluate(&trade, &tick(dec!(1.1005)), &broker(), dec!(1000));
        if let Some(m) = second {
            assert!(m.new_sl > trade.sl);
        }
    }

    #[test]
    fn sell_trade_trails_downward() {
        let mut trade = buy_trade(dec!(1.1020), dec!(1.0960));
        trade.direction = Direction::Sell;
        trade.open_price = dec!(1.1000);
        let t = Tick {
            symbol: "EURUSD".into(),
            bid: dec!(1.0987),
            ask: dec!(1.0988),
            spread: dec!(0.0001),
            volume: dec!(1),
            timestamp: Utc::now(),
            tradeable: true,
        };
        let move_ = evaluate(&trade, &t, &broker(), dec!(1000)).expect("should trail");
        assert!(move_.new_sl < trade.sl);
    }

    #[test]
    fn no_tp_set_never_trails() {
        let trade = buy_trade(dec!(1.0980), Decimal::ZERO);
        let move_ = evaluate(&trade, &tick(dec!(1.1030)), &broker(), dec!(1000));
        assert!(move_.is_none());
    }
}
