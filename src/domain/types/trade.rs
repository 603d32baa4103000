use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSource {
    Autotrade,
    EaCommand,
    Mt5Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    TpHit,
    SlHit,
    TrailingStop,
    Manual,
    Timeout,
    OpportunityCost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

/// One trade. Invariants (§3): at most one `open` trade per
/// `(account, symbol)`; a closed trade never reopens; `ticket` is the
/// external MT5 id and is globally unique — a collision implies
/// reconciliation drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub account_number: i64,
    pub ticket: i64,
    pub symbol: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub open_price: Decimal,
    pub open_time: DateTime<Utc>,
    pub close_price: Option<Decimal>,
    pub close_time: Option<DateTime<Utc>>,
    pub sl: Decimal,
    pub tp: Decimal,
    pub initial_sl: Decimal,
    pub initial_tp: Decimal,
    pub profit: Decimal,
    pub commission: Decimal,
    pub swap: Decimal,
    pub status: TradeStatus,
    pub source: TradeSource,
    pub command_id: Option<Uuid>,
    pub signal_id: Option<Uuid>,
    pub entry_confidence: Option<f64>,
    pub timeframe: Option<String>,
    pub close_reason: Option<CloseReason>,
    pub mfe: Decimal,
    pub mae: Decimal,
    pub trailing_stop_active: bool,
    pub trailing_stop_moves: u32,
    pub entry_bid: Option<Decimal>,
    pub entry_ask: Option<Decimal>,
    pub entry_spread: Option<Decimal>,
    pub session: Option<String>,
}

impl Trade {
    /// Loss realized if SL is hit right now, in account currency.
    pub fn sl_distance(&self) -> Decimal {
        (self.open_price - self.sl).abs()
    }

    pub fn is_profitable_side(&self, current_price: Decimal) -> bool {
        match self.direction {
            Direction::Buy => current_price > self.open_price,
            Direction::Sell => current_price < self.open_price,
        }
    }

    /// §4.10 progress toward TP, clamped to [0,1].
    pub fn progress_to_tp(&self, current_price: Decimal) -> Decimal {
        let total = (self.tp - self.open_price).abs();
        if total == Decimal::ZERO {
            return Decimal::ZERO;
        }
        let moved = (current_price - self.open_price).abs();
        (moved / total).clamp(Decimal::ZERO, Decimal::ONE)
    }
}

/// Append-only audit log of SL/TP changes, owned by its `Trade` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeHistoryEvent {
    pub id: Uuid,
    pub trade_id: Uuid,
    pub event_type: String,
    pub old_value: Option<Decimal>,
    pub new_value: Option<Decimal>,
    pub reason: String,
    pub source: String,
    pub price_at_change: Option<Decimal>,
    pub spread_at_change: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_trade() -> Trade {
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
            sl: dec!(1.0980),
            tp: dec!(1.1040),
            initial_sl: dec!(1.0980),
            initial_tp: dec!(1.1040),
            profit: Decimal::ZERO,
            commission: Decimal::ZERO,
            swap: Decimal::ZERO,
            status: TradeStatus::Open,
            source: TradeSource::Autotrade,
            command_id: None,
            signal_id: None,
            entry_confidence: Some(72.0),
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

    #[test]
    fn progress_to_tp_at_thirty_percent() {
        let trade = sample_trade();
        // distance entry->tp = 40 pips; 30% = 1.1012
        let p = trade.progress_to_tp(dec!(1.1012));
        assert_eq!(p, dec!(0.30));
    }

    #[test]
    fn sl_distance_is_absolute() {
        let trade = sample_trade();
        assert_eq!(trade.sl_distance(), dec!(0.0020));
    }
}
