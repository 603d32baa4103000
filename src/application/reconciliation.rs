//! Reconciliation loop (§4.11, §6 `/api/trades/sync`). Runs periodically
//! (~30s) and on every bulk sync call: cross-checks server trade state
//! against the terminal's report and resolves drift. Every close discovered
//! here also drives the protection layer (§4.12) and adaptive symbol config
//! (§4.13) — a trade can close from the terminal side without ever passing
//! back through the decision pipeline.

use crate::application::adaptive_symbol_config;
use crate::domain::ports::{ProtectionRepository, SymbolConfigRepository, SymbolRepository, TickRepository, TradeRepository};
use crate::domain::types::{CloseReason, Direction, Trade, TradeHistoryEvent, TradeSource, TradeStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The terminal's view of one position/closed trade, as reported by
/// `/api/trades/sync`.
#[derive(Debug, Clone)]
pub struct TerminalTradeReport {
    pub ticket: i64,
    pub symbol: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub open_price: Decimal,
    pub open_time: DateTime<Utc>,
    pub sl: Decimal,
    pub tp: Decimal,
    pub profit: Decimal,
    pub commission: Decimal,
    pub swap: Decimal,
    pub is_open: bool,
    pub close_price: Option<Decimal>,
    pub close_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ReconciliationSummary {
    pub inserted: usize,
    pub closed: usize,
    pub updated: usize,
}

/// Tolerance for matching a close price against SL/TP, in points.
const CLOSE_PRICE_TOLERANCE_POINTS: i64 = 3;

/// Classifies why a trade closed by comparing the close price to its SL/TP
/// within a small tolerance, falling back to the trailing-stop flag, then
/// to manual (§4.11).
fn classify_close_reason(trade: &Trade, close_price: Decimal, point: Decimal) -> CloseReason {
    let tolerance = point * Decimal::from(CLOSE_PRICE_TOLERANCE_POINTS);
    if (close_price - trade.sl).abs() <= tolerance {
        return if trade.trailing_stop_active { CloseReason::TrailingStop } else { CloseReason::SlHit };
    }
    if (close_price - trade.tp).abs() <= tolerance {
        return CloseReason::TpHit;
    }
    CloseReason::Manual
}

/// Runs the protection layer and adaptive symbol config updates a closed
/// trade must trigger, regardless of which code path discovered the close.
#[allow(clippy::too_many_arguments)]
async fn on_trade_closed(
    protection: &Arc<dyn ProtectionRepository>,
    symbol_configs: &Arc<dyn SymbolConfigRepository>,
    account_number: i64,
    symbol: &str,
    profit: Decimal,
    current_equity: Decimal,
    reason: CloseReason,
    sl_cooldown_secs: i64,
    sl_cooldown_extended_secs: i64,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut state = protection.get_or_create(account_number, current_equity).await?;
    let events = crate::application::risk_management::protection::apply_trade_close(&mut state, profit, current_equity, now);
    protection.save(&state).await?;
    for event in events {
        warn!(account_number, ?event, "protection layer tripped on trade close");
    }

    let mut config = symbol_configs.get_or_create(account_number, symbol).await?;
    adaptive_symbol_config::apply_trade_close(&mut config, profit > Decimal::ZERO, now);
    if reason == CloseReason::SlHit {
        adaptive_symbol_config::apply_sl_hit(&mut config, now, sl_cooldown_secs, sl_cooldown_extended_secs);
    }
    symbol_configs.save(&config).await?;

    Ok(())
}

/// `full_sync`: whether `terminal` is the terminal's *complete* view of its
/// open positions. Only then may an absent ticket be inferred as closed —
/// a single-trade `/api/trades/update` delta must not trigger that sweep.
#[allow(clippy::too_many_arguments)]
pub async fn reconcile_account(
    trades: &Arc<dyn TradeRepository>,
    ticks: &Arc<dyn TickRepository>,
    symbols: &Arc<dyn SymbolRepository>,
    protection: &Arc<dyn ProtectionRepository>,
    symbol_configs: &Arc<dyn SymbolConfigRepository>,
    account_number: i64,
    current_equity: Decimal,
    terminal: &[TerminalTradeReport],
    full_sync: bool,
    sl_cooldown_secs: i64,
    sl_cooldown_extended_secs: i64,
    now: DateTime<Utc>,
) -> anyhow::Result<ReconciliationSummary> {
    let mut summary = ReconciliationSummary::default();
    let reported_tickets: HashSet<i64> = terminal.iter().map(|t| t.ticket).collect();

    for report in terminal {
        match trades.find_by_ticket(report.ticket).await? {
            None => {
                if report.is_open {
                    let trade = Trade {
                        id: Uuid::new_v4(),
                        account_number,
                        ticket: report.ticket,
                        symbol: report.symbol.clone(),
                        direction: report.direction,
                        volume: report.volume,
                        open_price: report.open_price,
                        open_time: report.open_time,
                        close_price: None,
                        close_time: None,
                        sl: report.sl,
                        tp: report.tp,
                        initial_sl: report.sl,
                        initial_tp: report.tp,
                        profit: report.profit,
                        commission: report.commission,
                        swap: report.swap,
                        status: TradeStatus::Open,
                        source: TradeSource::Mt5Manual,
                        command_id: None,
                        signal_id: None,
                        entry_confidence: None,
                        timeframe: None,
                        close_reason: None,
                        mfe: Decimal::ZERO,
                        mae: Decimal::ZERO,
                        trailing_stop_active: false,
                        trailing_stop_moves: 0,
                        entry_bid: None,
                        entry_ask: None,
                        entry_spread: None,
                        session: None,
                    };
                    if let Err(e) = trades.insert_open(&trade).await {
                        warn!("reconciliation: could not insert terminal-only trade {}: {}", report.ticket, e);
                    } else {
                        summary.inserted += 1;
                    }
                }
            }
            Some(existing) if existing.status == TradeStatus::Open => {
                if !report.is_open {
                    let close_price = report.close_price.unwrap_or(existing.open_price);
                    let point = symbols.find_symbol(&existing.symbol).await?.map(|s| s.point()).unwrap_or(Decimal::new(1, 4));
                    let reason = classify_close_reason(&existing, close_price, point);
                    trades.close(existing.id, close_price, report.close_time.unwrap_or(now), report.profit, reason).await?;
                    on_trade_closed(
                        protection,
                        symbol_configs,
                        account_number,
                        &existing.symbol,
                        report.profit,
                        current_equity,
                        reason,
                        sl_cooldown_secs,
                        sl_cooldown_extended_secs,
                        now,
                    )
                    .await?;
                    summary.closed += 1;
                } else if existing.sl != report.sl || existing.tp != report.tp {
                    trades.update_sl_tp(existing.id, report.sl, report.tp).await?;
                    trades
                        .append_history_event(&TradeHistoryEvent {
                            id: Uuid::new_v4(),
                            trade_id: existing.id,
                            event_type: "SL_TP_DRIFT".into(),
                            old_value: Some(existing.sl),
                            new_value: Some(report.sl),
                            reason: "reconciliation: terminal SL/TP differs from server record".into(),
                            source: "reconciliation".into(),
                            price_at_change: None,
                            spread_at_change: None,
                            timestamp: now,
                        })
                        .await?;
                    summary.updated += 1;
                }
            }
            Some(_closed_already) => {
                // Already closed on our side; terminal re-reporting it is a no-op.
            }
        }
    }

    if !full_sync {
        return Ok(summary);
    }

    for open_trade in trades.open_trades_for_account(account_number).await? {
        if !reported_tickets.contains(&open_trade.ticket) {
            let close_price = ticks.latest(&open_trade.symbol).await.ok().flatten().map(|t| t.mid()).unwrap_or(open_trade.open_price);
            let point = symbols.find_symbol(&open_trade.symbol).await?.map(|s| s.point()).unwrap_or(Decimal::new(1, 4));
            let reason = classify_close_reason(&open_trade, close_price, point);
            trades.close(open_trade.id, close_price, now, open_trade.profit, reason).await?;
            on_trade_closed(
                protection,
                symbol_configs,
                account_number,
                &open_trade.symbol,
                open_trade.profit,
                current_equity,
                reason,
                sl_cooldown_secs,
                sl_cooldown_extended_secs,
                now,
            )
            .await?;
            summary.closed += 1;
            info!("reconciliation: closed trade {} absent from terminal report", open_trade.ticket);
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_trade(sl: Decimal, tp: Decimal, trailing: bool) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            account_number: 1,
            ticket: 1,
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
            status: TradeStatus::Open,
            source: TradeSource::Autotrade,
            command_id: None,
            signal_id: None,
            entry_confidence: None,
            timeframe: None,
            close_reason: None,
            mfe: Decimal::ZERO,
            mae: Decimal::ZERO,
            trailing_stop_active: trailing,
            trailing_stop_moves: if trailing { 2 } else { 0 },
            entry_bid: None,
            entry_ask: None,
            entry_spread: None,
            session: None,
        }
    }

    #[test]
    fn close_near_sl_classifies_as_sl_hit() {
        let trade = sample_trade(dec!(1.0980), dec!(1.1040), false);
        let reason = classify_close_reason(&trade, dec!(1.0980), dec!(0.00001));
        assert_eq!(reason, CloseReason::SlHit);
    }

    #[test]
    fn close_near_sl_with_trailing_active_classifies_as_trailing_stop() {
        let trade = sample_trade(dec!(1.0980), dec!(1.1040), true);
        let reason = classify_close_reason(&trade, dec!(1.0980), dec!(0.00001));
        assert_eq!(reason, CloseReason::TrailingStop);
    }

    #[test]
    fn close_near_tp_classifies_as_tp_hit() {
        let trade = sample_trade(dec!(1.0980), dec!(1.1040), false);
        let reason = classify_close_reason(&trade, dec!(1.1040), dec!(0.00001));
        assert_eq!(reason, CloseReason::TpHit);
    }

    #[test]
    fn close_away_from_either_classifies_as_manual() {
        let trade = sample_trade(dec!(1.0980), dec!(1.1040), false);
        let reason = classify_close_reason(&trade, dec!(1.1010), dec!(0.00001));
        assert_eq!(reason, CloseReason::Manual);
    }
}
