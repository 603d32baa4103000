//! Protection layer state transitions (§4.12). Pure mutations over
//! `ProtectionState` — persistence is the caller's job (via
//! `ProtectionRepository`).

use crate::domain::types::ProtectionState;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionEvent {
    DailyLimitReached,
    CircuitBreakerTripped,
}

/// §4.12 daily reset, applied before any other check on a new UTC day.
pub fn roll_daily(state: &mut ProtectionState, today: NaiveDate) {
    state.roll_to_day(today);
}

/// §4.12 "on trade close": updates `daily_pnl` and trips the daily /
/// total-drawdown breakers if thresholds are crossed.
pub fn apply_trade_close(state: &mut ProtectionState, profit: Decimal, current_equity: Decimal, now: DateTime<Utc>) -> Vec<ProtectionEvent> {
    let mut events = Vec::new();
    state.daily_pnl += profit;

    let daily_pnl_f = state.daily_pnl.to_f64().unwrap_or(0.0);
    let balance_f = state.initial_balance.to_f64().unwrap_or(1.0).max(1.0);
    let pct_breach = (daily_pnl_f / balance_f) * 100.0 <= -state.max_daily_loss_percent;
    let eur_breach = state.max_daily_loss_eur.map(|cap| state.daily_pnl <= -cap).unwrap_or(false);

    if !state.limit_reached && (pct_breach || eur_breach) {
        state.limit_reached = true;
        state.auto_trading_disabled_at = Some(now);
        events.push(ProtectionEvent::DailyLimitReached);
    }

    if !state.circuit_breaker_tripped {
        let equity_f = current_equity.to_f64().unwrap_or(balance_f);
        let drawdown_pct = ((balance_f - equity_f) / balance_f) * 100.0;
        if drawdown_pct >= state.max_total_drawdown_percent {
            state.circuit_breaker_tripped = true;
            events.push(ProtectionEvent::CircuitBreakerTripped);
        }
    }

    events
}

/// §4.12 command-failure circuit breaker: records one EA command outcome.
/// Returns `true` the moment the breaker trips (consecutive failures cross
/// `cb_threshold`); a success resets the counter unconditionally.
pub fn record_command_result(state: &mut ProtectionState, succeeded: bool, now: DateTime<Utc>, cb_threshold: u32) -> bool {
    if succeeded {
        state.consecutive_command_failures = 0;
        return false;
    }
    state.consecutive_command_failures += 1;
    if state.consecutive_command_failures >= cb_threshold && state.command_breaker_tripped_at.is_none() {
        state.command_breaker_tripped_at = Some(now);
        return true;
    }
    false
}

/// Auto-resets the command-failure breaker once `cb_cooldown_secs` has
/// elapsed since it tripped. Unlike `circuit_breaker_tripped`, this breaker
/// is not a hard stop and does not require manual intervention.
pub fn maybe_reset_command_breaker(state: &mut ProtectionState, now: DateTime<Utc>, cb_cooldown_secs: i64) {
    if let Some(tripped_at) = state.command_breaker_tripped_at {
        if now - tripped_at >= Duration::seconds(cb_cooldown_secs) {
            state.command_breaker_tripped_at = None;
            state.consecutive_command_failures = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn state() -> ProtectionState {
        ProtectionState::new(1, dec!(1000), NaiveDate::from_ymd_opt(2026, 7, 31).unwrap())
    }

    #[test]
    fn daily_loss_pct_trips_limit() {
        let mut s = state();
        let now = Utc::now();
        let events = apply_trade_close(&mut s, dec!(-25), dec!(975), now);
        assert!(events.contains(&ProtectionEvent::DailyLimitReached));
        assert!(s.limit_reached);
        assert_eq!(s.auto_trading_disabled_at, Some(now));
    }

    #[test]
    fn total_drawdown_trips_circuit_breaker() {
        let mut s = state();
        let now = Utc::now();
        let events = apply_trade_close(&mut s, dec!(-250), dec!(750), now);
        assert!(events.contains(&ProtectionEvent::CircuitBreakerTripped));
        assert!(s.circuit_breaker_tripped);
    }

    #[test]
    fn small_profitable_close_trips_nothing() {
        let mut s = state();
        let events = apply_trade_close(&mut s, dec!(15), dec!(1015), Utc::now());
        assert!(events.is_empty());
    }

    #[test]
    fn command_breaker_trips_after_threshold_consecutive_failures() {
        let mut s = state();
        let now = Utc::now();
        for _ in 0..4 {
            assert!(!record_command_result(&mut s, false, now, 5));
        }
        assert!(record_command_result(&mut s, false, now, 5));
        assert!(s.command_breaker_tripped_at.is_some());
    }

    #[test]
    fn command_breaker_success_resets_counter() {
        let mut s = state();
        let now = Utc::now();
        record_command_result(&mut s, false, now, 5);
        record_command_result(&mut s, false, now, 5);
        record_command_result(&mut s, true, now, 5);
        assert_eq!(s.consecutive_command_failures, 0);
    }

    #[test]
    fn command_breaker_auto_resets_after_cooldown() {
        let mut s = state();
        let tripped_at = Utc::now() - Duration::seconds(301);
        s.command_breaker_tripped_at = Some(tripped_at);
        s.consecutive_command_failures = 5;
        maybe_reset_command_breaker(&mut s, Utc::now(), 300);
        assert!(s.command_breaker_tripped_at.is_none());
        assert_eq!(s.consecutive_command_failures, 0);
    }
}
