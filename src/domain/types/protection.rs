use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 1:1 with account (§3, §4.12). When `protection_enabled`, no new trade
/// may open without consulting this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionState {
    pub account_number: i64,
    pub protection_enabled: bool,
    pub max_daily_loss_percent: f64,
    pub max_daily_loss_eur: Option<Decimal>,
    pub max_total_drawdown_percent: f64,
    pub pause_after_consecutive_losses: u32,
    pub circuit_breaker_tripped: bool,
    pub tracking_date: NaiveDate,
    pub daily_pnl: Decimal,
    pub limit_reached: bool,
    pub auto_trading_disabled_at: Option<DateTime<Utc>>,
    pub initial_balance: Decimal,

    /// Consecutive failed EA command responses (§4.12 circuit breaker).
    /// Resets to 0 on the next success or once the cooldown below expires.
    pub consecutive_command_failures: u32,
    /// Set when `consecutive_command_failures` crosses the threshold;
    /// cleared automatically after `CB_COOLDOWN_SECS`, unlike
    /// `circuit_breaker_tripped` which requires manual reset.
    pub command_breaker_tripped_at: Option<DateTime<Utc>>,
}

impl ProtectionState {
    pub fn new(account_number: i64, initial_balance: Decimal, today: NaiveDate) -> Self {
        Self {
            account_number,
            protection_enabled: true,
            max_daily_loss_percent: 2.0,
            max_daily_loss_eur: None,
            max_total_drawdown_percent: 20.0,
            pause_after_consecutive_losses: 3,
            circuit_breaker_tripped: false,
            tracking_date: today,
            daily_pnl: Decimal::ZERO,
            limit_reached: false,
            auto_trading_disabled_at: None,
            initial_balance,
            consecutive_command_failures: 0,
            command_breaker_tripped_at: None,
        }
    }

    /// §4.12 daily reset: if `tracking_date != today`, reset `daily_pnl`
    /// and `limit_reached` (the hard circuit breaker is NOT reset here —
    /// it requires manual reset per §4.12).
    pub fn roll_to_day(&mut self, today: NaiveDate) {
        if self.tracking_date != today {
            self.tracking_date = today;
            self.daily_pnl = Decimal::ZERO;
            self.limit_reached = false;
        }
    }

    pub fn blocks_new_trades(&self) -> bool {
        self.protection_enabled
            && (self.circuit_breaker_tripped
                || self.command_breaker_tripped_at.is_some()
                || self.limit_reached
                || self.auto_trading_disabled_at.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn daily_reset_clears_pnl_and_limit_but_not_breaker() {
        let day1 = NaiveDate::from_ymd_opt(2026, 7, 30).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        let mut state = ProtectionState::new(1, dec!(1000), day1);
        state.daily_pnl = dec!(-50);
        state.limit_reached = true;
        state.circuit_breaker_tripped = true;

        state.roll_to_day(day2);

        assert_eq!(state.daily_pnl, Decimal::ZERO);
        assert!(!state.limit_reached);
        assert!(state.circuit_breaker_tripped, "hard breaker requires manual reset");
    }

    #[test]
    fn no_reset_within_same_day() {
        let day1 = NaiveDate::from_ymd_opt(2026, 7, 30).unwrap();
        let mut state = ProtectionState::new(1, dec!(1000), day1);
        state.daily_pnl = dec!(-10);
        state.roll_to_day(day1);
        assert_eq!(state.daily_pnl, dec!(-10));
    }
}
