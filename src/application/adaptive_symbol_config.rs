//! Adaptive symbol config (§4.13). Called once per closed trade; nudges the
//! confidence bar and position-size multiplier for that `(account, symbol)`
//! based on recent outcomes, and auto-pauses symbols on a losing streak.
//!
//! `rolling_winrate` is stored as a single scalar rather than a 20-trade
//! history buffer (no such buffer exists in `SymbolTradingConfig`), updated
//! as an exponential moving average with weight `1/20` per trade — this
//! approximates a 20-trade rolling window without persisting per-trade
//! history.

use crate::domain::types::{SymbolStatus, SymbolTradingConfig};
use chrono::{DateTime, Duration, Utc};

const ROLLING_WINDOW: f64 = 20.0;
const LOW_WINRATE_THRESHOLD: f64 = 40.0;
const HIGH_WINRATE_THRESHOLD: f64 = 65.0;
const AUTO_PAUSE_CONSECUTIVE_LOSSES: u32 = 3;
const AUTO_PAUSE_DURATION_HOURS: i64 = 24;

fn update_rolling_winrate(current: f64, won: bool) -> f64 {
    let outcome = if won { 100.0 } else { 0.0 };
    current + (outcome - current) / ROLLING_WINDOW
}

/// Applies one closed trade's outcome to the config in place. `profitable`
/// is the trade's win/loss classification (profit > 0).
pub fn apply_trade_close(config: &mut SymbolTradingConfig, profitable: bool, now: DateTime<Utc>) {
    config.rolling_winrate = update_rolling_winrate(config.rolling_winrate, profitable);

    if profitable {
        config.consecutive_wins += 1;
        config.consecutive_losses = 0;

        let mut delta = 1.0;
        if config.rolling_winrate > HIGH_WINRATE_THRESHOLD {
            delta += 2.0;
        }
        config.min_confidence_threshold = (config.min_confidence_threshold - delta).max(SymbolTradingConfig::MIN_CONFIDENCE_FLOOR);

        if config.consecutive_wins >= 3 {
            config.risk_multiplier = (config.risk_multiplier + 0.05).min(SymbolTradingConfig::RISK_MULTIPLIER_CEIL);
        }
    } else {
        config.consecutive_losses += 1;
        config.consecutive_wins = 0;

        let mut delta = 5.0;
        if config.rolling_winrate < LOW_WINRATE_THRESHOLD {
            delta += 5.0;
        }
        config.min_confidence_threshold = (config.min_confidence_threshold + delta).min(SymbolTradingConfig::MIN_CONFIDENCE_CEIL);

        if config.consecutive_losses >= 2 {
            config.risk_multiplier = (config.risk_multiplier - 0.10).max(SymbolTradingConfig::RISK_MULTIPLIER_FLOOR);
        }
    }

    let should_pause = config.consecutive_losses >= AUTO_PAUSE_CONSECUTIVE_LOSSES || config.rolling_winrate < LOW_WINRATE_THRESHOLD;
    if should_pause && config.status == SymbolStatus::Active {
        config.status = SymbolStatus::Paused;
        config.pause_reason = Some(if config.consecutive_losses >= AUTO_PAUSE_CONSECUTIVE_LOSSES {
            format!("{} consecutive losses", config.consecutive_losses)
        } else {
            format!("rolling win rate {:.1}% below {:.0}%", config.rolling_winrate, LOW_WINRATE_THRESHOLD)
        });
        config.paused_until = Some(now + Duration::hours(AUTO_PAUSE_DURATION_HOURS));
    }
}

/// SL-hit cooldown (§4.12): pauses the symbol after a stop-loss close. A
/// second SL hit within 4 hours of the first extends the cooldown from
/// `cooldown_secs` to `extended_cooldown_secs` instead of the base duration.
pub fn apply_sl_hit(config: &mut SymbolTradingConfig, now: DateTime<Utc>, cooldown_secs: i64, extended_cooldown_secs: i64) {
    let within_window = config.last_sl_hit_at.map(|prev| now - prev <= Duration::hours(4)).unwrap_or(false);
    let cooldown = if within_window { extended_cooldown_secs } else { cooldown_secs };

    config.last_sl_hit_at = Some(now);
    config.status = SymbolStatus::Paused;
    config.pause_reason = Some("sl_hit_cooldown".into());
    config.paused_until = Some(now + Duration::seconds(cooldown));
}

/// Auto-resume check: called before using a paused config. Clears the pause
/// once the window elapses; a fresh signal meeting the (now higher)
/// confidence bar is handled upstream by the decision pipeline itself,
/// which reads `min_confidence_threshold` directly.
pub fn maybe_resume(config: &mut SymbolTradingConfig, now: DateTime<Utc>) {
    if config.status == SymbolStatus::Paused {
        if let Some(until) = config.paused_until {
            if now >= until {
                config.status = SymbolStatus::Active;
                config.pause_reason = None;
                config.paused_until = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SymbolTradingConfig {
        SymbolTradingConfig::new(1, "EURUSD".into())
    }

    #[test]
    fn loss_raises_confidence_threshold() {
        let mut c = fresh();
        let before = c.min_confidence_threshold;
        apply_trade_close(&mut c, false, Utc::now());
        assert!(c.min_confidence_threshold > before);
    }

    #[test]
    fn win_lowers_confidence_threshold() {
        let mut c = fresh();
        c.min_confidence_threshold = 60.0;
        apply_trade_close(&mut c, true, Utc::now());
        assert!(c.min_confidence_threshold < 60.0);
    }

    #[test]
    fn confidence_threshold_respects_ceiling() {
        let mut c = fresh();
        c.min_confidence_threshold = 79.0;
        for _ in 0..5 {
            apply_trade_close(&mut c, false, Utc::now());
        }
        assert!(c.min_confidence_threshold <= SymbolTradingConfig::MIN_CONFIDENCE_CEIL);
    }

    #[test]
    fn three_consecutive_losses_auto_pauses() {
        let mut c = fresh();
        let now = Utc::now();
        apply_trade_close(&mut c, false, now);
        apply_trade_close(&mut c, false, now);
        apply_trade_close(&mut c, false, now);
        assert_eq!(c.status, SymbolStatus::Paused);
        assert!(c.paused_until.is_some());
    }

    #[test]
    fn win_streak_raises_risk_multiplier() {
        let mut c = fresh();
        let now = Utc::now();
        apply_trade_close(&mut c, true, now);
        apply_trade_close(&mut c, true, now);
        apply_trade_close(&mut c, true, now);
        assert!(c.risk_multiplier > 1.0);
    }

    #[test]
    fn first_sl_hit_pauses_for_base_cooldown() {
        let mut c = fresh();
        let now = Utc::now();
        apply_sl_hit(&mut c, now, 3600, 14400);
        assert_eq!(c.status, SymbolStatus::Paused);
        assert_eq!(c.paused_until, Some(now + Duration::seconds(3600)));
    }

    #[test]
    fn second_sl_hit_within_four_hours_extends_cooldown() {
        let mut c = fresh();
        let first = Utc::now();
        apply_sl_hit(&mut c, first, 3600, 14400);
        let second = first + Duration::hours(1);
        apply_sl_hit(&mut c, second, 3600, 14400);
        assert_eq!(c.paused_until, Some(second + Duration::seconds(14400)));
    }

    #[test]
    fn sl_hit_after_window_uses_base_cooldown_again() {
        let mut c = fresh();
        let first = Utc::now();
        apply_sl_hit(&mut c, first, 3600, 14400);
        let second = first + Duration::hours(5);
        apply_sl_hit(&mut c, second, 3600, 14400);
        assert_eq!(c.paused_until, Some(second + Duration::seconds(3600)));
    }

    #[test]
    fn resume_clears_pause_after_window() {
        let mut c = fresh();
        c.status = SymbolStatus::Paused;
        c.pause_reason = Some("test".into());
        c.paused_until = Some(Utc::now() - Duration::hours(1));
        maybe_resume(&mut c, Utc::now());
        assert_eq!(c.status, SymbolStatus::Active);
        assert!(c.pause_reason.is_none());
    }
}
