//! `Config::from_env()` — every knob is an environment variable with a
//! sane default, following the teacher's convention of
//! `env::var(...).unwrap_or_else(...).parse().context(...)`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,

    pub control_port: u16,
    pub tick_port: u16,
    pub trade_port: u16,
    pub log_port: u16,

    pub commands_per_poll: usize,
    pub command_timeout_secs: i64,
    pub command_sweep_interval_secs: u64,
    pub tick_flush_interval_ms: u64,
    pub watchdog_interval_secs: u64,
    pub watchdog_heartbeat_lost_secs: i64,
    pub watchdog_tick_stale_secs: i64,
    pub signal_generator_interval_secs: u64,
    pub decision_pipeline_interval_secs: u64,
    pub trailing_stop_interval_secs: u64,
    pub reconciliation_interval_secs: u64,
    pub retention_sweep_interval_secs: u64,
    pub decision_log_retention_hours: i64,

    pub max_signal_age_secs: i64,
    pub default_min_confidence: f64,
    pub max_open_positions_global: usize,
    pub max_open_positions_per_symbol: usize,
    pub max_open_positions_per_timeframe: usize,
    pub max_spread_points: i32,

    pub risk_per_trade_percent: f64,
    pub max_sl_risk_percent: f64,

    pub max_daily_loss_percent: f64,
    pub max_total_drawdown_percent: f64,
    pub pause_after_consecutive_losses: u32,

    pub cb_threshold: u32,
    pub cb_cooldown_secs: i64,
    pub sl_cooldown_secs: i64,
    pub sl_cooldown_extended_secs: i64,

    pub trailing_min_trail_pips: f64,
    pub trailing_max_trail_pips: f64,

    pub observability_enabled: bool,
    pub observability_interval_secs: u64,

    pub worker_backoff_cap_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/mt5backend.db".to_string());
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let control_port = parse_env("CONTROL_PORT", "9900")?;
        let tick_port = parse_env("TICK_PORT", "9901")?;
        let trade_port = parse_env("TRADE_PORT", "9902")?;
        let log_port = parse_env("LOG_PORT", "9903")?;

        let commands_per_poll = parse_env("COMMANDS_PER_POLL", "10")?;
        let command_timeout_secs = parse_env("COMMAND_TIMEOUT_SECS", "300")?;
        let command_sweep_interval_secs = parse_env("COMMAND_SWEEP_INTERVAL_SECS", "60")?;
        let tick_flush_interval_ms = parse_env("TICK_FLUSH_INTERVAL_MS", "1000")?;
        let watchdog_interval_secs = parse_env("WATCHDOG_INTERVAL_SECS", "60")?;
        let watchdog_heartbeat_lost_secs = parse_env("WATCHDOG_HEARTBEAT_LOST_SECS", "300")?;
        let watchdog_tick_stale_secs = parse_env("WATCHDOG_TICK_STALE_SECS", "180")?;
        let signal_generator_interval_secs = parse_env("SIGNAL_GENERATOR_INTERVAL_SECS", "60")?;
        let decision_pipeline_interval_secs = parse_env("DECISION_PIPELINE_INTERVAL_SECS", "60")?;
        let trailing_stop_interval_secs = parse_env("TRAILING_STOP_INTERVAL_SECS", "5")?;
        let reconciliation_interval_secs = parse_env("RECONCILIATION_INTERVAL_SECS", "30")?;
        let retention_sweep_interval_secs = parse_env("RETENTION_SWEEP_INTERVAL_SECS", "86400")?;
        let decision_log_retention_hours = parse_env("DECISION_LOG_RETENTION_HOURS", "48")?;

        let max_signal_age_secs = parse_env("MAX_SIGNAL_AGE_SECS", "300")?;
        let default_min_confidence = parse_env("DEFAULT_MIN_CONFIDENCE", "50.0")?;
        let max_open_positions_global = parse_env("MAX_OPEN_POSITIONS_GLOBAL", "20")?;
        let max_open_positions_per_symbol = parse_env("MAX_OPEN_POSITIONS_PER_SYMBOL", "1")?;
        let max_open_positions_per_timeframe = parse_env("MAX_OPEN_POSITIONS_PER_TIMEFRAME", "1")?;
        let max_spread_points = parse_env("MAX_SPREAD_POINTS", "30")?;

        let risk_per_trade_percent = parse_env("RISK_PER_TRADE_PERCENT", "1.0")?;
        let max_sl_risk_percent = parse_env("MAX_SL_RISK_PERCENT", "2.0")?;

        let max_daily_loss_percent = parse_env("MAX_DAILY_LOSS_PERCENT", "2.0")?;
        let max_total_drawdown_percent = parse_env("MAX_TOTAL_DRAWDOWN_PERCENT", "20.0")?;
        let pause_after_consecutive_losses = parse_env("PAUSE_AFTER_CONSECUTIVE_LOSSES", "3")?;

        let cb_threshold = parse_env("CB_THRESHOLD", "5")?;
        let cb_cooldown_secs = parse_env("CB_COOLDOWN_SECS", "300")?;
        let sl_cooldown_secs = parse_env("SL_COOLDOWN_SECS", "3600")?;
        let sl_cooldown_extended_secs = parse_env("SL_COOLDOWN_EXTENDED_SECS", "14400")?;

        let trailing_min_trail_pips = parse_env("TRAILING_MIN_TRAIL_PIPS", "10.0")?;
        let trailing_max_trail_pips = parse_env("TRAILING_MAX_TRAIL_PIPS", "100.0")?;

        let observability_enabled = env::var("OBSERVABILITY_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);
        let observability_interval_secs = parse_env("OBSERVABILITY_INTERVAL_SECS", "60")?;

        let worker_backoff_cap_secs = parse_env("WORKER_BACKOFF_CAP_SECS", "300")?;

        Ok(Self {
            database_url,
            redis_url,
            control_port,
            tick_port,
            trade_port,
            log_port,
            commands_per_poll,
            command_timeout_secs,
            command_sweep_interval_secs,
            tick_flush_interval_ms,
            watchdog_interval_secs,
            watchdog_heartbeat_lost_secs,
            watchdog_tick_stale_secs,
            signal_generator_interval_secs,
            decision_pipeline_interval_secs,
            trailing_stop_interval_secs,
            reconciliation_interval_secs,
            retention_sweep_interval_secs,
            decision_log_retention_hours,
            max_signal_age_secs,
            default_min_confidence,
            max_open_positions_global,
            max_open_positions_per_symbol,
            max_open_positions_per_timeframe,
            max_spread_points,
            risk_per_trade_percent,
            max_sl_risk_percent,
            max_daily_loss_percent,
            max_total_drawdown_percent,
            pause_after_consecutive_losses,
            cb_threshold,
            cb_cooldown_secs,
            sl_cooldown_secs,
            sl_cooldown_extended_secs,
            trailing_min_trail_pips,
            trailing_max_trail_pips,
            observability_enabled,
            observability_interval_secs,
            worker_backoff_cap_secs,
        })
    }

    pub fn risk_per_trade_fraction(&self) -> Decimal {
        Decimal::from_str(&(self.risk_per_trade_percent / 100.0).to_string()).unwrap_or_default()
    }
}

fn parse_env<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("failed to parse {}={}: {}", key, raw, e))
        .context(format!("invalid configuration for {}", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_env() {
        // SAFETY: test-only process env mutation, no concurrent readers in this test binary.
        for key in ["CONTROL_PORT", "DATABASE_URL"] {
            unsafe { env::remove_var(key) };
        }
        let config = Config::from_env().expect("defaults should parse");
        assert_eq!(config.control_port, 9900);
        assert_eq!(config.tick_port, 9901);
    }
}
