use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolStatus {
    Active,
    Paused,
    Disabled,
}

/// Adaptive, per-`(account, symbol)` trading config (§3, §4.13). Mutated
/// after each trade closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolTradingConfig {
    pub account_number: i64,
    pub symbol: String,
    pub direction: Option<String>,
    pub min_confidence_threshold: f64,
    pub risk_multiplier: f64,
    pub status: SymbolStatus,
    pub rolling_winrate: f64,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    pub pause_reason: Option<String>,
    pub paused_until: Option<chrono::DateTime<chrono::Utc>>,
    /// Last time a trade on this symbol closed via `CloseReason::SlHit`;
    /// drives the SL-hit cooldown's doubling window (§4.12).
    pub last_sl_hit_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SymbolTradingConfig {
    pub const MIN_CONFIDENCE_FLOOR: f64 = 45.0;
    pub const MIN_CONFIDENCE_CEIL: f64 = 80.0;
    pub const RISK_MULTIPLIER_FLOOR: f64 = 0.1;
    pub const RISK_MULTIPLIER_CEIL: f64 = 2.0;

    pub fn new(account_number: i64, symbol: String) -> Self {
        Self {
            account_number,
            symbol,
            direction: None,
            min_confidence_threshold: 50.0,
            risk_multiplier: 1.0,
            status: SymbolStatus::Active,
            rolling_winrate: 0.0,
            consecutive_wins: 0,
            consecutive_losses: 0,
            pause_reason: None,
            paused_until: None,
            last_sl_hit_at: None,
        }
    }

    pub fn position_size_cap(&self) -> Decimal {
        Decimal::ONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_has_sane_defaults() {
        let c = SymbolTradingConfig::new(1, "EURUSD".into());
        assert_eq!(c.status, SymbolStatus::Active);
        assert_eq!(c.min_confidence_threshold, 50.0);
    }
}
