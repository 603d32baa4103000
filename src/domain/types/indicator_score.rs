use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global (no account) learned performance of one indicator on one
/// `(symbol, timeframe)` (§3, §9 — explicitly not keyed by account; an
/// earlier design carried `account_id` and was migrated away).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorScore {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub indicator_name: String,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_signals: u64,
    pub last_updated: DateTime<Utc>,
}

impl IndicatorScore {
    /// Confidence-confluence weight for this indicator (§4.6 step 3): a
    /// well-performing indicator contributes more to the confluence score.
    /// win_rate in [0,1] maps to a weight in [0.5, 1.5].
    pub fn confluence_weight(&self) -> f64 {
        0.5 + self.win_rate.clamp(0.0, 1.0)
    }
}
