//! Market regime classification (§4.5). Grounded in the teacher's
//! `domain::market::market_regime::MarketRegimeDetector`, reworked to the
//! ADX-threshold ladder and Bollinger-bandwidth tie-breaker this spec calls
//! for instead of the teacher's Hurst/skew-based detector.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// ADX < 12 — suppress all trend-following signals.
    TooWeak,
    /// ADX > 25.
    Trending,
    /// ADX < 20 (and not `TooWeak`).
    Ranging,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::TooWeak => write!(f, "TOO_WEAK"),
            Regime::Trending => write!(f, "TRENDING"),
            Regime::Ranging => write!(f, "RANGING"),
        }
    }
}

/// Detects market regime from ADX and, in the ambiguous [20,25] band, from
/// Bollinger bandwidth (wide bands tie-break to `Trending`, narrow to
/// `Ranging`) — per §4.5.
pub fn detect_regime(adx: f64, bollinger_bandwidth_pct: f64) -> Regime {
    if adx < 12.0 {
        return Regime::TooWeak;
    }
    if adx > 25.0 {
        return Regime::Trending;
    }
    if adx < 20.0 {
        return Regime::Ranging;
    }
    // adx in [20, 25]: Bollinger-bandwidth tie-breaker. A bandwidth above 4%
    // of price reads as expansion (trending); below reads as contraction
    // (ranging).
    if bollinger_bandwidth_pct >= 4.0 {
        Regime::Trending
    } else {
        Regime::Ranging
    }
}

/// RSI overbought/oversold bands vary by regime (§4.5): 40/60 in
/// `Trending`, 30/70 in `Ranging`/`TooWeak`.
pub fn rsi_bands(regime: Regime) -> (f64, f64) {
    match regime {
        Regime::Trending => (40.0, 60.0),
        Regime::Ranging | Regime::TooWeak => (30.0, 70.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_adx_is_too_weak() {
        assert_eq!(detect_regime(8.0, 10.0), Regime::TooWeak);
    }

    #[test]
    fn strong_adx_is_trending() {
        assert_eq!(detect_regime(30.0, 10.0), Regime::Trending);
    }

    #[test]
    fn low_adx_is_ranging() {
        assert_eq!(detect_regime(15.0, 10.0), Regime::Ranging);
    }

    #[test]
    fn ambiguous_band_uses_bandwidth_tiebreak() {
        assert_eq!(detect_regime(22.0, 5.0), Regime::Trending);
        assert_eq!(detect_regime(22.0, 2.0), Regime::Ranging);
    }

    #[test]
    fn rsi_bands_tighten_in_trend() {
        assert_eq!(rsi_bands(Regime::Trending), (40.0, 60.0));
        assert_eq!(rsi_bands(Regime::Ranging), (30.0, 70.0));
    }
}
