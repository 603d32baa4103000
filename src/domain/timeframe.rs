use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle timeframe. §3: `OHLCCandle` is unique on `(symbol, timeframe,
/// timestamp)`; retention is timeframe-dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn all() -> [Timeframe; 7] {
        [
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ]
    }

    pub fn seconds(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::M30 => 30 * 60,
            Timeframe::H1 => 60 * 60,
            Timeframe::H4 => 4 * 60 * 60,
            Timeframe::D1 => 24 * 60 * 60,
        }
    }

    /// Retention horizon in days (§3): M1/M5: 2d, M15: 3d, H1: 7d, H4: 14d, D1: 30d.
    pub fn retention_days(self) -> i64 {
        match self {
            Timeframe::M1 => 2,
            Timeframe::M5 => 2,
            Timeframe::M15 => 3,
            Timeframe::M30 => 3,
            Timeframe::H1 => 7,
            Timeframe::H4 => 14,
            Timeframe::D1 => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }

    pub fn parse(s: &str) -> Option<Timeframe> {
        match s.to_ascii_uppercase().as_str() {
            "M1" => Some(Timeframe::M1),
            "M5" => Some(Timeframe::M5),
            "M15" => Some(Timeframe::M15),
            "M30" => Some(Timeframe::M30),
            "H1" => Some(Timeframe::H1),
            "H4" => Some(Timeframe::H4),
            "D1" => Some(Timeframe::D1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_matches_spec_table() {
        assert_eq!(Timeframe::M1.retention_days(), 2);
        assert_eq!(Timeframe::H1.retention_days(), 7);
        assert_eq!(Timeframe::H4.retention_days(), 14);
        assert_eq!(Timeframe::D1.retention_days(), 30);
    }

    #[test]
    fn round_trips_through_string() {
        for tf in Timeframe::all() {
            assert_eq!(Timeframe::parse(tf.as_str()), Some(tf));
        }
    }
}
