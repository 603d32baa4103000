use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Global (not per-account) broker symbol specification (§3). Written by
/// symbol-spec ingress (`/api/symbol_specs`); read everywhere a trade is
/// sized or validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSymbol {
    pub symbol: String,
    pub volume_min: Decimal,
    pub volume_max: Decimal,
    pub volume_step: Decimal,
    /// Minimum SL/TP distance from market, in points.
    pub stops_level: i32,
    pub freeze_level: i32,
    pub digits: u32,
    pub point_value: Decimal,
    pub trade_mode: String,
}

impl BrokerSymbol {
    /// One "point" expressed as a decimal price increment, e.g. digits=5 -> 0.00001.
    pub fn point(&self) -> Decimal {
        let mut p = Decimal::ONE;
        for _ in 0..self.digits {
            p /= Decimal::from(10);
        }
        p
    }

    pub fn clamp_volume(&self, volume: Decimal) -> Decimal {
        let stepped = if self.volume_step > Decimal::ZERO {
            (volume / self.volume_step).round() * self.volume_step
        } else {
            volume
        };
        stepped.clamp(self.volume_min, self.volume_max)
    }
}

/// `(account, symbol)` pair: the terminal is asked to stream ticks and
/// accept trades on this symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribedSymbol {
    pub account_number: i64,
    pub symbol: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eurusd() -> BrokerSymbol {
        BrokerSymbol {
            symbol: "EURUSD".into(),
            volume_min: dec!(0.01),
            volume_max: dec!(100),
            volume_step: dec!(0.01),
            stops_level: 10,
            freeze_level: 5,
            digits: 5,
            point_value: dec!(1),
            trade_mode: "full".into(),
        }
    }

    #[test]
    fn point_reflects_digits() {
        assert_eq!(eurusd().point(), dec!(0.00001));
    }

    #[test]
    fn clamp_volume_rounds_to_step_and_clamps_bounds() {
        let s = eurusd();
        assert_eq!(s.clamp_volume(dec!(0.017)), dec!(0.02));
        assert_eq!(s.clamp_volume(dec!(0.001)), dec!(0.01));
        assert_eq!(s.clamp_volume(dec!(999)), dec!(100));
    }
}
