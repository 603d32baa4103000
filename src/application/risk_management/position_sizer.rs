//! Position sizer (§4.8). Pure function: confidence + symbol + balance +
//! SL distance in, a broker-clamped lot size out.

use crate::domain::types::BrokerSymbol;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// §4.8 step 1.
fn confidence_multiplier(confidence: f64) -> f64 {
    if confidence >= 85.0 {
        1.5
    } else if confidence >= 75.0 {
        1.2
    } else if confidence >= 60.0 {
        1.0
    } else if confidence >= 50.0 {
        0.7
    } else {
        0.5
    }
}

/// §4.8 step 2. Defaults cover the symbols named in the spec; anything
/// unlisted gets the neutral 1.0 factor.
fn symbol_risk_factor(symbol: &str) -> f64 {
    match symbol.to_ascii_uppercase().as_str() {
        "BTCUSD" => 0.5,
        "ETHUSD" => 0.6,
        "XAUUSD" => 0.8,
        "DE40.C" | "DE40" => 0.9,
        _ => 1.0,
    }
}

/// §4.8 step 5. Base lot by balance tier, before blending with the
/// risk-derived lot.
fn balance_tier_lot(balance: f64) -> f64 {
    if balance < 500.0 {
        0.01
    } else if balance < 1000.0 {
        0.01
    } else if balance < 2000.0 {
        0.02
    } else if balance < 5000.0 {
        0.03
    } else if balance < 10000.0 {
        0.05
    } else {
        0.10
    }
}

pub struct PositionSizerInput<'a> {
    pub balance: Decimal,
    pub confidence: f64,
    pub sl_distance_pips: f64,
    pub pip_value: Decimal,
    pub symbol: &'a str,
    pub base_risk_pct: f64,
    pub risk_multiplier: f64,
    pub broker: &'a BrokerSymbol,
}

/// §4.8. Returns `None` if `sl_distance_pips` is non-positive (cannot size
/// against a zero-distance stop).
pub fn size_position(input: &PositionSizerInput) -> Option<Decimal> {
    if input.sl_distance_pips <= 0.0 {
        return None;
    }

    let balance = input.balance.to_f64().unwrap_or(0.0);
    let conf_mult = confidence_multiplier(input.confidence);
    let symbol_factor = symbol_risk_factor(input.symbol);

    let risk_amount = balance * (input.base_risk_pct / 100.0) * conf_mult * symbol_factor * input.risk_multiplier;
    let pip_value = input.pip_value.to_f64().unwrap_or(0.0001);
    let lot_by_risk = if pip_value > 0.0 { risk_amount / (input.sl_distance_pips * pip_value) } else { 0.0 };

    let tier_lot = balance_tier_lot(balance);
    let final_lot = (tier_lot + lot_by_risk) / 2.0;

    let clamped_max = input.broker.volume_max.min(Decimal::ONE);
    let lot = Decimal::from_f64(final_lot).unwrap_or(input.broker.volume_min).clamp(input.broker.volume_min, clamped_max);

    Some(input.broker.clamp_volume(lot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn broker() -> BrokerSymbol {
        BrokerSymbol {
            symbol: "EURUSD".into(),
            volume_min: dec!(0.01),
            volume_max: dec!(100),
            volume_step: dec!(0.01),
            stops_level: 10,
            freeze_level: 5,
            digits: 5,
            point_value: dec!(0.0001),
            trade_mode: "full".into(),
        }
    }

    #[test]
    fn higher_confidence_sizes_larger() {
        let broker = broker();
        let low = size_position(&PositionSizerInput {
            balance: dec!(5000),
            confidence: 55.0,
            sl_distance_pips: 20.0,
            pip_value: dec!(1),
            symbol: "EURUSD",
            base_risk_pct: 1.0,
            risk_multiplier: 1.0,
            broker: &broker,
        })
        .unwrap();
        let high = size_position(&PositionSizerInput {
            balance: dec!(5000),
            confidence: 90.0,
            sl_distance_pips: 20.0,
            pip_value: dec!(1),
            symbol: "EURUSD",
            base_risk_pct: 1.0,
            risk_multiplier: 1.0,
            broker: &broker,
        })
        .unwrap();
        assert!(high >= low);
    }

    #[test]
    fn zero_sl_distance_is_unsizeable() {
        let broker = broker();
        assert!(size_position(&PositionSizerInput {
            balance: dec!(5000),
            confidence: 70.0,
            sl_distance_pips: 0.0,
            pip_value: dec!(1),
            symbol: "EURUSD",
            base_risk_pct: 1.0,
            risk_multiplier: 1.0,
            broker: &broker,
        })
        .is_none());
    }

    #[test]
    fn result_is_clamped_to_broker_bounds() {
        let broker = broker();
        let lot = size_position(&PositionSizerInput {
            balance: dec!(1_000_000),
            confidence: 95.0,
            sl_distance_pips: 1.0,
            pip_value: dec!(1),
            symbol: "EURUSD",
            base_risk_pct: 5.0,
            risk_multiplier: 2.0,
            broker: &broker,
        })
        .unwrap();
        assert!(lot <= dec!(1.0));
    }
}
