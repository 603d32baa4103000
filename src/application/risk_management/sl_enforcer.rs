//! Balance-aware SL enforcement (§4.9). Percentage-based caps replace a
//! prior fixed-EUR cap design that became a large fraction of a small
//! balance (see §9 design notes reproduced in spec.md §4.9).

use crate::domain::types::BrokerSymbol;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

pub struct SlEnforcementInput<'a> {
    pub proposed_lot: Decimal,
    pub sl_distance_pips: f64,
    pub balance: Decimal,
    pub symbol: &'a str,
    pub broker: &'a BrokerSymbol,
}

/// §4.9 defaults: 2.5% for BTCUSD/ETHUSD, 2.0% otherwise.
fn max_risk_pct_for(symbol: &str) -> f64 {
    match symbol.to_ascii_uppercase().as_str() {
        "BTCUSD" | "ETHUSD" => 2.5,
        _ => 2.0,
    }
}

/// Returns the (possibly shrunk) lot size, or `None` if even the smallest
/// tradeable lot exceeds the risk cap (§4.9 step 3: "cannot size safely").
pub fn enforce(input: &SlEnforcementInput) -> Option<Decimal> {
    if input.sl_distance_pips <= 0.0 {
        return None;
    }

    let max_risk_pct = max_risk_pct_for(input.symbol);
    let balance = input.balance.to_f64().unwrap_or(0.0);
    let point_value = input.broker.point_value.to_f64().unwrap_or(0.0001);
    let proposed_lot = input.proposed_lot.to_f64().unwrap_or(0.0);

    let potential_loss = input.sl_distance_pips * proposed_lot * point_value;
    let max_loss = balance * (max_risk_pct / 100.0);

    let final_lot = if potential_loss > max_loss {
        max_loss / (input.sl_distance_pips * point_value)
    } else {
        proposed_lot
    };

    let final_lot = Decimal::from_f64(final_lot).unwrap_or_default();
    let clamped = input.broker.clamp_volume(final_lot);

    if clamped < input.broker.volume_min {
        None
    } else {
        Some(clamped)
    }
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
            point_value: dec!(10),
            trade_mode: "full".into(),
        }
    }

    #[test]
    fn shrinks_lot_to_respect_balance_aware_cap() {
        let broker = broker();
        let lot = enforce(&SlEnforcementInput {
            proposed_lot: dec!(0.05),
            sl_distance_pips: 50.0,
            balance: dec!(500),
            symbol: "EURUSD",
            broker: &broker,
        })
        .expect("should find a safe smaller lot");
        assert_eq!(lot, dec!(0.02));
    }

    #[test]
    fn leaves_safe_lot_untouched() {
        let broker = broker();
        let lot = enforce(&SlEnforcementInput {
            proposed_lot: dec!(0.01),
            sl_distance_pips: 10.0,
            balance: dec!(10_000),
            symbol: "EURUSD",
            broker: &broker,
        })
        .unwrap();
        assert_eq!(lot, dec!(0.01));
    }

    #[test]
    fn rejects_when_minimum_lot_still_exceeds_cap() {
        let broker = broker();
        let result = enforce(&SlEnforcementInput {
            proposed_lot: dec!(0.01),
            sl_distance_pips: 5000.0,
            balance: dec!(10),
            symbol: "EURUSD",
            broker: &broker,
        });
        assert!(result.is_none());
    }
}
