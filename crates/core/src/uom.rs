//! Units of measure for traded material.
//!
//! Market prices are quoted per troy ounce while material moves in grams or
//! tons, so quantities are normalized through gram ratios before any
//! summation or matching.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Unit of measure for quantities and quoted prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Gram,
    Kilogram,
    MetricTon,
    TroyOunce,
}

impl Unit {
    /// Grams per one unit.
    pub fn grams_per_unit(self) -> Decimal {
        match self {
            Unit::Gram => Decimal::ONE,
            Unit::Kilogram => dec!(1000),
            Unit::MetricTon => dec!(1000000),
            Unit::TroyOunce => dec!(31.1034768),
        }
    }

    /// Convert a quantity expressed in `self` into `to`.
    pub fn convert_quantity(self, quantity: Decimal, to: Unit) -> Decimal {
        if self == to {
            return quantity;
        }
        quantity * self.grams_per_unit() / to.grams_per_unit()
    }

    /// Convert a per-unit price quoted in `self` into a per-unit price in
    /// `to`. Prices move inversely to quantities.
    pub fn convert_price(self, price: Decimal, to: Unit) -> Decimal {
        if self == to {
            return price;
        }
        price * to.grams_per_unit() / self.grams_per_unit()
    }

    /// Ratio of one `self` expressed in `to` (the original's unit
    /// convention factor).
    pub fn ratio_to(self, to: Unit) -> Decimal {
        self.grams_per_unit() / to.grams_per_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_conversion_round_numbers() {
        assert_eq!(Unit::Kilogram.convert_quantity(dec!(2), Unit::Gram), dec!(2000));
        assert_eq!(Unit::MetricTon.convert_quantity(dec!(0.5), Unit::Kilogram), dec!(500));
        assert_eq!(Unit::Gram.convert_quantity(dec!(42), Unit::Gram), dec!(42));
    }

    #[test]
    fn troy_ounce_ratio_matches_convention() {
        assert_eq!(Unit::TroyOunce.grams_per_unit(), dec!(31.1034768));
        assert_eq!(Unit::TroyOunce.ratio_to(Unit::Gram), dec!(31.1034768));
    }

    #[test]
    fn price_conversion_inverts_quantity_ratio() {
        // 1000 per kilogram is 1 per gram.
        assert_eq!(Unit::Kilogram.convert_price(dec!(1000), Unit::Gram), dec!(1));
    }
}
