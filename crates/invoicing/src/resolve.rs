use std::collections::HashMap;

use rust_decimal::Decimal;

use costchain_core::{guarded_div, truncate2, ProductId};
use costchain_manufacturing::ProductionOrder;
use costchain_sales::SaleLine;
use costchain_stock::DeliveryLayer;

/// Platform default costing, consulted when every other cost source for a
/// layer came up empty.
pub trait DefaultCosting {
    /// Cost per base unit for a product.
    fn unit_cost(&self, product: ProductId) -> Decimal;
}

/// Standard-cost table keyed by product.
#[derive(Debug, Default, Clone)]
pub struct StandardCostTable {
    costs: HashMap<ProductId, Decimal>,
}

impl StandardCostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cost(mut self, product: ProductId, unit_cost: Decimal) -> Self {
        self.costs.insert(product, unit_cost);
        self
    }
}

impl DefaultCosting for StandardCostTable {
    fn unit_cost(&self, product: ProductId) -> Decimal {
        self.costs.get(&product).copied().unwrap_or(Decimal::ZERO)
    }
}

/// Resolves a delivery layer's total cost through the fallback chain.
///
/// Tiers, first non-zero value wins:
/// 1. the cost carried on the invoice line (apportioned to the layer by its
///    share of the delivered quantity), when the sale line has delivered;
/// 2. the sum of propagated cost over the move's lines;
/// 3. the production order reached through the produced-lot link;
/// 4. the move's own consumption-cost aggregate;
/// 5. platform default costing.
pub struct CostResolver<'a> {
    /// Cost the invoice line carried over from the sale line, when any.
    pub invoice_carried_cost: Option<Decimal>,
    pub productions: &'a [ProductionOrder],
    pub default_costing: &'a dyn DefaultCosting,
}

impl CostResolver<'_> {
    /// Total cost of one delivery layer.
    pub fn resolve_total(&self, layer: &DeliveryLayer, sale_line: &SaleLine) -> Decimal {
        if let Some(carried) = self.invoice_carried_cost {
            if !carried.is_zero() && sale_line.delivered_quantity > Decimal::ZERO {
                let per_unit = guarded_div(carried, sale_line.delivered_quantity);
                return truncate2(per_unit * layer.quantity);
            }
        }

        if !layer.line_cost_total.is_zero() {
            return layer.line_cost_total;
        }

        if let Some(lot) = layer.produced_lot {
            if let Some(mo) = self
                .productions
                .iter()
                .find(|p| p.produced_lot == Some(lot))
            {
                let total = truncate2(mo.unit_cost() * layer.quantity);
                if !total.is_zero() {
                    return total;
                }
            }
        }

        if !layer.aggregate_cost.is_zero() {
            return layer.aggregate_cost;
        }

        tracing::debug!(
            layer = %layer.move_id,
            "no propagated cost for delivery layer, falling back to default costing"
        );
        truncate2(self.default_costing.unit_cost(sale_line.product_id) * layer.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use costchain_core::EntityId;
    use costchain_manufacturing::ProductionOrderId;
    use costchain_sales::{SaleLineId, SaleOrderId};
    use costchain_stock::{LotId, StockMoveId};
    use rust_decimal_macros::dec;

    fn layer(quantity: Decimal) -> DeliveryLayer {
        DeliveryLayer {
            move_id: StockMoveId::new(EntityId::new()),
            quantity,
            done_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            line_cost_total: Decimal::ZERO,
            aggregate_cost: Decimal::ZERO,
            produced_lot: None,
        }
    }

    fn sale_line(delivered: Decimal) -> SaleLine {
        let mut l = SaleLine::new(
            SaleLineId::new(EntityId::new()),
            SaleOrderId::new(EntityId::new()),
            ProductId::new(),
        );
        l.delivered_quantity = delivered;
        l
    }

    #[test]
    fn carried_cost_wins_and_is_apportioned_by_layer_share() {
        let resolver = CostResolver {
            invoice_carried_cost: Some(dec!(1000)),
            productions: &[],
            default_costing: &StandardCostTable::new(),
        };
        let mut l = layer(dec!(40));
        l.line_cost_total = dec!(999);
        // 1000 / 100 delivered × 40 in this layer
        assert_eq!(resolver.resolve_total(&l, &sale_line(dec!(100))), dec!(400.00));
    }

    #[test]
    fn zero_carried_cost_falls_through_to_line_costs() {
        let resolver = CostResolver {
            invoice_carried_cost: Some(Decimal::ZERO),
            productions: &[],
            default_costing: &StandardCostTable::new(),
        };
        let mut l = layer(dec!(40));
        l.line_cost_total = dec!(420);
        assert_eq!(resolver.resolve_total(&l, &sale_line(dec!(100))), dec!(420));
    }

    #[test]
    fn production_lookup_uses_the_produced_lot_link() {
        let lot = LotId::new(EntityId::new());
        let mut mo = ProductionOrder::new(
            ProductionOrderId::new(EntityId::new()),
            ProductId::new(),
            dec!(100),
        )
        .producing(lot);
        mo.purchase_cost = dec!(1000);

        let resolver = CostResolver {
            invoice_carried_cost: None,
            productions: std::slice::from_ref(&mo),
            default_costing: &StandardCostTable::new(),
        };
        let mut l = layer(dec!(40));
        l.produced_lot = Some(lot);
        // unit cost 10 × 40
        assert_eq!(resolver.resolve_total(&l, &sale_line(dec!(100))), dec!(400.00));
    }

    #[test]
    fn aggregate_cost_then_default_costing_close_the_chain() {
        let product = ProductId::new();
        let table = StandardCostTable::new().with_cost(product, dec!(7.5));
        let resolver = CostResolver {
            invoice_carried_cost: None,
            productions: &[],
            default_costing: &table,
        };

        let mut with_aggregate = layer(dec!(10));
        with_aggregate.aggregate_cost = dec!(85);
        let mut line = sale_line(dec!(10));
        line.product_id = product;
        assert_eq!(resolver.resolve_total(&with_aggregate, &line), dec!(85));

        let bare = layer(dec!(10));
        assert_eq!(resolver.resolve_total(&bare, &line), dec!(75.00));
    }
}
