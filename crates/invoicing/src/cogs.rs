use std::collections::HashSet;

use rust_decimal::Decimal;
use thiserror::Error;

use costchain_core::{truncate2, DomainError, ProductId, Unit, QTY_TOLERANCE};
use costchain_sales::{SaleLine, SaleLineId};
use costchain_stock::{DeliveryLayer, StockMove};

use crate::line::{InvoiceLine, InvoiceLineId};
use crate::resolve::CostResolver;

/// Read-side query: delivery moves for a sale line.
pub trait DeliveryMoves {
    fn find_delivery_moves(&self, sale_line: SaleLineId) -> Vec<StockMove>;
}

/// Read-side query: posted COGS invoice lines for a (sale line, product).
pub trait PostedCogsLines {
    fn find_posted_cogs_lines(&self, sale_line: SaleLineId, product: ProductId)
        -> Vec<InvoiceLine>;
}

/// Matching failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CogsError {
    /// The requested quantity would recognize more COGS than was delivered.
    /// Surfaced before posting; the matcher never silently floors.
    #[error(
        "reconciliation mismatch on sale line {sale_line}: requested {requested} exceeds remaining delivered {remaining}"
    )]
    ReconciliationMismatch {
        sale_line: SaleLineId,
        requested: Decimal,
        remaining: Decimal,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Result of matching one invoice slice against the delivery layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedCost {
    /// Blended cost per unit for this slice, truncated.
    pub unit_cost: Decimal,
    /// Quantity the layers actually covered.
    pub matched_quantity: Decimal,
    /// Total cost recognized for this slice, truncated.
    pub total_cost: Decimal,
}

/// Quantity already recognized by posted COGS lines for this (sale line,
/// product), net of credit-memo reversals. Quantities are converted to the
/// product's base unit before summation.
pub fn quantity_already_invoiced(
    posted: &[InvoiceLine],
    sale_line: SaleLineId,
    product: ProductId,
    base_unit: Unit,
) -> Decimal {
    let originals: HashSet<InvoiceLineId> = posted
        .iter()
        .filter(|l| {
            l.is_cogs && l.reversal_of.is_none() && l.sale_line == sale_line && l.product_id == product
        })
        .map(|l| l.id)
        .collect();

    let invoiced: Decimal = posted
        .iter()
        .filter(|l| originals.contains(&l.id))
        .map(|l| l.base_quantity(base_unit))
        .sum();

    let reversed: Decimal = posted
        .iter()
        .filter(|l| l.reversal_of.is_some_and(|orig| originals.contains(&orig)))
        .map(|l| l.base_quantity(base_unit))
        .sum();

    invoiced - reversed
}

/// Match a quantity to invoice now against the delivery layers and return
/// the unit cost for that slice.
///
/// A positive quantity invoices forward from where prior postings stopped.
/// A negative quantity is a credit memo: it re-prices the most recently
/// invoiced slice, so the clawback carries exactly the cost that slice was
/// posted with.
///
/// Layers must be ascending by delivery time (see
/// `costchain_stock::delivery_layers`). When no layer quantity is matched at
/// all, the platform default costing provides the unit cost.
pub fn match_unit_cost(
    sale_line: &SaleLine,
    quantity: Decimal,
    posted: &[InvoiceLine],
    layers: &[DeliveryLayer],
    resolver: &CostResolver<'_>,
    base_unit: Unit,
) -> Result<MatchedCost, CogsError> {
    let already = quantity_already_invoiced(posted, sale_line.id, sale_line.product_id, base_unit);

    let (mut remaining_skip, mut remaining) = if quantity >= Decimal::ZERO {
        (already, quantity)
    } else {
        let magnitude = -quantity;
        ((already - magnitude).max(Decimal::ZERO), magnitude)
    };

    if quantity > Decimal::ZERO {
        let delivered: Decimal = layers.iter().map(|l| l.quantity).sum();
        let available = delivered - already;
        if quantity > available + QTY_TOLERANCE {
            return Err(CogsError::ReconciliationMismatch {
                sale_line: sale_line.id,
                requested: quantity,
                remaining: available.max(Decimal::ZERO),
            });
        }
    }

    let mut total_cost = Decimal::ZERO;
    let mut total_qty = Decimal::ZERO;

    for layer in layers {
        if remaining <= QTY_TOLERANCE {
            break;
        }
        if remaining_skip >= layer.quantity {
            remaining_skip -= layer.quantity;
            continue;
        }
        let available = layer.quantity - remaining_skip;
        remaining_skip = Decimal::ZERO;

        let layer_total = resolver.resolve_total(layer, sale_line);
        let cost_per_unit = layer.cost_per_unit(layer_total);

        let take = available.min(remaining);
        total_cost += take * cost_per_unit;
        total_qty += take;
        remaining -= take;
    }

    if total_qty > Decimal::ZERO {
        Ok(MatchedCost {
            unit_cost: truncate2(total_cost / total_qty),
            matched_quantity: total_qty,
            total_cost: truncate2(total_cost),
        })
    } else {
        let fallback = resolver.default_costing.unit_cost(sale_line.product_id);
        tracing::debug!(
            sale_line = %sale_line.id,
            "no layer quantity matched, using default costing"
        );
        Ok(MatchedCost {
            unit_cost: truncate2(fallback),
            matched_quantity: Decimal::ZERO,
            total_cost: Decimal::ZERO,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::InvoiceKind;
    use crate::resolve::StandardCostTable;
    use chrono::{TimeZone, Utc};
    use costchain_core::EntityId;
    use costchain_sales::SaleOrderId;
    use costchain_stock::StockMoveId;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn layer(qty: Decimal, total_cost: Decimal, day: u32) -> DeliveryLayer {
        DeliveryLayer {
            move_id: StockMoveId::new(EntityId::new()),
            quantity: qty,
            done_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            line_cost_total: total_cost,
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

    fn resolver<'a>(default: &'a StandardCostTable) -> CostResolver<'a> {
        CostResolver {
            invoice_carried_cost: None,
            productions: &[],
            default_costing: default,
        }
    }

    fn posted_cogs(line: &SaleLine, qty: Decimal, unit_cost: Decimal) -> InvoiceLine {
        let mut l = InvoiceLine::new(
            InvoiceLineId::new(EntityId::new()),
            line.id,
            line.product_id,
            InvoiceKind::Invoice,
            qty,
            Unit::Gram,
        )
        .as_cogs();
        l.posted_unit_cost = unit_cost;
        l
    }

    #[test]
    fn fifo_blend_across_two_layers() {
        let line = sale_line(dec!(20));
        let layers = vec![layer(dec!(10), dec!(100), 1), layer(dec!(10), dec!(300), 15)];
        let table = StandardCostTable::new();

        let matched =
            match_unit_cost(&line, dec!(15), &[], &layers, &resolver(&table), Unit::Gram).unwrap();
        // 10 × 10.0 + 5 × 30.0 = 250 over 15 units
        assert_eq!(matched.unit_cost, dec!(16.66));
        assert_eq!(matched.matched_quantity, dec!(15));
        assert_eq!(matched.total_cost, dec!(250.00));
    }

    #[test]
    fn prior_postings_shift_the_walk_forward() {
        let line = sale_line(dec!(20));
        let layers = vec![layer(dec!(10), dec!(100), 1), layer(dec!(10), dec!(300), 15)];
        let table = StandardCostTable::new();
        let posted = vec![posted_cogs(&line, dec!(10), dec!(10))];

        let matched =
            match_unit_cost(&line, dec!(5), &posted, &layers, &resolver(&table), Unit::Gram)
                .unwrap();
        // layer 1 fully recognized already; this slice prices off layer 2
        assert_eq!(matched.unit_cost, dec!(30.00));
    }

    #[test]
    fn partial_prior_posting_splits_a_layer() {
        let line = sale_line(dec!(20));
        let layers = vec![layer(dec!(10), dec!(100), 1), layer(dec!(10), dec!(300), 15)];
        let table = StandardCostTable::new();
        let posted = vec![posted_cogs(&line, dec!(4), dec!(10))];

        let matched =
            match_unit_cost(&line, dec!(10), &posted, &layers, &resolver(&table), Unit::Gram)
                .unwrap();
        // 6 left of layer 1 at 10.0, then 4 of layer 2 at 30.0 -> 180/10
        assert_eq!(matched.unit_cost, dec!(18.00));
    }

    #[test]
    fn reversal_claws_back_and_restores_layer_pricing() {
        let line = sale_line(dec!(20));
        let layers = vec![layer(dec!(10), dec!(100), 1), layer(dec!(10), dec!(300), 15)];
        let table = StandardCostTable::new();

        let first =
            match_unit_cost(&line, dec!(10), &[], &layers, &resolver(&table), Unit::Gram).unwrap();
        assert_eq!(first.unit_cost, dec!(10.00));

        let original = posted_cogs(&line, dec!(10), first.unit_cost);
        let posted = vec![original.clone()];

        // credit memo re-prices the slice that was just posted
        let clawback =
            match_unit_cost(&line, dec!(-10), &posted, &layers, &resolver(&table), Unit::Gram)
                .unwrap();
        assert_eq!(clawback.unit_cost, dec!(10.00));
        assert_eq!(clawback.matched_quantity, dec!(10));

        // once the reversal is posted, prior quantity is back to zero
        let reversal = InvoiceLine::new(
            InvoiceLineId::new(EntityId::new()),
            line.id,
            line.product_id,
            InvoiceKind::CreditMemo,
            dec!(10),
            Unit::Gram,
        )
        .reversing(original.id);
        let posted = vec![original, reversal];
        assert_eq!(
            quantity_already_invoiced(&posted, line.id, line.product_id, Unit::Gram),
            Decimal::ZERO
        );

        let again =
            match_unit_cost(&line, dec!(10), &posted, &layers, &resolver(&table), Unit::Gram)
                .unwrap();
        assert_eq!(again.unit_cost, dec!(10.00));
    }

    #[test]
    fn over_invoicing_is_a_hard_mismatch() {
        let line = sale_line(dec!(20));
        let layers = vec![layer(dec!(10), dec!(100), 1), layer(dec!(10), dec!(300), 15)];
        let table = StandardCostTable::new();
        let posted = vec![posted_cogs(&line, dec!(15), dec!(16.66))];

        let err = match_unit_cost(&line, dec!(6), &posted, &layers, &resolver(&table), Unit::Gram)
            .unwrap_err();
        match err {
            CogsError::ReconciliationMismatch { requested, remaining, .. } => {
                assert_eq!(requested, dec!(6));
                assert_eq!(remaining, dec!(5));
            }
            other => panic!("expected reconciliation mismatch, got {other:?}"),
        }
    }

    #[test]
    fn no_layers_fall_back_to_default_costing() {
        let mut line = sale_line(Decimal::ZERO);
        let product = ProductId::new();
        line.product_id = product;
        let table = StandardCostTable::new().with_cost(product, dec!(12.345));

        let matched =
            match_unit_cost(&line, Decimal::ZERO, &[], &[], &resolver(&table), Unit::Gram).unwrap();
        assert_eq!(matched.unit_cost, dec!(12.34));
        assert_eq!(matched.matched_quantity, Decimal::ZERO);
    }

    #[test]
    fn posted_quantities_convert_to_base_unit_before_summation() {
        let line = sale_line(dec!(3000));
        let mut posted = posted_cogs(&line, dec!(2), dec!(10));
        posted.unit = Unit::Kilogram;
        assert_eq!(
            quantity_already_invoiced(&[posted], line.id, line.product_id, Unit::Gram),
            dec!(2000)
        );
    }

    proptest! {
        /// Conservation: invoicing the full delivered quantity in arbitrary
        /// integer slices recognizes the same total cost as the layers carry,
        /// within the 2-decimal truncation tolerance per unit.
        #[test]
        fn slices_conserve_layer_cost(
            layer_specs in prop::collection::vec((1u32..50, 1u32..100), 1..4),
            cut in 1u32..99,
        ) {
            let mut layers = Vec::new();
            let mut exact_total = Decimal::ZERO;
            let mut delivered = Decimal::ZERO;
            for (day, (qty, unit_cost)) in layer_specs.iter().enumerate() {
                let qty = Decimal::from(*qty);
                let cost = qty * Decimal::from(*unit_cost);
                layers.push(layer(qty, cost, day as u32 + 1));
                exact_total += cost;
                delivered += qty;
            }

            let line = sale_line(delivered);
            let table = StandardCostTable::new();
            let res = resolver(&table);

            // split the delivered quantity into two integer slices
            let first = (delivered * Decimal::from(cut) / Decimal::from(100)).floor().max(Decimal::ONE).min(delivered);
            let second = delivered - first;

            let mut posted = Vec::new();
            let mut recognized = Decimal::ZERO;
            for slice in [first, second] {
                if slice.is_zero() {
                    continue;
                }
                let matched = match_unit_cost(&line, slice, &posted, &layers, &res, Unit::Gram).unwrap();
                recognized += matched.unit_cost * slice;
                posted.push(posted_cogs(&line, slice, matched.unit_cost));
            }

            let tolerance = dec!(0.01) * delivered;
            prop_assert!((recognized - exact_total).abs() <= tolerance);
        }
    }
}
