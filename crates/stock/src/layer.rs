use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use costchain_core::truncate2;

use crate::lot::LotId;
use crate::movement::{MoveLine, StockMove, StockMoveId};

/// One delivery event, treated as a discrete cost-bearing slice.
///
/// Layers are built from done customer-bound moves and walked in time order
/// by the COGS matcher. The cost fields carry everything the resolution
/// fallback chain needs without reaching back into the stock model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLayer {
    pub move_id: StockMoveId,
    /// Delivered quantity in the product's base unit.
    pub quantity: Decimal,
    pub done_at: DateTime<Utc>,
    /// Sum of the derived cost over the move's lines.
    pub line_cost_total: Decimal,
    /// The move's own consumption-side cost aggregate.
    pub aggregate_cost: Decimal,
    /// Lot delivered by this move, when lot-tracked.
    pub produced_lot: Option<LotId>,
}

impl DeliveryLayer {
    /// Cost per delivered unit for a given resolved total.
    pub fn cost_per_unit(&self, total_cost: Decimal) -> Decimal {
        costchain_core::guarded_div(total_cost, self.quantity)
    }
}

/// Build the delivery-layer view for a set of moves.
///
/// Only moves that are `Done` and customer-bound qualify. Layers come back
/// ascending by completion time, ties broken by move id so the order is
/// total and stable across runs.
pub fn delivery_layers<'a, M, F>(moves: M, lines_of: F) -> Vec<DeliveryLayer>
where
    M: IntoIterator<Item = &'a StockMove>,
    F: Fn(StockMoveId) -> Vec<&'a MoveLine>,
{
    let mut layers: Vec<DeliveryLayer> = moves
        .into_iter()
        .filter(|m| m.state == crate::movement::MoveState::Done && m.is_outbound())
        .filter_map(|m| {
            let done_at = m.done_at?;
            let lines = lines_of(m.id);
            let quantity = if lines.is_empty() {
                m.quantity
            } else {
                lines.iter().map(|l| l.quantity_done).sum()
            };
            let line_cost_total = truncate2(lines.iter().map(|l| l.product_cost).sum());
            let produced_lot = lines.iter().find_map(|l| l.lot_id);
            Some(DeliveryLayer {
                move_id: m.id,
                quantity,
                done_at,
                line_cost_total,
                aggregate_cost: m.total_purchase_cost,
                produced_lot,
            })
        })
        .collect();
    layers.sort_by(|a, b| a.done_at.cmp(&b.done_at).then(a.move_id.cmp(&b.move_id)));
    layers
}
