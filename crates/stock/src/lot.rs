use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use costchain_core::{truncate2, Entity, EntityId, ProductId};

use crate::movement::{MoveLine, StockMove, StockMoveId};

/// Lot identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(pub EntityId);

impl LotId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LotId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A traceable batch of a product.
///
/// The name is a human label and may recur across lots; all value flow keys
/// on [`LotId`] or on the explicit `inventory_line` link of a move line, so
/// same-named lots cannot alias each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub name: String,
    pub product_id: ProductId,
}

impl Lot {
    pub fn new(id: LotId, name: impl Into<String>, product_id: ProductId) -> Self {
        Self {
            id,
            name: name.into(),
            product_id,
        }
    }
}

impl Entity for Lot {
    type Id = LotId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Aggregate view over a lot: what the company still holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LotAggregate {
    pub quality: Decimal,
    pub first_process_weight: Decimal,
    pub cost: Decimal,
    pub quantity: Decimal,
}

/// Aggregate a lot's quality/weight/cost/quantity over move lines held in
/// on-hand locations.
///
/// Customer-facing moves are excluded: a lot's aggregate reflects inventory
/// still held, not units already shipped. Lines whose owning move cannot be
/// resolved are skipped.
pub fn aggregate_on_hand<'a, I, F>(lot_id: LotId, lines: I, owning_move: F) -> LotAggregate
where
    I: IntoIterator<Item = &'a MoveLine>,
    F: Fn(StockMoveId) -> Option<&'a StockMove>,
{
    let mut agg = LotAggregate::default();
    for line in lines {
        if line.lot_id != Some(lot_id) {
            continue;
        }
        let Some(owner) = owning_move(line.move_id) else {
            tracing::debug!(line = %line.id, "move line has no resolvable owning move, skipping");
            continue;
        };
        if !owner.dest.is_on_hand() {
            continue;
        }
        agg.quality += line.lot_quality;
        agg.first_process_weight += line.lot_weight;
        agg.cost += line.lot_purchase_cost;
        agg.quantity += line.quantity_done;
    }
    agg.cost = truncate2(agg.cost);
    agg
}
