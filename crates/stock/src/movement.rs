use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use costchain_core::{guarded_div, truncate2, Entity, EntityId, ProductId};

use crate::lot::LotId;

/// Stock move identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockMoveId(pub EntityId);

impl StockMoveId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StockMoveId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Move line identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveLineId(pub EntityId);

impl MoveLineId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MoveLineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Usage of a stock location, as far as costing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Supplier,
    Internal,
    Transit,
    Customer,
}

impl LocationKind {
    /// Internal and transit locations hold inventory; supplier and customer
    /// locations are outside the company.
    pub fn is_on_hand(self) -> bool {
        matches!(self, LocationKind::Internal | LocationKind::Transit)
    }
}

/// Stock move lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveState {
    Draft,
    Assigned,
    Done,
    Cancelled,
}

/// One physical transfer of a product between two locations.
///
/// Two roles matter for costing: inbound receipts (supplier -> internal)
/// carry the purchase cost into stock, and outbound deliveries
/// (internal -> customer) become the delivery layers invoicing matches
/// against. Raw-material moves consumed by a production order additionally
/// aggregate the consumption-side values of their lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMove {
    pub id: StockMoveId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub source: LocationKind,
    pub dest: LocationKind,
    pub state: MoveState,
    /// Set when the move reaches `Done`; orders delivery layers.
    pub done_at: Option<DateTime<Utc>>,
    /// Propagated from the purchase line on inbound receipts.
    pub purchase_cost: Decimal,
    pub product_quality: Decimal,
    pub first_process_weight: Decimal,
    /// Sum of consumption-side cost over this move's lines.
    pub total_purchase_cost: Decimal,
    /// Sum of consumption-side weight over this move's lines.
    pub total_weight: Decimal,
    /// Weight-weighted quality over this move's lines, truncated.
    pub weighted_average_quality: Decimal,
}

impl StockMove {
    pub fn new(
        id: StockMoveId,
        product_id: ProductId,
        quantity: Decimal,
        source: LocationKind,
        dest: LocationKind,
    ) -> Self {
        Self {
            id,
            product_id,
            quantity,
            source,
            dest,
            state: MoveState::Draft,
            done_at: None,
            purchase_cost: Decimal::ZERO,
            product_quality: Decimal::ZERO,
            first_process_weight: Decimal::ZERO,
            total_purchase_cost: Decimal::ZERO,
            total_weight: Decimal::ZERO,
            weighted_average_quality: Decimal::ZERO,
        }
    }

    /// Mark the move done at a given time. Done moves are frozen except for
    /// cost-field backfills.
    pub fn mark_done(&mut self, at: DateTime<Utc>) {
        self.state = MoveState::Done;
        self.done_at = Some(at);
    }

    pub fn is_outbound(&self) -> bool {
        self.dest == LocationKind::Customer
    }

    pub fn is_inbound_receipt(&self) -> bool {
        self.source == LocationKind::Supplier && self.dest.is_on_hand()
    }

    /// Recompute the totals derived over this move's lines.
    ///
    /// `total_purchase_cost` and `total_weight` sum the consumption-side
    /// values; `weighted_average_quality` divides the weight-weighted
    /// quality sum by the total weight, zero when no weight is present.
    pub fn recompute_totals<'a>(&mut self, lines: impl IntoIterator<Item = &'a MoveLine>) {
        let mut cost = Decimal::ZERO;
        let mut weight = Decimal::ZERO;
        let mut weighted_quality = Decimal::ZERO;
        for line in lines {
            cost += line.mo_purchase_cost;
            weight += line.mo_weight;
            weighted_quality += line.mo_quality * line.mo_weight;
        }
        self.total_purchase_cost = truncate2(cost);
        self.total_weight = weight;
        self.weighted_average_quality = truncate2(guarded_div(weighted_quality, weight));
    }
}

impl Entity for StockMove {
    type Id = StockMoveId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// One (move, lot) pairing within a stock move.
///
/// The same line type serves three roles, each with its own value set:
/// inventory-side lines mirror their owning inbound move (`lot_*`),
/// consumption-side lines resolve values across the `inventory_line` link
/// (`mo_*`), and customer-delivery lines carry the cost derived from the
/// production order that produced their lot (`product_cost`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveLine {
    pub id: MoveLineId,
    pub move_id: StockMoveId,
    pub lot_id: Option<LotId>,
    pub quantity_done: Decimal,
    /// Canonical link from a consumption-side line to the inventory-side
    /// line it consumes, established at creation time.
    pub inventory_line: Option<MoveLineId>,
    pub lot_purchase_cost: Decimal,
    pub lot_quality: Decimal,
    pub lot_weight: Decimal,
    pub mo_purchase_cost: Decimal,
    pub mo_quality: Decimal,
    pub mo_weight: Decimal,
    /// Cost of this delivered slice, derived from manufacturing.
    pub product_cost: Decimal,
    /// Quality of this delivered slice, derived from manufacturing.
    pub average_quality: Decimal,
}

impl MoveLine {
    pub fn new(id: MoveLineId, move_id: StockMoveId, quantity_done: Decimal) -> Self {
        Self {
            id,
            move_id,
            lot_id: None,
            quantity_done,
            inventory_line: None,
            lot_purchase_cost: Decimal::ZERO,
            lot_quality: Decimal::ZERO,
            lot_weight: Decimal::ZERO,
            mo_purchase_cost: Decimal::ZERO,
            mo_quality: Decimal::ZERO,
            mo_weight: Decimal::ZERO,
            product_cost: Decimal::ZERO,
            average_quality: Decimal::ZERO,
        }
    }

    pub fn with_lot(mut self, lot_id: LotId) -> Self {
        self.lot_id = Some(lot_id);
        self
    }

    pub fn consuming(mut self, inventory_line: MoveLineId) -> Self {
        self.inventory_line = Some(inventory_line);
        self
    }

    /// Mirror the owning inbound move's values onto this line.
    pub fn mirror_from_move(&mut self, owner: &StockMove) {
        self.lot_purchase_cost = truncate2(owner.purchase_cost);
        self.lot_quality = owner.product_quality;
        self.lot_weight = owner.first_process_weight;
    }

    /// Resolve consumption-side values across the canonical inventory link.
    /// A missing link degrades to zero; the chain never halts on it.
    pub fn resolve_consumption(&mut self, inventory: Option<&MoveLine>) {
        match inventory {
            Some(source) => {
                self.mo_purchase_cost = source.lot_purchase_cost;
                self.mo_quality = source.lot_quality;
                self.mo_weight = source.lot_weight;
            }
            None => {
                tracing::debug!(line = %self.id, "consumption line has no inventory link, degrading to zero");
                self.mo_purchase_cost = Decimal::ZERO;
                self.mo_quality = Decimal::ZERO;
                self.mo_weight = Decimal::ZERO;
            }
        }
    }
}

impl Entity for MoveLine {
    type Id = MoveLineId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
