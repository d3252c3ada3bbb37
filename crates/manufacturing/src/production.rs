use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use costchain_core::{guarded_div, truncate2, Entity, EntityId, ProductId};
use costchain_stock::{LotId, MoveLine, StockMove, StockMoveId};

/// Production order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductionOrderId(pub EntityId);

impl ProductionOrderId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductionOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A production run: consumes raw-material moves, produces one lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: ProductionOrderId,
    pub product_id: ProductId,
    /// Lot this run produced; outbound deliveries of that lot cost against
    /// this order.
    pub produced_lot: Option<LotId>,
    pub raw_moves: Vec<StockMoveId>,
    pub produced_quantity: Decimal,
    /// Total raw-material cost consumed, derived.
    pub purchase_cost: Decimal,
    /// Total consumed weight, derived.
    pub total_weight: Decimal,
    /// Plain mean quality over consumed lines, derived.
    pub average_quality: Decimal,
    /// Weight-weighted quality over consumed lines, derived.
    pub weighted_average_quality: Decimal,
}

impl ProductionOrder {
    pub fn new(id: ProductionOrderId, product_id: ProductId, produced_quantity: Decimal) -> Self {
        Self {
            id,
            product_id,
            produced_lot: None,
            raw_moves: Vec::new(),
            produced_quantity,
            purchase_cost: Decimal::ZERO,
            total_weight: Decimal::ZERO,
            average_quality: Decimal::ZERO,
            weighted_average_quality: Decimal::ZERO,
        }
    }

    pub fn producing(mut self, lot: LotId) -> Self {
        self.produced_lot = Some(lot);
        self
    }

    pub fn consuming(mut self, raw_moves: Vec<StockMoveId>) -> Self {
        self.raw_moves = raw_moves;
        self
    }

    /// Re-aggregate cost/weight/quality from the raw moves and their lines.
    ///
    /// Cost and weight sum the per-move totals; qualities are derived over
    /// the individual consumption lines. A run with no consumed weight has a
    /// weighted average quality of exactly zero.
    pub fn aggregate_from_raw<'a>(
        &mut self,
        moves: impl IntoIterator<Item = &'a StockMove>,
        lines: impl IntoIterator<Item = &'a MoveLine>,
    ) {
        let mut cost = Decimal::ZERO;
        let mut weight = Decimal::ZERO;
        for mv in moves {
            cost += mv.total_purchase_cost;
            weight += mv.total_weight;
        }

        let mut quality_sum = Decimal::ZERO;
        let mut weighted_quality = Decimal::ZERO;
        let mut line_count = 0u32;
        for line in lines {
            quality_sum += line.mo_quality;
            weighted_quality += line.mo_quality * line.mo_weight;
            line_count += 1;
        }

        self.purchase_cost = truncate2(cost);
        self.total_weight = weight;
        self.average_quality = truncate2(guarded_div(quality_sum, Decimal::from(line_count)));
        self.weighted_average_quality = truncate2(guarded_div(weighted_quality, weight));
    }

    /// Cost per produced unit, zero when nothing was produced.
    pub fn unit_cost(&self) -> Decimal {
        guarded_div(self.purchase_cost, self.produced_quantity)
    }
}

impl Entity for ProductionOrder {
    type Id = ProductionOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costchain_stock::{LocationKind, MoveLineId};
    use rust_decimal_macros::dec;

    fn raw_move(cost: Decimal, weight: Decimal) -> StockMove {
        let mut mv = StockMove::new(
            StockMoveId::new(EntityId::new()),
            ProductId::new(),
            weight,
            LocationKind::Internal,
            LocationKind::Internal,
        );
        mv.total_purchase_cost = cost;
        mv.total_weight = weight;
        mv
    }

    fn consumption_line(move_id: StockMoveId, quality: Decimal, weight: Decimal) -> MoveLine {
        let mut line = MoveLine::new(MoveLineId::new(EntityId::new()), move_id, weight);
        line.mo_quality = quality;
        line.mo_weight = weight;
        line
    }

    #[test]
    fn aggregates_cost_and_weighted_quality_over_raw_moves() {
        let a = raw_move(dec!(600), dec!(60));
        let b = raw_move(dec!(400), dec!(40));
        let lines = vec![
            consumption_line(a.id, dec!(90), dec!(60)),
            consumption_line(b.id, dec!(60), dec!(40)),
        ];

        let mut mo = ProductionOrder::new(
            ProductionOrderId::new(EntityId::new()),
            ProductId::new(),
            dec!(100),
        )
        .consuming(vec![a.id, b.id]);
        mo.aggregate_from_raw([&a, &b], lines.iter());

        assert_eq!(mo.purchase_cost, dec!(1000));
        assert_eq!(mo.total_weight, dec!(100));
        // plain mean: (90 + 60) / 2
        assert_eq!(mo.average_quality, dec!(75));
        // weighted: (90*60 + 60*40) / 100
        assert_eq!(mo.weighted_average_quality, dec!(78));
        assert_eq!(mo.unit_cost(), dec!(10));
    }

    #[test]
    fn zero_consumed_weight_yields_zero_weighted_quality() {
        let mut mo = ProductionOrder::new(
            ProductionOrderId::new(EntityId::new()),
            ProductId::new(),
            Decimal::ZERO,
        );
        mo.aggregate_from_raw(std::iter::empty(), std::iter::empty());
        assert_eq!(mo.weighted_average_quality, Decimal::ZERO);
        assert_eq!(mo.average_quality, Decimal::ZERO);
        assert_eq!(mo.unit_cost(), Decimal::ZERO);
    }

    #[test]
    fn truncates_aggregated_cost() {
        let a = raw_move(dec!(333.337), dec!(3));
        let mut mo = ProductionOrder::new(
            ProductionOrderId::new(EntityId::new()),
            ProductId::new(),
            dec!(3),
        );
        mo.aggregate_from_raw([&a], std::iter::empty());
        assert_eq!(mo.purchase_cost, dec!(333.33));
    }
}
