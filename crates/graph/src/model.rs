use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use costchain_core::Entity;
use costchain_manufacturing::{ProductionOrder, ProductionOrderId};
use costchain_purchasing::{PurchaseLine, PurchaseLineId, PurchaseOrder, PurchaseOrderId};
use costchain_sales::{SaleLine, SaleLineId, SaleOrder, SaleOrderId};
use costchain_stock::{Lot, LotAggregate, LotId, MoveLine, MoveLineId, StockMove, StockMoveId};

/// The working set of one propagation closure: every entity reachable from
/// the purchase orders being recomputed, keyed by typed id.
///
/// Ordered maps keep iteration (and therefore graph construction and
/// recompute order) deterministic. The model holds no derived-value logic of
/// its own; it is the substrate the propagation graph reads and writes.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CostModel {
    pub purchase_orders: BTreeMap<PurchaseOrderId, PurchaseOrder>,
    pub purchase_lines: BTreeMap<PurchaseLineId, PurchaseLine>,
    pub moves: BTreeMap<StockMoveId, StockMove>,
    pub move_lines: BTreeMap<MoveLineId, MoveLine>,
    pub lots: BTreeMap<LotId, Lot>,
    /// Derived lot aggregates, recomputed alongside the cost chain.
    pub lot_aggregates: BTreeMap<LotId, LotAggregate>,
    pub productions: BTreeMap<ProductionOrderId, ProductionOrder>,
    pub sale_orders: BTreeMap<SaleOrderId, SaleOrder>,
    pub sale_lines: BTreeMap<SaleLineId, SaleLine>,
    /// Inbound receipt move -> the purchase line it receives.
    pub receipt_of: BTreeMap<StockMoveId, PurchaseLineId>,
    /// Outbound delivery move -> the sale line it delivers.
    pub delivery_of: BTreeMap<StockMoveId, SaleLineId>,
}

impl CostModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_purchase_order(&mut self, order: PurchaseOrder) {
        self.purchase_orders.insert(order.id(), order);
    }

    pub fn add_purchase_line(&mut self, line: PurchaseLine) {
        self.purchase_lines.insert(line.id(), line);
    }

    pub fn add_move(&mut self, mv: StockMove) {
        self.moves.insert(mv.id(), mv);
    }

    pub fn add_move_line(&mut self, line: MoveLine) {
        self.move_lines.insert(line.id(), line);
    }

    pub fn add_lot(&mut self, lot: Lot) {
        self.lots.insert(lot.id(), lot);
    }

    pub fn add_production(&mut self, production: ProductionOrder) {
        self.productions.insert(production.id(), production);
    }

    pub fn add_sale_order(&mut self, order: SaleOrder) {
        self.sale_orders.insert(order.id(), order);
    }

    pub fn add_sale_line(&mut self, line: SaleLine) {
        self.sale_lines.insert(line.id(), line);
    }

    /// Record that `mv` receives goods for `line`.
    pub fn link_receipt(&mut self, mv: StockMoveId, line: PurchaseLineId) {
        self.receipt_of.insert(mv, line);
    }

    /// Record that `mv` delivers goods for `line`.
    pub fn link_delivery(&mut self, mv: StockMoveId, line: SaleLineId) {
        self.delivery_of.insert(mv, line);
    }

    pub fn lines_of_move(&self, mv: StockMoveId) -> Vec<&MoveLine> {
        self.move_lines
            .values()
            .filter(|l| l.move_id == mv)
            .collect()
    }

    pub fn delivery_moves_of(&self, sale_line: SaleLineId) -> Vec<&StockMove> {
        self.delivery_of
            .iter()
            .filter(|(_, s)| **s == sale_line)
            .filter_map(|(m, _)| self.moves.get(m))
            .collect()
    }

    /// Production order that produced a given lot, when any.
    pub fn production_of_lot(&self, lot: LotId) -> Option<&ProductionOrder> {
        self.productions
            .values()
            .find(|p| p.produced_lot == Some(lot))
    }
}
