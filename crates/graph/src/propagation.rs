use std::collections::{BTreeSet, HashMap, HashSet};

use rust_decimal::Decimal;

use costchain_core::truncate2;
use costchain_manufacturing::ProductionOrderId;
use costchain_purchasing::PurchaseLineId;
use costchain_sales::{SaleLineId, SaleOrderId};
use costchain_stock::{aggregate_on_hand, LocationKind, LotId, MoveLineId, StockMoveId};

use crate::model::CostModel;

/// One derived-value node in the propagation graph.
///
/// A stock move appears as two nodes: the receipt values copied down from
/// its purchase line, and the totals summed up from its lines. A move line
/// appears as exactly one of three roles, decided by its owning move and its
/// consumption link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostNode {
    /// Source: the purchase line's derived amount (written by repricing).
    PurchaseLine(PurchaseLineId),
    /// Inbound receipt values copied from the purchase line.
    ReceiptMove(StockMoveId),
    /// Inventory-side line mirroring its owning move.
    InventoryLine(MoveLineId),
    /// Consumption-side line resolving values across its inventory link.
    ConsumptionLine(MoveLineId),
    /// Customer-delivery line costed from the production of its lot.
    OutboundLine(MoveLineId),
    /// Per-move totals over its lines.
    MoveTotals(StockMoveId),
    /// On-hand aggregate projection for a lot.
    Lot(LotId),
    /// Production-order aggregation over its raw moves.
    Production(ProductionOrderId),
    /// Sale-order net price.
    SaleOrder(SaleOrderId),
    /// Sale-line rate and delivery-derived cost/quality.
    SaleLine(SaleLineId),
}

/// Outcome of one propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Nodes recomputed this pass.
    pub recomputed: usize,
    /// Nodes whose stored value actually moved.
    pub changed: usize,
}

/// Explicit dependency graph over a cost model.
///
/// Built once per model shape; every mutation then walks the affected
/// dependents in one fixed topological order. Rebuild after adding or
/// removing entities or links, not after plain value writes.
pub struct PropagationGraph {
    nodes: Vec<CostNode>,
    index: HashMap<CostNode, usize>,
    dependents: Vec<Vec<usize>>,
    topo_pos: Vec<usize>,
}

impl PropagationGraph {
    pub fn build(model: &CostModel) -> Self {
        let mut builder = GraphBuilder::default();

        for id in model.purchase_lines.keys() {
            builder.node(CostNode::PurchaseLine(*id));
        }
        for (id, _) in model.moves.iter() {
            if model.receipt_of.contains_key(id) {
                builder.node(CostNode::ReceiptMove(*id));
            }
            builder.node(CostNode::MoveTotals(*id));
        }
        for (id, line) in model.move_lines.iter() {
            builder.node(classify_line(model, *id, line.move_id, line.inventory_line.is_some()));
        }
        for id in model.lots.keys() {
            builder.node(CostNode::Lot(*id));
        }
        for id in model.productions.keys() {
            builder.node(CostNode::Production(*id));
        }
        for id in model.sale_orders.keys() {
            builder.node(CostNode::SaleOrder(*id));
        }
        for id in model.sale_lines.keys() {
            builder.node(CostNode::SaleLine(*id));
        }

        for (mv, line) in model.receipt_of.iter() {
            builder.edge(CostNode::PurchaseLine(*line), CostNode::ReceiptMove(*mv));
        }
        for (id, line) in model.move_lines.iter() {
            let node = classify_line(model, *id, line.move_id, line.inventory_line.is_some());
            match node {
                CostNode::InventoryLine(_) => {
                    // moves without a purchase link (opening stock) keep
                    // whatever values the caller set; only receipts re-derive
                    if model.receipt_of.contains_key(&line.move_id) {
                        builder.edge(CostNode::ReceiptMove(line.move_id), node);
                    }
                    if let Some(lot) = line.lot_id {
                        builder.edge(node, CostNode::Lot(lot));
                    }
                }
                CostNode::ConsumptionLine(_) | CostNode::OutboundLine(_) => {
                    if let Some(source) = line.inventory_line {
                        builder.edge(CostNode::InventoryLine(source), node);
                    }
                    builder.edge(node, CostNode::MoveTotals(line.move_id));
                }
                _ => {}
            }
        }
        for (id, production) in model.productions.iter() {
            for raw in &production.raw_moves {
                builder.edge(CostNode::MoveTotals(*raw), CostNode::Production(*id));
            }
            if let Some(lot) = production.produced_lot {
                for (line_id, line) in model.move_lines.iter() {
                    let node =
                        classify_line(model, *line_id, line.move_id, line.inventory_line.is_some());
                    if matches!(node, CostNode::OutboundLine(_)) && line.lot_id == Some(lot) {
                        builder.edge(CostNode::Production(*id), node);
                    }
                }
            }
        }
        for (mv, sale_line) in model.delivery_of.iter() {
            for line in model.lines_of_move(*mv) {
                let node =
                    classify_line(model, line.id, line.move_id, line.inventory_line.is_some());
                if matches!(node, CostNode::OutboundLine(_)) {
                    builder.edge(node, CostNode::SaleLine(*sale_line));
                }
            }
            // a delivery with no lines still feeds the sale line's totals
            builder.edge(CostNode::MoveTotals(*mv), CostNode::SaleLine(*sale_line));
        }
        for (id, line) in model.sale_lines.iter() {
            builder.edge(CostNode::SaleOrder(line.order_id), CostNode::SaleLine(*id));
        }

        builder.finish()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Recompute every node, in topological order.
    pub fn propagate_all(&self, model: &mut CostModel) -> PropagationStats {
        let all: Vec<CostNode> = self.nodes.clone();
        self.propagate(model, &all)
    }

    /// Recompute the dirty nodes and all their transitive dependents,
    /// synchronously, in topological order. Dirty nodes unknown to the graph
    /// are ignored.
    pub fn propagate(&self, model: &mut CostModel, dirty: &[CostNode]) -> PropagationStats {
        let mut marked: HashSet<usize> = HashSet::new();
        let mut stack: Vec<usize> = Vec::new();
        for node in dirty {
            match self.index.get(node) {
                Some(i) => {
                    if marked.insert(*i) {
                        stack.push(*i);
                    }
                }
                None => tracing::debug!(?node, "dirty node not present in graph, ignoring"),
            }
        }
        while let Some(i) = stack.pop() {
            for dep in &self.dependents[i] {
                if marked.insert(*dep) {
                    stack.push(*dep);
                }
            }
        }

        let mut ordered: Vec<usize> = marked.into_iter().collect();
        ordered.sort_by_key(|i| self.topo_pos[*i]);

        let mut stats = PropagationStats::default();
        for i in ordered {
            stats.recomputed += 1;
            if recompute(model, self.nodes[i]) {
                stats.changed += 1;
            }
        }
        tracing::trace!(
            recomputed = stats.recomputed,
            changed = stats.changed,
            "propagation pass complete"
        );
        stats
    }
}

fn classify_line(
    model: &CostModel,
    id: MoveLineId,
    move_id: StockMoveId,
    has_inventory_link: bool,
) -> CostNode {
    let outbound = model
        .moves
        .get(&move_id)
        .is_some_and(|m| m.dest == LocationKind::Customer);
    if outbound {
        CostNode::OutboundLine(id)
    } else if has_inventory_link {
        CostNode::ConsumptionLine(id)
    } else {
        CostNode::InventoryLine(id)
    }
}

#[derive(Default)]
struct GraphBuilder {
    nodes: Vec<CostNode>,
    index: HashMap<CostNode, usize>,
    dependents: Vec<Vec<usize>>,
}

impl GraphBuilder {
    fn node(&mut self, node: CostNode) -> usize {
        if let Some(i) = self.index.get(&node) {
            return *i;
        }
        let i = self.nodes.len();
        self.nodes.push(node);
        self.index.insert(node, i);
        self.dependents.push(Vec::new());
        i
    }

    fn edge(&mut self, from: CostNode, to: CostNode) {
        let from = self.node(from);
        let to = self.node(to);
        if !self.dependents[from].contains(&to) {
            self.dependents[from].push(to);
        }
    }

    fn finish(self) -> PropagationGraph {
        // Kahn's algorithm; ties broken by node insertion index so the walk
        // order is total and stable.
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        for deps in &self.dependents {
            for d in deps {
                in_degree[*d] += 1;
            }
        }
        let mut ready: BTreeSet<usize> = (0..n).filter(|i| in_degree[*i] == 0).collect();
        let mut order: Vec<usize> = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for d in &self.dependents[i] {
                in_degree[*d] -= 1;
                if in_degree[*d] == 0 {
                    ready.insert(*d);
                }
            }
        }
        if order.len() != n {
            // a link cycle cannot produce a fixed point; fall back to
            // appending the rest in index order so propagation still runs
            tracing::warn!("propagation graph contains a cycle, remainder walked in index order");
            let seen: HashSet<usize> = order.iter().copied().collect();
            order.extend((0..n).filter(|i| !seen.contains(i)));
        }

        let mut topo_pos = vec![0usize; n];
        for (pos, i) in order.iter().enumerate() {
            topo_pos[*i] = pos;
        }
        PropagationGraph {
            nodes: self.nodes,
            index: self.index,
            dependents: self.dependents,
            topo_pos,
        }
    }
}

/// Recompute one node's stored value. Returns whether the value moved.
///
/// Missing upstream links and zero denominators resolve to zero; the walk
/// never halts on them.
fn recompute(model: &mut CostModel, node: CostNode) -> bool {
    match node {
        CostNode::PurchaseLine(_) => false, // source; written by repricing
        CostNode::ReceiptMove(id) => {
            let Some(current) = model.moves.get(&id) else {
                return false;
            };
            let mut updated = current.clone();
            match model
                .receipt_of
                .get(&id)
                .and_then(|pl| model.purchase_lines.get(pl))
            {
                Some(line) => {
                    updated.purchase_cost = truncate2(line.amount);
                    updated.product_quality = line.quality;
                    updated.first_process_weight = line.effective_first_process();
                }
                None => {
                    tracing::debug!(mv = %id, "receipt move lost its purchase line, degrading to zero");
                    updated.purchase_cost = Decimal::ZERO;
                    updated.product_quality = Decimal::ZERO;
                    updated.first_process_weight = Decimal::ZERO;
                }
            }
            write_back(&mut model.moves, id, updated)
        }
        CostNode::InventoryLine(id) => {
            let Some(current) = model.move_lines.get(&id) else {
                return false;
            };
            let mut updated = current.clone();
            match model.moves.get(&updated.move_id) {
                Some(owner) => updated.mirror_from_move(owner),
                None => {
                    updated.lot_purchase_cost = Decimal::ZERO;
                    updated.lot_quality = Decimal::ZERO;
                    updated.lot_weight = Decimal::ZERO;
                }
            }
            write_back(&mut model.move_lines, id, updated)
        }
        CostNode::ConsumptionLine(id) => {
            let Some(current) = model.move_lines.get(&id) else {
                return false;
            };
            let mut updated = current.clone();
            let source = updated
                .inventory_line
                .and_then(|l| model.move_lines.get(&l));
            updated.resolve_consumption(source);
            write_back(&mut model.move_lines, id, updated)
        }
        CostNode::OutboundLine(id) => {
            let Some(current) = model.move_lines.get(&id) else {
                return false;
            };
            let mut updated = current.clone();
            let source = updated
                .inventory_line
                .and_then(|l| model.move_lines.get(&l));
            updated.resolve_consumption(source);
            match updated.lot_id.and_then(|lot| model.production_of_lot(lot)) {
                Some(production) => {
                    updated.product_cost =
                        truncate2(production.unit_cost() * updated.quantity_done);
                    updated.average_quality = production.weighted_average_quality;
                }
                None => {
                    updated.product_cost = Decimal::ZERO;
                    updated.average_quality = Decimal::ZERO;
                }
            }
            write_back(&mut model.move_lines, id, updated)
        }
        CostNode::MoveTotals(id) => {
            let Some(current) = model.moves.get(&id) else {
                return false;
            };
            let mut updated = current.clone();
            updated.recompute_totals(model.lines_of_move(id).into_iter());
            write_back(&mut model.moves, id, updated)
        }
        CostNode::Lot(id) => {
            let aggregate =
                aggregate_on_hand(id, model.move_lines.values(), |mv| model.moves.get(&mv));
            let changed = model.lot_aggregates.get(&id) != Some(&aggregate);
            model.lot_aggregates.insert(id, aggregate);
            changed
        }
        CostNode::Production(id) => {
            let Some(current) = model.productions.get(&id) else {
                return false;
            };
            let mut updated = current.clone();
            let raw: HashSet<StockMoveId> = updated.raw_moves.iter().copied().collect();
            let moves = raw.iter().filter_map(|m| model.moves.get(m));
            let lines = model
                .move_lines
                .values()
                .filter(|l| raw.contains(&l.move_id));
            updated.aggregate_from_raw(moves, lines);
            write_back(&mut model.productions, id, updated)
        }
        CostNode::SaleOrder(id) => {
            let Some(current) = model.sale_orders.get(&id) else {
                return false;
            };
            let mut updated = current.clone();
            updated.reprice();
            write_back(&mut model.sale_orders, id, updated)
        }
        CostNode::SaleLine(id) => {
            let Some(current) = model.sale_lines.get(&id) else {
                return false;
            };
            let mut updated = current.clone();
            let net_price = model
                .sale_orders
                .get(&updated.order_id)
                .map(|o| o.net_price)
                .unwrap_or(Decimal::ZERO);
            updated.reprice(net_price);
            let moves = model.delivery_moves_of(id);
            updated.recompute_from_deliveries(moves, |mv| model.lines_of_move(mv));
            write_back(&mut model.sale_lines, id, updated)
        }
    }
}

fn write_back<K: Ord + Copy, V: PartialEq>(
    map: &mut std::collections::BTreeMap<K, V>,
    key: K,
    updated: V,
) -> bool {
    match map.get(&key) {
        Some(current) if *current == updated => false,
        _ => {
            map.insert(key, updated);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use costchain_core::{Currency, EntityId, ProductId, Unit};
    use costchain_purchasing::{MarketPricing, PurchaseLine, PurchaseOrder, PurchaseOrderId};
    use costchain_stock::{MoveLine, StockMove};
    use rust_decimal_macros::dec;

    fn pricing() -> MarketPricing {
        MarketPricing {
            market_price: dec!(92),
            price_adjustment: Decimal::ZERO,
            market_currency: Currency::new("USD"),
            market_unit: Unit::Gram,
            input_unit: Unit::Gram,
            transaction_unit: Unit::Gram,
            transaction_currency: Currency::new("USD"),
            purity_factor: dec!(92),
            as_of: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        }
    }

    fn seeded_model() -> (CostModel, PurchaseLineId, StockMoveId, MoveLineId) {
        let mut model = CostModel::new();
        let order = PurchaseOrder::new(PurchaseOrderId::new(EntityId::new()), pricing());
        let product = ProductId::new();
        let mut line = PurchaseLine::new(PurchaseLineId::new(EntityId::new()), order.id, product);
        line.amount = dec!(1000);
        line.quality = dec!(85);
        line.first_process_weight = dec!(100);

        let receipt = StockMove::new(
            StockMoveId::new(EntityId::new()),
            product,
            dec!(100),
            LocationKind::Supplier,
            LocationKind::Internal,
        );
        let inv_line = MoveLine::new(MoveLineId::new(EntityId::new()), receipt.id, dec!(100));

        let (line_id, move_id, inv_id) = (line.id, receipt.id, inv_line.id);
        model.add_purchase_order(order);
        model.add_purchase_line(line);
        model.add_move(receipt);
        model.add_move_line(inv_line);
        model.link_receipt(move_id, line_id);
        (model, line_id, move_id, inv_id)
    }

    #[test]
    fn receipt_and_mirror_follow_the_purchase_line() {
        let (mut model, line_id, move_id, inv_id) = seeded_model();
        let graph = PropagationGraph::build(&model);
        let stats = graph.propagate(&mut model, &[CostNode::PurchaseLine(line_id)]);

        assert!(stats.recomputed >= 3);
        let mv = &model.moves[&move_id];
        assert_eq!(mv.purchase_cost, dec!(1000));
        assert_eq!(mv.product_quality, dec!(85));
        let inv = &model.move_lines[&inv_id];
        assert_eq!(inv.lot_purchase_cost, dec!(1000));
        assert_eq!(inv.lot_weight, dec!(100));
    }

    #[test]
    fn second_pass_with_no_upstream_change_changes_nothing() {
        let (mut model, line_id, _, _) = seeded_model();
        let graph = PropagationGraph::build(&model);
        graph.propagate(&mut model, &[CostNode::PurchaseLine(line_id)]);
        let stats = graph.propagate(&mut model, &[CostNode::PurchaseLine(line_id)]);
        assert_eq!(stats.changed, 0);
        assert!(stats.recomputed > 0);
    }

    #[test]
    fn unknown_dirty_nodes_are_ignored() {
        let (mut model, _, _, _) = seeded_model();
        let graph = PropagationGraph::build(&model);
        let stats = graph.propagate(
            &mut model,
            &[CostNode::SaleLine(SaleLineId::new(EntityId::new()))],
        );
        assert_eq!(stats.recomputed, 0);
    }

    #[test]
    fn consumption_line_reads_across_the_inventory_link() {
        let (mut model, line_id, _, inv_id) = seeded_model();

        let raw = StockMove::new(
            StockMoveId::new(EntityId::new()),
            ProductId::new(),
            dec!(100),
            LocationKind::Internal,
            LocationKind::Internal,
        );
        let consumption =
            MoveLine::new(MoveLineId::new(EntityId::new()), raw.id, dec!(100)).consuming(inv_id);
        let (raw_id, cons_id) = (raw.id, consumption.id);
        model.add_move(raw);
        model.add_move_line(consumption);

        let graph = PropagationGraph::build(&model);
        graph.propagate(&mut model, &[CostNode::PurchaseLine(line_id)]);

        let cons = &model.move_lines[&cons_id];
        assert_eq!(cons.mo_purchase_cost, dec!(1000));
        assert_eq!(cons.mo_quality, dec!(85));
        let raw_mv = &model.moves[&raw_id];
        assert_eq!(raw_mv.total_purchase_cost, dec!(1000));
    }
}
