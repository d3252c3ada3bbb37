use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use costchain_core::{CurrencyConverter, DomainError};
use costchain_purchasing::{PurchaseLineId, PurchaseOrderId};

use crate::model::CostModel;
use crate::propagation::{CostNode, PropagationGraph};

/// An explicit, session-scoped market-price update. Passed by value to the
/// recalculator; nothing about the previous price is remembered anywhere
/// else.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketPriceChange {
    pub order: PurchaseOrderId,
    pub market_price: Decimal,
    /// Replace the order's price adjustment when set.
    pub price_adjustment: Option<Decimal>,
    /// Re-date the FX conversion when set.
    pub as_of: Option<NaiveDate>,
}

/// Counts reported back from one recalculation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalculationReport {
    /// Entities whose stored derived values moved.
    pub updated: usize,
    /// Entities recomputed but already at their fixed-point values.
    pub skipped: usize,
}

/// Recalculation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecalcError {
    #[error("purchase order {0} is not in the working set")]
    UnknownOrder(PurchaseOrderId),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Batch entry point for a market-price change after goods have moved.
///
/// Reprices the order's purchase lines from the new market price, then runs
/// the propagation graph over everything reachable from the changed lines in
/// one fixed topological order. Idempotent: a second run over the same
/// closure reports zero updates.
///
/// Exclusivity over the closure is advisory and left to the caller; a run
/// interrupted partway leaves already-processed entities updated and later
/// ones untouched.
pub struct CostChainRecalculator<'a> {
    fx: &'a dyn CurrencyConverter,
}

impl<'a> CostChainRecalculator<'a> {
    pub fn new(fx: &'a dyn CurrencyConverter) -> Self {
        Self { fx }
    }

    pub fn recalculate(
        &self,
        model: &mut CostModel,
        change: &MarketPriceChange,
    ) -> Result<RecalculationReport, RecalcError> {
        let order = model
            .purchase_orders
            .get_mut(&change.order)
            .ok_or(RecalcError::UnknownOrder(change.order))?;
        order.pricing.market_price = change.market_price;
        if let Some(adjustment) = change.price_adjustment {
            order.pricing.price_adjustment = adjustment;
        }
        if let Some(as_of) = change.as_of {
            order.pricing.as_of = as_of;
        }
        let ctx = order.price_context(self.fx)?;

        let line_ids: Vec<PurchaseLineId> = model
            .purchase_lines
            .iter()
            .filter(|(_, l)| l.order_id == change.order)
            .map(|(id, _)| *id)
            .collect();

        let mut report = RecalculationReport::default();
        let mut dirty: Vec<CostNode> = Vec::new();
        for id in line_ids {
            let Some(line) = model.purchase_lines.get_mut(&id) else {
                continue;
            };
            let before = line.clone();
            line.reprice(&ctx);
            if *line != before {
                report.updated += 1;
                dirty.push(CostNode::PurchaseLine(id));
            } else {
                report.skipped += 1;
            }
        }

        let graph = PropagationGraph::build(model);
        let stats = graph.propagate(model, &dirty);
        report.updated += stats.changed;
        report.skipped += (stats.recomputed - stats.changed).saturating_sub(dirty.len());

        tracing::info!(
            order = %change.order,
            updated = report.updated,
            skipped = report.skipped,
            "cost chain recalculated"
        );
        Ok(report)
    }
}
