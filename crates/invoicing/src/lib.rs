//! `costchain-invoicing` — invoice lines and the COGS quantity matcher.
//!
//! The matcher assigns a unit cost to the next slice of quantity being
//! invoiced by walking delivery layers in time order, skipping what earlier
//! postings already recognized and clawing back what credit memos reversed.
//! Consumption is FIFO in spirit, but the layers are delivery events rather
//! than receipts, and consumption is invoicing rather than shipment.

pub mod cogs;
pub mod line;
pub mod resolve;

pub use cogs::{
    match_unit_cost, quantity_already_invoiced, CogsError, DeliveryMoves, MatchedCost,
    PostedCogsLines,
};
pub use line::{InvoiceKind, InvoiceLine, InvoiceLineId};
pub use resolve::{CostResolver, DefaultCosting, StandardCostTable};
