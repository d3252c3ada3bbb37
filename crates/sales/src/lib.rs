//! `costchain-sales` — sale orders, sale-side pricing, and the derived
//! product cost that feeds invoicing.
//!
//! A sale order may be confirmed with its market price still unfixed; once
//! the price is fixed the line rate is derived from the net market price
//! (quoted per troy ounce, settled per gram). Each line also derives its
//! delivered cost and quality from the done delivery moves linked to it.

pub mod order;

pub use order::{SaleLine, SaleLineId, SaleOrder, SaleOrderId, SaleOrderStatus};
