//! `costchain-purchasing` — purchase orders, market-price valuation, and
//! quality scoring.
//!
//! A purchase order carries the market-pricing block (quoted market price,
//! adjustment, unit/currency conventions, purity factor); each line derives
//! its quality score, converted quantity, unit rate, and amount from it. The
//! line amount is the cost the propagation chain pushes into stock.

pub mod order;
pub mod quality;

pub use order::{
    Deduction, DeductionKind, MarketPricing, PriceContext, PurchaseLine, PurchaseLineId,
    PurchaseOrder, PurchaseOrderId, DEFAULT_PURITY_FACTOR,
};
pub use quality::{effective_quality, QualityInputs, QualityStrategy};
