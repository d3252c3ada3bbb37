//! `costchain-manufacturing` — production orders and raw-material
//! aggregation.
//!
//! A production order consumes raw-material stock moves and aggregates
//! their cost, weight, and quality into the produced lot. Raw materials are
//! not fungible one-to-one: a unit of higher measured quality represents
//! more recoverable value, so the order carries a weight-weighted average
//! quality alongside the plain one.

pub mod production;

pub use production::{ProductionOrder, ProductionOrderId};
