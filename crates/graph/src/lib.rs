//! `costchain-graph` — the cost propagation graph and the chain
//! recalculator.
//!
//! Derived cost and quality values flow from a purchase line through stock
//! moves, move lines, and production orders into sale lines. The flow is an
//! explicit dependency graph: nodes and edges are built once from the
//! working set's links and walked in topological order on every mutation,
//! synchronously, so every dependent is fresh before the triggering write
//! returns.

pub mod model;
pub mod propagation;
pub mod recalc;

pub use model::CostModel;
pub use propagation::{CostNode, PropagationGraph, PropagationStats};
pub use recalc::{CostChainRecalculator, MarketPriceChange, RecalcError, RecalculationReport};
