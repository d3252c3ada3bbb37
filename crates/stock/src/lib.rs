//! `costchain-stock` — stock transfers, lots, and delivery cost layers.
//!
//! A [`StockMove`] is one physical transfer; it splits across [`MoveLine`]s
//! when more than one lot is involved. Lot aggregates are pure projections
//! over on-hand move lines, and outbound customer moves become the
//! time-ordered [`DeliveryLayer`]s the COGS matcher consumes.

pub mod layer;
pub mod lot;
pub mod movement;

pub use layer::{delivery_layers, DeliveryLayer};
pub use lot::{aggregate_on_hand, Lot, LotAggregate, LotId};
pub use movement::{LocationKind, MoveLine, MoveLineId, MoveState, StockMove, StockMoveId};
