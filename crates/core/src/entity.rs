//! Entity trait: identity + continuity across derived-field recomputation.

/// Entity marker + minimal interface.
///
/// The propagation working set stores entities keyed by their typed id;
/// derived cost fields on an entity change over its life while the identity
/// anchor stays fixed.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
