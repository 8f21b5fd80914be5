//! Bounds providers.
//!
//! A policy yields either one `(lower, upper)` pair for the whole series or a
//! pair per index. Both are exposed through [`BoundsProvider`] so the
//! evaluator never needs to know which one it holds.

use hr_pulse_core::types::Bounds;

/// Source of the adaptive bounds for a series index.
pub trait BoundsProvider: Send + Sync + std::fmt::Debug {
    /// Bounds applying at `index`. Undefined bounds exclude the index.
    fn bounds_at(&self, index: usize) -> Bounds;

    /// The single pair used for every index, if the provider is constant.
    fn constant(&self) -> Option<Bounds> {
        None
    }
}

/// Same bounds for every index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantBounds(Bounds);

impl ConstantBounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self(Bounds::new(lower, upper))
    }
}

impl From<Bounds> for ConstantBounds {
    fn from(bounds: Bounds) -> Self {
        Self(bounds)
    }
}

impl BoundsProvider for ConstantBounds {
    fn bounds_at(&self, _index: usize) -> Bounds {
        self.0
    }

    fn constant(&self) -> Option<Bounds> {
        Some(self.0)
    }
}

/// Bounds looked up per index; indices past the end are undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedBounds(Vec<Bounds>);

impl IndexedBounds {
    pub fn new(bounds: Vec<Bounds>) -> Self {
        Self(bounds)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl BoundsProvider for IndexedBounds {
    fn bounds_at(&self, index: usize) -> Bounds {
        self.0.get(index).copied().unwrap_or(Bounds::UNDEFINED)
    }
}
