//! The cached derived object stored in a [`FeatureMap`](crate::FeatureMap).

use crate::position::Position;

/// A derived feature anchored at one or more grid positions.
///
/// A feature is published in the map under each of its [`parts`](Feature::parts)
/// and stays there until it is retired. Once invalidated it never becomes
/// valid again.
pub trait Feature: Send + Sync + 'static {
    /// Every position the feature is published under.
    fn parts(&self) -> &[Position];

    /// Returns `true` if `pos` is one of this feature's air parts.
    fn is_air_part(&self, pos: &Position) -> bool {
        self.parts().contains(pos)
    }

    /// Marks the feature permanently stale.
    ///
    /// Returns `true` only for the call that performed the transition, so
    /// repeated calls are observably identical to one.
    fn invalidate(&self) -> bool;

    /// Returns `false` once [`invalidate`](Feature::invalidate) has been called.
    fn is_valid(&self) -> bool;

    /// Whether `other` describes the same cells.
    fn same_parts(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        self.parts() == other.parts()
    }
}
