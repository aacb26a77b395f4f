//! The world-model collaborator: cell lookup and classification predicates.
//!
//! The cache never owns the grid. It reads cell states through [`World`]
//! and reduces each state to a [`CellClass`].

use crate::position::Position;

/// How a cell participates in hole detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellClass {
    /// Blast-immune full block; the only valid hole enclosure.
    NoBlast,
    /// No collision; may be a hole air part.
    Open,
    /// Anything else (ordinary solids, partial blocks).
    Other,
}

/// Read access to the world grid.
///
/// Implementations must be cheap to query from many threads at once.
pub trait World: Send + Sync + 'static {
    /// Per-cell state.
    type State: Clone + Send + Sync + 'static;

    /// Current state of `pos`, or `None` if its region is not loaded.
    fn state_at(&self, pos: Position) -> Option<Self::State>;

    /// Whether `state` is a blast-immune block.
    fn is_no_blast(&self, state: &Self::State) -> bool;

    /// Whether `state` has an empty collision shape at `pos`.
    fn has_empty_collision(&self, state: &Self::State, pos: Position) -> bool;

    /// Whether `state` cannot be broken at all.
    fn is_unbreakable(&self, _state: &Self::State) -> bool {
        false
    }

    /// Classifies a state. No-blast takes precedence over open.
    fn classify(&self, state: &Self::State, pos: Position) -> CellClass {
        if self.is_no_blast(state) {
            CellClass::NoBlast
        } else if self.has_empty_collision(state, pos) {
            CellClass::Open
        } else {
            CellClass::Other
        }
    }

    /// Classifies the cell currently at `pos`.
    fn class_at(&self, pos: Position) -> Option<CellClass> {
        self.state_at(pos).map(|state| self.classify(&state, pos))
    }
}
