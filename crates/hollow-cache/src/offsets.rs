//! Precomputed cascade offset sets.
//!
//! Each set lists the displacements, relative to a changed cell, at which a
//! cached hole may have been computed under that cell's previous
//! classification. Both sets are closed under negation.

use crate::position::Offset;

/// Face-adjacent displacements.
const FACES: [Offset; 6] = [
    Offset::new(1, 0, 0),
    Offset::new(-1, 0, 0),
    Offset::new(0, 1, 0),
    Offset::new(0, -1, 0),
    Offset::new(0, 0, 1),
    Offset::new(0, 0, -1),
];

/// Swept when a cell becomes open: it may have been the floor, a wall, or
/// the cap above a hole at any face neighbour.
pub const AIR_OFFSETS: [Offset; 6] = FACES;

/// Swept when a cell becomes no-blast solid: besides enclosing its
/// neighbours, the cell itself may have been an air part.
pub const BLOCK_OFFSETS: [Offset; 7] = [
    Offset::ZERO,
    FACES[0],
    FACES[1],
    FACES[2],
    FACES[3],
    FACES[4],
    FACES[5],
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{Cursor, Position};

    fn assert_symmetric(set: &[Offset]) {
        for &o in set {
            assert!(set.contains(&-o), "{o:?} has no inverse in the set");
        }
    }

    fn assert_unique(set: &[Offset]) {
        for (i, a) in set.iter().enumerate() {
            assert!(!set[i + 1..].contains(a), "{a:?} listed twice");
        }
    }

    #[test]
    fn test_offset_sets_are_symmetric() {
        assert_symmetric(&AIR_OFFSETS);
        assert_symmetric(&BLOCK_OFFSETS);
    }

    #[test]
    fn test_offset_sets_have_no_duplicates() {
        assert_unique(&AIR_OFFSETS);
        assert_unique(&BLOCK_OFFSETS);
    }

    #[test]
    fn test_reverse_cascade_reaches_origin() {
        let p = Position::new(3, 64, -9);
        for set in [&AIR_OFFSETS[..], &BLOCK_OFFSETS[..]] {
            for &o in set {
                let mut forward = Cursor::new(p);
                let reached = forward.with_offset(o);
                let mut back = Cursor::new(reached);
                assert_eq!(back.with_offset(-o), p);
            }
        }
    }

    #[test]
    fn test_block_offsets_cover_origin_and_air_offsets() {
        assert!(BLOCK_OFFSETS.contains(&Offset::ZERO));
        assert!(!AIR_OFFSETS.contains(&Offset::ZERO));
        for o in AIR_OFFSETS {
            assert!(BLOCK_OFFSETS.contains(&o));
        }
    }
}
