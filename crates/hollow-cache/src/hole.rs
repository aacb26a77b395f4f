//! Holes: enclosed vertical air pockets.
//!
//! A hole is a vertical run of open cells, at most `max_hole_height` tall
//! and inside the scan window, whose floor, cap and every wall (the four
//! horizontal neighbours of each air part) are blast-immune. Ordinary blocks
//! therefore never take part in a hole.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::feature::Feature;
use crate::manager::ScanBounds;
use crate::position::Position;
use crate::world::{CellClass, World};

/// How well a hole's enclosure holds up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HoleSafety {
    /// Every enclosing block is unbreakable.
    Bedrock,
    /// At least one enclosing block can be mined.
    Obsidian,
}

/// A cached hole.
#[derive(Debug)]
pub struct Hole {
    /// Air parts, bottom to top. Never empty.
    parts: Vec<Position>,
    safety: HoleSafety,
    valid: AtomicBool,
}

impl Hole {
    pub(crate) fn new(parts: Vec<Position>, safety: HoleSafety) -> Self {
        debug_assert!(!parts.is_empty());
        debug_assert!(parts.windows(2).all(|w| w[1] == w[0].up()));
        Self {
            parts,
            safety,
            valid: AtomicBool::new(true),
        }
    }

    /// Lowest air part.
    pub fn bottom(&self) -> Position {
        self.parts[0]
    }

    /// Highest air part.
    pub fn top(&self) -> Position {
        self.parts[self.parts.len() - 1]
    }

    /// The blast-immune cell the hole rests on.
    pub fn floor(&self) -> Position {
        self.bottom().down()
    }

    /// The blast-immune cell covering the hole.
    pub fn cap(&self) -> Position {
        self.top().up()
    }

    /// Number of air parts.
    pub fn height(&self) -> usize {
        self.parts.len()
    }

    /// Enclosure rating.
    pub fn safety(&self) -> HoleSafety {
        self.safety
    }
}

impl Feature for Hole {
    fn parts(&self) -> &[Position] {
        &self.parts
    }

    fn is_air_part(&self, pos: &Position) -> bool {
        // Parts form one column, so a range check suffices.
        let bottom = self.bottom();
        pos.x == bottom.x && pos.z == bottom.z && (bottom.y..=self.top().y).contains(&pos.y)
    }

    fn invalidate(&self) -> bool {
        self.valid.swap(false, Ordering::AcqRel)
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }
}

/// Checks one enclosing cell. `Some(unbreakable)` if it is blast-immune.
fn enclosure<W: World>(world: &W, pos: Position) -> Option<bool> {
    let state = world.state_at(pos)?;
    (world.classify(&state, pos) == CellClass::NoBlast).then(|| world.is_unbreakable(&state))
}

/// Detects the hole containing `pos`, if `pos` is an air part of one.
///
/// Any unloaded cell touched by the check yields `None`.
pub fn detect_hole<W: World>(
    world: &W,
    pos: Position,
    bounds: ScanBounds,
    max_height: u32,
) -> Option<Hole> {
    let max_height = i32::try_from(max_height).unwrap_or(i32::MAX);
    if !bounds.contains_y(pos.y) || world.class_at(pos)? != CellClass::Open {
        return None;
    }

    let mut bottom = pos;
    let mut unbreakable = loop {
        let below = bottom.down();
        if world.class_at(below)? != CellClass::Open {
            break enclosure(world, below)?;
        }
        if !bounds.contains_y(below.y) || pos.y - below.y + 1 > max_height {
            return None;
        }
        bottom = below;
    };

    let mut top = pos;
    unbreakable &= loop {
        let above = top.up();
        if world.class_at(above)? != CellClass::Open {
            break enclosure(world, above)?;
        }
        if !bounds.contains_y(above.y) || above.y - bottom.y + 1 > max_height {
            return None;
        }
        top = above;
    };

    let parts: Vec<Position> = (bottom.y..=top.y)
        .map(|y| Position::new(pos.x, y, pos.z))
        .collect();
    for part in &parts {
        for wall in part.horizontal_neighbors() {
            unbreakable &= enclosure(world, wall)?;
        }
    }

    let safety = if unbreakable {
        HoleSafety::Bedrock
    } else {
        HoleSafety::Obsidian
    };
    Some(Hole::new(parts, safety))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Block, GridWorld};
    use crate::region::RegionAddress;

    fn bounds() -> ScanBounds {
        ScanBounds::new(0, 10).unwrap()
    }

    /// Obsidian box around the column x=z=1, with the given open run.
    fn pocket(floor: Block, ys: std::ops::RangeInclusive<i32>) -> GridWorld {
        let world = GridWorld::new();
        world.load_region(RegionAddress::new(0, 0));
        world.fill(Position::new(0, 0, 0), Position::new(2, 11, 2), Block::Obsidian);
        world.set(Position::new(1, *ys.start() - 1, 1), floor);
        for y in ys {
            world.set(Position::new(1, y, 1), Block::Air);
        }
        world
    }

    #[test]
    fn test_detects_pocket_from_any_part() {
        let world = pocket(Block::Obsidian, 4..=6);
        for y in 4..=6 {
            let hole = detect_hole(&world, Position::new(1, y, 1), bounds(), 3).unwrap();
            assert_eq!(hole.bottom(), Position::new(1, 4, 1));
            assert_eq!(hole.top(), Position::new(1, 6, 1));
            assert_eq!(hole.floor(), Position::new(1, 3, 1));
            assert_eq!(hole.height(), 3);
            assert_eq!(hole.safety(), HoleSafety::Obsidian);
        }
    }

    #[test]
    fn test_air_parts_exclude_enclosure() {
        let world = pocket(Block::Obsidian, 4..=6);
        let hole = detect_hole(&world, Position::new(1, 5, 1), bounds(), 3).unwrap();
        assert!(hole.is_air_part(&Position::new(1, 4, 1)));
        assert!(hole.is_air_part(&Position::new(1, 6, 1)));
        assert!(!hole.is_air_part(&Position::new(1, 3, 1)));
        assert!(!hole.is_air_part(&Position::new(1, 7, 1)));
        assert!(!hole.is_air_part(&Position::new(0, 5, 1)));
    }

    #[test]
    fn test_too_tall_run_is_not_a_hole() {
        let world = pocket(Block::Obsidian, 4..=7);
        assert!(detect_hole(&world, Position::new(1, 5, 1), bounds(), 3).is_none());
        assert!(detect_hole(&world, Position::new(1, 5, 1), bounds(), 4).is_some());
    }

    #[test]
    fn test_ordinary_floor_is_not_a_hole() {
        let world = pocket(Block::Stone, 4..=5);
        assert!(detect_hole(&world, Position::new(1, 4, 1), bounds(), 3).is_none());
    }

    #[test]
    fn test_open_wall_is_not_a_hole() {
        let world = pocket(Block::Obsidian, 4..=5);
        world.set(Position::new(2, 5, 1), Block::Grass);
        assert!(detect_hole(&world, Position::new(1, 4, 1), bounds(), 3).is_none());
    }

    #[test]
    fn test_ordinary_cap_is_not_a_hole() {
        let world = pocket(Block::Obsidian, 4..=5);
        world.set(Position::new(1, 6, 1), Block::Stone);
        assert!(detect_hole(&world, Position::new(1, 4, 1), bounds(), 3).is_none());
        world.set(Position::new(1, 6, 1), Block::Bedrock);
        let hole = detect_hole(&world, Position::new(1, 4, 1), bounds(), 3).unwrap();
        assert_eq!(hole.cap(), Position::new(1, 6, 1));
    }

    #[test]
    fn test_solid_cell_is_not_a_hole() {
        let world = pocket(Block::Obsidian, 4..=5);
        assert!(detect_hole(&world, Position::new(1, 3, 1), bounds(), 3).is_none());
    }

    #[test]
    fn test_run_leaving_scan_window_is_not_a_hole() {
        let world = pocket(Block::Obsidian, 9..=10);
        world.set(Position::new(1, 11, 1), Block::Air);
        world.set(Position::new(1, 12, 1), Block::Obsidian);
        // The run 9..=11 pokes out of the window even though it is short enough.
        assert!(detect_hole(&world, Position::new(1, 9, 1), bounds(), 3).is_none());
    }

    #[test]
    fn test_bedrock_enclosure_rated_bedrock() {
        let world = GridWorld::new();
        world.load_region(RegionAddress::new(0, 0));
        world.fill(Position::new(0, 0, 0), Position::new(2, 3, 2), Block::Bedrock);
        world.set(Position::new(1, 1, 1), Block::Air);
        world.set(Position::new(1, 2, 1), Block::Air);
        let hole = detect_hole(&world, Position::new(1, 2, 1), bounds(), 3).unwrap();
        assert_eq!(hole.safety(), HoleSafety::Bedrock);
    }

    #[test]
    fn test_unloaded_neighbor_region_blocks_detection() {
        let world = GridWorld::new();
        world.load_region(RegionAddress::new(0, 0));
        world.fill(Position::new(14, 0, 0), Position::new(15, 3, 2), Block::Obsidian);
        world.set(Position::new(15, 1, 1), Block::Air);
        // The +X wall at x=16 is in an unloaded region.
        assert!(detect_hole(&world, Position::new(15, 1, 1), bounds(), 3).is_none());
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let hole = Hole::new(vec![Position::new(0, 1, 0)], HoleSafety::Obsidian);
        assert!(hole.is_valid());
        assert!(hole.invalidate());
        assert!(!hole.invalidate());
        assert!(!hole.is_valid());
    }
}
