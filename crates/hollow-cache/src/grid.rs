//! In-memory, thread-safe [`World`] implementation.
//!
//! Cells live in a sparse [`DashMap`]; any unset cell inside a loaded region
//! reads as [`Block::Air`]. Cells in unloaded regions read as `None`.

use dashmap::{DashMap, DashSet};
use rustc_hash::FxBuildHasher;

use crate::position::Position;
use crate::region::RegionAddress;
use crate::world::World;

/// Block palette of the in-memory grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Block {
    /// Empty space.
    #[default]
    Air,
    /// Decorative plant without collision.
    Grass,
    /// Ordinary breakable solid.
    Stone,
    /// Half-height block; solid but not a full enclosure.
    Slab,
    /// Blast-immune, breakable.
    Obsidian,
    /// Blast-immune, unbreakable.
    Bedrock,
}

impl Block {
    /// Whether explosions leave this block intact.
    pub fn is_no_blast(self) -> bool {
        matches!(self, Block::Obsidian | Block::Bedrock)
    }

    /// Whether entities pass through this block.
    pub fn has_empty_collision(self) -> bool {
        matches!(self, Block::Air | Block::Grass)
    }
}

/// Sparse voxel grid with per-region load tracking.
#[derive(Debug, Default)]
pub struct GridWorld {
    cells: DashMap<Position, Block, FxBuildHasher>,
    loaded: DashSet<RegionAddress, FxBuildHasher>,
}

impl GridWorld {
    /// Creates an empty world with no loaded regions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a region as loaded so its cells become readable.
    pub fn load_region(&self, region: RegionAddress) {
        self.loaded.insert(region);
    }

    /// Marks a region as unloaded and drops its cells.
    pub fn unload_region(&self, region: RegionAddress) {
        self.loaded.remove(&region);
        self.cells.retain(|pos, _| !region.contains(*pos));
    }

    /// Returns `true` if `region` is loaded.
    pub fn is_loaded(&self, region: RegionAddress) -> bool {
        self.loaded.contains(&region)
    }

    /// Reads a block; `None` if the region is not loaded.
    pub fn get(&self, pos: Position) -> Option<Block> {
        if !self.is_loaded(pos.region()) {
            return None;
        }
        Some(self.cells.get(&pos).map_or(Block::Air, |cell| *cell))
    }

    /// Writes a block and returns the previous one.
    ///
    /// Writes to unloaded regions are ignored and return `None`.
    pub fn set(&self, pos: Position, block: Block) -> Option<Block> {
        if !self.is_loaded(pos.region()) {
            tracing::warn!("GridWorld::set in unloaded region at {pos}");
            return None;
        }
        let previous = if block == Block::Air {
            self.cells.remove(&pos).map(|(_, b)| b)
        } else {
            self.cells.insert(pos, block)
        };
        Some(previous.unwrap_or(Block::Air))
    }

    /// Fills the inclusive box spanned by `a` and `b`.
    pub fn fill(&self, a: Position, b: Position, block: Block) {
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                for z in a.z.min(b.z)..=a.z.max(b.z) {
                    self.set(Position::new(x, y, z), block);
                }
            }
        }
    }
}

impl World for GridWorld {
    type State = Block;

    fn state_at(&self, pos: Position) -> Option<Block> {
        self.get(pos)
    }

    fn is_no_blast(&self, state: &Block) -> bool {
        state.is_no_blast()
    }

    fn has_empty_collision(&self, state: &Block, _pos: Position) -> bool {
        state.has_empty_collision()
    }

    fn is_unbreakable(&self, state: &Block) -> bool {
        *state == Block::Bedrock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::CellClass;

    #[test]
    fn test_unloaded_region_reads_none() {
        let world = GridWorld::new();
        assert_eq!(world.get(Position::new(0, 0, 0)), None);
        assert_eq!(world.set(Position::new(0, 0, 0), Block::Stone), None);
    }

    #[test]
    fn test_set_returns_previous_block() {
        let world = GridWorld::new();
        world.load_region(RegionAddress::new(0, 0));
        let p = Position::new(1, 1, 1);
        assert_eq!(world.set(p, Block::Stone), Some(Block::Air));
        assert_eq!(world.set(p, Block::Obsidian), Some(Block::Stone));
        assert_eq!(world.set(p, Block::Air), Some(Block::Obsidian));
        assert_eq!(world.get(p), Some(Block::Air));
    }

    #[test]
    fn test_classification() {
        let world = GridWorld::new();
        let p = Position::new(0, 0, 0);
        assert_eq!(world.classify(&Block::Bedrock, p), CellClass::NoBlast);
        assert_eq!(world.classify(&Block::Obsidian, p), CellClass::NoBlast);
        assert_eq!(world.classify(&Block::Air, p), CellClass::Open);
        assert_eq!(world.classify(&Block::Grass, p), CellClass::Open);
        assert_eq!(world.classify(&Block::Stone, p), CellClass::Other);
        assert_eq!(world.classify(&Block::Slab, p), CellClass::Other);
    }

    #[test]
    fn test_unload_drops_cells() {
        let world = GridWorld::new();
        let region = RegionAddress::new(0, 0);
        world.load_region(region);
        world.fill(Position::new(0, 0, 0), Position::new(2, 2, 2), Block::Stone);
        world.unload_region(region);
        world.load_region(region);
        assert_eq!(world.get(Position::new(1, 1, 1)), Some(Block::Air));
    }
}
