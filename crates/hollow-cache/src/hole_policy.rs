//! Hole specialization of the invalidation manager.
//!
//! | new state      | reaction task  | cascade sweeps                  |
//! |----------------|----------------|---------------------------------|
//! | no-blast solid | `SolidAdded`   | `BLOCK_OFFSETS`                 |
//! | open           | `OpenAdded`    | `AIR_OFFSETS`                   |
//! | anything else  | none           | `AIR_OFFSETS`, `BLOCK_OFFSETS`  |
//!
//! A neutral state says nothing about what the cell used to be, so both
//! sets are swept. It never needs a reaction: a hole is blast-immune on
//! every side, so an ordinary block can only ever end one.

use std::marker::PhantomData;
use std::sync::Arc;

use hollow_config::{Config, HoleConfig};

use crate::error::CacheError;
use crate::feature_map::{FeatureMap, InsertOutcome};
use crate::hole::{Hole, detect_hole};
use crate::manager::{InvalidationManager, InvalidationPolicy, MutationPlan, ScanBounds};
use crate::offsets::{AIR_OFFSETS, BLOCK_OFFSETS};
use crate::position::{Offset, Position};
use crate::region::RegionAddress;
use crate::worker::RegionWorkerPool;
use crate::world::{CellClass, World};

const SOLID_SWEEPS: &[&[Offset]] = &[&BLOCK_OFFSETS];
const OPEN_SWEEPS: &[&[Offset]] = &[&AIR_OFFSETS];
const NEUTRAL_SWEEPS: &[&[Offset]] = &[&AIR_OFFSETS, &BLOCK_OFFSETS];

/// Reaction task variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    /// A blast-immune block appeared: it may now floor or wall a hole.
    SolidAdded,
    /// A cell became open: it may now be part of a hole.
    OpenAdded,
}

/// Detects holes and decides how cell changes invalidate them.
pub struct HolePolicy<W> {
    max_hole_height: u32,
    _world: PhantomData<fn() -> W>,
}

impl<W> HolePolicy<W> {
    /// Creates a policy recognising runs up to `max_hole_height` cells tall.
    pub fn new(max_hole_height: u32) -> Self {
        Self {
            max_hole_height: max_hole_height.max(1),
            _world: PhantomData,
        }
    }

    /// Policy from the `holes` section of the config.
    pub fn from_config(config: &HoleConfig) -> Self {
        Self::new(config.max_hole_height)
    }

    /// Tallest run recognised as a hole.
    pub fn max_hole_height(&self) -> u32 {
        self.max_hole_height
    }
}

impl<W: World> HolePolicy<W> {
    fn publish(&self, map: &FeatureMap<Hole>, hole: Option<Hole>) -> usize {
        match hole.map(|hole| map.insert(Arc::new(hole))) {
            Some(InsertOutcome::Inserted { .. }) => 1,
            Some(InsertOutcome::Unchanged) | None => 0,
        }
    }

    fn open_at(world: &W, pos: Position) -> Option<bool> {
        world.class_at(pos).map(|class| class == CellClass::Open)
    }
}

impl<W: World> InvalidationPolicy for HolePolicy<W> {
    type World = W;
    type Feature = Hole;
    type Reaction = ReactionKind;

    fn plan(&self, world: &W, pos: Position, state: &W::State) -> MutationPlan<ReactionKind> {
        match world.classify(state, pos) {
            CellClass::NoBlast => MutationPlan {
                reaction: Some(ReactionKind::SolidAdded),
                sweeps: SOLID_SWEEPS,
            },
            CellClass::Open => MutationPlan {
                reaction: Some(ReactionKind::OpenAdded),
                sweeps: OPEN_SWEEPS,
            },
            CellClass::Other => MutationPlan {
                reaction: None,
                sweeps: NEUTRAL_SWEEPS,
            },
        }
    }

    fn populate(
        &self,
        world: &W,
        map: &FeatureMap<Hole>,
        region: RegionAddress,
        bounds: ScanBounds,
    ) -> usize {
        let inserted = self.scan_columns(world, map, region.columns(), bounds);
        inserted.unwrap_or_else(|partial| {
            tracing::debug!("region {region} became unreadable during population");
            partial
        })
    }

    fn react(
        &self,
        world: &W,
        map: &FeatureMap<Hole>,
        reaction: ReactionKind,
        pos: Position,
        region: RegionAddress,
        bounds: ScanBounds,
    ) -> usize {
        let detect = |at: Position| {
            if region.contains(at) {
                detect_hole(world, at, bounds, self.max_hole_height)
            } else {
                None
            }
        };
        match reaction {
            ReactionKind::OpenAdded => self.publish(map, detect(pos)),
            ReactionKind::SolidAdded => AIR_OFFSETS
                .iter()
                .map(|&offset| self.publish(map, detect(pos + offset)))
                .sum(),
        }
    }

    fn rescan_border(
        &self,
        world: &W,
        map: &FeatureMap<Hole>,
        region: RegionAddress,
        neighbor: RegionAddress,
        bounds: ScanBounds,
    ) -> usize {
        let columns = region.border_columns(neighbor);
        self.scan_columns(world, map, columns, bounds)
            .unwrap_or_else(|partial| partial)
    }
}

impl<W: World> HolePolicy<W> {
    /// Detects and publishes every hole in `columns` over the scan window.
    ///
    /// Stops at the first unreadable cell, returning `Err` with the count
    /// published so far.
    fn scan_columns(
        &self,
        world: &W,
        map: &FeatureMap<Hole>,
        columns: impl Iterator<Item = (i32, i32)>,
        bounds: ScanBounds,
    ) -> Result<usize, usize> {
        let mut inserted = 0;
        for (x, z) in columns {
            let mut y = bounds.min_height();
            while y <= bounds.max_height() {
                let pos = Position::new(x, y, z);
                match Self::open_at(world, pos) {
                    None => return Err(inserted),
                    Some(false) => {
                        y += 1;
                        continue;
                    }
                    Some(true) => {}
                }

                // `pos` starts an open run.
                match detect_hole(world, pos, bounds, self.max_hole_height) {
                    Some(hole) => {
                        y = hole.top().y + 1;
                        inserted += self.publish(map, Some(hole));
                    }
                    None => {
                        while y <= bounds.max_height()
                            && Self::open_at(world, Position::new(x, y, z)) == Some(true)
                        {
                            y += 1;
                        }
                    }
                }
            }
        }
        Ok(inserted)
    }
}

/// Hole cache running on a [`RegionWorkerPool`] by default.
pub type HoleManager<W, Q = RegionWorkerPool> = InvalidationManager<HolePolicy<W>, Q>;

impl<W: World> InvalidationManager<HolePolicy<W>, RegionWorkerPool> {
    /// Builds a hole manager, and its worker pool, from a validated config.
    pub fn from_config(config: &Config, world: Arc<W>) -> Result<Self, CacheError> {
        config.validate()?;
        let bounds = ScanBounds::from_config(&config.scan)?;
        let pool = RegionWorkerPool::with_threads(config.workers.threads)?;
        Ok(Self::new(
            HolePolicy::from_config(&config.holes),
            world,
            Arc::new(pool),
            bounds,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use crate::grid::{Block, GridWorld};

    const ORIGIN: RegionAddress = RegionAddress::new(0, 0);

    fn bounds() -> ScanBounds {
        ScanBounds::new(0, 10).unwrap()
    }

    fn policy() -> HolePolicy<GridWorld> {
        HolePolicy::new(3)
    }

    fn obsidian_region() -> GridWorld {
        let world = GridWorld::new();
        world.load_region(ORIGIN);
        world.fill(Position::new(0, 0, 0), Position::new(15, 11, 15), Block::Obsidian);
        world
    }

    #[test]
    fn test_plan_per_classification() {
        let world = GridWorld::new();
        let p = Position::new(0, 0, 0);
        let policy = policy();

        let solid = policy.plan(&world, p, &Block::Obsidian);
        assert_eq!(solid.reaction, Some(ReactionKind::SolidAdded));
        assert_eq!(solid.sweeps, SOLID_SWEEPS);

        let open = policy.plan(&world, p, &Block::Air);
        assert_eq!(open.reaction, Some(ReactionKind::OpenAdded));
        assert_eq!(open.sweeps, OPEN_SWEEPS);

        let neutral = policy.plan(&world, p, &Block::Slab);
        assert_eq!(neutral.reaction, None);
        assert_eq!(neutral.sweeps.len(), 2);
        assert_eq!(neutral.sweeps[0], &AIR_OFFSETS[..]);
        assert_eq!(neutral.sweeps[1], &BLOCK_OFFSETS[..]);
    }

    #[test]
    fn test_populate_finds_every_pocket_once() {
        let world = obsidian_region();
        world.set(Position::new(3, 5, 3), Block::Air);
        world.fill(Position::new(8, 2, 8), Position::new(8, 4, 8), Block::Air);
        // Too tall, never a hole.
        world.fill(Position::new(12, 2, 12), Position::new(12, 7, 12), Block::Air);

        let map = FeatureMap::new();
        let inserted = policy().populate(&world, &map, ORIGIN, bounds());
        assert_eq!(inserted, 2);
        assert_eq!(map.features().len(), 2);
        assert_eq!(map.len(), 4);
        assert!(map.get(&Position::new(12, 4, 12)).is_none());

        // A second pass publishes nothing new.
        let again = policy().populate(&world, &map, ORIGIN, bounds());
        assert_eq!(again, 0);
        assert_eq!(map.features().len(), 2);
    }

    #[test]
    fn test_populate_of_unloaded_region_is_empty() {
        let world = GridWorld::new();
        let map = FeatureMap::new();
        assert_eq!(
            policy().populate(&world, &map, ORIGIN, bounds()),
            0
        );
        assert!(map.is_empty());
    }

    #[test]
    fn test_open_added_creates_hole() {
        let world = obsidian_region();
        let map = FeatureMap::new();
        let p = Position::new(5, 5, 5);
        world.set(p, Block::Air);
        assert_eq!(
            policy().react(&world, &map, ReactionKind::OpenAdded, p, ORIGIN, bounds()),
            1
        );
        assert!(map.get(&p).unwrap().is_air_part(&p));
    }

    #[test]
    fn test_solid_added_closes_neighbor_pocket() {
        let world = obsidian_region();
        let map = FeatureMap::new();
        let part = Position::new(5, 5, 5);
        let wall = Position::new(6, 5, 5);
        world.set(part, Block::Air);
        world.set(wall, Block::Stone);
        assert_eq!(
            policy().populate(&world, &map, ORIGIN, bounds()),
            0
        );

        world.set(wall, Block::Obsidian);
        let inserted =
            policy().react(&world, &map, ReactionKind::SolidAdded, wall, ORIGIN, bounds());
        assert_eq!(inserted, 1);
        assert!(map.get(&part).is_some());
    }

    #[test]
    fn test_reaction_on_non_hole_cell_changes_nothing() {
        let world = obsidian_region();
        let map = FeatureMap::new();
        let p = Position::new(5, 5, 5);
        world.set(p, Block::Slab);
        assert_eq!(
            policy().react(&world, &map, ReactionKind::OpenAdded, p, ORIGIN, bounds()),
            0
        );
        assert!(map.is_empty());
    }

    #[test]
    fn test_reaction_only_publishes_inside_its_region() {
        let world = obsidian_region();
        let east = RegionAddress::new(1, 0);
        world.load_region(east);
        world.fill(Position::new(16, 0, 0), Position::new(17, 11, 15), Block::Obsidian);
        let map = FeatureMap::new();
        // Pocket in the east region whose -X wall is the changed cell.
        let part = Position::new(16, 5, 5);
        let wall = Position::new(15, 5, 5);
        world.set(part, Block::Air);

        assert_eq!(
            policy().react(&world, &map, ReactionKind::SolidAdded, wall, ORIGIN, bounds()),
            0
        );
        assert!(map.is_empty());
        assert_eq!(
            policy().react(&world, &map, ReactionKind::SolidAdded, wall, east, bounds()),
            1
        );
        assert!(map.get(&part).is_some());
    }

    #[test]
    fn test_border_rescan_only_visits_facing_columns() {
        let world = obsidian_region();
        world.load_region(RegionAddress::new(1, 0));
        world.fill(Position::new(16, 0, 0), Position::new(16, 11, 15), Block::Obsidian);
        let edge = Position::new(15, 5, 4);
        let inner = Position::new(7, 5, 4);
        world.set(edge, Block::Air);
        world.set(inner, Block::Air);

        let map = FeatureMap::new();
        let east = RegionAddress::new(1, 0);
        assert_eq!(policy().rescan_border(&world, &map, ORIGIN, east, bounds()), 1);
        assert!(map.get(&edge).is_some());
        assert!(map.get(&inner).is_none());
        let west = RegionAddress::new(-1, 0);
        assert_eq!(policy().rescan_border(&world, &map, ORIGIN, west, bounds()), 0);
    }

    #[test]
    fn test_from_config_rejects_invalid_bounds() {
        let mut config = Config::default();
        config.scan.min_height = 5;
        config.scan.max_height = 4;
        let result: Result<HoleManager<GridWorld>, _> =
            HoleManager::from_config(&config, Arc::new(GridWorld::new()));
        assert!(matches!(result, Err(CacheError::Config(_))));
    }
}
