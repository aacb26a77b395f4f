//! Live, incrementally updated cache of holes over a chunked voxel world.
//!
//! The world reports two kinds of events: a region becoming available and a
//! single cell changing. The [`InvalidationManager`] turns the first into a
//! population pass on the region's serial task queue, and the second into a
//! local reaction task plus a synchronous cascade that retires every cached
//! feature the change may have made stale.
//!
//! [`HolePolicy`] specializes the manager for holes: vertical air pockets
//! enclosed by blast-immune blocks.

pub mod error;
pub mod feature;
pub mod feature_map;
pub mod grid;
pub mod hole;
pub mod hole_policy;
pub mod manager;
pub mod offsets;
pub mod position;
pub mod region;
pub mod worker;
pub mod world;


pub use error::CacheError;
pub use feature::Feature;
pub use feature_map::{FeatureMap, Inconsistency, InsertOutcome};
pub use grid::{Block, GridWorld};
pub use hole::{Hole, HoleSafety, detect_hole};
pub use hole_policy::{HoleManager, HolePolicy, ReactionKind};
pub use manager::{
    InvalidationManager, InvalidationPolicy, MutationOutcome, MutationPlan, RegionPhase,
    ScanBounds,
};
pub use offsets::{AIR_OFFSETS, BLOCK_OFFSETS};
pub use position::{Cursor, Offset, Position};
pub use region::{REGION_WIDTH, RegionAddress};
pub use worker::{RegionWorkerPool, Task, TaskQueue};
pub use world::{CellClass, World};
