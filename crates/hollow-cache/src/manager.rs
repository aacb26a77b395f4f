//! Generic incremental invalidation manager.
//!
//! The manager owns the shared [`FeatureMap`] and reacts to two events from
//! the world model:
//!
//! * [`on_region_populated`](InvalidationManager::on_region_populated) schedules
//!   a full population pass on the region's queue.
//! * [`on_cell_changed`](InvalidationManager::on_cell_changed) schedules a
//!   local reaction task on the region's queue and then, on the calling thread,
//!   cascades invalidation over the offset sets chosen by the policy.
//!
//! The cascade does not wait for the reaction; the two converge eventually.
//! What is detected and which offsets apply is decided by an
//! [`InvalidationPolicy`].

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hollow_config::ScanConfig;
use rustc_hash::FxBuildHasher;

use crate::error::CacheError;
use crate::feature::Feature;
use crate::feature_map::{FeatureMap, Inconsistency};
use crate::position::{Cursor, Offset, Position};
use crate::region::RegionAddress;
use crate::worker::TaskQueue;
use crate::world::World;

/// Inclusive vertical window scanned during population.
///
/// The window never touches `i32::MIN` or `i32::MAX`, so the floor below and
/// the cap above any scanned cell are always addressable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanBounds {
    min_height: i32,
    max_height: i32,
}

impl ScanBounds {
    /// Creates bounds, rejecting an empty window or one at the edge of the
    /// coordinate range.
    pub fn new(min_height: i32, max_height: i32) -> Result<Self, CacheError> {
        if min_height > max_height || min_height == i32::MIN || max_height == i32::MAX {
            return Err(CacheError::InvalidScanBounds {
                min: min_height,
                max: max_height,
            });
        }
        Ok(Self {
            min_height,
            max_height,
        })
    }

    /// Bounds from the `scan` section of the config.
    pub fn from_config(config: &ScanConfig) -> Result<Self, CacheError> {
        Self::new(config.min_height, config.max_height)
    }

    /// Lowest scanned Y.
    pub fn min_height(&self) -> i32 {
        self.min_height
    }

    /// Highest scanned Y.
    pub fn max_height(&self) -> i32 {
        self.max_height
    }

    /// Returns `true` if `y` lies inside the window.
    pub fn contains_y(&self, y: i32) -> bool {
        (self.min_height..=self.max_height).contains(&y)
    }
}

/// What to do about a single cell change.
#[derive(Clone, Copy, Debug)]
pub struct MutationPlan<R> {
    /// Reaction task to schedule on the region queue, if any.
    pub reaction: Option<R>,
    /// Offset sets swept from the changed cell, in order.
    pub sweeps: &'static [&'static [Offset]],
}

/// Synchronous result of [`InvalidationManager::on_cell_changed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutationOutcome<R> {
    /// The reaction that was scheduled, if any.
    pub reaction: Option<R>,
    /// Features retired by the cascade.
    pub retired: usize,
}

/// Lifecycle of a region as seen by the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionPhase {
    /// Population is queued or running.
    Scheduled,
    /// Population has completed; reactions may run.
    Populated,
}

#[derive(Clone, Copy, Debug)]
struct RegionState {
    /// Distinguishes successive loads of the same region.
    ticket: u64,
    phase: RegionPhase,
}

/// Decides what a feature cache detects and how cell changes propagate.
pub trait InvalidationPolicy: Send + Sync + 'static {
    /// World model read by the tasks.
    type World: World;
    /// Cached feature type.
    type Feature: Feature;
    /// Reaction task variants.
    type Reaction: Copy + Debug + Send + 'static;

    /// Classifies a change of `pos` to `state`.
    fn plan(
        &self,
        world: &Self::World,
        pos: Position,
        state: &<Self::World as World>::State,
    ) -> MutationPlan<Self::Reaction>;

    /// Scans `region` within `bounds`, publishing what it finds.
    /// Returns the number of features inserted.
    fn populate(
        &self,
        world: &Self::World,
        map: &FeatureMap<Self::Feature>,
        region: RegionAddress,
        bounds: ScanBounds,
    ) -> usize;

    /// Incrementally updates the map around one changed cell, publishing
    /// only features that lie inside `region`.
    /// Returns the number of features inserted.
    fn react(
        &self,
        world: &Self::World,
        map: &FeatureMap<Self::Feature>,
        reaction: Self::Reaction,
        pos: Position,
        region: RegionAddress,
        bounds: ScanBounds,
    ) -> usize;

    /// Re-detects features of `region` along its border with `neighbor`,
    /// which has just become readable.
    /// Returns the number of features inserted.
    fn rescan_border(
        &self,
        world: &Self::World,
        map: &FeatureMap<Self::Feature>,
        region: RegionAddress,
        neighbor: RegionAddress,
        bounds: ScanBounds,
    ) -> usize;
}

/// State shared between the manager and the tasks it schedules.
struct Shared<P: InvalidationPolicy, Q: TaskQueue> {
    policy: P,
    world: Arc<P::World>,
    queue: Arc<Q>,
    map: FeatureMap<P::Feature>,
    bounds: ScanBounds,
    regions: DashMap<RegionAddress, RegionState, FxBuildHasher>,
    next_ticket: AtomicU64,
}

impl<P: InvalidationPolicy, Q: TaskQueue> Shared<P, Q> {
    fn run_population(self: &Arc<Self>, region: RegionAddress, ticket: u64) {
        let start = Instant::now();
        let found = self
            .policy
            .populate(&self.world, &self.map, region, self.bounds);

        let current = match self.regions.get_mut(&region) {
            Some(mut state) if state.ticket == ticket => {
                state.phase = RegionPhase::Populated;
                true
            }
            _ => false,
        };

        if current {
            tracing::debug!(
                "populated region {region}: {found} features in {} µs",
                start.elapsed().as_micros()
            );
            self.schedule_border_rescans(region);
        } else {
            // Unloaded (or reloaded) while scanning; drop what was published.
            let evicted = self.map.evict_region(region);
            tracing::debug!("region {region} unloaded during population, evicted {evicted}");
        }
    }

    /// Features of a known neighbour that touch `region` could not be
    /// detected while `region` was unreadable. Queue a rescan of the shared
    /// border on each neighbour's own queue.
    fn schedule_border_rescans(self: &Arc<Self>, region: RegionAddress) {
        for neighbor in region.neighbors() {
            let Some(ticket) = self.ticket_of(neighbor) else {
                continue;
            };
            let shared = Arc::clone(self);
            self.queue.enqueue(
                neighbor,
                Box::new(move || shared.run_border_rescan(neighbor, ticket, region)),
            );
        }
    }

    fn run_border_rescan(&self, region: RegionAddress, ticket: u64, toward: RegionAddress) {
        if !self.is_current(region, ticket) {
            tracing::trace!("skipping border rescan of stale region {region}");
            return;
        }
        let found = self
            .policy
            .rescan_border(&self.world, &self.map, region, toward, self.bounds);
        if !self.is_current(region, ticket) {
            let evicted = self.map.evict_region(region);
            tracing::debug!("region {region} unloaded during border rescan, evicted {evicted}");
            return;
        }
        tracing::trace!("border of {region} toward {toward}: {found} features");
    }

    fn run_reaction(
        &self,
        region: RegionAddress,
        ticket: Option<u64>,
        reaction: P::Reaction,
        pos: Position,
    ) {
        match self.try_react(region, ticket, reaction, pos) {
            Ok(inserted) => {
                tracing::trace!("{reaction:?} at {pos} inserted {inserted} features");
            }
            Err(err) => tracing::error!("{reaction:?} at {pos} aborted: {err}"),
        }
    }

    fn try_react(
        &self,
        region: RegionAddress,
        ticket: Option<u64>,
        reaction: P::Reaction,
        pos: Position,
    ) -> Result<usize, CacheError> {
        let Some(ticket) = ticket.filter(|&ticket| self.is_current(region, ticket)) else {
            return Err(CacheError::RegionNotPopulated(region));
        };
        let inserted = self
            .policy
            .react(&self.world, &self.map, reaction, pos, region, self.bounds);

        // An unload that raced the reaction has already evicted the region;
        // anything published after that eviction must go too.
        if !self.is_current(region, ticket) {
            let evicted = self.map.evict_region(region);
            tracing::debug!("region {region} unloaded during {reaction:?}, evicted {evicted}");
        }
        Ok(inserted)
    }

    fn enqueue_reaction(
        self: &Arc<Self>,
        region: RegionAddress,
        ticket: Option<u64>,
        reaction: P::Reaction,
        pos: Position,
    ) {
        let shared = Arc::clone(self);
        self.queue.enqueue(
            region,
            Box::new(move || shared.run_reaction(region, ticket, reaction, pos)),
        );
    }

    fn ticket_of(&self, region: RegionAddress) -> Option<u64> {
        self.regions.get(&region).map(|state| state.ticket)
    }

    /// Whether `region` is populated under the load identified by `ticket`.
    fn is_current(&self, region: RegionAddress, ticket: u64) -> bool {
        self.regions
            .get(&region)
            .is_some_and(|state| state.ticket == ticket && state.phase == RegionPhase::Populated)
    }

    fn phase(&self, region: RegionAddress) -> Option<RegionPhase> {
        self.regions.get(&region).map(|state| state.phase)
    }
}

/// Incremental feature cache driven by world events.
pub struct InvalidationManager<P: InvalidationPolicy, Q: TaskQueue> {
    shared: Arc<Shared<P, Q>>,
}

impl<P: InvalidationPolicy, Q: TaskQueue> InvalidationManager<P, Q> {
    /// Creates a manager with an empty map.
    pub fn new(policy: P, world: Arc<P::World>, queue: Arc<Q>, bounds: ScanBounds) -> Self {
        Self {
            shared: Arc::new(Shared {
                policy,
                world,
                queue,
                map: FeatureMap::new(),
                bounds,
                regions: DashMap::with_hasher(FxBuildHasher),
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// Schedules population of a freshly available region.
    ///
    /// Fires at most once per load; repeated calls for a region that is
    /// still loaded are ignored. Once population completes, known
    /// neighbours rescan their shared border.
    pub fn on_region_populated(&self, region: RegionAddress) {
        let ticket = self.shared.next_ticket.fetch_add(1, Ordering::Relaxed);
        match self.shared.regions.entry(region) {
            Entry::Occupied(_) => {
                tracing::warn!("region {region} reported populated twice; ignoring");
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(RegionState {
                    ticket,
                    phase: RegionPhase::Scheduled,
                });
            }
        }

        let shared = Arc::clone(&self.shared);
        self.shared.queue.enqueue(
            region,
            Box::new(move || shared.run_population(region, ticket)),
        );
        tracing::debug!("scheduled population of region {region}");
    }

    /// Reacts to `pos` (inside `region`) changing to `state`.
    ///
    /// The reaction, if any, is queued on the region; the cascade runs before
    /// this returns. Never fails: absent entries are the common case.
    ///
    /// A reaction may publish features one cell away from `pos`. When that
    /// cell belongs to another known region, the reaction is queued there as
    /// well, and each copy only publishes inside its own region.
    pub fn on_cell_changed(
        &self,
        pos: Position,
        state: &<P::World as World>::State,
        region: RegionAddress,
    ) -> MutationOutcome<P::Reaction> {
        let plan = self.shared.policy.plan(&self.shared.world, pos, state);

        if let Some(reaction) = plan.reaction {
            self.shared
                .enqueue_reaction(region, self.shared.ticket_of(region), reaction, pos);
            for neighbor in pos.neighbor_regions() {
                if neighbor == region {
                    continue;
                }
                if let Some(ticket) = self.shared.ticket_of(neighbor) {
                    self.shared
                        .enqueue_reaction(neighbor, Some(ticket), reaction, pos);
                }
            }
        }

        let mut cursor = Cursor::new(pos);
        let mut retired = 0;
        for offsets in plan.sweeps {
            cursor.reset();
            retired += self.shared.map.sweep(&mut cursor, offsets);
        }

        MutationOutcome {
            reaction: plan.reaction,
            retired,
        }
    }

    /// Forgets a region: cancels its queued work and retires its features.
    ///
    /// A task already running for the region re-checks the load once it has
    /// published and evicts again. Returns the number of features retired.
    pub fn on_region_unloaded(&self, region: RegionAddress) -> usize {
        self.shared.queue.close(region);
        self.shared.regions.remove(&region);
        let evicted = self.shared.map.evict_region(region);
        tracing::debug!("unloaded region {region}, evicted {evicted} features");
        evicted
    }

    /// The valid feature covering `pos`, if any.
    pub fn get(&self, pos: &Position) -> Option<Arc<P::Feature>> {
        self.shared.map.get(pos)
    }

    /// The shared feature map.
    pub fn map(&self) -> &FeatureMap<P::Feature> {
        &self.shared.map
    }

    /// The configured scan window.
    pub fn bounds(&self) -> ScanBounds {
        self.shared.bounds
    }

    /// The policy in use.
    pub fn policy(&self) -> &P {
        &self.shared.policy
    }

    /// The world handle tasks read from.
    pub fn world(&self) -> &Arc<P::World> {
        &self.shared.world
    }

    /// The task queue regions are scheduled on.
    pub fn queue(&self) -> &Arc<Q> {
        &self.shared.queue
    }

    /// Where `region` is in its lifecycle, or `None` if it is unknown.
    pub fn region_phase(&self, region: RegionAddress) -> Option<RegionPhase> {
        self.shared.phase(region)
    }

    /// Returns `true` once population of `region` has completed.
    pub fn is_populated(&self, region: RegionAddress) -> bool {
        self.region_phase(region) == Some(RegionPhase::Populated)
    }

    /// Reports broken map invariants (logged at `warn`).
    pub fn verify(&self) -> Vec<Inconsistency> {
        self.shared.map.verify()
    }
}
