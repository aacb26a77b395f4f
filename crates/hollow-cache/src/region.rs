//! Region (chunk column) addressing.
//!
//! A region is the unit of asynchronous task ordering: every task touching
//! a region runs on that region's serial queue.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Width of a region along X and Z, in cells.
pub const REGION_WIDTH: i32 = 16;

/// Identifies a full-height column of `REGION_WIDTH × REGION_WIDTH` cells.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RegionAddress {
    /// Region-grid X coordinate.
    pub x: i32,
    /// Region-grid Z coordinate.
    pub z: i32,
}

impl RegionAddress {
    /// Creates a new region address.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The region containing `pos`. Negative coordinates round towards -∞.
    pub fn of(pos: Position) -> Self {
        Self {
            x: pos.x.div_euclid(REGION_WIDTH),
            z: pos.z.div_euclid(REGION_WIDTH),
        }
    }

    /// Smallest world X coordinate inside this region.
    pub fn min_x(self) -> i32 {
        self.x * REGION_WIDTH
    }

    /// Smallest world Z coordinate inside this region.
    pub fn min_z(self) -> i32 {
        self.z * REGION_WIDTH
    }

    /// Returns `true` if `pos` lies in this region (any height).
    pub fn contains(self, pos: Position) -> bool {
        Self::of(pos) == self
    }

    /// The four regions sharing a border with this one.
    pub const fn neighbors(self) -> [Self; 4] {
        [
            Self::new(self.x + 1, self.z),
            Self::new(self.x - 1, self.z),
            Self::new(self.x, self.z + 1),
            Self::new(self.x, self.z - 1),
        ]
    }

    /// Iterates the columns of this region that touch `toward`.
    ///
    /// Empty unless `toward` is one of [`neighbors`](Self::neighbors).
    pub fn border_columns(self, toward: RegionAddress) -> impl Iterator<Item = (i32, i32)> {
        let (min_x, min_z) = (self.min_x(), self.min_z());
        let (max_x, max_z) = (min_x + REGION_WIDTH - 1, min_z + REGION_WIDTH - 1);
        let edge = match (toward.x - self.x, toward.z - self.z) {
            (1, 0) => Some((Some(max_x), None)),
            (-1, 0) => Some((Some(min_x), None)),
            (0, 1) => Some((None, Some(max_z))),
            (0, -1) => Some((None, Some(min_z))),
            _ => None,
        };
        edge.into_iter().flat_map(move |(x, z)| {
            (0..REGION_WIDTH).map(move |i| (x.unwrap_or(min_x + i), z.unwrap_or(min_z + i)))
        })
    }

    /// Iterates the world `(x, z)` of every column in the region.
    pub fn columns(self) -> impl Iterator<Item = (i32, i32)> {
        let (min_x, min_z) = (self.min_x(), self.min_z());
        (0..REGION_WIDTH)
            .flat_map(move |dx| (0..REGION_WIDTH).map(move |dz| (min_x + dx, min_z + dz)))
    }
}

impl fmt::Display for RegionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}
