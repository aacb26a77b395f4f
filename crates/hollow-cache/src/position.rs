//! Integer grid positions, offsets, and the reusable cascade cursor.

use std::fmt;
use std::ops::{Add, Neg};

use serde::{Deserialize, Serialize};

use crate::region::RegionAddress;

/// A cell in the world grid. Used as the feature map key.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate (vertical).
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl Position {
    /// Creates a new position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns this position displaced by `offset`.
    pub const fn offset(self, offset: Offset) -> Self {
        Self {
            x: self.x + offset.dx,
            y: self.y + offset.dy,
            z: self.z + offset.dz,
        }
    }

    /// The cell directly above. Saturates at the top of the range.
    pub const fn up(self) -> Self {
        Self::new(self.x, self.y.saturating_add(1), self.z)
    }

    /// The cell directly below. Saturates at the bottom of the range.
    pub const fn down(self) -> Self {
        Self::new(self.x, self.y.saturating_sub(1), self.z)
    }

    /// The four horizontal neighbours (+X, -X, +Z, -Z).
    pub const fn horizontal_neighbors(self) -> [Self; 4] {
        [
            Self::new(self.x + 1, self.y, self.z),
            Self::new(self.x - 1, self.y, self.z),
            Self::new(self.x, self.y, self.z + 1),
            Self::new(self.x, self.y, self.z - 1),
        ]
    }

    /// The region column this position belongs to.
    pub fn region(self) -> RegionAddress {
        RegionAddress::of(self)
    }

    /// Regions of the four horizontal neighbours. Only differs from
    /// [`region`](Self::region) on a region border.
    pub fn neighbor_regions(self) -> [RegionAddress; 4] {
        self.horizontal_neighbors().map(RegionAddress::of)
    }
}

impl Add<Offset> for Position {
    type Output = Position;

    fn add(self, rhs: Offset) -> Position {
        self.offset(rhs)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A relative displacement between two positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    /// X displacement.
    pub dx: i32,
    /// Y displacement.
    pub dy: i32,
    /// Z displacement.
    pub dz: i32,
}

impl Offset {
    /// Creates a new offset.
    pub const fn new(dx: i32, dy: i32, dz: i32) -> Self {
        Self { dx, dy, dz }
    }

    /// The zero displacement.
    pub const ZERO: Offset = Offset::new(0, 0, 0);
}

impl Neg for Offset {
    type Output = Offset;

    fn neg(self) -> Offset {
        Offset::new(-self.dx, -self.dy, -self.dz)
    }
}

/// Reusable walker for visiting `origin + offset` for many offsets.
///
/// The cursor is only ever read through [`Cursor::position`] or the value
/// returned by [`Cursor::with_offset`], both of which are immutable
/// [`Position`] snapshots, so it can never end up as a map key itself.
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    origin: Position,
    current: Position,
}

impl Cursor {
    /// Creates a cursor resting on `origin`.
    pub const fn new(origin: Position) -> Self {
        Self {
            origin,
            current: origin,
        }
    }

    /// Moves the cursor to `origin + offset` and returns that position.
    pub fn with_offset(&mut self, offset: Offset) -> Position {
        self.current = self.origin.offset(offset);
        self.current
    }

    /// Moves the cursor back onto its origin.
    pub fn reset(&mut self) {
        self.current = self.origin;
    }

    /// The origin the cursor was created with.
    pub fn origin(&self) -> Position {
        self.origin
    }

    /// The position the cursor currently rests on.
    pub fn position(&self) -> Position {
        self.current
    }
}
