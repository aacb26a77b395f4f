//! Concurrent position → feature map with cascade eviction.
//!
//! Readers may query from any thread. Writers (region tasks and the
//! mutation-reporting thread) are serialized per key by the [`DashMap`]
//! shard locks. No shard guard is held while another entry is touched.

use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::{FxBuildHasher, FxHashSet};

use crate::feature::Feature;
use crate::position::{Cursor, Offset, Position};
use crate::region::RegionAddress;

/// Result of [`FeatureMap::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The feature is now published under all of its parts.
    Inserted {
        /// Number of different features displaced (and retired) by the insert.
        displaced: usize,
    },
    /// An identical valid feature was already published; nothing changed.
    Unchanged,
}

/// A broken map invariant found by [`FeatureMap::verify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inconsistency {
    /// The feature stored under this key does not list it as an air part.
    NotAirPart(Position),
    /// An invalidated feature is still reachable under this key.
    Stale(Position),
}

/// Shared map from grid position to the feature covering it.
pub struct FeatureMap<F> {
    entries: DashMap<Position, Arc<F>, FxBuildHasher>,
}

impl<F: Feature> FeatureMap<F> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Returns the valid feature covering `pos`, if any.
    ///
    /// Stale entries are treated as absent.
    pub fn get(&self, pos: &Position) -> Option<Arc<F>> {
        let entry = self.entries.get(pos)?;
        let feature = entry.value();
        (feature.is_valid() && feature.is_air_part(pos)).then(|| Arc::clone(feature))
    }

    /// Returns `true` if any entry (valid or not) exists under `pos`.
    pub fn contains_key(&self, pos: &Position) -> bool {
        self.entries.contains_key(pos)
    }

    /// Number of keys in the map (a feature with `n` parts counts `n` times).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Publishes `feature` under every one of its parts.
    ///
    /// If each part already maps to a valid feature with identical parts the
    /// call is a no-op. Otherwise the last writer wins: any different feature
    /// displaced from one of the keys is retired entirely.
    ///
    /// Parts are written one at a time, so a concurrent retire may land
    /// halfway through. The feature is re-checked once every part is written
    /// and evicted again if it was invalidated meanwhile.
    pub fn insert(&self, feature: Arc<F>) -> InsertOutcome {
        if self.is_published(&feature) {
            return InsertOutcome::Unchanged;
        }

        let mut displaced: Vec<Arc<F>> = Vec::new();
        for &part in feature.parts() {
            if let Some(old) = self.entries.insert(part, Arc::clone(&feature))
                && !Arc::ptr_eq(&old, &feature)
                && !displaced.iter().any(|d| Arc::ptr_eq(d, &old))
            {
                displaced.push(old);
            }
        }

        for old in &displaced {
            self.retire(old);
        }
        if !feature.is_valid() {
            self.retire(&feature);
        }
        InsertOutcome::Inserted {
            displaced: displaced.len(),
        }
    }

    /// Invalidates `feature` and removes every key that still points at it.
    ///
    /// Keys already taken over by another feature are left untouched.
    /// Returns `true` if this call performed the invalidation.
    pub fn retire(&self, feature: &Arc<F>) -> bool {
        let first = feature.invalidate();
        for part in feature.parts() {
            self.entries
                .remove_if(part, |_, current| Arc::ptr_eq(current, feature));
        }
        first
    }

    /// Sweeps `offsets` around `origin`, retiring every feature that lists the
    /// visited position as an air part. Returns the number of features retired.
    pub fn cascade(&self, origin: Position, offsets: &[Offset]) -> usize {
        self.sweep(&mut Cursor::new(origin), offsets)
    }

    /// [`cascade`](Self::cascade) driven by a caller-owned cursor, so several
    /// offset sets can be swept from one origin with a reset in between.
    pub fn sweep(&self, cursor: &mut Cursor, offsets: &[Offset]) -> usize {
        let mut retired = 0;
        for &offset in offsets {
            let pos = cursor.with_offset(offset);
            // Clone out of the guard before touching the map again.
            let Some(feature) = self.entries.get(&pos).map(|e| Arc::clone(e.value())) else {
                continue;
            };
            if !feature.is_air_part(&pos) {
                tracing::warn!("feature reachable at {pos} does not list it as an air part");
                continue;
            }
            if self.retire(&feature) {
                retired += 1;
            }
        }
        retired
    }

    /// Retires every feature with at least one part inside `region`.
    pub fn evict_region(&self, region: RegionAddress) -> usize {
        let victims: Vec<Arc<F>> = self
            .entries
            .iter()
            .filter(|e| region.contains(*e.key()))
            .map(|e| Arc::clone(e.value()))
            .collect();

        let mut seen = FxHashSet::default();
        victims
            .iter()
            .filter(|f| seen.insert(Arc::as_ptr(f)))
            .filter(|f| self.retire(f))
            .count()
    }

    /// Snapshot of all distinct valid features.
    pub fn features(&self) -> Vec<Arc<F>> {
        let mut seen = FxHashSet::default();
        self.entries
            .iter()
            .map(|e| Arc::clone(e.value()))
            .filter(|f| f.is_valid() && seen.insert(Arc::as_ptr(f)))
            .collect()
    }

    /// Scans the whole map for broken invariants.
    pub fn verify(&self) -> Vec<Inconsistency> {
        let mut found = Vec::new();
        for entry in self.entries.iter() {
            let (pos, feature) = (*entry.key(), entry.value());
            if !feature.is_air_part(&pos) {
                found.push(Inconsistency::NotAirPart(pos));
            } else if !feature.is_valid() {
                found.push(Inconsistency::Stale(pos));
            }
        }
        for issue in &found {
            tracing::warn!("feature map inconsistency: {issue:?}");
        }
        found
    }

    /// Drops every entry without invalidating anything.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn is_published(&self, feature: &Arc<F>) -> bool {
        feature.parts().iter().all(|part| {
            self.entries.get(part).is_some_and(|current| {
                let current = current.value();
                current.is_valid() && (Arc::ptr_eq(current, feature) || current.same_parts(feature))
            })
        })
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, pos: Position, feature: Arc<F>) {
        self.entries.insert(pos, feature);
    }
}

impl<F: Feature> Default for FeatureMap<F> {
    fn default() -> Self {
        Self::new()
    }
}
