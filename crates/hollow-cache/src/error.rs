//! Error types for the hole cache.

use hollow_config::ConfigError;
use thiserror::Error;

use crate::region::RegionAddress;

/// Errors surfaced by the cache.
///
/// Expected absence (no feature at a position, no reaction for a state) is
/// never an error.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A region worker thread could not be spawned.
    #[error("failed to spawn region worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// A reaction task ran for a region whose population has not completed.
    #[error("region {0} has not been populated")]
    RegionNotPopulated(RegionAddress),

    /// The scan window is empty or reaches the end of the coordinate range.
    #[error("invalid scan bounds: {min}..={max}")]
    InvalidScanBounds {
        /// Lower bound.
        min: i32,
        /// Upper bound.
        max: i32,
    },

    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
