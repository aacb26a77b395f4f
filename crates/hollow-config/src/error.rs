//! Configuration error types.

/// Errors that can occur when loading, saving, parsing, or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),

    /// The scan window is empty (`min_height > max_height`).
    #[error("invalid scan window: min_height {min} is above max_height {max}")]
    InvalidScanWindow {
        /// Configured lower bound.
        min: i32,
        /// Configured upper bound.
        max: i32,
    },

    /// Holes must be allowed at least one cell of height.
    #[error("max_hole_height must be at least 1")]
    InvalidHoleHeight,
}
