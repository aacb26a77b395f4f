//! Configuration for the hollow hole cache.
//!
//! Settings persist to disk as RON files, tolerate missing or unknown fields,
//! and can be overridden from the command line via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, HoleConfig, ScanConfig, WorkerConfig};
pub use error::ConfigError;
