//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Hollow command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "hollow", about = "Incremental hole cache")]
pub struct CliArgs {
    /// Lowest scanned Y coordinate.
    #[arg(long)]
    pub min_height: Option<i32>,

    /// Highest scanned Y coordinate.
    #[arg(long)]
    pub max_height: Option<i32>,

    /// Tallest open run recognised as a hole.
    #[arg(long)]
    pub max_hole_height: Option<u32>,

    /// Number of region worker threads.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(min) = args.min_height {
            self.scan.min_height = min;
        }
        if let Some(max) = args.max_height {
            self.scan.max_height = max;
        }
        if let Some(height) = args.max_hole_height {
            self.holes.max_hole_height = height;
        }
        if let Some(threads) = args.threads {
            self.workers.threads = threads;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
