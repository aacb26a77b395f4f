//! Demo binary: builds a small in-memory world, populates the hole cache
//! and streams a few edits through it.
//!
//! Run with `cargo run -p hollow-demo -- --log-level debug`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hollow_cache::{Block, GridWorld, HoleManager, Position, RegionAddress};
use hollow_config::{CliArgs, Config};
use tracing::{info, warn};

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().or_else(Config::default_dir);
    let mut config = match config_dir.as_deref().map(Config::load_or_create) {
        Some(Ok(config)) => config,
        Some(Err(err)) => {
            eprintln!("config error, using defaults: {err}");
            Config::default()
        }
        None => Config::default(),
    };
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.as_deref().map(|dir| dir.join("logs"));
    hollow_log::init_logging(log_dir.as_deref(), cfg!(debug_assertions), Some(&config));

    if let Err(err) = run(&config) {
        tracing::error!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), hollow_cache::CacheError> {
    let world = Arc::new(GridWorld::new());
    let regions: Vec<_> = (0..2)
        .flat_map(|x| (0..2).map(move |z| RegionAddress::new(x, z)))
        .collect();

    let base = config.scan.min_height;
    for &region in &regions {
        world.load_region(region);
        build_bunkers(&world, region, base);
    }

    let manager: HoleManager<GridWorld> = HoleManager::from_config(config, Arc::clone(&world))?;
    for &region in &regions {
        manager.on_region_populated(region);
    }
    settle(&manager);
    info!("populated {} regions: {} holes", regions.len(), count(&manager));

    // Crack one bunker wall, then seal it back with bedrock.
    let wall = Position::new(5, base + 1, 4);
    for block in [Block::Air, Block::Bedrock] {
        world.set(wall, block);
        let outcome = manager.on_cell_changed(wall, &block, wall.region());
        info!(
            "{wall} -> {block:?}: reaction {:?}, retired {}",
            outcome.reaction, outcome.retired
        );
        settle(&manager);
        info!("{} holes cached", count(&manager));
    }

    for hole in manager.map().features() {
        info!(
            "hole at {} height {} ({:?})",
            hole.bottom(),
            hole.height(),
            hole.safety()
        );
    }

    let issues = manager.verify();
    if !issues.is_empty() {
        warn!("{} inconsistencies found", issues.len());
    }

    for &region in &regions {
        manager.on_region_unloaded(region);
        world.unload_region(region);
    }
    info!("all regions unloaded: {} holes left", count(&manager));
    Ok(())
}

/// An obsidian slab with a one-deep pocket every four cells.
fn build_bunkers(world: &GridWorld, region: RegionAddress, base: i32) {
    let (x0, z0) = (region.min_x(), region.min_z());
    world.fill(
        Position::new(x0, base, z0),
        Position::new(x0 + 15, base + 2, z0 + 15),
        Block::Obsidian,
    );
    for dx in (4..16).step_by(4) {
        for dz in (4..16).step_by(4) {
            world.set(Position::new(x0 + dx, base + 1, z0 + dz), Block::Air);
        }
    }
}

fn settle(manager: &HoleManager<GridWorld>) {
    if !manager.queue().wait_idle(Duration::from_secs(10)) {
        warn!("workers still busy after 10s");
    }
}

fn count(manager: &HoleManager<GridWorld>) -> usize {
    manager.map().features().len()
}
