#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Terminal host that lets a player walk the Token Trek grid.

mod config;
mod input;
mod session;
mod terminal;
mod wander;

use std::io;

use anyhow::{Context, Result as AnyResult};
use clap::Parser;
use token_trek_system_persistence::{FileStore, KeyValueStore, MemoryStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Cli, Settings};
use session::Session;
use terminal::TerminalSurface;
use wander::WanderFeed;

/// Entry point for the Token Trek command-line interface.
fn main() -> AnyResult<()> {
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load(&cli).context("failed to load settings")?;
    info!(
        save_dir = %settings.save_dir.display(),
        radius = settings.world.window_radius,
        "token_trek_startup"
    );

    match FileStore::open(&settings.save_dir) {
        Ok(store) => play(&settings, store),
        Err(error) => {
            warn!(error = %error, "save_dir_unavailable");
            play(&settings, MemoryStore::new())
        }
    }
}

fn play<S: KeyValueStore>(settings: &Settings, store: S) -> AnyResult<()> {
    let feed = WanderFeed::new(settings.world.frame, settings.world.world_seed);
    let surface = TerminalSurface::new(io::stdin().lock(), io::stdout().lock());
    let mut session = Session::new(settings, store, Some(Box::new(feed)), surface);

    session.start(settings.tracked)?;
    session.run()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}
