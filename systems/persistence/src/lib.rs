#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Game-state snapshot service for Token Trek.
//!
//! A [`GameSnapshot`] bundles the override store with the player state. The
//! [`SnapshotService`] captures it from the world and the movement
//! controller, writes it to a [`KeyValueStore`] through the text [`codec`],
//! and restores it. Storage failures are logged and treated as no-ops so
//! play continues in memory.

mod autosave;
pub mod codec;
mod store;

use token_trek_core::{Command, Event, GameSnapshot, MovementMode, PlayerState};
use token_trek_system_movement::MovementController;
use token_trek_world::{self as world, query, World};
use tracing::{info, warn};

pub use autosave::{Autosave, DEFAULT_AUTOSAVE_INTERVAL};
pub use codec::SnapshotError;
pub use store::{FileStore, KeyValueStore, MemoryStore, StorageError};

/// Key under which the session snapshot is stored by default.
pub const DEFAULT_SNAPSHOT_KEY: &str = "session";

/// Result of [`SnapshotService::save`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The snapshot was written.
    Saved,
    /// The snapshot could not be written. The failure was logged.
    Skipped,
}

/// Result of [`SnapshotService::load`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// A valid snapshot was read.
    Found(GameSnapshot),
    /// Nothing is stored.
    Missing,
    /// The stored value failed to decode.
    Corrupt(SnapshotError),
    /// The store failed to answer.
    StorageUnavailable,
}

/// Result of [`SnapshotService::resume`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The stored session was restored.
    Resumed,
    /// A fresh session was started.
    Fresh,
}

/// Captures, persists and restores whole sessions.
#[derive(Debug)]
pub struct SnapshotService<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> SnapshotService<S> {
    /// Creates a service writing under [`DEFAULT_SNAPSHOT_KEY`].
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_key(store, DEFAULT_SNAPSHOT_KEY)
    }

    /// Creates a service writing under `key`.
    #[must_use]
    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads the session state into one immutable value.
    #[must_use]
    pub fn capture(&self, world: &World, movement: &MovementController) -> GameSnapshot {
        GameSnapshot {
            overrides: query::overrides(world).to_entries(),
            player: PlayerState {
                position: movement.current_position(),
                held: query::held_token(world),
                mode: movement.mode(),
            },
        }
    }

    /// Captures and writes the session.
    pub fn save(&mut self, world: &World, movement: &MovementController) -> SaveOutcome {
        let snapshot = self.capture(world, movement);
        let encoded = match codec::encode(&snapshot) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(error = %error, "snapshot_encode_failed");
                return SaveOutcome::Skipped;
            }
        };

        match self.store.put(&self.key, &encoded) {
            Ok(()) => {
                info!(
                    key = %self.key,
                    overrides = snapshot.overrides.len(),
                    "snapshot_saved"
                );
                SaveOutcome::Saved
            }
            Err(error) => {
                warn!(error = %error, key = %self.key, "snapshot_save_failed");
                SaveOutcome::Skipped
            }
        }
    }

    /// Reads and decodes the stored session.
    pub fn load(&self) -> LoadOutcome {
        let stored = match self.store.get(&self.key) {
            Ok(Some(stored)) => stored,
            Ok(None) => return LoadOutcome::Missing,
            Err(error) => {
                warn!(error = %error, key = %self.key, "snapshot_load_failed");
                return LoadOutcome::StorageUnavailable;
            }
        };

        match codec::decode(&stored) {
            Ok(snapshot) => LoadOutcome::Found(snapshot),
            Err(error) => {
                warn!(error = %error, key = %self.key, "snapshot_corrupt");
                LoadOutcome::Corrupt(error)
            }
        }
    }

    /// Replaces the session state with `snapshot` and rebuilds the window.
    ///
    /// An invalid snapshot leaves everything untouched. A tracked-mode
    /// snapshot falls back to manual movement when no feed is available.
    pub fn restore(
        &self,
        world: &mut World,
        movement: &mut MovementController,
        mut snapshot: GameSnapshot,
        out_events: &mut Vec<Event>,
    ) -> Result<(), SnapshotError> {
        snapshot.validate()?;

        let mut commands = Vec::new();
        if let Err(error) = movement.switch_to(snapshot.player.mode, &mut commands) {
            warn!(error = %error, "restored_mode_unavailable");
            snapshot.player.mode = MovementMode::Manual;
            let _ = movement.switch_to(MovementMode::Manual, &mut commands);
        }
        movement.adopt(snapshot.player.position);

        commands.push(Command::Restore { snapshot });
        for command in commands {
            let mut events = Vec::new();
            world::apply(world, command, &mut events);
            movement.handle(&events);
            out_events.extend(events);
        }
        Ok(())
    }

    /// Restores the stored session, or boots a fresh one when nothing usable
    /// is stored.
    pub fn resume(
        &self,
        world: &mut World,
        movement: &mut MovementController,
        out_events: &mut Vec<Event>,
    ) -> ResumeOutcome {
        if let LoadOutcome::Found(snapshot) = self.load() {
            match self.restore(world, movement, snapshot, out_events) {
                Ok(()) => {
                    info!(key = %self.key, "session_resumed");
                    return ResumeOutcome::Resumed;
                }
                Err(error) => warn!(error = %error, "snapshot_restore_failed"),
            }
        }

        world::apply(world, Command::RefreshWindow, out_events);
        info!("session_started_fresh");
        ResumeOutcome::Fresh
    }

    /// Clears overrides and the held token, returns the player to the origin
    /// and forgets the stored snapshot. The movement mode is kept.
    pub fn reset(
        &mut self,
        world: &mut World,
        movement: &mut MovementController,
        out_events: &mut Vec<Event>,
    ) {
        let mut events = Vec::new();
        world::apply(world, Command::Reset, &mut events);
        movement.handle(&events);
        out_events.extend(events);

        if let Err(error) = self.store.delete(&self.key) {
            warn!(error = %error, key = %self.key, "snapshot_delete_failed");
        }
    }
}
