#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Token Trek.
//!
//! The [`World`] aggregate owns the override store, the active window and the
//! player. It is mutated exclusively through [`apply`] and observed through
//! [`query`].

mod generator;
mod overrides;
mod window;

use std::{collections::BTreeMap, time::Duration};

use token_trek_core::{
    ActiveWindow, CellCoord, CellHash, CellState, Command, Event, GameSnapshot, GridFrame,
    LifecycleRejection, MovementMode, PlayerState, Token, TokenId, TokenStyle, WorldPosition,
    WELCOME_BANNER,
};
use tracing::{debug, info, warn};

pub use generator::{Generator, Sha256CellHash, ValueDraw};
pub use overrides::OverrideStore;

use window::{Materializer, WindowManager};

const DEFAULT_WINDOW_RADIUS: u32 = 8;
const DEFAULT_SPAWN_PROBABILITY: f64 = 0.1;
const DEFAULT_WIN_VALUE: u32 = 256;
const DEFAULT_WORLD_SEED: u64 = 0x7e4b_1d2c_9a35_f081;
const DEFAULT_VALUE_SEED: u64 = 0x51c3_88e0_24bd_6a17;

/// Allocates token identifiers that are unique within a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenIds {
    next: u64,
}

impl Default for TokenIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl TokenIds {
    /// Creates an allocator whose first identifier is `first`.
    #[must_use]
    pub const fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Issues the next unused identifier.
    pub fn issue(&mut self) -> TokenId {
        let id = TokenId::new(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Guarantees that `id` is never issued again.
    pub fn reserve_past(&mut self, id: TokenId) {
        self.next = self.next.max(id.get().saturating_add(1));
    }
}

/// Tunables that shape a world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldConfig {
    /// Origin and cell size of the grid.
    pub frame: GridFrame,
    /// Number of cells between the player's cell and the window edge.
    pub window_radius: u32,
    /// Probability that a pristine cell spawns a token.
    pub spawn_probability: f64,
    /// Token value that announces a win when produced by a combination.
    pub win_value: u32,
    /// Seed of the default cell hash.
    pub world_seed: u64,
    /// Seed of the token value draw.
    pub value_seed: u64,
    /// Policy used to pick spawned token values.
    pub value_draw: ValueDraw,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            frame: GridFrame::default(),
            window_radius: DEFAULT_WINDOW_RADIUS,
            spawn_probability: DEFAULT_SPAWN_PROBABILITY,
            win_value: DEFAULT_WIN_VALUE,
            world_seed: DEFAULT_WORLD_SEED,
            value_seed: DEFAULT_VALUE_SEED,
            value_draw: ValueDraw::default(),
        }
    }
}

/// Represents the authoritative Token Trek world state.
///
/// A freshly created world has no active window. The first
/// [`Command::RefreshWindow`] or [`Command::MovePlayer`] materializes it.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    config: WorldConfig,
    generator: Generator,
    overrides: OverrideStore,
    window: WindowManager,
    ids: TokenIds,
    player: PlayerState,
    elapsed: Duration,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates a world using the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a world whose generator hashes cells with [`Sha256CellHash`].
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self::with_hash(config, Box::new(Sha256CellHash::new(config.world_seed)))
    }

    /// Creates a world that consults the provided hash for spawn decisions.
    #[must_use]
    pub fn with_hash(config: WorldConfig, hash: Box<dyn CellHash>) -> Self {
        Self {
            banner: WELCOME_BANNER,
            generator: Generator::new(
                hash,
                config.spawn_probability,
                config.value_draw,
                config.value_seed,
            ),
            overrides: OverrideStore::new(),
            window: WindowManager::default(),
            ids: TokenIds::default(),
            player: PlayerState {
                position: config.frame.origin(),
                held: None,
                mode: MovementMode::default(),
            },
            elapsed: Duration::ZERO,
            config,
        }
    }

    fn player_cell(&self) -> CellCoord {
        self.config.frame.to_grid(self.player.position)
    }

    fn rebuild(&mut self, force: bool, out_events: &mut Vec<Event>) -> bool {
        let target = ActiveWindow::centered(self.player_cell(), self.config.window_radius);
        let mut sources = Materializer {
            frame: &self.config.frame,
            overrides: &self.overrides,
            generator: &mut self.generator,
            ids: &mut self.ids,
        };
        self.window.rebuild(target, force, &mut sources, out_events)
    }

    fn relocate(&mut self, position: WorldPosition, out_events: &mut Vec<Event>) {
        let from = self.player.position;
        if from == position {
            return;
        }

        let from_cell = self.player_cell();
        self.player.position = position;
        out_events.push(Event::PlayerMoved { from, to: position });

        let to_cell = self.player_cell();
        if from_cell != to_cell {
            out_events.push(Event::PlayerCellChanged {
                from: from_cell,
                to: to_cell,
            });
        }
    }

    fn move_player(&mut self, position: WorldPosition, out_events: &mut Vec<Event>) {
        if !position.is_finite() {
            warn!(
                lat = position.lat(),
                lng = position.lng(),
                "non_finite_position_ignored"
            );
            return;
        }

        self.relocate(position, out_events);
        let _ = self.rebuild(false, out_events);
    }

    fn set_mode(&mut self, mode: MovementMode, out_events: &mut Vec<Event>) {
        if self.player.mode == mode {
            return;
        }
        self.player.mode = mode;
        info!(mode = ?mode, "movement_mode_recorded");
        out_events.push(Event::MovementModeChanged { mode });
    }

    /// Writes the materialized content of `cell` back into the override store.
    fn persist_cell(&mut self, cell: CellCoord, out_events: &mut Vec<Event>) {
        let tokens = self.window.tokens(cell).unwrap_or_default().to_vec();
        let _ = self.overrides.save(cell, &tokens);
        if self.window.mark_overridden(cell) {
            out_events.push(Event::CellOverridden { cell });
        }
    }

    fn materialized(&self, token: Token) -> Event {
        let style = match self.window.state(token.cell) {
            CellState::ActiveOverridden => TokenStyle::Overridden,
            CellState::ActivePristine | CellState::Outside => TokenStyle::Pristine,
        };
        Event::TokenMaterialized {
            token,
            bounds: self.config.frame.bounds(token.cell),
            style,
        }
    }

    fn pick_up(&mut self, id: TokenId, out_events: &mut Vec<Event>) {
        if self.player.held.is_some() {
            reject(LifecycleRejection::HandsFull, out_events);
            return;
        }
        let Some(token) = self.window.take(id) else {
            reject(LifecycleRejection::UnknownToken, out_events);
            return;
        };

        self.player.held = Some(token);
        out_events.push(Event::TokenReleased { token: token.id });
        self.persist_cell(token.cell, out_events);
        debug!(token = %token.id, value = %token.value, cell = %token.cell, "token_picked_up");
        out_events.push(Event::TokenPickedUp {
            token,
            cell: token.cell,
        });
    }

    fn drop_held(&mut self, out_events: &mut Vec<Event>) {
        let Some(held) = self.player.held.take() else {
            reject(LifecycleRejection::HandsEmpty, out_events);
            return;
        };

        let _ = self.rebuild(false, out_events);
        let cell = self.player_cell();
        let token = Token::new(held.id, held.value, cell);
        if !self.window.insert(token) {
            debug_assert!(false, "player cell {cell} is not active");
            self.player.held = Some(held);
            return;
        }

        self.persist_cell(cell, out_events);
        out_events.push(self.materialized(token));
        debug!(token = %token.id, value = %token.value, cell = %cell, "token_dropped");
        out_events.push(Event::TokenDropped { token, cell });
    }

    fn combine(&mut self, target_id: TokenId, out_events: &mut Vec<Event>) {
        let Some(held) = self.player.held else {
            reject(LifecycleRejection::HandsEmpty, out_events);
            return;
        };
        let Some(target) = self.window.find(target_id) else {
            reject(LifecycleRejection::UnknownToken, out_events);
            return;
        };
        if held.value != target.value {
            debug!(held = %held.value, target = %target.value, "combine_mismatch");
            out_events.push(Event::CombineMismatch { held, target });
            return;
        }
        let Some(value) = target.value.doubled() else {
            reject(LifecycleRejection::ValueAtMaximum, out_events);
            return;
        };

        let _ = self.window.take(target.id);
        let created = Token::new(self.ids.issue(), value, target.cell);
        let _ = self.window.insert(created);
        self.player.held = None;

        out_events.push(Event::TokenReleased { token: target.id });
        self.persist_cell(target.cell, out_events);
        out_events.push(self.materialized(created));
        debug!(value = %created.value, cell = %created.cell, "tokens_combined");
        out_events.push(Event::TokensCombined {
            consumed: held,
            target,
            created,
        });

        if created.value.get() >= self.config.win_value {
            info!(value = %created.value, cell = %created.cell, "win_reached");
            out_events.push(Event::WinReached { token: created });
        }
    }

    fn restore(&mut self, snapshot: GameSnapshot, out_events: &mut Vec<Event>) {
        let mut entries = BTreeMap::new();
        for (key, entry) in snapshot.overrides {
            match key.parse::<CellCoord>() {
                Ok(cell) => {
                    let _ = entries.insert(cell, entry);
                }
                Err(error) => warn!(error = %error, "override_entry_skipped"),
            }
        }
        self.overrides.replace_all(entries);

        let PlayerState {
            position,
            held,
            mode,
        } = snapshot.player;
        if let Some(token) = held {
            self.ids.reserve_past(token.id);
        }
        self.player.held = held;
        self.set_mode(mode, out_events);
        if position.is_finite() {
            self.relocate(position, out_events);
        }

        let _ = self.rebuild(true, out_events);
        info!(
            overrides = self.overrides.len(),
            holding = self.player.held.is_some(),
            "world_restored"
        );
        out_events.push(Event::Restored);
    }

    fn reset(&mut self, out_events: &mut Vec<Event>) {
        self.overrides.clear();
        self.player.held = None;
        let origin = self.config.frame.origin();
        self.relocate(origin, out_events);
        let _ = self.rebuild(true, out_events);
        info!("world_reset");
        out_events.push(Event::ResetPerformed);
    }
}

fn reject(reason: LifecycleRejection, out_events: &mut Vec<Event>) {
    debug!(reason = ?reason, "lifecycle_rejected");
    out_events.push(Event::LifecycleRejected { reason });
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.elapsed = world.elapsed.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::MovePlayer { position } => world.move_player(position, out_events),
        Command::SetMovementMode { mode } => world.set_mode(mode, out_events),
        Command::PickUp { token } => world.pick_up(token, out_events),
        Command::Drop => world.drop_held(out_events),
        Command::Combine { target } => world.combine(target, out_events),
        Command::RefreshWindow => {
            let _ = world.rebuild(true, out_events);
        }
        Command::Restore { snapshot } => world.restore(snapshot, out_events),
        Command::Reset => world.reset(out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::{OverrideStore, World, WorldConfig};
    use token_trek_core::{
        ActiveWindow, CellCoord, CellState, GridFrame, PlayerState, Token, TokenId,
    };

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Configuration the world was created with.
    #[must_use]
    pub fn config(world: &World) -> &WorldConfig {
        &world.config
    }

    /// Provides read-only access to the grid frame.
    #[must_use]
    pub fn frame(world: &World) -> &GridFrame {
        &world.config.frame
    }

    /// Player position, held token and movement mode.
    #[must_use]
    pub fn player(world: &World) -> &PlayerState {
        &world.player
    }

    /// Token currently held by the player, if any.
    #[must_use]
    pub fn held_token(world: &World) -> Option<Token> {
        world.player.held
    }

    /// Cell containing the player's position.
    #[must_use]
    pub fn player_cell(world: &World) -> CellCoord {
        world.player_cell()
    }

    /// Window recorded by the most recent rebuild.
    #[must_use]
    pub fn window(world: &World) -> Option<ActiveWindow> {
        world.window.current()
    }

    /// Materialization state of the provided cell.
    #[must_use]
    pub fn cell_state(world: &World, cell: CellCoord) -> CellState {
        world.window.state(cell)
    }

    /// Tokens resident in an active cell. Inactive cells report none.
    #[must_use]
    pub fn cell_tokens(world: &World, cell: CellCoord) -> &[Token] {
        world.window.tokens(cell).unwrap_or_default()
    }

    /// Every resident token, in cell order.
    #[must_use]
    pub fn resident_tokens(world: &World) -> Vec<Token> {
        world
            .window
            .iter()
            .flat_map(|(_, active)| active.tokens.iter().copied())
            .collect()
    }

    /// Looks up a resident token by identifier.
    #[must_use]
    pub fn find_token(world: &World, id: TokenId) -> Option<Token> {
        world.window.find(id)
    }

    /// Active cells paired with their state, in cell order.
    #[must_use]
    pub fn active_cells(world: &World) -> Vec<(CellCoord, CellState)> {
        world
            .window
            .iter()
            .map(|(cell, active)| (cell, active.state))
            .collect()
    }

    /// Number of materialized cells.
    #[must_use]
    pub fn active_cell_count(world: &World) -> usize {
        world.window.len()
    }

    /// Provides read-only access to the override store.
    #[must_use]
    pub fn overrides(world: &World) -> &OverrideStore {
        &world.overrides
    }

    /// Reports whether the player has modified the provided cell.
    #[must_use]
    pub fn is_modified(world: &World, cell: CellCoord) -> bool {
        world.overrides.is_modified(cell)
    }

    /// Total session time accumulated from ticks.
    #[must_use]
    pub fn elapsed(world: &World) -> Duration {
        world.elapsed
    }
}
