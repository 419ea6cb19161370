#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Token Trek engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.
//!
//! The grid itself is unbounded. Cells are never allocated; they are referenced
//! by [`CellCoord`] pairs and only the cells inside the current
//! [`ActiveWindow`] are materialized by the world.

mod grid;

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use grid::{CellBounds, GridFrame, WorldPosition, DEFAULT_ORIGIN, TILE_DEGREES};

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to Token Trek.";

/// Describes which movement source currently drives the player's position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementMode {
    /// Position changes only through discrete step commands.
    #[default]
    Manual,
    /// Position follows an external continuous position feed.
    Tracked,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the session clock by the provided delta time.
    Tick {
        /// Duration of wall time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Moves the player to a new world position reported by a movement source.
    MovePlayer {
        /// Position the player now occupies.
        position: WorldPosition,
    },
    /// Records which movement source drives the player.
    SetMovementMode {
        /// Mode that should become active.
        mode: MovementMode,
    },
    /// Picks up a token resident in an active cell.
    PickUp {
        /// Identifier of the token to pick up.
        token: TokenId,
    },
    /// Drops the held token into the player's current cell.
    Drop,
    /// Combines the held token with a resident token of equal value.
    Combine {
        /// Identifier of the resident token targeted by the combination.
        target: TokenId,
    },
    /// Releases every active cell and rematerializes the whole window.
    RefreshWindow,
    /// Replaces overrides and player state with the provided snapshot.
    Restore {
        /// Snapshot to restore. Callers are expected to validate it first.
        snapshot: GameSnapshot,
    },
    /// Clears all overrides and the held token and returns the player to the origin.
    Reset,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the session clock advanced.
    TimeAdvanced {
        /// Duration of time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that the player's world position changed.
    PlayerMoved {
        /// Position held before the move.
        from: WorldPosition,
        /// Position held after the move.
        to: WorldPosition,
    },
    /// Reports that the player crossed into a different grid cell.
    PlayerCellChanged {
        /// Cell occupied before the move.
        from: CellCoord,
        /// Cell occupied after the move.
        to: CellCoord,
    },
    /// Reports that the active window now covers a different set of cells.
    WindowShifted {
        /// Window recorded as current after the rebuild.
        window: ActiveWindow,
    },
    /// Requests that presentation layers display a token.
    TokenMaterialized {
        /// Token that became resident in an active cell.
        token: Token,
        /// World-space rectangle of the cell holding the token.
        bounds: CellBounds,
        /// Styling hint describing whether the cell is pristine or overridden.
        style: TokenStyle,
    },
    /// Requests that presentation layers stop displaying a token.
    TokenReleased {
        /// Identifier of the token that left the materialized set.
        token: TokenId,
    },
    /// Confirms that the player picked up a token.
    TokenPickedUp {
        /// Token now held by the player.
        token: Token,
        /// Cell the token was removed from.
        cell: CellCoord,
    },
    /// Confirms that the player dropped the held token.
    TokenDropped {
        /// Token now resident in the player's cell.
        token: Token,
        /// Cell that received the token.
        cell: CellCoord,
    },
    /// Confirms that two equal tokens merged into one of double value.
    TokensCombined {
        /// Token the player was holding.
        consumed: Token,
        /// Resident token that was merged into.
        target: Token,
        /// Newly created token resident at the target's cell.
        created: Token,
    },
    /// Informational outcome when the held token and the target differ in value.
    CombineMismatch {
        /// Token the player is holding.
        held: Token,
        /// Resident token that was targeted.
        target: Token,
    },
    /// Informational outcome when a lifecycle command could not apply.
    LifecycleRejected {
        /// Specific reason the command was ignored.
        reason: LifecycleRejection,
    },
    /// Announces that a combination reached the configured win value.
    WinReached {
        /// Token whose value met the threshold.
        token: Token,
    },
    /// Reports that a pristine cell gained an override.
    CellOverridden {
        /// Cell whose content is now pinned by the override store.
        cell: CellCoord,
    },
    /// Announces that the recorded movement mode changed.
    MovementModeChanged {
        /// Mode that became active.
        mode: MovementMode,
    },
    /// Confirms that a snapshot replaced the session state.
    Restored,
    /// Confirms that the session state was reset.
    ResetPerformed,
}

/// Reasons a lifecycle command may be ignored by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleRejection {
    /// The player already holds a token and cannot pick up another.
    HandsFull,
    /// The player holds nothing to drop or combine.
    HandsEmpty,
    /// The referenced token is not resident in any active cell.
    UnknownToken,
    /// Both tokens already carry [`TokenValue::MAX`] and cannot be doubled.
    ValueAtMaximum,
}

/// Cardinal step directions available to manual movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Movement toward increasing latitude.
    North,
    /// Movement toward increasing longitude.
    East,
    /// Movement toward decreasing latitude.
    South,
    /// Movement toward decreasing longitude.
    West,
}

/// Unique identifier assigned to a materialized token.
///
/// Identifiers are issued per materialization and are not stable across
/// regeneration or reloads of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(u64);

impl TokenId {
    /// Creates a new token identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value carried by a token. Always a power of two no smaller than two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TokenValue(u32);

impl TokenValue {
    /// Smallest value a token may carry.
    pub const MIN: Self = Self(2);

    /// Largest value a token may carry.
    pub const MAX: Self = Self(1 << 31);

    /// Validates and wraps a raw token value.
    pub fn new(value: u32) -> Result<Self, TokenValueError> {
        if value >= Self::MIN.0 && value.is_power_of_two() {
            Ok(Self(value))
        } else {
            Err(TokenValueError { value })
        }
    }

    /// Retrieves the raw value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Value produced by combining two tokens of this value, or `None` when
    /// it would exceed [`TokenValue::MAX`].
    #[must_use]
    pub const fn doubled(self) -> Option<Self> {
        if self.0 >= Self::MAX.0 {
            None
        } else {
            Some(Self(self.0 << 1))
        }
    }
}

impl TryFrom<u32> for TokenValue {
    type Error = TokenValueError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TokenValue> for u32 {
    fn from(value: TokenValue) -> Self {
        value.0
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raised when a raw integer is not a valid token value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("token value {value} is not a power of two of at least 2")]
pub struct TokenValueError {
    /// Rejected raw value.
    pub value: u32,
}

/// Collectible unit resident in a cell or held by the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Identifier unique to this materialization.
    pub id: TokenId,
    /// Value carried by the token.
    pub value: TokenValue,
    /// Cell the token belongs to.
    pub cell: CellCoord,
}

impl Token {
    /// Creates a token descriptor.
    #[must_use]
    pub const fn new(id: TokenId, value: TokenValue, cell: CellCoord) -> Self {
        Self { id, value, cell }
    }

    /// Reports whether two tokens carry the same value and cell, ignoring identity.
    #[must_use]
    pub fn same_content(&self, other: &Token) -> bool {
        self.value == other.value && self.cell == other.cell
    }
}

/// Location of a single grid cell expressed as signed coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    i: i32,
    j: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    /// Index along the latitude axis.
    #[must_use]
    pub const fn i(&self) -> i32 {
        self.i
    }

    /// Index along the longitude axis.
    #[must_use]
    pub const fn j(&self) -> i32 {
        self.j
    }

    /// Canonical string key used by the override store and snapshots.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Cell adjacent to this one in the provided direction.
    #[must_use]
    pub const fn neighbor(self, direction: Direction) -> Self {
        match direction {
            Direction::North => Self::new(self.i.saturating_add(1), self.j),
            Direction::South => Self::new(self.i.saturating_sub(1), self.j),
            Direction::East => Self::new(self.i, self.j.saturating_add(1)),
            Direction::West => Self::new(self.i, self.j.saturating_sub(1)),
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.i, self.j)
    }
}

impl FromStr for CellCoord {
    type Err = CellKeyError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let (i, j) = key
            .split_once(',')
            .ok_or_else(|| CellKeyError::MissingSeparator(key.to_owned()))?;
        let i = i
            .parse::<i32>()
            .map_err(|_| CellKeyError::InvalidIndex(key.to_owned()))?;
        let j = j
            .parse::<i32>()
            .map_err(|_| CellKeyError::InvalidIndex(key.to_owned()))?;
        Ok(Self::new(i, j))
    }
}

/// Errors raised while parsing canonical cell keys.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CellKeyError {
    /// The key did not contain the `,` separator.
    #[error("cell key '{0}' is missing the ',' separator")]
    MissingSeparator(String),
    /// One of the indices was not a signed 32-bit integer.
    #[error("cell key '{0}' contains an invalid index")]
    InvalidIndex(String),
}

/// Square neighbourhood of cells materialized around the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveWindow {
    i_min: i32,
    i_max: i32,
    j_min: i32,
    j_max: i32,
}

impl ActiveWindow {
    /// Creates the window of the provided radius centred on `center`.
    #[must_use]
    pub fn centered(center: CellCoord, radius: u32) -> Self {
        let radius = i32::try_from(radius).unwrap_or(i32::MAX);
        Self {
            i_min: center.i().saturating_sub(radius),
            i_max: center.i().saturating_add(radius),
            j_min: center.j().saturating_sub(radius),
            j_max: center.j().saturating_add(radius),
        }
    }

    /// Smallest latitude index inside the window.
    #[must_use]
    pub const fn i_min(&self) -> i32 {
        self.i_min
    }

    /// Largest latitude index inside the window.
    #[must_use]
    pub const fn i_max(&self) -> i32 {
        self.i_max
    }

    /// Smallest longitude index inside the window.
    #[must_use]
    pub const fn j_min(&self) -> i32 {
        self.j_min
    }

    /// Largest longitude index inside the window.
    #[must_use]
    pub const fn j_max(&self) -> i32 {
        self.j_max
    }

    /// Reports whether the cell lies inside the window, bounds inclusive.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.i() >= self.i_min
            && cell.i() <= self.i_max
            && cell.j() >= self.j_min
            && cell.j() <= self.j_max
    }

    /// Number of cells covered by the window.
    #[must_use]
    pub fn area(&self) -> u64 {
        let rows = u64::from(self.i_max.abs_diff(self.i_min)) + 1;
        let columns = u64::from(self.j_max.abs_diff(self.j_min)) + 1;
        rows * columns
    }

    /// Iterates the window's cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let (j_min, j_max) = (self.j_min, self.j_max);
        (self.i_min..=self.i_max)
            .flat_map(move |i| (j_min..=j_max).map(move |j| CellCoord::new(i, j)))
    }
}

/// Materialization state of a single cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellState {
    /// The cell lies outside the active window and has no in-memory record.
    Outside,
    /// The cell is active and was derived from the generator.
    ActivePristine,
    /// The cell is active and was restored from the override store.
    ActiveOverridden,
}

/// Styling hint forwarded to presentation layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStyle {
    /// Token belongs to a cell that still matches procedural content.
    Pristine,
    /// Token belongs to a cell fixed by a prior player action.
    Overridden,
}

/// Memento recorded for a cell the player has modified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellOverride {
    /// Always `true` for recorded overrides.
    pub modified: bool,
    /// Tokens resident in the cell at the time of the last mutation.
    pub tokens: Vec<Token>,
}

impl CellOverride {
    /// Creates an override recording the provided tokens.
    #[must_use]
    pub fn modified(tokens: Vec<Token>) -> Self {
        Self {
            modified: true,
            tokens,
        }
    }
}

/// Player-facing portion of the session state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Current world position of the player.
    pub position: WorldPosition,
    /// Token currently held, if any.
    pub held: Option<Token>,
    /// Movement source driving the player.
    pub mode: MovementMode,
}

/// Sole unit of durable persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Overrides keyed by canonical cell key, in key order.
    pub overrides: Vec<(String, CellOverride)>,
    /// Player state captured alongside the overrides.
    pub player: PlayerState,
}

impl GameSnapshot {
    /// Checks that cell keys parse and that every stored token lies in its cell.
    pub fn validate(&self) -> Result<(), SnapshotValidationError> {
        let mut seen = std::collections::BTreeSet::new();
        for (key, entry) in &self.overrides {
            let cell: CellCoord = key.parse()?;
            if !seen.insert(cell) {
                return Err(SnapshotValidationError::DuplicateCell(key.clone()));
            }
            if entry.tokens.iter().any(|token| token.cell != cell) {
                return Err(SnapshotValidationError::MisplacedToken(key.clone()));
            }
        }
        Ok(())
    }
}

/// Structural problems detected in a decoded snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SnapshotValidationError {
    /// An override entry used a malformed cell key.
    #[error(transparent)]
    InvalidCellKey(#[from] CellKeyError),
    /// The same cell appeared more than once.
    #[error("cell '{0}' appears more than once")]
    DuplicateCell(String),
    /// A stored token claimed a different cell than its entry.
    #[error("override for cell '{0}' contains a token from another cell")]
    MisplacedToken(String),
}

/// Deterministic hash collaborator consulted by the generator.
pub trait CellHash: fmt::Debug {
    /// Maps a canonical cell key to a number in `[0, 1)`.
    ///
    /// Must return the same value for the same key within a process run.
    fn unit(&self, key: &str) -> f64;
}
