#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared presentation contracts for Token Trek adapters.
//!
//! The world never holds rendering objects. It announces tokens entering and
//! leaving the active window through events, and the [`Presenter`] keeps the
//! side table from token identity to the handle a [`PresentationSurface`]
//! returned for it.

use anyhow::{Context, Result as AnyResult};
use glam::DVec2;
use std::{collections::BTreeMap, fmt};
use token_trek_core::{
    CellBounds, Event, LifecycleRejection, MovementMode, Token, TokenId, TokenStyle,
};
use token_trek_system_interaction::{InteractionMenu, MenuOption};
use tracing::warn;

/// RGBA color used when presenting tokens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

/// Colors assigned to each token style.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    /// Tokens of cells that still match procedural content.
    pub pristine: Color,
    /// Tokens of cells the player has modified.
    pub overridden: Color,
}

impl Default for Palette {
    fn default() -> Self {
        let pristine = Color::from_rgb_u8(214, 162, 38);
        Self {
            pristine,
            overridden: pristine.lighten(0.45),
        }
    }
}

impl Palette {
    /// Color used for tokens of the given style.
    #[must_use]
    pub const fn color_for(&self, style: TokenStyle) -> Color {
        match style {
            TokenStyle::Pristine => self.pristine,
            TokenStyle::Overridden => self.overridden,
        }
    }
}

/// Axis-aligned rectangle in map space, `x` along longitude and `y` along
/// latitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapRect {
    /// Corner with the smallest coordinates.
    pub min: DVec2,
    /// Corner with the largest coordinates.
    pub max: DVec2,
}

impl MapRect {
    /// Converts cell bounds into a map rectangle.
    #[must_use]
    pub fn from_bounds(bounds: CellBounds) -> Self {
        Self {
            min: DVec2::new(bounds.min.lng(), bounds.min.lat()),
            max: DVec2::new(bounds.max.lng(), bounds.max.lat()),
        }
    }

    /// Width and height of the rectangle.
    #[must_use]
    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    /// Midpoint of the rectangle.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }
}

/// Everything a surface needs to draw one token.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TokenSprite {
    /// Token being drawn.
    pub token: Token,
    /// Rectangle of the cell holding the token.
    pub rect: MapRect,
    /// Whether the cell is pristine or overridden.
    pub style: TokenStyle,
    /// Fill color derived from the style.
    pub color: Color,
}

/// Opaque reference to something a surface is displaying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PresentationHandle(u64);

impl PresentationHandle {
    /// Creates a new handle with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Informational message for the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notice {
    /// The player's hand changed. `None` means empty.
    Holding(Option<Token>),
    /// Two tokens merged into `created`.
    Combined {
        /// Token produced by the merge.
        created: Token,
    },
    /// The held token and the target differ in value.
    Mismatch {
        /// Token the player is holding.
        held: Token,
        /// Token that was targeted.
        target: Token,
    },
    /// A lifecycle command was ignored.
    Rejected(LifecycleRejection),
    /// A merge reached the win value. Play continues.
    Win(Token),
    /// A different movement source drives the player.
    ModeChanged(MovementMode),
    /// A stored session was restored.
    Restored,
    /// The session was reset.
    Reset,
}

impl Notice {
    /// Derives the notice announced by a world event, if any.
    #[must_use]
    pub fn from_event(event: &Event) -> Option<Self> {
        let notice = match event {
            Event::TokenPickedUp { token, .. } => Self::Holding(Some(*token)),
            Event::TokenDropped { .. } => Self::Holding(None),
            Event::TokensCombined { created, .. } => Self::Combined { created: *created },
            Event::CombineMismatch { held, target } => Self::Mismatch {
                held: *held,
                target: *target,
            },
            Event::LifecycleRejected { reason } => Self::Rejected(*reason),
            Event::WinReached { token } => Self::Win(*token),
            Event::MovementModeChanged { mode } => Self::ModeChanged(*mode),
            Event::Restored => Self::Restored,
            Event::ResetPerformed => Self::Reset,
            _ => return None,
        };
        Some(notice)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Holding(Some(token)) => {
                write!(f, "holding token #{} ({})", token.id, token.value)
            }
            Self::Holding(None) => write!(f, "hands empty"),
            Self::Combined { created } => write!(
                f,
                "combined into {} at cell {}",
                created.value, created.cell
            ),
            Self::Mismatch { held, target } => write!(
                f,
                "cannot combine {} with {}: values differ",
                held.value, target.value
            ),
            Self::Rejected(LifecycleRejection::HandsFull) => {
                write!(f, "already holding a token")
            }
            Self::Rejected(LifecycleRejection::HandsEmpty) => write!(f, "not holding a token"),
            Self::Rejected(LifecycleRejection::UnknownToken) => {
                write!(f, "that token is not in view")
            }
            Self::Rejected(LifecycleRejection::ValueAtMaximum) => {
                write!(f, "those tokens are already at the largest value")
            }
            Self::Win(token) => write!(f, "you reached {}! keep playing", token.value),
            Self::ModeChanged(MovementMode::Manual) => write!(f, "manual movement"),
            Self::ModeChanged(MovementMode::Tracked) => write!(f, "tracking position"),
            Self::Restored => write!(f, "previous session restored"),
            Self::Reset => write!(f, "session reset"),
        }
    }
}

/// Surface capable of displaying tokens, menus and notices.
pub trait PresentationSurface {
    /// Starts displaying a token and returns a handle for it.
    fn materialize(&mut self, sprite: &TokenSprite) -> AnyResult<PresentationHandle>;

    /// Stops displaying whatever `handle` refers to.
    fn release(&mut self, handle: PresentationHandle) -> AnyResult<()>;

    /// Shows the interaction menu and returns the chosen option, or `None`
    /// when the player dismissed it.
    fn show_menu(&mut self, menu: &InteractionMenu) -> AnyResult<Option<MenuOption>>;

    /// Shows an informational message.
    fn notify(&mut self, notice: &Notice);
}

/// Side table mapping resident tokens to their presentation handles.
#[derive(Debug, Default)]
pub struct Presenter {
    palette: Palette,
    handles: BTreeMap<TokenId, PresentationHandle>,
}

impl Presenter {
    /// Creates an empty presenter drawing with `palette`.
    #[must_use]
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            handles: BTreeMap::new(),
        }
    }

    /// Handle currently displaying `token`.
    #[must_use]
    pub fn handle_of(&self, token: TokenId) -> Option<PresentationHandle> {
        self.handles.get(&token).copied()
    }

    /// Number of tokens on display.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Reports whether nothing is on display.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Forwards world events to `surface`.
    pub fn handle<S>(&mut self, events: &[Event], surface: &mut S) -> AnyResult<()>
    where
        S: PresentationSurface + ?Sized,
    {
        for event in events {
            match event {
                Event::TokenMaterialized {
                    token,
                    bounds,
                    style,
                } => self.materialize(*token, *bounds, *style, surface)?,
                Event::TokenReleased { token } => self.release(*token, surface)?,
                _ => {
                    if let Some(notice) = Notice::from_event(event) {
                        surface.notify(&notice);
                    }
                }
            }
        }
        Ok(())
    }

    /// Releases every handle, typically before the surface goes away.
    pub fn clear<S>(&mut self, surface: &mut S) -> AnyResult<()>
    where
        S: PresentationSurface + ?Sized,
    {
        for (token, handle) in std::mem::take(&mut self.handles) {
            surface
                .release(handle)
                .with_context(|| format!("failed to release token {token}"))?;
        }
        Ok(())
    }

    fn materialize<S>(
        &mut self,
        token: Token,
        bounds: CellBounds,
        style: TokenStyle,
        surface: &mut S,
    ) -> AnyResult<()>
    where
        S: PresentationSurface + ?Sized,
    {
        let sprite = TokenSprite {
            token,
            rect: MapRect::from_bounds(bounds),
            style,
            color: self.palette.color_for(style),
        };
        let handle = surface
            .materialize(&sprite)
            .with_context(|| format!("failed to materialize token {}", token.id))?;

        if let Some(stale) = self.handles.insert(token.id, handle) {
            warn!(token = token.id.get(), "presentation_handle_replaced");
            surface
                .release(stale)
                .with_context(|| format!("failed to release token {}", token.id))?;
        }
        Ok(())
    }

    fn release<S>(&mut self, token: TokenId, surface: &mut S) -> AnyResult<()>
    where
        S: PresentationSurface + ?Sized,
    {
        match self.handles.remove(&token) {
            Some(handle) => surface
                .release(handle)
                .with_context(|| format!("failed to release token {token}")),
            None => Ok(()),
        }
    }
}
