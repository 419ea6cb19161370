//! Flyweight window of materialized cells around the player.

use std::collections::BTreeMap;

use token_trek_core::{
    ActiveWindow, CellCoord, CellState, Event, GridFrame, Token, TokenId, TokenStyle,
};
use tracing::debug;

use crate::{generator::Generator, overrides::OverrideStore, TokenIds};

/// In-memory record of an active cell.
#[derive(Clone, Debug)]
pub(crate) struct ActiveCell {
    pub(crate) state: CellState,
    pub(crate) tokens: Vec<Token>,
}

impl ActiveCell {
    fn style(&self) -> TokenStyle {
        match self.state {
            CellState::ActiveOverridden => TokenStyle::Overridden,
            CellState::ActivePristine | CellState::Outside => TokenStyle::Pristine,
        }
    }
}

/// Sources consulted when a cell enters the window.
pub(crate) struct Materializer<'a> {
    pub(crate) frame: &'a GridFrame,
    pub(crate) overrides: &'a OverrideStore,
    pub(crate) generator: &'a mut Generator,
    pub(crate) ids: &'a mut TokenIds,
}

impl Materializer<'_> {
    fn materialize(&mut self, cell: CellCoord) -> ActiveCell {
        if self.overrides.is_modified(cell) {
            return ActiveCell {
                state: CellState::ActiveOverridden,
                tokens: self.overrides.load(cell, self.ids),
            };
        }

        let tokens = self
            .generator
            .spawn(cell)
            .map(|value| Token::new(self.ids.issue(), value, cell))
            .into_iter()
            .collect();
        ActiveCell {
            state: CellState::ActivePristine,
            tokens,
        }
    }
}

/// Tracks the current window and the cells materialized inside it.
#[derive(Debug, Default)]
pub(crate) struct WindowManager {
    window: Option<ActiveWindow>,
    cells: BTreeMap<CellCoord, ActiveCell>,
}

impl WindowManager {
    pub(crate) fn current(&self) -> Option<ActiveWindow> {
        self.window
    }

    /// Brings the materialized set in line with `target`.
    ///
    /// A forced rebuild releases every cell first; otherwise only cells leaving
    /// the window are released and only cells entering it are materialized.
    /// Returns `false` when nothing had to change.
    pub(crate) fn rebuild(
        &mut self,
        target: ActiveWindow,
        force: bool,
        sources: &mut Materializer<'_>,
        out_events: &mut Vec<Event>,
    ) -> bool {
        if !force && self.window == Some(target) {
            return false;
        }

        let leaving: Vec<CellCoord> = self
            .cells
            .keys()
            .copied()
            .filter(|cell| force || !target.contains(*cell))
            .collect();
        for cell in &leaving {
            if let Some(active) = self.cells.remove(cell) {
                for token in active.tokens {
                    out_events.push(Event::TokenReleased { token: token.id });
                }
            }
        }

        let mut entered = 0usize;
        for cell in target.cells() {
            if self.cells.contains_key(&cell) {
                continue;
            }
            let active = sources.materialize(cell);
            let bounds = sources.frame.bounds(cell);
            let style = active.style();
            for token in &active.tokens {
                out_events.push(Event::TokenMaterialized {
                    token: *token,
                    bounds,
                    style,
                });
            }
            let _ = self.cells.insert(cell, active);
            entered += 1;
        }

        self.window = Some(target);
        out_events.push(Event::WindowShifted { window: target });
        debug!(
            released = leaving.len(),
            materialized = entered,
            forced = force,
            "window_rebuilt"
        );
        debug_assert!(self.matches_window(), "active cells diverged from window");
        true
    }

    pub(crate) fn state(&self, cell: CellCoord) -> CellState {
        self.cells
            .get(&cell)
            .map_or(CellState::Outside, |active| active.state)
    }

    pub(crate) fn tokens(&self, cell: CellCoord) -> Option<&[Token]> {
        self.cells.get(&cell).map(|active| active.tokens.as_slice())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (CellCoord, &ActiveCell)> {
        self.cells.iter().map(|(cell, active)| (*cell, active))
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn find(&self, id: TokenId) -> Option<Token> {
        self.cells
            .values()
            .flat_map(|active| active.tokens.iter())
            .find(|token| token.id == id)
            .copied()
    }

    /// Removes a resident token from whichever cell holds it.
    pub(crate) fn take(&mut self, id: TokenId) -> Option<Token> {
        self.cells.values_mut().find_map(|active| {
            let index = active.tokens.iter().position(|token| token.id == id)?;
            Some(active.tokens.remove(index))
        })
    }

    /// Appends a token to its cell. Returns `false` when the cell is not active.
    pub(crate) fn insert(&mut self, token: Token) -> bool {
        match self.cells.get_mut(&token.cell) {
            Some(active) => {
                active.tokens.push(token);
                true
            }
            None => false,
        }
    }

    /// Flags the cell as overridden. Returns `true` on the first transition.
    pub(crate) fn mark_overridden(&mut self, cell: CellCoord) -> bool {
        match self.cells.get_mut(&cell) {
            Some(active) if active.state == CellState::ActivePristine => {
                active.state = CellState::ActiveOverridden;
                true
            }
            _ => false,
        }
    }

    fn matches_window(&self) -> bool {
        match self.window {
            Some(window) => {
                u64::try_from(self.cells.len()).map_or(false, |len| len == window.area())
                    && self.cells.keys().all(|cell| window.contains(*cell))
            }
            None => self.cells.is_empty(),
        }
    }
}
