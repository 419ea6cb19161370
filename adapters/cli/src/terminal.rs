//! Text presentation surface drawing the active window as a character grid.

use std::{
    collections::BTreeMap,
    fmt,
    io::{BufRead, Write},
};

use anyhow::{bail, Context, Result as AnyResult};
use token_trek_core::{ActiveWindow, CellCoord, CellState, MovementMode, Token, TokenStyle};
use token_trek_rendering::{Notice, PresentationHandle, PresentationSurface, TokenSprite};
use token_trek_system_interaction::{InteractionMenu, MenuOption};

const NEARBY_LISTED: usize = 8;

/// What the grid needs from the world besides the tokens on display.
#[derive(Clone, Debug)]
pub(crate) struct View {
    pub(crate) window: ActiveWindow,
    pub(crate) player: CellCoord,
    pub(crate) cells: Vec<(CellCoord, CellState)>,
    pub(crate) held: Option<Token>,
    pub(crate) mode: MovementMode,
}

#[derive(Debug)]
pub(crate) struct TerminalSurface<R, W> {
    input: R,
    output: W,
    next_handle: u64,
    sprites: BTreeMap<PresentationHandle, TokenSprite>,
}

impl<R: BufRead, W: Write> TerminalSurface<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            next_handle: 0,
            sprites: BTreeMap::new(),
        }
    }

    /// Prompts for and reads one line. `None` once the input is exhausted.
    pub(crate) fn read_line(&mut self) -> AnyResult<Option<String>> {
        write!(self.output, "> ")?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("failed to read a command")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    #[cfg(test)]
    pub(crate) fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }

    pub(crate) fn say(&mut self, message: impl fmt::Display) -> AnyResult<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }

    pub(crate) fn draw(&mut self, view: &View) -> AnyResult<()> {
        let mut glyphs: BTreeMap<CellCoord, char> = view
            .cells
            .iter()
            .map(|(cell, state)| {
                let glyph = match state {
                    CellState::ActiveOverridden => ':',
                    CellState::ActivePristine | CellState::Outside => '.',
                };
                (*cell, glyph)
            })
            .collect();
        for sprite in self.sprites.values() {
            let _ = glyphs.insert(sprite.token.cell, value_glyph(&sprite.token));
        }
        let _ = glyphs.insert(view.player, '@');

        let window = view.window;
        writeln!(self.output)?;
        for i in (window.i_min()..=window.i_max()).rev() {
            let row: String = (window.j_min()..=window.j_max())
                .flat_map(|j| {
                    let glyph = glyphs.get(&CellCoord::new(i, j)).copied().unwrap_or(' ');
                    [glyph, ' ']
                })
                .collect();
            writeln!(self.output, "  {}", row.trim_end())?;
        }

        let hand = match view.held {
            Some(token) => format!("holding #{} ({})", token.id, token.value),
            None => "hands empty".to_owned(),
        };
        let mode = match view.mode {
            MovementMode::Manual => "manual",
            MovementMode::Tracked => "tracked",
        };
        writeln!(self.output, "cell {}  {hand}  {mode}", view.player)?;

        let mut nearby: Vec<&TokenSprite> = self.sprites.values().collect();
        nearby.sort_by_key(|sprite| (distance(view.player, sprite.token.cell), sprite.token.id));
        for sprite in nearby.into_iter().take(NEARBY_LISTED) {
            let marker = match sprite.style {
                TokenStyle::Pristine => "",
                TokenStyle::Overridden => " *",
            };
            writeln!(
                self.output,
                "  #{} value {} at {}{marker}",
                sprite.token.id, sprite.token.value, sprite.token.cell
            )?;
        }
        self.output.flush()?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> PresentationSurface for TerminalSurface<R, W> {
    fn materialize(&mut self, sprite: &TokenSprite) -> AnyResult<PresentationHandle> {
        self.next_handle += 1;
        let handle = PresentationHandle::new(self.next_handle);
        let _ = self.sprites.insert(handle, *sprite);
        Ok(handle)
    }

    fn release(&mut self, handle: PresentationHandle) -> AnyResult<()> {
        if self.sprites.remove(&handle).is_none() {
            bail!("presentation handle {} is not on display", handle.get());
        }
        Ok(())
    }

    fn show_menu(&mut self, menu: &InteractionMenu) -> AnyResult<Option<MenuOption>> {
        writeln!(
            self.output,
            "token #{} ({}) at {}",
            menu.token.id, menu.token.value, menu.token.cell
        )?;
        for (index, option) in menu.options.iter().enumerate() {
            let label = match option {
                MenuOption::PickUp => "pick up".to_owned(),
                MenuOption::Combine => match menu.held {
                    Some(held) => format!("combine with held {}", held.value),
                    None => "combine".to_owned(),
                },
            };
            writeln!(self.output, "  {}) {label}", index + 1)?;
        }
        writeln!(self.output, "  0) cancel")?;

        let Some(line) = self.read_line()? else {
            return Ok(None);
        };
        let choice = line
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|number| number.checked_sub(1))
            .and_then(|index| menu.options.get(index).copied());
        Ok(choice)
    }

    fn notify(&mut self, notice: &Notice) {
        let _ = writeln!(self.output, "* {notice}");
    }
}

fn value_glyph(token: &Token) -> char {
    let exponent = token.value.get().trailing_zeros();
    char::from_digit(exponent, 36).unwrap_or('+')
}

fn distance(a: CellCoord, b: CellCoord) -> u32 {
    a.i().abs_diff(b.i()) + a.j().abs_diff(b.j())
}
