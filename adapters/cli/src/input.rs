//! Parsing of the line-oriented terminal commands.

use std::str::FromStr;

use thiserror::Error;
use token_trek_core::{Direction, MovementMode, TokenId};

pub(crate) const HELP: &str = "\
commands:
  n | s | e | w      step one cell north, south, east or west
  pick <id>          pick up a token in view
  drop               drop the held token here
  combine <id>       merge the held token into an equal one
  inspect <id>       open the interaction menu for a token
  mode manual|tracked
  save               write the session now
  reset              forget every change and return to the origin
  look               redraw without acting
  help               show this text
  quit               save and leave";

/// One line of player input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Input {
    Step(Direction),
    PickUp(TokenId),
    Drop,
    Combine(TokenId),
    Inspect(TokenId),
    Mode(MovementMode),
    Save,
    Reset,
    Look,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum InputError {
    #[error("unknown command `{0}`, type `help`")]
    Unknown(String),
    #[error("`{0}` needs a token id")]
    MissingToken(&'static str),
    #[error("`{0}` is not a token id")]
    InvalidToken(String),
    #[error("mode must be `manual` or `tracked`")]
    InvalidMode,
    #[error("`{0}` takes no arguments")]
    UnexpectedArgument(&'static str),
}

impl FromStr for Input {
    type Err = InputError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Self::Look);
        };
        let argument = words.next();
        if words.next().is_some() {
            return Err(InputError::Unknown(line.trim().to_owned()));
        }

        let verb = verb.to_ascii_lowercase();
        let input = match verb.as_str() {
            "n" | "north" => Self::Step(Direction::North),
            "s" | "south" => Self::Step(Direction::South),
            "e" | "east" => Self::Step(Direction::East),
            "w" | "west" => Self::Step(Direction::West),
            "pick" | "p" => return token("pick", argument).map(Self::PickUp),
            "combine" | "c" => return token("combine", argument).map(Self::Combine),
            "inspect" | "i" => return token("inspect", argument).map(Self::Inspect),
            "mode" => {
                return match argument {
                    Some("manual") => Ok(Self::Mode(MovementMode::Manual)),
                    Some("tracked") => Ok(Self::Mode(MovementMode::Tracked)),
                    _ => Err(InputError::InvalidMode),
                }
            }
            "drop" | "d" => Self::Drop,
            "save" => Self::Save,
            "reset" => Self::Reset,
            "look" | "l" => Self::Look,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            _ => return Err(InputError::Unknown(verb)),
        };

        match argument {
            Some(_) => Err(InputError::UnexpectedArgument(static_verb(&input))),
            None => Ok(input),
        }
    }
}

fn token(verb: &'static str, argument: Option<&str>) -> Result<TokenId, InputError> {
    let raw = argument.ok_or(InputError::MissingToken(verb))?;
    let id = raw
        .trim_start_matches('#')
        .parse::<u64>()
        .map_err(|_| InputError::InvalidToken(raw.to_owned()))?;
    Ok(TokenId::new(id))
}

fn static_verb(input: &Input) -> &'static str {
    match input {
        Input::Step(_) => "step",
        Input::Drop => "drop",
        Input::Save => "save",
        Input::Reset => "reset",
        Input::Look => "look",
        Input::Help => "help",
        Input::Quit => "quit",
        Input::PickUp(_) => "pick",
        Input::Combine(_) => "combine",
        Input::Inspect(_) => "inspect",
        Input::Mode(_) => "mode",
    }
}
