#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Interaction menu system that turns a menu choice into a lifecycle command.
//!
//! Presentation layers ask [`Interaction::open`] for the menu of a token in
//! view, display it however they like, and report the user's choice through
//! [`Interaction::resolve`]. Each resolved menu yields at most one command.

use token_trek_core::{Command, Event, Token};
use tracing::debug;

/// Action a menu may offer for a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenuOption {
    /// Pick the token up. Offered while the player's hands are empty.
    PickUp,
    /// Merge the held token into this one. Offered while holding a token.
    Combine,
}

/// Menu describing what the player may do with a resident token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionMenu {
    /// Token the menu was opened for.
    pub token: Token,
    /// Token held by the player when the menu opened.
    pub held: Option<Token>,
    /// Options in display order.
    pub options: Vec<MenuOption>,
}

impl InteractionMenu {
    /// Builds the menu for `token` given what the player is holding.
    #[must_use]
    pub fn for_token(token: Token, held: Option<Token>) -> Self {
        let options = match held {
            None => vec![MenuOption::PickUp],
            Some(_) => vec![MenuOption::Combine],
        };
        Self {
            token,
            held,
            options,
        }
    }

    /// Reports whether the menu offers `option`.
    #[must_use]
    pub fn offers(&self, option: MenuOption) -> bool {
        self.options.contains(&option)
    }
}

/// Tracks the open menu and resolves the user's choice.
#[derive(Debug, Default, Clone)]
pub struct Interaction {
    pending: Option<InteractionMenu>,
}

impl Interaction {
    /// Creates a new interaction system with no open menu.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Opens the menu for `token`, replacing any menu still pending.
    pub fn open(&mut self, token: Token, held: Option<Token>) -> &InteractionMenu {
        self.pending.insert(InteractionMenu::for_token(token, held))
    }

    /// Menu awaiting a choice, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&InteractionMenu> {
        self.pending.as_ref()
    }

    /// Closes a pending menu whose token left the view.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            let stale = match event {
                Event::TokenReleased { token } => self
                    .pending
                    .as_ref()
                    .map_or(false, |menu| menu.token.id == *token),
                Event::Restored | Event::ResetPerformed => true,
                _ => false,
            };
            if stale && self.pending.take().is_some() {
                debug!("interaction_menu_closed");
            }
        }
    }

    /// Resolves the pending menu with the user's choice.
    ///
    /// Dismissing the menu (`None`) or choosing an option it does not offer
    /// closes it without emitting anything. Returns `true` when a command was
    /// emitted.
    pub fn resolve(&mut self, choice: Option<MenuOption>, out: &mut Vec<Command>) -> bool {
        let Some(menu) = self.pending.take() else {
            return false;
        };
        let Some(option) = choice.filter(|option| menu.offers(*option)) else {
            debug!(token = %menu.token.id, "interaction_menu_dismissed");
            return false;
        };

        out.push(match option {
            MenuOption::PickUp => Command::PickUp {
                token: menu.token.id,
            },
            MenuOption::Combine => Command::Combine {
                target: menu.token.id,
            },
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use token_trek_core::{CellCoord, TokenId, TokenValue};

    fn token(id: u64) -> Token {
        Token::new(TokenId::new(id), TokenValue::MIN, CellCoord::new(0, 0))
    }

    #[test]
    fn empty_hands_offer_pickup_only() {
        let menu = InteractionMenu::for_token(token(1), None);
        assert_eq!(menu.options, vec![MenuOption::PickUp]);
    }

    #[test]
    fn holding_offers_combine_only() {
        let menu = InteractionMenu::for_token(token(1), Some(token(2)));
        assert_eq!(menu.options, vec![MenuOption::Combine]);
    }

    #[test]
    fn resolving_without_a_menu_emits_nothing() {
        let mut interaction = Interaction::new();
        let mut commands = Vec::new();
        assert!(!interaction.resolve(Some(MenuOption::PickUp), &mut commands));
        assert!(commands.is_empty());
    }
}
