//! Memento store remembering the content of player-modified cells.

use std::collections::BTreeMap;

use token_trek_core::{CellCoord, CellOverride, Token};

use crate::TokenIds;

/// Records the last known token list of every cell the player has touched.
///
/// Absence of an entry means the cell is still procedurally pristine. Entries
/// are only removed by [`OverrideStore::clear`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverrideStore {
    entries: BTreeMap<CellCoord, CellOverride>,
}

impl OverrideStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether the cell has a recorded override.
    #[must_use]
    pub fn is_modified(&self, cell: CellCoord) -> bool {
        self.entries
            .get(&cell)
            .map_or(false, |entry| entry.modified)
    }

    /// Records `tokens` as the content of `cell`, replacing any prior entry.
    ///
    /// Returns `true` when the cell had no entry before.
    pub fn save(&mut self, cell: CellCoord, tokens: &[Token]) -> bool {
        self.entries
            .insert(cell, CellOverride::modified(tokens.to_vec()))
            .is_none()
    }

    /// Copies the stored tokens of `cell`, issuing fresh identifiers.
    ///
    /// An unmodified cell yields an empty list; no entry is created.
    pub fn load(&self, cell: CellCoord, ids: &mut TokenIds) -> Vec<Token> {
        self.entries.get(&cell).map_or_else(Vec::new, |entry| {
            entry
                .tokens
                .iter()
                .map(|token| Token::new(ids.issue(), token.value, token.cell))
                .collect()
        })
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of modified cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no cell has been modified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in cell order.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, &CellOverride)> {
        self.entries.iter().map(|(cell, entry)| (*cell, entry))
    }

    /// Serialisable entries keyed by canonical cell key, in cell order.
    #[must_use]
    pub fn to_entries(&self) -> Vec<(String, CellOverride)> {
        self.entries
            .iter()
            .map(|(cell, entry)| (cell.key(), entry.clone()))
            .collect()
    }

    pub(crate) fn replace_all(&mut self, entries: BTreeMap<CellCoord, CellOverride>) {
        self.entries = entries;
    }
}
