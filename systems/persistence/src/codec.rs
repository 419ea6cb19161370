//! Single-line text encoding of [`GameSnapshot`] values.
//!
//! The format is `ttrek:v1:<payload>`, where the payload is standard base64
//! without padding over a JSON document.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use token_trek_core::{
    CellCoord, CellKeyError, CellOverride, GameSnapshot, MovementMode, PlayerState,
    SnapshotValidationError, Token, TokenId, TokenValue, TokenValueError, WorldPosition,
};

const SNAPSHOT_DOMAIN: &str = "ttrek";
const SNAPSHOT_VERSION: &str = "v1";
const FIELD_DELIMITER: char = ':';

/// Identifier prefix emitted before the encoded payload.
pub const SNAPSHOT_HEADER: &str = "ttrek:v1";

/// Errors that can occur while encoding or decoding snapshot strings.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The string was empty or contained only whitespace.
    #[error("snapshot payload was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("snapshot string is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("snapshot string is missing the version")]
    MissingVersion,
    /// The payload segment was missing.
    #[error("snapshot string is missing the payload")]
    MissingPayload,
    /// The prefix segment named another format.
    #[error("snapshot prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The version segment named an unknown revision.
    #[error("snapshot version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode snapshot payload")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The payload was not a valid snapshot document.
    #[error("could not parse snapshot payload")]
    InvalidPayload(#[source] serde_json::Error),
    /// An override used a malformed cell key.
    #[error(transparent)]
    InvalidCellKey(#[from] CellKeyError),
    /// A stored token carried a value that is not a power of two of at least 2.
    #[error(transparent)]
    InvalidTokenValue(#[from] TokenValueError),
    /// The overrides contradict each other.
    #[error("snapshot is inconsistent")]
    Inconsistent(#[source] SnapshotValidationError),
    /// The player position has a NaN or infinite component.
    #[error("player position ({lat}, {lng}) is not finite")]
    NonFinitePosition {
        /// Stored latitude.
        lat: f64,
        /// Stored longitude.
        lng: f64,
    },
}

impl From<SnapshotValidationError> for SnapshotError {
    fn from(error: SnapshotValidationError) -> Self {
        match error {
            SnapshotValidationError::InvalidCellKey(error) => Self::InvalidCellKey(error),
            other => Self::Inconsistent(other),
        }
    }
}

/// Encodes the snapshot into a single-line string.
pub fn encode(snapshot: &GameSnapshot) -> Result<String, SnapshotError> {
    let position = snapshot.player.position;
    if !position.is_finite() {
        return Err(SnapshotError::NonFinitePosition {
            lat: position.lat(),
            lng: position.lng(),
        });
    }

    let wire = WireSnapshot::from(snapshot);
    let json = serde_json::to_vec(&wire).map_err(SnapshotError::InvalidPayload)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!("{SNAPSHOT_HEADER}{FIELD_DELIMITER}{encoded}"))
}

/// Decodes and validates a snapshot string.
pub fn decode(value: &str) -> Result<GameSnapshot, SnapshotError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SnapshotError::EmptyPayload);
    }

    let mut parts = trimmed.splitn(3, FIELD_DELIMITER);
    let domain = parts.next().ok_or(SnapshotError::MissingPrefix)?;
    let version = parts.next().ok_or(SnapshotError::MissingVersion)?;
    let payload = parts.next().ok_or(SnapshotError::MissingPayload)?;

    if domain != SNAPSHOT_DOMAIN {
        return Err(SnapshotError::InvalidPrefix(domain.to_owned()));
    }
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version.to_owned()));
    }

    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(SnapshotError::InvalidEncoding)?;
    let wire: WireSnapshot =
        serde_json::from_slice(&bytes).map_err(SnapshotError::InvalidPayload)?;
    let snapshot = wire.into_snapshot()?;
    snapshot.validate()?;
    Ok(snapshot)
}

#[derive(Debug, Serialize, Deserialize)]
struct WireSnapshot {
    overrides: Vec<(String, WireOverride)>,
    player: WirePlayer,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireOverride {
    modified: bool,
    tokens: Vec<WireToken>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePlayer {
    lat: f64,
    lng: f64,
    held: Option<WireToken>,
    mode: MovementMode,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct WireToken {
    id: u64,
    value: u32,
    i: i32,
    j: i32,
}

impl From<&Token> for WireToken {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id.get(),
            value: token.value.get(),
            i: token.cell.i(),
            j: token.cell.j(),
        }
    }
}

impl TryFrom<WireToken> for Token {
    type Error = TokenValueError;

    fn try_from(wire: WireToken) -> Result<Self, Self::Error> {
        Ok(Token::new(
            TokenId::new(wire.id),
            TokenValue::new(wire.value)?,
            CellCoord::new(wire.i, wire.j),
        ))
    }
}

impl From<&GameSnapshot> for WireSnapshot {
    fn from(snapshot: &GameSnapshot) -> Self {
        Self {
            overrides: snapshot
                .overrides
                .iter()
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        WireOverride {
                            modified: entry.modified,
                            tokens: entry.tokens.iter().map(WireToken::from).collect(),
                        },
                    )
                })
                .collect(),
            player: WirePlayer {
                lat: snapshot.player.position.lat(),
                lng: snapshot.player.position.lng(),
                held: snapshot.player.held.as_ref().map(WireToken::from),
                mode: snapshot.player.mode,
            },
        }
    }
}

impl WireSnapshot {
    fn into_snapshot(self) -> Result<GameSnapshot, SnapshotError> {
        let mut overrides = Vec::with_capacity(self.overrides.len());
        for (key, entry) in self.overrides {
            let _: CellCoord = key.parse()?;
            if !entry.modified {
                continue;
            }
            let tokens = entry
                .tokens
                .into_iter()
                .map(Token::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            overrides.push((key, CellOverride::modified(tokens)));
        }

        let held = self.player.held.map(Token::try_from).transpose()?;
        Ok(GameSnapshot {
            overrides,
            player: PlayerState {
                position: WorldPosition::new(self.player.lat, self.player.lng),
                held,
                mode: self.player.mode,
            },
        })
    }
}
