//! Contract of the continuous position feed consumed by tracked movement.

use std::{fmt, sync::mpsc::Sender};

use thiserror::Error;
use token_trek_core::WorldPosition;

/// Opaque handle returned by [`PositionFeed::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Creates a handle wrapping the provided feed-specific value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the wrapped value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Recoverable failures reported by a position feed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The host exposes no position feed.
    #[error("position feed is not available on this host")]
    Unavailable,
    /// The user or the host refused access to the feed.
    #[error("access to the position feed was denied")]
    PermissionDenied,
    /// A single sample could not be produced.
    #[error("position feed reported a transient failure: {0}")]
    Transient(String),
}

/// Message delivered by a feed to its subscriber.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedMessage {
    /// A fresh position sample.
    Sample(WorldPosition),
    /// A recoverable failure. The previous sample stays authoritative.
    Error(FeedError),
}

/// External provider of continuous position samples.
///
/// Feeds deliver messages through the sender handed to
/// [`PositionFeed::subscribe`]. Sends to a dropped receiver fail silently on
/// the feed's side, which is how a stopped subscriber stops listening.
pub trait PositionFeed: fmt::Debug {
    /// Reports whether the host exposes this feed at all.
    fn is_present(&self) -> bool;

    /// Starts delivering messages into `sink`.
    fn subscribe(&mut self, sink: Sender<FeedMessage>) -> Result<SubscriptionHandle, FeedError>;

    /// Ends the subscription identified by `handle`.
    fn unsubscribe(&mut self, handle: SubscriptionHandle);
}
