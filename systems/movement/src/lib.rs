#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Movement sources that supply the player's position and emit move commands.
//!
//! Exactly one [`MovementSource`] drives the player at a time. The
//! [`MovementController`] owns it, translates step requests and feed samples
//! into [`Command::MovePlayer`], and keeps the feed parked while manual
//! movement is active.

mod feed;

use std::sync::mpsc::{self, Receiver, TryRecvError};

use token_trek_core::{Command, Direction, Event, GridFrame, MovementMode, WorldPosition};
use tracing::{debug, info, warn};

pub use feed::{FeedError, FeedMessage, PositionFeed, SubscriptionHandle};

/// Discrete stepping source. Always available.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ManualSource {
    frame: GridFrame,
    position: WorldPosition,
}

impl ManualSource {
    /// Creates a manual source starting at `position`.
    #[must_use]
    pub const fn new(frame: GridFrame, position: WorldPosition) -> Self {
        Self { frame, position }
    }

    /// Moves exactly one cell in `direction`, landing on the centre of the
    /// neighbouring cell, and returns the new position.
    pub fn step(&mut self, direction: Direction) -> WorldPosition {
        let next = self.frame.to_grid(self.position).neighbor(direction);
        let bounds = self.frame.bounds(next);
        self.position = WorldPosition::new(
            (bounds.min.lat() + bounds.max.lat()) / 2.0,
            (bounds.min.lng() + bounds.max.lng()) / 2.0,
        );
        self.position
    }

    /// Last position produced or adopted by the source.
    #[must_use]
    pub const fn current_position(&self) -> WorldPosition {
        self.position
    }
}

/// Source following an external [`PositionFeed`].
#[derive(Debug)]
pub struct TrackedSource {
    feed: Box<dyn PositionFeed>,
    subscription: Option<(SubscriptionHandle, Receiver<FeedMessage>)>,
    last: Option<WorldPosition>,
}

impl TrackedSource {
    /// Wraps a feed. No sample is known until one arrives.
    #[must_use]
    pub fn new(feed: Box<dyn PositionFeed>) -> Self {
        Self {
            feed,
            subscription: None,
            last: None,
        }
    }

    /// Wraps a feed, treating `position` as the last known sample.
    #[must_use]
    pub fn seeded(feed: Box<dyn PositionFeed>, position: WorldPosition) -> Self {
        Self {
            last: Some(position),
            ..Self::new(feed)
        }
    }

    /// Reports whether the host exposes the feed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.feed.is_present()
    }

    /// Reports whether a subscription is currently open.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribes to the feed. A missing feed or a refused subscription
    /// leaves the source idle.
    pub fn start(&mut self) -> Result<(), FeedError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        if !self.feed.is_present() {
            return Err(FeedError::Unavailable);
        }

        let (sink, receiver) = mpsc::channel();
        let handle = self.feed.subscribe(sink)?;
        debug!(handle = handle.get(), "position_feed_subscribed");
        self.subscription = Some((handle, receiver));
        Ok(())
    }

    /// Ends the subscription. No message is observed after this returns.
    pub fn stop(&mut self) {
        if let Some((handle, receiver)) = self.subscription.take() {
            self.feed.unsubscribe(handle);
            drop(receiver);
            debug!(handle = handle.get(), "position_feed_unsubscribed");
        }
    }

    /// Drains pending feed messages and returns the newest sample, if any
    /// arrived since the previous poll. Errors are logged and skipped.
    pub fn poll(&mut self) -> Option<WorldPosition> {
        let mut newest = None;
        let mut disconnected = false;
        if let Some((_, receiver)) = &self.subscription {
            loop {
                match receiver.try_recv() {
                    Ok(FeedMessage::Sample(position)) if position.is_finite() => {
                        newest = Some(position);
                    }
                    Ok(FeedMessage::Sample(position)) => {
                        warn!(
                            lat = position.lat(),
                            lng = position.lng(),
                            "position_sample_rejected"
                        );
                    }
                    Ok(FeedMessage::Error(error)) => {
                        warn!(error = %error, "position_feed_error");
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        if disconnected {
            warn!("position_feed_disconnected");
            self.subscription = None;
        }
        if newest.is_some() {
            self.last = newest;
        }
        newest
    }

    /// Last received sample, or `None` before the first one.
    #[must_use]
    pub const fn current_position(&self) -> Option<WorldPosition> {
        self.last
    }

    fn into_feed(mut self) -> Box<dyn PositionFeed> {
        self.stop();
        self.feed
    }
}

/// Closed set of movement sources.
#[derive(Debug)]
pub enum MovementSource {
    /// Discrete cardinal steps.
    Manual(ManualSource),
    /// Continuous external feed.
    Tracked(TrackedSource),
}

impl MovementSource {
    /// Mode tag matching the variant.
    #[must_use]
    pub const fn mode(&self) -> MovementMode {
        match self {
            Self::Manual(_) => MovementMode::Manual,
            Self::Tracked(_) => MovementMode::Tracked,
        }
    }

    /// Begins producing positions. Manual sources have nothing to start.
    pub fn start(&mut self) -> Result<(), FeedError> {
        match self {
            Self::Manual(_) => Ok(()),
            Self::Tracked(source) => source.start(),
        }
    }

    /// Stops producing positions. Manual sources have nothing to stop.
    pub fn stop(&mut self) {
        match self {
            Self::Manual(_) => {}
            Self::Tracked(source) => source.stop(),
        }
    }

    /// Position the source currently reports.
    #[must_use]
    pub const fn current_position(&self) -> Option<WorldPosition> {
        match self {
            Self::Manual(source) => Some(source.current_position()),
            Self::Tracked(source) => source.current_position(),
        }
    }

    /// Reports whether the source can produce positions on this host.
    #[must_use]
    pub fn is_available(&self) -> bool {
        match self {
            Self::Manual(_) => true,
            Self::Tracked(source) => source.is_available(),
        }
    }
}

/// Owns the active movement source and the parked feed.
#[derive(Debug)]
pub struct MovementController {
    frame: GridFrame,
    active: MovementSource,
    parked_feed: Option<Box<dyn PositionFeed>>,
    last_known: WorldPosition,
}

impl MovementController {
    /// Creates a controller in manual mode at `position`.
    ///
    /// `feed` is kept parked until tracked mode is requested.
    #[must_use]
    pub fn new(
        frame: GridFrame,
        position: WorldPosition,
        feed: Option<Box<dyn PositionFeed>>,
    ) -> Self {
        Self {
            frame,
            active: MovementSource::Manual(ManualSource::new(frame, position)),
            parked_feed: feed,
            last_known: position,
        }
    }

    /// Mode of the active source.
    #[must_use]
    pub const fn mode(&self) -> MovementMode {
        self.active.mode()
    }

    /// Active source.
    #[must_use]
    pub const fn source(&self) -> &MovementSource {
        &self.active
    }

    /// Position reported by the active source, or the last known one when the
    /// tracked source has not produced a sample yet.
    #[must_use]
    pub fn current_position(&self) -> WorldPosition {
        self.active.current_position().unwrap_or(self.last_known)
    }

    /// Reports whether switching to tracked mode could succeed.
    #[must_use]
    pub fn tracked_available(&self) -> bool {
        match &self.active {
            MovementSource::Tracked(source) => source.is_available(),
            MovementSource::Manual(_) => self
                .parked_feed
                .as_ref()
                .map_or(false, |feed| feed.is_present()),
        }
    }

    /// Switches to `mode`, stopping the outgoing source first.
    ///
    /// Returns `Ok(true)` when the mode changed and a
    /// [`Command::SetMovementMode`] was emitted. Switching to tracked mode
    /// without an available feed fails and keeps the current source.
    pub fn switch_to(
        &mut self,
        mode: MovementMode,
        out: &mut Vec<Command>,
    ) -> Result<bool, FeedError> {
        if self.mode() == mode {
            return Ok(false);
        }
        if mode == MovementMode::Tracked && !self.tracked_available() {
            return Err(FeedError::Unavailable);
        }

        let position = self.current_position();
        let outgoing = std::mem::replace(
            &mut self.active,
            MovementSource::Manual(ManualSource::new(self.frame, position)),
        );
        let incoming = match outgoing {
            MovementSource::Tracked(source) => {
                self.parked_feed = Some(source.into_feed());
                None
            }
            MovementSource::Manual(_) => self.parked_feed.take(),
        };

        if let Some(feed) = incoming {
            let mut source = MovementSource::Tracked(TrackedSource::seeded(feed, position));
            if let Err(error) = source.start() {
                warn!(error = %error, "tracked_movement_start_failed");
                if let MovementSource::Tracked(source) = source {
                    self.parked_feed = Some(source.into_feed());
                }
                return Err(error);
            }
            self.active = source;
        }

        self.last_known = position;
        info!(mode = ?mode, "movement_source_switched");
        out.push(Command::SetMovementMode { mode });
        Ok(true)
    }

    /// Requests a manual step. Ignored while tracked movement is active.
    pub fn step(&mut self, direction: Direction, out: &mut Vec<Command>) -> bool {
        match &mut self.active {
            MovementSource::Manual(source) => {
                let position = source.step(direction);
                self.last_known = position;
                out.push(Command::MovePlayer { position });
                true
            }
            MovementSource::Tracked(_) => false,
        }
    }

    /// Drains the tracked feed and emits a move to the newest sample.
    pub fn poll(&mut self, out: &mut Vec<Command>) {
        if let MovementSource::Tracked(source) = &mut self.active {
            if let Some(position) = source.poll() {
                self.last_known = position;
                out.push(Command::MovePlayer { position });
            }
        }
    }

    /// Keeps the sources aligned with positions the world settled on.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            if let Event::PlayerMoved { to, .. } = event {
                self.adopt(*to);
            }
        }
    }

    /// Treats `position` as the last known position of every source.
    pub fn adopt(&mut self, position: WorldPosition) {
        self.last_known = position;
        match &mut self.active {
            MovementSource::Manual(source) => *source = ManualSource::new(self.frame, position),
            MovementSource::Tracked(source) => source.last = Some(position),
        }
    }

    /// Stops the active source.
    pub fn shutdown(&mut self) {
        self.active.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use token_trek_core::CellCoord;

    #[derive(Debug)]
    struct AbsentFeed;

    impl PositionFeed for AbsentFeed {
        fn is_present(&self) -> bool {
            false
        }

        fn subscribe(
            &mut self,
            _sink: mpsc::Sender<FeedMessage>,
        ) -> Result<SubscriptionHandle, FeedError> {
            Err(FeedError::Unavailable)
        }

        fn unsubscribe(&mut self, _handle: SubscriptionHandle) {}
    }

    #[test]
    fn manual_steps_move_one_cell() {
        let frame = GridFrame::default();
        let mut source = ManualSource::new(frame, frame.origin());
        let north = source.step(Direction::North);
        assert_eq!(frame.to_grid(north), CellCoord::new(1, 0));
        let east = source.step(Direction::East);
        assert_eq!(frame.to_grid(east), CellCoord::new(1, 1));
        let _ = source.step(Direction::South);
        let west = source.step(Direction::West);
        assert_eq!(frame.to_grid(west), CellCoord::new(0, 0));
    }

    #[test]
    fn absent_feed_keeps_manual_mode() {
        let frame = GridFrame::default();
        let mut controller =
            MovementController::new(frame, frame.origin(), Some(Box::new(AbsentFeed)));
        let mut commands = Vec::new();

        assert!(!controller.tracked_available());
        assert_eq!(
            controller.switch_to(MovementMode::Tracked, &mut commands),
            Err(FeedError::Unavailable)
        );
        assert_eq!(controller.mode(), MovementMode::Manual);
        assert!(commands.is_empty());
        assert!(controller.step(Direction::North, &mut commands));
    }

    #[test]
    fn tracked_source_without_samples_reports_nothing() {
        let mut source = TrackedSource::new(Box::new(AbsentFeed));
        assert_eq!(source.start(), Err(FeedError::Unavailable));
        assert!(!source.is_running());
        assert_eq!(source.poll(), None);
        assert_eq!(source.current_position(), None);
    }
}
