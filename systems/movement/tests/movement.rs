use std::{cell::RefCell, rc::Rc, sync::mpsc::Sender};

use token_trek_core::{CellCoord, Command, Direction, Event, GridFrame, MovementMode, WorldPosition};
use token_trek_system_movement::{
    FeedError, FeedMessage, MovementController, MovementSource, PositionFeed, SubscriptionHandle,
};
use token_trek_world::{self as world, query, World, WorldConfig};

/// Feed driven by the test through a shared sender slot.
#[derive(Debug, Default, Clone)]
struct ScriptedFeed {
    sink: Rc<RefCell<Option<Sender<FeedMessage>>>>,
    subscriptions: Rc<RefCell<u64>>,
}

impl ScriptedFeed {
    fn send(&self, message: FeedMessage) -> bool {
        self.sink
            .borrow()
            .as_ref()
            .map_or(false, |sink| sink.send(message).is_ok())
    }

    fn subscribed(&self) -> bool {
        self.sink.borrow().is_some()
    }
}

impl PositionFeed for ScriptedFeed {
    fn is_present(&self) -> bool {
        true
    }

    fn subscribe(&mut self, sink: Sender<FeedMessage>) -> Result<SubscriptionHandle, FeedError> {
        *self.subscriptions.borrow_mut() += 1;
        *self.sink.borrow_mut() = Some(sink);
        Ok(SubscriptionHandle::new(*self.subscriptions.borrow()))
    }

    fn unsubscribe(&mut self, _handle: SubscriptionHandle) {
        *self.sink.borrow_mut() = None;
    }
}

/// Feed whose sender outlives the subscription, like a sensor that ignores
/// unsubscribe requests.
#[derive(Debug, Default, Clone)]
struct StubbornFeed {
    sink: Rc<RefCell<Option<Sender<FeedMessage>>>>,
}

impl PositionFeed for StubbornFeed {
    fn is_present(&self) -> bool {
        true
    }

    fn subscribe(&mut self, sink: Sender<FeedMessage>) -> Result<SubscriptionHandle, FeedError> {
        *self.sink.borrow_mut() = Some(sink);
        Ok(SubscriptionHandle::new(1))
    }

    fn unsubscribe(&mut self, _handle: SubscriptionHandle) {}
}

fn drive(world: &mut World, controller: &mut MovementController, commands: Vec<Command>) {
    for command in commands {
        let mut events = Vec::new();
        world::apply(world, command, &mut events);
        controller.handle(&events);
    }
}

#[test]
fn manual_steps_move_the_player_and_shift_the_window() {
    let config = WorldConfig {
        window_radius: 2,
        ..WorldConfig::default()
    };
    let mut world = World::with_config(config);
    let frame = *query::frame(&world);
    let mut controller = MovementController::new(frame, frame.origin(), None);

    let mut commands = Vec::new();
    assert!(controller.step(Direction::North, &mut commands));
    assert!(controller.step(Direction::East, &mut commands));
    drive(&mut world, &mut controller, commands);

    assert_eq!(query::player_cell(&world), CellCoord::new(1, 1));
    assert_eq!(
        query::window(&world).map(|window| (window.i_min(), window.j_max())),
        Some((-1, 3))
    );
}

#[test]
fn tracked_mode_follows_the_newest_sample() {
    let frame = GridFrame::default();
    let feed = ScriptedFeed::default();
    let mut controller =
        MovementController::new(frame, frame.origin(), Some(Box::new(feed.clone())));
    let mut commands = Vec::new();

    assert_eq!(
        controller.switch_to(MovementMode::Tracked, &mut commands),
        Ok(true)
    );
    assert_eq!(
        commands,
        vec![Command::SetMovementMode {
            mode: MovementMode::Tracked
        }]
    );
    assert!(feed.subscribed());
    assert_eq!(controller.current_position(), frame.origin());

    let first = frame.bounds(CellCoord::new(3, 3)).min;
    let second = frame.bounds(CellCoord::new(4, 3)).min;
    assert!(feed.send(FeedMessage::Sample(first)));
    assert!(feed.send(FeedMessage::Sample(second)));

    commands.clear();
    controller.poll(&mut commands);
    assert_eq!(commands, vec![Command::MovePlayer { position: second }]);

    commands.clear();
    controller.poll(&mut commands);
    assert!(commands.is_empty());
}

#[test]
fn feed_errors_do_not_move_the_player() {
    let frame = GridFrame::default();
    let feed = ScriptedFeed::default();
    let mut controller =
        MovementController::new(frame, frame.origin(), Some(Box::new(feed.clone())));
    let mut commands = Vec::new();
    let _ = controller.switch_to(MovementMode::Tracked, &mut commands);
    commands.clear();

    assert!(feed.send(FeedMessage::Error(FeedError::Transient("no fix".to_owned()))));
    controller.poll(&mut commands);

    assert!(commands.is_empty());
    assert_eq!(controller.current_position(), frame.origin());
}

#[test]
fn non_finite_samples_are_skipped() {
    let frame = GridFrame::default();
    let feed = ScriptedFeed::default();
    let mut controller =
        MovementController::new(frame, frame.origin(), Some(Box::new(feed.clone())));
    let mut commands = Vec::new();
    let _ = controller.switch_to(MovementMode::Tracked, &mut commands);
    commands.clear();

    assert!(feed.send(FeedMessage::Sample(WorldPosition::new(f64::NAN, 0.0))));
    controller.poll(&mut commands);

    assert!(commands.is_empty());
    assert_eq!(controller.current_position(), frame.origin());

    let valid = frame.bounds(CellCoord::new(2, -1)).min;
    assert!(feed.send(FeedMessage::Sample(valid)));
    assert!(feed.send(FeedMessage::Sample(WorldPosition::new(1.0, f64::NEG_INFINITY))));
    controller.poll(&mut commands);

    assert_eq!(commands, vec![Command::MovePlayer { position: valid }]);
    assert_eq!(controller.current_position(), valid);
}

#[test]
fn manual_steps_are_ignored_while_tracking() {
    let frame = GridFrame::default();
    let mut controller = MovementController::new(
        frame,
        frame.origin(),
        Some(Box::new(ScriptedFeed::default())),
    );
    let mut commands = Vec::new();
    let _ = controller.switch_to(MovementMode::Tracked, &mut commands);
    commands.clear();

    assert!(!controller.step(Direction::West, &mut commands));
    assert!(commands.is_empty());
}

#[test]
fn switching_back_preserves_the_last_position_and_stops_delivery() {
    let frame = GridFrame::default();
    let feed = StubbornFeed::default();
    let mut controller =
        MovementController::new(frame, frame.origin(), Some(Box::new(feed.clone())));
    let mut commands = Vec::new();
    let _ = controller.switch_to(MovementMode::Tracked, &mut commands);

    let sample = frame.bounds(CellCoord::new(-6, 2)).min;
    let sink = feed.sink.borrow().clone().expect("subscribed");
    sink.send(FeedMessage::Sample(sample)).expect("receiver alive");
    controller.poll(&mut commands);

    commands.clear();
    assert_eq!(
        controller.switch_to(MovementMode::Manual, &mut commands),
        Ok(true)
    );
    assert_eq!(
        commands,
        vec![Command::SetMovementMode {
            mode: MovementMode::Manual
        }]
    );
    assert!(matches!(controller.source(), MovementSource::Manual(_)));
    assert_eq!(controller.current_position(), sample);
    assert!(
        sink.send(FeedMessage::Sample(frame.origin())).is_err(),
        "receiver must be gone after stop"
    );

    commands.clear();
    let _ = controller.step(Direction::South, &mut commands);
    let Some(Command::MovePlayer { position }) = commands.first() else {
        panic!("expected a move");
    };
    assert_eq!(frame.to_grid(*position), CellCoord::new(-7, 2));
}

#[test]
fn controller_adopts_positions_settled_by_the_world() {
    let mut world = World::new();
    let frame = *query::frame(&world);
    let mut controller = MovementController::new(frame, frame.origin(), None);
    let mut commands = Vec::new();
    for _ in 0..3 {
        let _ = controller.step(Direction::East, &mut commands);
    }
    drive(&mut world, &mut controller, commands);

    let mut events = Vec::new();
    world::apply(&mut world, Command::Reset, &mut events);
    controller.handle(&events);
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::PlayerMoved { .. })));

    let mut commands = Vec::new();
    let _ = controller.step(Direction::North, &mut commands);
    drive(&mut world, &mut controller, commands);
    assert_eq!(query::player_cell(&world), CellCoord::new(1, 0));
}
