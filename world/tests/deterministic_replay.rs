use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Duration,
};

use token_trek_core::{CellCoord, Command, Event, Token, TokenId, WorldPosition};
use token_trek_world::{self as world, query, ValueDraw, World, WorldConfig};

#[test]
fn deterministic_replay_produces_identical_logs() {
    let config = WorldConfig {
        window_radius: 4,
        spawn_probability: 0.25,
        ..WorldConfig::default()
    };
    let first = replay(config);
    let second = replay(config);

    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert!(first
        .events
        .iter()
        .any(|record| matches!(record, EventRecord::Materialized { .. })));
}

#[test]
fn cell_seeded_values_replay_across_sessions_with_different_paths() {
    let config = WorldConfig {
        window_radius: 2,
        spawn_probability: 0.5,
        value_draw: ValueDraw::CellSeeded,
        ..WorldConfig::default()
    };
    let mut direct = World::with_config(config);
    let mut wandering = World::with_config(config);
    let frame = *query::frame(&direct);

    let mut sink = Vec::new();
    world::apply(&mut direct, Command::RefreshWindow, &mut sink);
    for cell in [CellCoord::new(9, 9), CellCoord::new(-7, 3), CellCoord::new(0, 0)] {
        world::apply(
            &mut wandering,
            Command::MovePlayer {
                position: frame.bounds(cell).min,
            },
            &mut sink,
        );
    }

    let values = |world: &World| -> Vec<(CellCoord, u32)> {
        query::resident_tokens(world)
            .into_iter()
            .map(|token| (token.cell, token.value.get()))
            .collect()
    };
    assert_eq!(values(&direct), values(&wandering));
}

fn replay(config: WorldConfig) -> ReplayOutcome {
    let mut world = World::with_config(config);
    let frame = *query::frame(&world);
    let mut log = Vec::new();

    let run = |world: &mut World, command: Command, log: &mut Vec<EventRecord>| {
        let mut events = Vec::new();
        world::apply(world, command, &mut events);
        log.extend(events.iter().map(EventRecord::from));
    };

    run(&mut world, Command::RefreshWindow, &mut log);
    for step in 0..12 {
        let cell = CellCoord::new(step / 3, step % 5 - 2);
        run(
            &mut world,
            Command::MovePlayer {
                position: frame.bounds(cell).min,
            },
            &mut log,
        );
        run(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(400),
            },
            &mut log,
        );

        let here = query::cell_tokens(&world, cell).first().copied();
        match (query::held_token(&world), here) {
            (None, Some(token)) => run(&mut world, Command::PickUp { token: token.id }, &mut log),
            (Some(_), Some(token)) => {
                run(&mut world, Command::Combine { target: token.id }, &mut log)
            }
            (Some(_), None) => run(&mut world, Command::Drop, &mut log),
            (None, None) => {}
        }
    }

    ReplayOutcome {
        tokens: query::resident_tokens(&world),
        held: query::held_token(&world),
        overrides: query::overrides(&world)
            .to_entries()
            .into_iter()
            .map(|(key, entry)| (key, entry.tokens))
            .collect(),
        events: log,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ReplayOutcome {
    tokens: Vec<Token>,
    held: Option<Token>,
    overrides: Vec<(String, Vec<Token>)>,
    events: Vec<EventRecord>,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum EventRecord {
    TimeAdvanced { dt_micros: u128 },
    Moved { to: (u64, u64) },
    Materialized { token: Token },
    Released { token: TokenId },
    Lifecycle(String),
    Other(String),
}

fn position_bits(position: WorldPosition) -> (u64, u64) {
    (position.lat().to_bits(), position.lng().to_bits())
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        match event {
            Event::TimeAdvanced { dt } => Self::TimeAdvanced {
                dt_micros: dt.as_micros(),
            },
            Event::PlayerMoved { to, .. } => Self::Moved {
                to: position_bits(*to),
            },
            Event::TokenMaterialized { token, .. } => Self::Materialized { token: *token },
            Event::TokenReleased { token } => Self::Released { token: *token },
            Event::TokenPickedUp { .. }
            | Event::TokenDropped { .. }
            | Event::TokensCombined { .. }
            | Event::CombineMismatch { .. }
            | Event::LifecycleRejected { .. }
            | Event::WinReached { .. } => Self::Lifecycle(format!("{event:?}")),
            other => Self::Other(format!("{other:?}")),
        }
    }
}
