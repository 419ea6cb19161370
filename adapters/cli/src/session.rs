//! Single-threaded play loop tying the world to the terminal.

use std::{
    io::{BufRead, Write},
    time::Instant,
};

use anyhow::{Context, Result as AnyResult};
use token_trek_core::{Command, Event, LifecycleRejection, MovementMode, TokenId};
use token_trek_rendering::{Notice, PresentationSurface, Presenter};
use token_trek_system_interaction::Interaction;
use token_trek_system_movement::{MovementController, PositionFeed};
use token_trek_system_persistence::{
    Autosave, KeyValueStore, ResumeOutcome, SaveOutcome, SnapshotService,
};
use token_trek_world::{self as world, query, World};
use tracing::{debug, info};

use crate::{
    config::Settings,
    input::{Input, HELP},
    terminal::{TerminalSurface, View},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub(crate) struct Session<S, R, W> {
    world: World,
    movement: MovementController,
    interaction: Interaction,
    presenter: Presenter,
    autosave: Autosave,
    snapshots: SnapshotService<S>,
    surface: TerminalSurface<R, W>,
    clock: Instant,
}

impl<S, R, W> Session<S, R, W>
where
    S: KeyValueStore,
    R: BufRead,
    W: Write,
{
    pub(crate) fn new(
        settings: &Settings,
        store: S,
        feed: Option<Box<dyn PositionFeed>>,
        surface: TerminalSurface<R, W>,
    ) -> Self {
        let world = World::with_config(settings.world);
        let frame = *query::frame(&world);
        let movement = MovementController::new(frame, query::player(&world).position, feed);
        Self {
            world,
            movement,
            interaction: Interaction::new(),
            presenter: Presenter::default(),
            autosave: Autosave::new(settings.autosave),
            snapshots: SnapshotService::new(store),
            surface,
            clock: Instant::now(),
        }
    }

    /// Resumes the stored session or starts a fresh one.
    pub(crate) fn start(&mut self, tracked: bool) -> AnyResult<()> {
        self.surface.say(query::welcome_banner(&self.world))?;

        let mut events = Vec::new();
        let outcome = self
            .snapshots
            .resume(&mut self.world, &mut self.movement, &mut events);
        self.present(&events)?;
        let resumed = outcome == ResumeOutcome::Resumed;
        info!(resumed, "session_ready");

        if tracked && self.movement.mode() == MovementMode::Manual {
            self.switch_mode(MovementMode::Tracked)?;
        }
        self.draw()
    }

    /// Processes input lines until the player quits or input ends, then saves.
    pub(crate) fn run(&mut self) -> AnyResult<()> {
        while let Some(line) = self.surface.read_line()? {
            let dt = self.clock.elapsed();
            self.clock = Instant::now();
            let ticked = self.apply(vec![Command::Tick { dt }])?;

            let mut moves = Vec::new();
            self.movement.poll(&mut moves);
            let _ = self.apply(moves)?;

            let flow = match line.parse::<Input>() {
                Ok(input) => self.execute(input)?,
                Err(error) => {
                    self.surface.say(error)?;
                    Flow::Continue
                }
            };
            if flow == Flow::Quit {
                break;
            }

            if self.autosave.handle(&ticked) {
                debug!("autosave_due");
                let _ = self.snapshots.save(&self.world, &self.movement);
            }
            self.draw()?;
        }

        self.finish()
    }

    fn execute(&mut self, input: Input) -> AnyResult<Flow> {
        match input {
            Input::Step(direction) => {
                let mut commands = Vec::new();
                if !self.movement.step(direction, &mut commands) {
                    self.surface
                        .say("steps are ignored while tracking, use `mode manual`")?;
                }
                let _ = self.apply(commands)?;
            }
            Input::PickUp(token) => {
                let _ = self.apply(vec![Command::PickUp { token }])?;
            }
            Input::Drop => {
                let _ = self.apply(vec![Command::Drop])?;
            }
            Input::Combine(target) => {
                let _ = self.apply(vec![Command::Combine { target }])?;
            }
            Input::Inspect(token) => self.inspect(token)?,
            Input::Mode(mode) => self.switch_mode(mode)?,
            Input::Save => self.save()?,
            Input::Reset => {
                let mut events = Vec::new();
                self.snapshots
                    .reset(&mut self.world, &mut self.movement, &mut events);
                self.present(&events)?;
                self.autosave.restart();
            }
            Input::Look => {}
            Input::Help => self.surface.say(HELP)?,
            Input::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn inspect(&mut self, token: TokenId) -> AnyResult<()> {
        let Some(token) = query::find_token(&self.world, token) else {
            self.surface
                .notify(&Notice::Rejected(LifecycleRejection::UnknownToken));
            return Ok(());
        };

        let menu = self
            .interaction
            .open(token, query::held_token(&self.world));
        let choice = self.surface.show_menu(menu)?;
        let mut commands = Vec::new();
        let _ = self.interaction.resolve(choice, &mut commands);
        let _ = self.apply(commands)?;
        Ok(())
    }

    fn switch_mode(&mut self, mode: MovementMode) -> AnyResult<()> {
        let mut commands = Vec::new();
        match self.movement.switch_to(mode, &mut commands) {
            Ok(_) => {
                let _ = self.apply(commands)?;
            }
            Err(error) => self
                .surface
                .say(format!("cannot switch movement source: {error}"))?,
        }
        Ok(())
    }

    fn save(&mut self) -> AnyResult<()> {
        self.autosave.restart();
        match self.snapshots.save(&self.world, &self.movement) {
            SaveOutcome::Saved => self.surface.say("session saved"),
            SaveOutcome::Skipped => self.surface.say("could not save, play continues"),
        }
    }

    fn finish(&mut self) -> AnyResult<()> {
        self.save()?;
        self.movement.shutdown();
        self.presenter
            .clear(&mut self.surface)
            .context("failed to clear the terminal surface")
    }

    fn apply(&mut self, commands: Vec<Command>) -> AnyResult<Vec<Event>> {
        let mut log = Vec::new();
        for command in commands {
            let mut events = Vec::new();
            world::apply(&mut self.world, command, &mut events);
            self.movement.handle(&events);
            self.present(&events)?;
            log.extend(events);
        }
        Ok(log)
    }

    fn present(&mut self, events: &[Event]) -> AnyResult<()> {
        self.interaction.handle(events);
        self.presenter.handle(events, &mut self.surface)
    }

    fn draw(&mut self) -> AnyResult<()> {
        let Some(window) = query::window(&self.world) else {
            return Ok(());
        };
        let player = query::player(&self.world);
        let view = View {
            window,
            player: query::player_cell(&self.world),
            cells: query::active_cells(&self.world),
            held: player.held,
            mode: player.mode,
        };
        self.surface.draw(&view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use token_trek_system_persistence::{MemoryStore, DEFAULT_SNAPSHOT_KEY};
    use token_trek_world::WorldConfig;

    fn settings() -> Settings {
        Settings {
            world: WorldConfig {
                window_radius: 2,
                spawn_probability: 0.5,
                ..WorldConfig::default()
            },
            save_dir: std::path::PathBuf::from("unused"),
            autosave: std::time::Duration::from_secs(600),
            tracked: false,
        }
    }

    fn play(
        script: &str,
        store: MemoryStore,
    ) -> (Session<MemoryStore, Cursor<String>, Vec<u8>>, String) {
        let surface = TerminalSurface::new(Cursor::new(script.to_owned()), Vec::new());
        let mut session = Session::new(&settings(), store, None, surface);
        session.start(false).expect("start");
        session.run().expect("run");
        let output = String::from_utf8(session.surface_output()).expect("utf8");
        (session, output)
    }

    impl<S: KeyValueStore> Session<S, Cursor<String>, Vec<u8>> {
        fn surface_output(&mut self) -> Vec<u8> {
            std::mem::take(self.surface.output_mut())
        }
    }

    #[test]
    fn quitting_saves_the_session() {
        let (session, output) = play("n\ne\nquit\n", MemoryStore::new());

        assert!(output.contains("session saved"));
        assert!(session
            .snapshots
            .store()
            .exists(DEFAULT_SNAPSHOT_KEY)
            .expect("exists"));
        assert!(session.presenter.is_empty());
    }

    #[test]
    fn next_run_resumes_where_the_last_one_stopped() {
        let (first, _) = play("n\nn\nw\nquit\n", MemoryStore::new());
        let cell = query::player_cell(&first.world);
        let store = first.snapshots.store().clone();

        let (second, output) = play("quit\n", store);

        assert!(output.contains("previous session restored"));
        assert_eq!(query::player_cell(&second.world), cell);
    }

    #[test]
    fn tracking_is_unavailable_without_a_feed() {
        let (session, output) = play("mode tracked\nn\nquit\n", MemoryStore::new());

        assert!(output.contains("cannot switch movement source"));
        assert_eq!(session.movement.mode(), MovementMode::Manual);
        assert_eq!(query::player_cell(&session.world).i(), 1);
    }

    #[test]
    fn bad_input_is_reported_and_play_continues() {
        let (session, output) = play("dance\npick\ns\n", MemoryStore::new());

        assert!(output.contains("unknown command `dance`"));
        assert!(output.contains("`pick` needs a token id"));
        assert_eq!(query::player_cell(&session.world).i(), -1);
    }

    #[test]
    fn inspecting_unknown_tokens_is_informational() {
        let (_, output) = play("inspect 999999\nquit\n", MemoryStore::new());
        assert!(output.contains("that token is not in view"));
    }
}
