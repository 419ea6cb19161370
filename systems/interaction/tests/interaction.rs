use token_trek_core::{Command, Event, LifecycleRejection};
use token_trek_system_interaction::{Interaction, MenuOption};
use token_trek_world::{self as world, query, World, WorldConfig};

fn booted_world() -> World {
    let mut world = World::with_config(WorldConfig {
        window_radius: 3,
        spawn_probability: 0.5,
        ..WorldConfig::default()
    });
    let mut events = Vec::new();
    world::apply(&mut world, Command::RefreshWindow, &mut events);
    world
}

fn run(world: &mut World, interaction: &mut Interaction, commands: Vec<Command>) -> Vec<Event> {
    let mut log = Vec::new();
    for command in commands {
        let mut events = Vec::new();
        world::apply(world, command, &mut events);
        interaction.handle(&events);
        log.extend(events);
    }
    log
}

#[test]
fn choosing_pickup_emits_exactly_one_command() {
    let mut world = booted_world();
    let token = query::resident_tokens(&world)[0];
    let mut interaction = Interaction::new();

    let menu = interaction.open(token, query::held_token(&world)).clone();
    assert!(menu.offers(MenuOption::PickUp));

    let mut commands = Vec::new();
    assert!(interaction.resolve(Some(MenuOption::PickUp), &mut commands));
    assert_eq!(commands, vec![Command::PickUp { token: token.id }]);
    assert!(interaction.pending().is_none());

    let _ = run(&mut world, &mut interaction, commands);
    assert_eq!(query::held_token(&world), Some(token));
}

#[test]
fn options_not_offered_are_ignored() {
    let world = booted_world();
    let token = query::resident_tokens(&world)[0];
    let mut interaction = Interaction::new();
    let _ = interaction.open(token, None);

    let mut commands = Vec::new();
    assert!(!interaction.resolve(Some(MenuOption::Combine), &mut commands));
    assert!(commands.is_empty());
    assert!(interaction.pending().is_none());
}

#[test]
fn dismissing_the_menu_emits_nothing() {
    let world = booted_world();
    let token = query::resident_tokens(&world)[0];
    let mut interaction = Interaction::new();
    let _ = interaction.open(token, None);

    let mut commands = Vec::new();
    assert!(!interaction.resolve(None, &mut commands));
    assert!(commands.is_empty());
}

#[test]
fn menus_for_released_tokens_close() {
    let mut world = booted_world();
    let token = query::resident_tokens(&world)[0];
    let mut interaction = Interaction::new();
    let _ = interaction.open(token, None);

    let _ = run(&mut world, &mut interaction, vec![Command::RefreshWindow]);

    assert!(interaction.pending().is_none());
}

#[test]
fn combine_choice_reaches_the_world() {
    let mut world = booted_world();
    let tokens = query::resident_tokens(&world);
    let held = tokens[0];
    let target = tokens[1];
    let mut interaction = Interaction::new();

    let _ = interaction.open(held, None);
    let mut commands = Vec::new();
    let _ = interaction.resolve(Some(MenuOption::PickUp), &mut commands);
    let _ = run(&mut world, &mut interaction, commands);

    let menu = interaction.open(target, query::held_token(&world)).clone();
    assert_eq!(menu.options, vec![MenuOption::Combine]);
    let mut commands = Vec::new();
    let _ = interaction.resolve(Some(MenuOption::Combine), &mut commands);
    let events = run(&mut world, &mut interaction, commands);

    let outcome = events.iter().find(|event| {
        matches!(
            event,
            Event::TokensCombined { .. } | Event::CombineMismatch { .. }
        )
    });
    if held.value == target.value {
        assert!(matches!(outcome, Some(Event::TokensCombined { .. })));
        assert_eq!(query::held_token(&world), None);
    } else {
        assert!(matches!(outcome, Some(Event::CombineMismatch { .. })));
        assert_eq!(query::held_token(&world), Some(held));
    }
    assert!(!events.contains(&Event::LifecycleRejected {
        reason: LifecycleRejection::UnknownToken
    }));
}
