//! Property tests for the game engine.

use proptest::prelude::*;

use werewolf::game::{
    assign_roles, Alignment, GameEngine, GameSettings, NightActions, Phase, Player, PlayerId,
    RoleCounts, RoleId,
};

fn table(n: usize) -> Vec<Player> {
    (0..n)
        .map(|i| Player::new(PlayerId::new(format!("p{}", i)), format!("Player {}", i), None))
        .collect()
}

fn started(n: usize, seed: u32) -> GameEngine {
    let mut engine = GameEngine::with_seed("prop", seed);
    for player in table(n) {
        engine.add_player_with_id(player.id, player.name, None);
    }
    assert!(engine.start_game());
    assert!(engine.proceed_from_role_reveal());
    engine
}

fn count(players: &[Player], role: RoleId) -> usize {
    players.iter().filter(|p| p.role == Some(role)).count()
}

proptest! {
    #[test]
    fn prop_assignment_is_deterministic(n in 3usize..20, seed in any::<u32>()) {
        let settings = GameSettings::default();
        let a = assign_roles(&table(n), &settings, seed);
        let b = assign_roles(&table(n), &settings, seed);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_assignment_keeps_order_and_counts(n in 3usize..20, seed in any::<u32>()) {
        let players = table(n);
        let assigned = assign_roles(&players, &GameSettings::default(), seed);
        let counts = RoleCounts::auto(n).clamped(n);

        prop_assert_eq!(assigned.len(), n);
        for (before, after) in players.iter().zip(&assigned) {
            prop_assert_eq!(&before.id, &after.id);
            prop_assert!(after.alive);
            prop_assert!(after.role.is_some());
        }
        prop_assert_eq!(count(&assigned, RoleId::Werewolf), counts.werewolves);
        prop_assert_eq!(count(&assigned, RoleId::Seer), counts.seers);
        prop_assert_eq!(count(&assigned, RoleId::Medic), counts.medics);
        prop_assert_eq!(count(&assigned, RoleId::Villager), counts.villagers(n));
    }

    #[test]
    fn prop_overrides_never_overflow(
        n in 3usize..12,
        wolves in 0usize..15,
        seers in 0usize..4,
        medics in 0usize..4,
        seed in any::<u32>(),
    ) {
        let mut settings = GameSettings::default();
        settings.set_role_count(RoleId::Werewolf, wolves);
        settings.set_role_count(RoleId::Seer, seers);
        settings.set_role_count(RoleId::Medic, medics);

        let assigned = assign_roles(&table(n), &settings, seed);
        let wolves = count(&assigned, RoleId::Werewolf);
        prop_assert!(wolves >= 1);
        prop_assert!(wolves < n);
        prop_assert!(assigned.iter().all(|p| p.role.is_some()));
    }

    #[test]
    fn prop_night_kills_at_most_one(
        n in 5usize..12,
        seed in any::<u32>(),
        kill in proptest::option::of(0usize..12),
        protect in proptest::option::of(0usize..12),
    ) {
        let mut engine = started(n, seed);
        let pick = |i: Option<usize>| i.map(|i| PlayerId::new(format!("p{}", i % n)));
        let actions = NightActions {
            kill_target_id: pick(kill),
            protect_id: pick(protect),
            peek_target_id: None,
        };
        let expected_dead = usize::from(actions.killed().is_some());

        prop_assert!(engine.apply_night_actions(actions));
        prop_assert!(engine.resolve_night());
        prop_assert_eq!(engine.state().alive_count(), n - expected_dead);
        prop_assert!(matches!(engine.phase(), Phase::DayStart { round: 1 }), "phase was {:?}", engine.phase());
    }

    #[test]
    fn prop_voting_always_reaches_lynch_resolve(
        n in 5usize..12,
        seed in any::<u32>(),
        ballots in proptest::collection::vec(proptest::option::of(0usize..12), 24),
    ) {
        let mut engine = started(n, seed);
        engine.resolve_night();
        prop_assert!(engine.start_voting());

        // A revote can open a second ballot, so feed at most two rounds
        for choice in ballots {
            if engine.voters_remaining() == 0 {
                break;
            }
            engine.cast_vote_for_current(choice.map(|i| PlayerId::new(format!("p{}", i % n))));
        }
        engine.cast_all_remaining(None);

        prop_assert!(matches!(engine.phase(), Phase::LynchResolve { .. }), "phase was {:?}", engine.phase());
    }

    #[test]
    fn prop_game_terminates_with_consistent_winner(n in 5usize..12, seed in any::<u32>()) {
        let mut engine = started(n, seed);

        // Wolves eat the first living townsperson, the town lynches the first living wolf
        for _ in 0..(2 * n) {
            if matches!(engine.phase(), Phase::GameOver { .. }) {
                break;
            }
            let state = engine.state().clone();
            let victim = state.alive_players()
                .find(|p| p.role != Some(RoleId::Werewolf))
                .map(|p| p.id.clone());
            engine.apply_night_actions(NightActions { kill_target_id: victim, ..Default::default() });
            engine.resolve_night();

            engine.start_voting();
            let wolf = engine.state().alive_players()
                .find(|p| p.role == Some(RoleId::Werewolf))
                .map(|p| p.id.clone());
            engine.cast_all_remaining(wolf);
            engine.continue_after_lynch();
        }

        let Phase::GameOver { winners } = engine.phase().clone() else {
            return Err(TestCaseError::fail("game did not end"));
        };
        let state = engine.state();
        let wolves = state.alive_wolves();
        let town = state.alive_count() - wolves;
        match winners {
            Alignment::Town => prop_assert_eq!(wolves, 0),
            Alignment::Wolf => prop_assert!(wolves >= town),
        }
    }
}
