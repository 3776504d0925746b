use broadside_core::{
    Command, Coord, Event, GameConfig, GameId, Move, MoveCard, MoveCardId, OwnerId, SailPosition,
    Salt, ShipId, ShipSnapshot, Submission, TxId, TxStatus,
};
use broadside_system_commit_reveal::{
    build_commitment, decode_commitment, CommitReveal, CommitRevealError, CommitRevealState,
};
use broadside_world::{self as world, query, World};
use proptest::prelude::*;

const GAME: GameId = GameId::new(11);

fn ship(id: u32) -> ShipSnapshot {
    ShipSnapshot {
        id: ShipId::new(id),
        owner: OwnerId::new(1),
        position: Coord::new(0.0, 0.0),
        rotation: 0.0,
        length: 10.0,
        speed: 10.0,
        health: 10,
        max_health: 10,
        sail: SailPosition::Full,
        firepower: 0.0,
        on_fire: 0,
        damaged_cannons: 0,
    }
}

fn apply_all(world: &mut World, commands: Vec<Command>) -> Vec<Event> {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
    events
}

fn world_with_moves() -> World {
    let mut world = World::new();
    let mut commands = vec![
        Command::ConfigureGame {
            game: GAME,
            config: GameConfig {
                start_time: 0,
                commit_phase_length: 25,
                reveal_phase_length: 9,
                action_phase_length: 25,
                world_size: 100,
                shrink_rate: 100,
                entry_cutoff_turns: 2,
                island_threshold: 30,
                budget: 5,
                perlin_seed: 3,
            },
        },
        Command::SetLocalPlayer {
            owner: OwnerId::new(1),
        },
        Command::SyncMoveCard {
            card: MoveCard {
                id: MoveCardId::new(1),
                distance: 10.0,
                rotation: 0.0,
                direction: 0.0,
            },
        },
    ];
    for id in [1, 2] {
        commands.push(Command::SyncShip { ship: ship(id) });
        commands.push(Command::SetSelectedMove {
            ship: ShipId::new(id),
            card: Some(MoveCardId::new(1)),
        });
    }
    let _ = apply_all(&mut world, commands);
    world
}

/// Applies `commands`, feeds the resulting events back into the coordinator and
/// applies whatever it emits in response.
fn settle(world: &mut World, coordinator: &mut CommitReveal, commands: Vec<Command>) {
    let mut pending = commands;
    while !pending.is_empty() {
        let events = apply_all(world, std::mem::take(&mut pending));
        coordinator.handle(&events, &mut pending);
    }
}

fn latest_tx(world: &World) -> TxId {
    query::pending_transactions(world)
        .last()
        .map(|tx| tx.tx)
        .expect("a pending transaction")
}

#[test]
fn commitment_is_stored_only_after_confirmation() {
    let mut world = world_with_moves();
    let mut coordinator = CommitReveal::new(5);

    let mut commands = Vec::new();
    coordinator
        .submit_commit(&world, false, &mut commands)
        .expect("commit accepted");
    settle(&mut world, &mut coordinator, commands);

    assert_eq!(coordinator.state(), CommitRevealState::Committing);
    assert!(query::commitment(&world).is_none());

    let tx = latest_tx(&world);
    settle(
        &mut world,
        &mut coordinator,
        vec![Command::UpdateTransaction {
            tx,
            status: TxStatus::Complete,
        }],
    );

    assert_eq!(coordinator.state(), CommitRevealState::Committed);
    let commitment = query::commitment(&world).expect("commitment stored");
    let batch = decode_commitment(&commitment.encoding).expect("decodes");
    assert_eq!(batch.game, GAME);
    assert_eq!(batch.moves, query::committed_moves(&world));
    assert_eq!(query::committed_moves(&world).len(), 2);
}

#[test]
fn failed_commit_rolls_back_and_recommit_succeeds() {
    let mut world = world_with_moves();
    let mut coordinator = CommitReveal::new(5);

    let mut commands = Vec::new();
    coordinator
        .submit_commit(&world, false, &mut commands)
        .expect("commit accepted");
    settle(&mut world, &mut coordinator, commands);
    let tx = latest_tx(&world);
    settle(
        &mut world,
        &mut coordinator,
        vec![Command::UpdateTransaction {
            tx,
            status: TxStatus::Failed,
        }],
    );

    assert_eq!(coordinator.state(), CommitRevealState::Idle);
    assert!(query::commitment(&world).is_none());
    assert!(query::committed_moves(&world).is_empty());

    let mut commands = Vec::new();
    coordinator
        .submit_commit(&world, false, &mut commands)
        .expect("recommit accepted");
    settle(&mut world, &mut coordinator, commands);
    let retry = latest_tx(&world);
    assert_ne!(retry, tx);
    settle(
        &mut world,
        &mut coordinator,
        vec![Command::UpdateTransaction {
            tx: retry,
            status: TxStatus::Complete,
        }],
    );

    assert_eq!(coordinator.state(), CommitRevealState::Committed);
    assert!(query::commitment(&world).is_some());
    assert_eq!(query::committed_moves(&world).len(), 2);
}

#[test]
fn empty_selection_needs_override() {
    let mut world = world_with_moves();
    let _ = apply_all(&mut world, vec![Command::ClearSelectedMoves]);
    let mut coordinator = CommitReveal::new(5);

    let mut commands = Vec::new();
    assert!(matches!(
        coordinator.submit_commit(&world, false, &mut commands),
        Err(CommitRevealError::NoMoves)
    ));
    assert!(commands.is_empty());
    assert_eq!(coordinator.state(), CommitRevealState::Idle);

    coordinator
        .submit_commit(&world, true, &mut commands)
        .expect("forced commit accepted");
    assert_eq!(commands.len(), 1);
    assert!(matches!(
        coordinator.submit_commit(&world, true, &mut commands),
        Err(CommitRevealError::Busy(CommitRevealState::Committing))
    ));
}

#[test]
fn reveal_discloses_committed_moves_and_salt() {
    let mut world = world_with_moves();
    let mut coordinator = CommitReveal::new(5);

    let mut commands = Vec::new();
    coordinator
        .submit_commit(&world, false, &mut commands)
        .expect("commit accepted");
    settle(&mut world, &mut coordinator, commands);
    let tx = latest_tx(&world);
    settle(
        &mut world,
        &mut coordinator,
        vec![Command::UpdateTransaction {
            tx,
            status: TxStatus::Complete,
        }],
    );

    let commitment = query::commitment(&world).cloned();
    let mut commands = Vec::new();
    coordinator
        .submit_reveal(commitment.as_ref(), &mut commands)
        .expect("reveal accepted");
    let batch = decode_commitment(&commitment.expect("stored").encoding).expect("decodes");
    match &commands[..] {
        [Command::Submit {
            submission: Submission::Reveal { game, moves, salt },
        }] => {
            assert_eq!(*game, GAME);
            assert_eq!(moves, &batch.moves);
            assert_eq!(*salt, batch.salt);
            assert_ne!(*salt, Salt::ZERO, "salts are randomized");
        }
        other => panic!("unexpected commands {other:?}"),
    }

    settle(&mut world, &mut coordinator, commands);
    let reveal = latest_tx(&world);
    settle(
        &mut world,
        &mut coordinator,
        vec![Command::UpdateTransaction {
            tx: reveal,
            status: TxStatus::Failed,
        }],
    );
    assert_eq!(coordinator.state(), CommitRevealState::Failed);

    coordinator.reset();
    assert_eq!(coordinator.state(), CommitRevealState::Idle);
}

#[test]
fn restored_commitment_can_be_revealed() {
    let mut world = world_with_moves();
    let moves = query::player_ships_with_moves(&world);
    let commitment =
        build_commitment(GAME, &moves, Salt::from_bytes([4; 32])).expect("encode");

    let mut coordinator = CommitReveal::new(1);
    let mut commands = Vec::new();
    let batch = coordinator
        .restore(commitment.encoding.clone(), &mut commands)
        .expect("restores");
    let _ = apply_all(&mut world, commands);

    assert_eq!(batch.moves, moves);
    assert_eq!(query::commitment(&world), Some(&commitment));
    assert_eq!(coordinator.state(), CommitRevealState::Committed);
}

fn move_strategy() -> impl Strategy<Value = Move> {
    (0u32..64, 0u32..16).prop_map(|(ship, card)| Move {
        ship: ShipId::new(ship),
        card: MoveCardId::new(card),
    })
}

proptest! {
    #[test]
    fn decode_recovers_encoded_batch(
        game in any::<u64>(),
        moves in prop::collection::btree_map(0u32..64, 0u32..16, 1..8),
        salt in any::<[u8; 32]>(),
    ) {
        let moves: Vec<Move> = moves
            .into_iter()
            .map(|(ship, card)| Move { ship: ShipId::new(ship), card: MoveCardId::new(card) })
            .collect();
        let commitment = build_commitment(GameId::new(game), &moves, Salt::from_bytes(salt))
            .expect("encode");
        let batch = decode_commitment(&commitment.encoding).expect("decode");
        prop_assert_eq!(batch.game, GameId::new(game));
        prop_assert_eq!(batch.moves, moves);
        prop_assert_eq!(batch.salt, Salt::from_bytes(salt));
    }

    #[test]
    fn changing_a_move_changes_the_hash(
        moves in prop::collection::vec(move_strategy(), 1..8),
        replacement in move_strategy(),
        index in any::<prop::sample::Index>(),
    ) {
        let salt = Salt::ZERO;
        let original = build_commitment(GAME, &moves, salt).expect("encode");
        let mut changed = moves.clone();
        let slot = index.index(changed.len());
        prop_assume!(changed[slot] != replacement);
        changed[slot] = replacement;

        let mut sorted_original = moves;
        sorted_original.sort_unstable();
        let mut sorted_changed = changed.clone();
        sorted_changed.sort_unstable();
        prop_assume!(sorted_original != sorted_changed);

        let altered = build_commitment(GAME, &changed, salt).expect("encode");
        prop_assert_ne!(original.hash, altered.hash);
        let resorted = build_commitment(GAME, &sorted_original, salt).expect("encode");
        prop_assert_eq!(original.hash, resorted.hash);
    }
}
