use broadside_core::{
    ActionType, CannonId, CannonSnapshot, Command, Coord, Event, GameConfig, GameId, MoveCard,
    MoveCardId, OwnerId, Phase, SailPosition, ShipId, ShipSnapshot, TxStatus,
};
use broadside_system_action_selection::{ActionSelection, SelectionIntent};
use broadside_system_commit_reveal::{CommitReveal, CommitRevealState};
use broadside_system_phase_clock::PhaseClock;
use broadside_system_turn_scheduler::{Drivers, SchedulerHook, TurnScheduler};
use broadside_world::{self as world, query, World};

struct Harness {
    world: World,
    commit_reveal: CommitReveal,
    selection: ActionSelection,
    scheduler: TurnScheduler,
}

impl Harness {
    fn new(clock: PhaseClock) -> Self {
        let mut harness = Self {
            world: World::new(),
            commit_reveal: CommitReveal::new(9),
            selection: ActionSelection::new(),
            scheduler: TurnScheduler::new(clock),
        };
        let _ = harness.pump(vec![
            Command::ConfigureGame {
                game: GameId::new(3),
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
            Command::SyncShip {
                ship: ShipSnapshot {
                    id: ShipId::new(1),
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
                },
            },
            Command::SyncCannon {
                cannon: CannonSnapshot {
                    id: CannonId::new(1),
                    ship: ShipId::new(1),
                    rotation: 90.0,
                    range: 50.0,
                    firepower: 10.0,
                    loaded: false,
                },
            },
            Command::SyncMoveCard {
                card: MoveCard {
                    id: MoveCardId::new(1),
                    distance: 10.0,
                    rotation: 0.0,
                    direction: 0.0,
                },
            },
        ]);
        harness
    }

    fn pump(&mut self, commands: Vec<Command>) -> Vec<Event> {
        let mut pending = commands;
        let mut seen = Vec::new();
        while !pending.is_empty() {
            let mut events = Vec::new();
            for command in pending.drain(..) {
                world::apply(&mut self.world, command, &mut events);
            }
            self.commit_reveal.handle(&events, &mut pending);
            self.selection.handle(&events, &self.world, &mut pending);
            seen.extend(events);
        }
        seen
    }

    fn tick(&mut self, time_ms: u64) -> Vec<SchedulerHook> {
        let mut commands = Vec::new();
        let hooks = self.scheduler.tick(
            time_ms,
            &self.world,
            Drivers {
                commit_reveal: &mut self.commit_reveal,
                selection: &mut self.selection,
            },
            &mut commands,
        );
        let _ = self.pump(commands);
        hooks
    }

    fn intent(&mut self, intent: SelectionIntent, phase: Phase) {
        let mut commands = Vec::new();
        self.selection
            .apply_intent(intent, Some(phase), &self.world, &mut commands)
            .expect("intent accepted");
        let _ = self.pump(commands);
    }

    fn settle_pending(&mut self, status: TxStatus) {
        let pending: Vec<_> = query::pending_transactions(&self.world)
            .iter()
            .map(|tx| tx.tx)
            .collect();
        let commands = pending
            .into_iter()
            .map(|tx| Command::UpdateTransaction { tx, status })
            .collect();
        let _ = self.pump(commands);
    }
}

#[test]
fn full_turn_drives_commit_reveal_and_actions() {
    let mut harness = Harness::new(PhaseClock::raw());

    assert_eq!(harness.tick(0), vec![SchedulerHook::CommitStarted { turn: 0 }]);
    assert!(harness.tick(1_000).is_empty(), "entering hooks fire once");

    harness.intent(
        SelectionIntent::SelectMove {
            ship: ShipId::new(1),
            card: MoveCardId::new(1),
        },
        Phase::Commit,
    );

    assert_eq!(harness.tick(25_000), vec![SchedulerHook::ForcedCommit { turn: 0 }]);
    assert_eq!(harness.commit_reveal.state(), CommitRevealState::Committing);
    harness.settle_pending(TxStatus::Complete);
    assert!(query::commitment(&harness.world).is_some());

    assert!(harness.tick(30_000).is_empty());
    assert_eq!(harness.tick(31_000), vec![SchedulerHook::AutoReveal { turn: 0 }]);
    assert!(harness.tick(32_000).is_empty(), "deadline hooks fire once per turn");
    harness.settle_pending(TxStatus::Complete);
    assert_eq!(harness.commit_reveal.state(), CommitRevealState::Revealed);

    assert_eq!(harness.tick(34_000), vec![SchedulerHook::ActionStarted { turn: 0 }]);
    assert!(query::commitment(&harness.world).is_none());
    assert!(query::committed_moves(&harness.world).is_empty());
    assert!(query::selected_move(&harness.world, ShipId::new(1)).is_none());
    assert_eq!(harness.commit_reveal.state(), CommitRevealState::Idle);

    harness.intent(
        SelectionIntent::ToggleCannon {
            ship: ShipId::new(1),
            kind: ActionType::Load,
            cannon: CannonId::new(1),
        },
        Phase::Action,
    );
    assert_eq!(harness.tick(58_000), vec![SchedulerHook::AutoSubmit { turn: 0 }]);
    harness.settle_pending(TxStatus::Complete);
    assert_eq!(query::last_action_turn(&harness.world), Some(0));

    assert_eq!(harness.tick(59_000), vec![SchedulerHook::CommitStarted { turn: 1 }]);
    assert!(query::selected_actions(&harness.world, ShipId::new(1)).is_empty());
}

#[test]
fn irregular_ticks_still_fire_deadlines_exactly_once() {
    let mut harness = Harness::new(PhaseClock::raw());
    let _ = harness.tick(0);
    harness.intent(
        SelectionIntent::SelectMove {
            ship: ShipId::new(1),
            card: MoveCardId::new(1),
        },
        Phase::Commit,
    );
    let _ = harness.tick(26_300);
    harness.settle_pending(TxStatus::Complete);

    assert_eq!(harness.tick(33_700), vec![SchedulerHook::AutoReveal { turn: 0 }]);
    assert!(harness.tick(33_900).is_empty());
}

#[test]
fn failed_forced_commit_leaves_nothing_to_reveal() {
    let mut harness = Harness::new(PhaseClock::raw());
    let _ = harness.tick(0);
    harness.intent(
        SelectionIntent::SelectMove {
            ship: ShipId::new(1),
            card: MoveCardId::new(1),
        },
        Phase::Commit,
    );
    let _ = harness.tick(25_000);
    harness.settle_pending(TxStatus::Failed);

    assert!(query::commitment(&harness.world).is_none());
    assert!(harness.tick(31_000).is_empty());
}

#[test]
fn display_clock_commits_ahead_of_the_authoritative_boundary() {
    let mut harness = Harness::new(PhaseClock::display());
    let _ = harness.tick(0);
    harness.intent(
        SelectionIntent::SelectMove {
            ship: ShipId::new(1),
            card: MoveCardId::new(1),
        },
        Phase::Commit,
    );

    assert_eq!(harness.tick(20_000), vec![SchedulerHook::ForcedCommit { turn: 0 }]);
    assert_eq!(
        PhaseClock::raw().phase(20_000, query::config(&harness.world)),
        Some(Phase::Commit),
        "the ledger still accepts commits"
    );
}

#[test]
fn selected_ship_gets_fresh_firing_areas_when_action_starts() {
    let mut harness = Harness::new(PhaseClock::raw());
    let _ = harness.pump(vec![Command::SelectShip {
        ship: Some(ShipId::new(1)),
    }]);

    let _ = harness.tick(34_000);

    let (ship, areas) = query::firing_areas(&harness.world).expect("areas published");
    assert_eq!(ship, ShipId::new(1));
    assert_eq!(areas.len(), 1);
    assert!(!areas[0].loaded);
}

#[test]
fn unconfigured_world_fires_nothing() {
    let mut scheduler = TurnScheduler::default();
    let world = World::new();
    let mut commit_reveal = CommitReveal::new(1);
    let mut selection = ActionSelection::new();
    let mut commands = Vec::new();

    let hooks = scheduler.tick(
        1_000_000,
        &world,
        Drivers {
            commit_reveal: &mut commit_reveal,
            selection: &mut selection,
        },
        &mut commands,
    );

    assert!(hooks.is_empty());
    assert!(commands.is_empty());
}

fn select_first_card(harness: &mut Harness) {
    harness.intent(
        SelectionIntent::SelectMove {
            ship: ShipId::new(1),
            card: MoveCardId::new(1),
        },
        Phase::Commit,
    );
}

fn play_commit_and_reveal(harness: &mut Harness) {
    let _ = harness.tick(0);
    select_first_card(harness);
    assert_eq!(harness.tick(25_000), vec![SchedulerHook::ForcedCommit { turn: 0 }]);
    harness.settle_pending(TxStatus::Complete);
    assert_eq!(harness.tick(31_000), vec![SchedulerHook::AutoReveal { turn: 0 }]);
    harness.settle_pending(TxStatus::Complete);
    assert_eq!(harness.commit_reveal.state(), CommitRevealState::Revealed);
}

#[test]
fn missed_action_phase_still_clears_last_turns_commitment() {
    let mut harness = Harness::new(PhaseClock::raw());
    play_commit_and_reveal(&mut harness);

    assert_eq!(harness.tick(60_000), vec![SchedulerHook::CommitStarted { turn: 1 }]);
    assert!(query::commitment(&harness.world).is_none());
    assert!(query::committed_moves(&harness.world).is_empty());
    assert_eq!(harness.commit_reveal.state(), CommitRevealState::Idle);

    select_first_card(&mut harness);
    assert_eq!(harness.tick(84_000), vec![SchedulerHook::ForcedCommit { turn: 1 }]);
}

#[test]
fn jumping_into_a_later_reveal_discards_stale_moves() {
    let mut harness = Harness::new(PhaseClock::raw());
    play_commit_and_reveal(&mut harness);

    assert!(harness.tick(90_000).is_empty());
    assert!(query::commitment(&harness.world).is_none());
    assert!(query::selected_move(&harness.world, ShipId::new(1)).is_none());
    assert!(query::pending_transactions(&harness.world).is_empty());
    assert_eq!(harness.commit_reveal.state(), CommitRevealState::Idle);
}

#[test]
fn reveal_without_a_selected_move_submits_nothing() {
    let mut harness = Harness::new(PhaseClock::raw());
    let _ = harness.tick(0);

    assert!(harness.tick(25_000).is_empty());
    assert!(query::pending_transactions(&harness.world).is_empty());
    assert!(query::commitment(&harness.world).is_none());
    assert_eq!(harness.commit_reveal.state(), CommitRevealState::Idle);
    assert!(harness.tick(31_000).is_empty());
}

#[test]
fn late_commit_confirmation_is_revealed_before_the_phase_ends() {
    let mut harness = Harness::new(PhaseClock::raw());
    let _ = harness.tick(0);
    select_first_card(&mut harness);
    let _ = harness.tick(25_000);

    assert!(harness.tick(31_000).is_empty(), "commit still pending");
    harness.settle_pending(TxStatus::Complete);
    assert_eq!(harness.tick(32_000), vec![SchedulerHook::AutoReveal { turn: 0 }]);
    assert!(harness.tick(33_000).is_empty());
}

#[test]
fn confirmed_manual_submission_suppresses_auto_submit() {
    let mut harness = Harness::new(PhaseClock::raw());
    let _ = harness.tick(0);
    assert_eq!(harness.tick(34_000), vec![SchedulerHook::ActionStarted { turn: 0 }]);

    harness.intent(
        SelectionIntent::ToggleCannon {
            ship: ShipId::new(1),
            kind: ActionType::Load,
            cannon: CannonId::new(1),
        },
        Phase::Action,
    );
    let mut commands = Vec::new();
    let submitted = harness
        .selection
        .submit_actions(&harness.world, 0, false, &mut commands)
        .expect("actions submitted");
    assert_eq!(submitted, 1);
    let _ = harness.pump(commands);
    harness.settle_pending(TxStatus::Complete);
    assert_eq!(query::last_action_turn(&harness.world), Some(0));

    assert!(harness.tick(58_000).is_empty());
    assert!(query::pending_transactions(&harness.world).is_empty());
}
