use std::{collections::VecDeque, fmt};

use anyhow::{ensure, Context, Result};
use broadside_core::{ActionType, Command, Event, SelectedActions, ShipId, TxStatus};
use broadside_system_action_selection::ActionSelection;
use broadside_system_commit_reveal::CommitReveal;
use broadside_system_movement::preview_moves;
use broadside_system_phase_clock::world_size_at;
use broadside_system_turn_scheduler::{Drivers, SchedulerHook, TurnScheduler};
use broadside_world::{self as world, query, World};

use crate::{
    ledger::{MockLedger, Settlement},
    scenario::{Scenario, ScriptedIntent},
    secret_transfer::{to_hex, RevealSecret},
};

/// One line of the simulated session's timeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TimelineEntry {
    pub(crate) offset_ms: u64,
    pub(crate) message: String,
}

impl fmt::Display for TimelineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.offset_ms / 1000;
        let millis = self.offset_ms % 1000;
        write!(f, "[+{seconds:>4}.{millis:03}s] {}", self.message)
    }
}

/// Headless client session driven by a scenario against the mock ledger.
#[derive(Debug)]
pub(crate) struct Session {
    world: World,
    scheduler: TurnScheduler,
    commit_reveal: CommitReveal,
    selection: ActionSelection,
    ledger: MockLedger,
    intents: VecDeque<ScriptedIntent>,
    start_ms: u64,
    now_ms: u64,
    timeline: Vec<TimelineEntry>,
}

impl Session {
    /// Loads the scenario into a fresh world.
    pub(crate) fn new(scenario: &Scenario) -> Result<Self> {
        let seed = scenario.salt_seed.unwrap_or_else(rand::random);
        let mut session = Self {
            world: World::new(),
            scheduler: TurnScheduler::default(),
            commit_reveal: CommitReveal::new(seed),
            selection: ActionSelection::new(),
            ledger: MockLedger::new(&scenario.ledger),
            intents: scenario.intents.iter().copied().collect(),
            start_ms: scenario.start_ms,
            now_ms: scenario.start_ms,
            timeline: Vec::new(),
        };
        session.pump(scenario.setup_commands());

        if let Some(encoded) = &scenario.restore_secret {
            let secret = RevealSecret::decode(encoded).context("invalid restore_secret")?;
            ensure!(
                secret.batch().game == scenario.game,
                "restore_secret belongs to game {}",
                secret.batch().game.get()
            );
            let mut commands = Vec::new();
            let batch = session
                .commit_reveal
                .restore(secret.encoding().to_vec(), &mut commands)?;
            session.ledger.acknowledge_commit(batch.game, secret.hash());
            session.record(format!(
                "restored commitment {} with {} move(s)",
                to_hex(&secret.hash()),
                batch.moves.len()
            ));
            session.pump(commands);
        }
        Ok(session)
    }

    /// Ticks the session every `tick_ms` for `duration_ms`.
    pub(crate) fn run(&mut self, duration_ms: u64, tick_ms: u64) {
        let tick_ms = tick_ms.max(1);
        let end_ms = self.start_ms.saturating_add(duration_ms);
        let mut now_ms = self.start_ms;
        while now_ms <= end_ms {
            self.step(now_ms);
            now_ms = now_ms.saturating_add(tick_ms);
        }
    }

    /// Advances the session to `now_ms`.
    pub(crate) fn step(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        self.replay_intents();

        let mut commands = Vec::new();
        let hooks = self.scheduler.tick(
            now_ms,
            &self.world,
            Drivers {
                commit_reveal: &mut self.commit_reveal,
                selection: &mut self.selection,
            },
            &mut commands,
        );
        for hook in hooks {
            self.record(describe_hook(hook));
        }
        self.pump(commands);

        let mut commands = Vec::new();
        let settled = self.ledger.poll(now_ms, &self.world, &mut commands);
        for settlement in settled {
            self.record(describe_settlement(&settlement));
        }
        self.pump(commands);
    }

    /// Current client state.
    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Everything observed so far, in order.
    pub(crate) fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    fn replay_intents(&mut self) {
        let phase = self
            .scheduler
            .clock()
            .phase(self.now_ms, query::config(&self.world));
        while let Some(scripted) = self.intents.front().copied() {
            if self.start_ms.saturating_add(scripted.at_ms) > self.now_ms {
                break;
            }
            let _ = self.intents.pop_front();

            let mut commands = Vec::new();
            match self
                .selection
                .apply_intent(scripted.intent, phase, &self.world, &mut commands)
            {
                Ok(()) => self.pump(commands),
                Err(error) => {
                    log::debug!("intent {:?} rejected: {error}", scripted.intent);
                    self.record(format!("intent rejected: {error}"));
                }
            }
        }
    }

    fn pump(&mut self, commands: Vec<Command>) {
        let mut pending = commands;
        while !pending.is_empty() {
            let mut events = Vec::new();
            for command in pending.drain(..) {
                world::apply(&mut self.world, command, &mut events);
            }
            self.commit_reveal.handle(&events, &mut pending);
            self.selection.handle(&events, &self.world, &mut pending);
            for event in &events {
                if let Some(message) = self.describe_event(event) {
                    self.record(message);
                }
            }
        }
    }

    fn record(&mut self, message: String) {
        log::debug!("{message}");
        self.timeline.push(TimelineEntry {
            offset_ms: self.now_ms.saturating_sub(self.start_ms),
            message,
        });
    }

    fn describe_event(&self, event: &Event) -> Option<String> {
        match event {
            Event::ShipSynced { ship } => query::ship(&self.world, *ship).map(|snapshot| {
                format!(
                    "ship {} at ({:.1}, {:.1}) heading {:.0}, health {}/{}",
                    ship.get(),
                    snapshot.position.x(),
                    snapshot.position.y(),
                    snapshot.rotation,
                    snapshot.health,
                    snapshot.max_health
                )
            }),
            Event::ShipSunk { ship } => Some(format!("ship {} sunk", ship.get())),
            Event::CannonSynced { cannon } => {
                query::cannon(&self.world, *cannon).map(|snapshot| {
                    format!(
                        "cannon {} on ship {} {}",
                        cannon.get(),
                        snapshot.ship.get(),
                        if snapshot.loaded { "loaded" } else { "empty" }
                    )
                })
            }
            Event::CrateRemoved { crate_id } => Some(format!("crate {} claimed", crate_id.get())),
            Event::SelectedMoveChanged {
                ship,
                card: Some(card),
            } => Some(self.describe_move_preview(*ship, card.get())),
            Event::SelectedMoveChanged { ship, card: None } => {
                Some(format!("ship {} move cleared", ship.get()))
            }
            Event::SelectedActionsChanged { ship, actions } => Some(format!(
                "ship {} actions: {}",
                ship.get(),
                describe_actions(actions)
            )),
            Event::TargetedChanged { ships } if !ships.is_empty() => {
                let ids: Vec<String> = ships.iter().map(|ship| ship.get().to_string()).collect();
                Some(format!("targeting ship(s) {}", ids.join(", ")))
            }
            Event::FiringAreasPublished { ship } => {
                let count = query::firing_areas(&self.world).map_or(0, |(_, areas)| areas.len());
                Some(format!("ship {} has {count} firing arc(s)", ship.get()))
            }
            Event::CommitmentChanged { hash: Some(hash) } => {
                let secret = query::commitment(&self.world)
                    .and_then(|commitment| RevealSecret::from_commitment(commitment).ok())
                    .map(|secret| secret.encode())
                    .unwrap_or_default();
                Some(format!(
                    "commitment {} confirmed; reveal secret {secret}",
                    to_hex(hash)
                ))
            }
            Event::SubmissionRequested { tx, kind } => {
                Some(format!("submitted {kind:?} as tx {}", tx.get()))
            }
            Event::LastActionRecorded { turn } => Some(format!("actions of turn {turn} recorded")),
            _ => None,
        }
    }

    fn describe_move_preview(&self, ship: ShipId, card: u32) -> String {
        let moves = query::player_ships_with_moves(&self.world);
        let world_size = query::config(&self.world)
            .zip(self.scheduler.clock().turn(self.now_ms, query::config(&self.world)))
            .map_or(f32::INFINITY, |(config, turn)| world_size_at(turn, config));
        let preview = preview_moves(
            &moves,
            &query::ship_view(&self.world),
            &query::move_card_view(&self.world),
            world_size,
        )
        .into_iter()
        .find(|preview| preview.ship == ship);

        match preview {
            Some(preview) => format!(
                "ship {} selects card {card}: ends at ({:.1}, {:.1}) heading {:.0}{}",
                ship.get(),
                preview.pose.position.x(),
                preview.pose.position.y(),
                preview.pose.rotation,
                if preview.in_bounds { "" } else { " (out of bounds)" }
            ),
            None => format!("ship {} selects card {card}", ship.get()),
        }
    }
}

fn describe_actions(actions: &SelectedActions) -> String {
    let names: Vec<&str> = actions
        .slots()
        .iter()
        .filter(|slot| slot.kind != ActionType::None)
        .map(|slot| slot.kind.name())
        .collect();
    if names.is_empty() {
        "none".to_owned()
    } else {
        names.join(" + ")
    }
}

fn describe_hook(hook: SchedulerHook) -> String {
    match hook {
        SchedulerHook::CommitStarted { turn } => format!("turn {turn}: commit phase"),
        SchedulerHook::ForcedCommit { turn } => {
            format!("turn {turn}: reveal phase, committing current selection")
        }
        SchedulerHook::AutoReveal { turn } => format!("turn {turn}: revealing moves"),
        SchedulerHook::ActionStarted { turn } => format!("turn {turn}: action phase"),
        SchedulerHook::AutoSubmit { turn } => format!("turn {turn}: submitting actions"),
    }
}

fn describe_settlement(settlement: &Settlement) -> String {
    let outcome = match settlement.status {
        TxStatus::Complete => "confirmed",
        TxStatus::Failed => "failed",
        _ => "pending",
    };
    match &settlement.note {
        Some(note) => format!(
            "tx {} ({:?}) {outcome}: {note}",
            settlement.tx.get(),
            settlement.kind
        ),
        None => format!(
            "tx {} ({:?}) {outcome}",
            settlement.tx.get(),
            settlement.kind
        ),
    }
}
