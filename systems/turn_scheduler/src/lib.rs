#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Phase-boundary side effects of the turn cycle.
//!
//! The scheduler is evaluated once per clock tick. Entering hooks fire when the
//! observed `(turn, phase)` pair changes, so a dropped or irregular tick can
//! neither skip nor repeat them. Deadline hooks fire on the first tick at or
//! past their lead time and are recorded per turn.

use broadside_core::{ClockReading, Command, Phase};
use broadside_system_action_selection::{ActionSelection, SelectionError};
use broadside_system_commit_reveal::{CommitReveal, CommitRevealError, CommitRevealState};
use broadside_system_firing_geometry::firing_areas_for_ship;
use broadside_system_phase_clock::PhaseClock;
use broadside_world::{query, World};

/// Seconds before the end of the Reveal phase at which a held commitment is revealed.
pub const AUTO_REVEAL_LEAD_SECS: f64 = 3.0;

/// Seconds before the end of the Action phase at which pending actions are submitted.
pub const AUTO_SUBMIT_LEAD_SECS: f64 = 1.0;

/// Side effect fired by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchedulerHook {
    /// Transient projections were cleared for a new turn.
    CommitStarted {
        /// Turn that started.
        turn: u32,
    },
    /// A commitment was built from the current selection on entering Reveal.
    ForcedCommit {
        /// Turn of the commitment.
        turn: u32,
    },
    /// The held commitment was revealed ahead of the Reveal deadline.
    AutoReveal {
        /// Turn of the reveal.
        turn: u32,
    },
    /// Stale commitment state was cleared on entering Action.
    ActionStarted {
        /// Turn whose Action phase started.
        turn: u32,
    },
    /// Pending actions were submitted ahead of the Action deadline.
    AutoSubmit {
        /// Turn of the submission.
        turn: u32,
    },
}

/// Mutable collaborators driven by the scheduler.
#[derive(Debug)]
pub struct Drivers<'a> {
    /// Commit-reveal coordinator of the local player.
    pub commit_reveal: &'a mut CommitReveal,
    /// Action selection system of the local player.
    pub selection: &'a mut ActionSelection,
}

/// Reactive procedure coordinating every phase-boundary side effect.
#[derive(Debug)]
pub struct TurnScheduler {
    clock: PhaseClock,
    observed: Option<(u32, Phase)>,
    revealed_turn: Option<u32>,
    submitted_turn: Option<u32>,
}

impl Default for TurnScheduler {
    fn default() -> Self {
        Self::new(PhaseClock::display())
    }
}

impl TurnScheduler {
    /// Creates a scheduler sampling the provided clock.
    #[must_use]
    pub fn new(clock: PhaseClock) -> Self {
        Self {
            clock,
            observed: None,
            revealed_turn: None,
            submitted_turn: None,
        }
    }

    /// Clock sampled on every tick.
    #[must_use]
    pub const fn clock(&self) -> PhaseClock {
        self.clock
    }

    /// Samples the clock at `time_ms` and fires every hook due at that instant.
    ///
    /// Returns the hooks that fired, in evaluation order.
    pub fn tick(
        &mut self,
        time_ms: u64,
        world: &World,
        drivers: Drivers<'_>,
        out: &mut Vec<Command>,
    ) -> Vec<SchedulerHook> {
        let reading = self.clock.read(time_ms, query::config(world));
        self.handle(reading, world, drivers, out)
    }

    /// Fires every hook due for an already sampled clock reading.
    pub fn handle(
        &mut self,
        reading: Option<ClockReading>,
        world: &World,
        drivers: Drivers<'_>,
        out: &mut Vec<Command>,
    ) -> Vec<SchedulerHook> {
        let mut fired = Vec::new();
        let Some(reading) = reading else {
            return fired;
        };
        let Drivers {
            commit_reveal,
            selection,
        } = drivers;
        let ClockReading {
            phase,
            turn,
            seconds_until_next_phase,
        } = reading;

        let entering = self.observed != Some((turn, phase));
        let missed_action = entering && self.missed_action_of_previous_turn(turn);
        if entering {
            if missed_action {
                log::warn!("turn {turn}: previous Action phase was never observed");
                clear_commitment_state(commit_reveal, out);
            }
            self.observed = Some((turn, phase));
            log::info!("turn {turn}: entering {phase:?}");
            match phase {
                Phase::Commit => {
                    out.push(Command::ClearTurnProjections);
                    fired.push(SchedulerHook::CommitStarted { turn });
                }
                Phase::Reveal if missed_action => {
                    log::warn!("turn {turn}: no selection was made this turn, skipping commit");
                }
                Phase::Reveal => {
                    if forced_commit(world, commit_reveal, out) {
                        fired.push(SchedulerHook::ForcedCommit { turn });
                    }
                }
                Phase::Action => {
                    enter_action(world, commit_reveal, out);
                    fired.push(SchedulerHook::ActionStarted { turn });
                }
            }
        }

        match phase {
            Phase::Reveal
                if seconds_until_next_phase <= AUTO_REVEAL_LEAD_SECS
                    && self.revealed_turn != Some(turn)
                    && !missed_action =>
            {
                let revealed = auto_reveal(world, commit_reveal, out);
                if revealed {
                    fired.push(SchedulerHook::AutoReveal { turn });
                }
                if revealed || commit_reveal.state() != CommitRevealState::Committing {
                    self.revealed_turn = Some(turn);
                }
            }
            Phase::Action
                if seconds_until_next_phase <= AUTO_SUBMIT_LEAD_SECS
                    && self.submitted_turn != Some(turn) =>
            {
                self.submitted_turn = Some(turn);
                if auto_submit(world, selection, turn, out) {
                    fired.push(SchedulerHook::AutoSubmit { turn });
                }
            }
            _ => {}
        }

        fired
    }

    /// True when the turn changed without the previous turn's Action phase being seen.
    fn missed_action_of_previous_turn(&self, turn: u32) -> bool {
        match self.observed {
            Some((seen, _)) if seen == turn => false,
            Some(observed) => turn
                .checked_sub(1)
                .map_or(true, |previous| observed != (previous, Phase::Action)),
            None => false,
        }
    }
}

fn forced_commit(world: &World, commit_reveal: &mut CommitReveal, out: &mut Vec<Command>) -> bool {
    if query::commitment(world).is_some() || commit_reveal.state() != CommitRevealState::Idle {
        return false;
    }
    match commit_reveal.submit_commit(world, false, out) {
        Ok(()) => true,
        Err(CommitRevealError::NoMoves) => false,
        Err(error) => {
            log::warn!("forced commit aborted: {error}");
            false
        }
    }
}

fn auto_reveal(world: &World, commit_reveal: &mut CommitReveal, out: &mut Vec<Command>) -> bool {
    let Some(commitment) = query::commitment(world) else {
        log::debug!("nothing to reveal");
        return false;
    };
    match commit_reveal.submit_reveal(Some(commitment), out) {
        Ok(()) => true,
        Err(CommitRevealError::Busy(state)) => {
            log::debug!("reveal already handled: {state:?}");
            false
        }
        Err(error) => {
            log::warn!("auto reveal aborted: {error}");
            false
        }
    }
}

fn clear_commitment_state(commit_reveal: &mut CommitReveal, out: &mut Vec<Command>) {
    out.push(Command::SetCommitment { commitment: None });
    out.push(Command::SetCommittedMoves { moves: Vec::new() });
    out.push(Command::ClearSelectedMoves);
    commit_reveal.reset();
}

fn enter_action(world: &World, commit_reveal: &mut CommitReveal, out: &mut Vec<Command>) {
    clear_commitment_state(commit_reveal, out);

    if let Some(ship) = query::selected_ship(world) {
        let areas = firing_areas_for_ship(
            ship,
            &query::ship_view(world),
            &query::cannon_view(world),
        );
        out.push(Command::SetFiringAreas { ship, areas });
    }
}

fn auto_submit(
    world: &World,
    selection: &mut ActionSelection,
    turn: u32,
    out: &mut Vec<Command>,
) -> bool {
    if query::last_action_turn(world) == Some(turn) || selection.is_submitting() {
        return false;
    }
    match selection.submit_actions(world, turn, false, out) {
        Ok(_) => true,
        Err(SelectionError::NoActions) => false,
        Err(error) => {
            log::warn!("auto submit aborted: {error}");
            false
        }
    }
}
