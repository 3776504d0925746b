#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure functions mapping wall-clock time and the game configuration onto the
//! Commit → Reveal → Action cycle.
//!
//! All arithmetic is performed in integer milliseconds so independent clients
//! sampling the same instant derive identical boundaries. A missing
//! configuration, or an instant before the configured start, is the "game not
//! yet running" state and yields `None` rather than an error.

use broadside_core::{ClockReading, GameConfig, Phase};

/// Delay added to the raw clock so every client renders a turn slightly behind the ledger.
pub const DISPLAY_DELAY_MS: i64 = 5_000;

/// Smallest radius the shrinking world converges to.
pub const MIN_WORLD_SIZE: f32 = 50.0;

/// Clock bound to a fixed display delay so every call site shares the same boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseClock {
    delay_ms: i64,
}

impl PhaseClock {
    /// Creates a clock that applies the provided delay to every sample.
    #[must_use]
    pub const fn new(delay_ms: i64) -> Self {
        Self { delay_ms }
    }

    /// Clock used for presentation and scheduling, delayed by [`DISPLAY_DELAY_MS`].
    #[must_use]
    pub const fn display() -> Self {
        Self::new(DISPLAY_DELAY_MS)
    }

    /// Clock that samples the authoritative boundaries without delay.
    #[must_use]
    pub const fn raw() -> Self {
        Self::new(0)
    }

    /// Delay applied to every sample.
    #[must_use]
    pub const fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    /// Samples phase, turn and countdown at the provided instant.
    #[must_use]
    pub fn read(&self, time_ms: u64, config: Option<&GameConfig>) -> Option<ClockReading> {
        read(time_ms, config, self.delay_ms)
    }

    /// Phase active at the provided instant.
    #[must_use]
    pub fn phase(&self, time_ms: u64, config: Option<&GameConfig>) -> Option<Phase> {
        phase_at(time_ms, config, self.delay_ms)
    }

    /// Turn active at the provided instant.
    #[must_use]
    pub fn turn(&self, time_ms: u64, config: Option<&GameConfig>) -> Option<u32> {
        turn_at(time_ms, config, self.delay_ms)
    }

    /// Seconds until the phase active at the provided instant ends.
    #[must_use]
    pub fn seconds_until_next_phase(
        &self,
        time_ms: u64,
        config: Option<&GameConfig>,
    ) -> Option<f64> {
        seconds_until_next_phase(time_ms, config, self.delay_ms)
    }
}

impl Default for PhaseClock {
    fn default() -> Self {
        Self::display()
    }
}

/// Phase active at `time_ms` shifted by `delay_ms`.
#[must_use]
pub fn phase_at(time_ms: u64, config: Option<&GameConfig>, delay_ms: i64) -> Option<Phase> {
    position(time_ms, config?, delay_ms).map(|position| position.phase)
}

/// Zero-based turn index at `time_ms` shifted by `delay_ms`.
#[must_use]
pub fn turn_at(time_ms: u64, config: Option<&GameConfig>, delay_ms: i64) -> Option<u32> {
    position(time_ms, config?, delay_ms).map(|position| position.turn)
}

/// Seconds between `time_ms` shifted by `delay_ms` and the end of the current phase.
///
/// The result lies in `(0, phase_length]`.
#[must_use]
pub fn seconds_until_next_phase(
    time_ms: u64,
    config: Option<&GameConfig>,
    delay_ms: i64,
) -> Option<f64> {
    position(time_ms, config?, delay_ms).map(|position| position.seconds_remaining())
}

/// Samples phase, turn and countdown in one pass.
#[must_use]
pub fn read(time_ms: u64, config: Option<&GameConfig>, delay_ms: i64) -> Option<ClockReading> {
    position(time_ms, config?, delay_ms).map(|position| ClockReading {
        phase: position.phase,
        turn: position.turn,
        seconds_until_next_phase: position.seconds_remaining(),
    })
}

/// Radius of the playable world during `turn`.
///
/// The world holds its configured size through the entry cutoff, then shrinks
/// by `shrink_rate / 100` tiles per turn until it reaches the playable minimum.
#[must_use]
pub fn world_size_at(turn: u32, config: &GameConfig) -> f32 {
    let initial = config.world_size as f32;
    let floor = initial.min(MIN_WORLD_SIZE);
    let Some(turns_past_cutoff) = turn.checked_sub(config.entry_cutoff_turns) else {
        return initial;
    };
    if turns_past_cutoff == 0 {
        return initial;
    }
    let shrink = f64::from(turns_past_cutoff) * f64::from(config.shrink_rate) / 100.0;
    ((f64::from(config.world_size) - shrink) as f32).max(floor)
}

#[derive(Clone, Copy, Debug)]
struct TurnPosition {
    phase: Phase,
    turn: u32,
    ms_remaining: u64,
}

impl TurnPosition {
    fn seconds_remaining(&self) -> f64 {
        self.ms_remaining as f64 / 1000.0
    }
}

fn position(time_ms: u64, config: &GameConfig, delay_ms: i64) -> Option<TurnPosition> {
    if !config.has_valid_phases() {
        log::debug!("phase clock idle: configuration has a zero-length phase");
        return None;
    }

    let start_ms = i128::from(config.start_time) * 1000;
    let elapsed_ms = i128::from(time_ms) + i128::from(delay_ms) - start_ms;
    let elapsed_ms = u64::try_from(elapsed_ms).ok()?;

    let commit_ms = u64::from(config.commit_phase_length) * 1000;
    let reveal_end_ms = commit_ms + u64::from(config.reveal_phase_length) * 1000;
    let turn_ms = u64::from(config.turn_length()) * 1000;

    let turn = u32::try_from(elapsed_ms / turn_ms).unwrap_or(u32::MAX);
    let into_turn = elapsed_ms % turn_ms;

    let (phase, boundary_ms) = if into_turn < commit_ms {
        (Phase::Commit, commit_ms)
    } else if into_turn < reveal_end_ms {
        (Phase::Reveal, reveal_end_ms)
    } else {
        (Phase::Action, turn_ms)
    };

    Some(TurnPosition {
        phase,
        turn,
        ms_remaining: boundary_ms - into_turn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameConfig {
        GameConfig {
            start_time: 100,
            commit_phase_length: 25,
            reveal_phase_length: 9,
            action_phase_length: 25,
            world_size: 120,
            shrink_rate: 250,
            entry_cutoff_turns: 3,
            island_threshold: 33,
            budget: 10,
            perlin_seed: 1,
        }
    }

    #[test]
    fn missing_config_is_not_running() {
        assert_eq!(phase_at(1_000_000, None, 0), None);
        assert_eq!(turn_at(1_000_000, None, 0), None);
        assert_eq!(seconds_until_next_phase(1_000_000, None, 0), None);
    }

    #[test]
    fn instant_before_start_is_not_running() {
        let config = config();
        assert_eq!(phase_at(99_999, Some(&config), 0), None);
        assert_eq!(phase_at(100_000, Some(&config), 0), Some(Phase::Commit));
    }

    #[test]
    fn display_delay_moves_boundaries_earlier() {
        let config = config();
        let just_before_reveal = 100_000 + 25_000 - 5_000;
        assert_eq!(
            PhaseClock::raw().phase(just_before_reveal, Some(&config)),
            Some(Phase::Commit)
        );
        assert_eq!(
            PhaseClock::display().phase(just_before_reveal, Some(&config)),
            Some(Phase::Reveal)
        );
    }

    #[test]
    fn countdown_reaches_phase_length_at_boundary() {
        let config = config();
        let reading = read(100_000 + 25_000, Some(&config), 0).expect("running");
        assert_eq!(reading.phase, Phase::Reveal);
        assert_eq!(reading.seconds_until_next_phase, 9.0);

        let reading = read(100_000 + 33_500, Some(&config), 0).expect("running");
        assert_eq!(reading.seconds_until_next_phase, 0.5);
    }

    #[test]
    fn world_holds_size_until_cutoff_then_shrinks() {
        let config = config();
        assert_eq!(world_size_at(0, &config), 120.0);
        assert_eq!(world_size_at(3, &config), 120.0);
        assert_eq!(world_size_at(4, &config), 117.5);
        assert_eq!(world_size_at(13, &config), 95.0);
        assert_eq!(world_size_at(1_000, &config), MIN_WORLD_SIZE);
    }

    #[test]
    fn small_world_never_grows_to_minimum() {
        let config = GameConfig {
            world_size: 30,
            ..config()
        };
        assert_eq!(world_size_at(500, &config), 30.0);
    }
}
