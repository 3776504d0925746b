use broadside_core::{GameConfig, Phase};
use broadside_system_phase_clock::{
    phase_at, read, seconds_until_next_phase, turn_at, PhaseClock,
};
use proptest::prelude::*;

fn config(commit: u32, reveal: u32, action: u32) -> GameConfig {
    GameConfig {
        start_time: 0,
        commit_phase_length: commit,
        reveal_phase_length: reveal,
        action_phase_length: action,
        world_size: 100,
        shrink_rate: 100,
        entry_cutoff_turns: 2,
        island_threshold: 30,
        budget: 5,
        perlin_seed: 42,
    }
}

#[test]
fn full_turn_cycle_follows_configured_lengths() {
    let config = config(25, 9, 25);
    let clock = PhaseClock::raw();

    let samples = [
        (0, Phase::Commit, 0),
        (25_000, Phase::Reveal, 0),
        (34_000, Phase::Action, 0),
        (59_000, Phase::Commit, 1),
    ];
    for (time_ms, phase, turn) in samples {
        assert_eq!(clock.phase(time_ms, Some(&config)), Some(phase), "phase at {time_ms}");
        assert_eq!(clock.turn(time_ms, Some(&config)), Some(turn), "turn at {time_ms}");
    }
}

proptest! {
    #[test]
    fn sampling_is_deterministic(
        time_ms in 0u64..10_000_000,
        commit in 1u32..120,
        reveal in 1u32..120,
        action in 1u32..120,
        delay in -10_000i64..10_000,
    ) {
        let config = config(commit, reveal, action);
        prop_assert_eq!(
            read(time_ms, Some(&config), delay),
            read(time_ms, Some(&config), delay)
        );
    }

    #[test]
    fn advancing_one_turn_increments_turn_and_keeps_phase(
        time_ms in 0u64..10_000_000,
        commit in 1u32..120,
        reveal in 1u32..120,
        action in 1u32..120,
    ) {
        let config = config(commit, reveal, action);
        let turn_ms = u64::from(config.turn_length()) * 1000;

        let turn = turn_at(time_ms, Some(&config), 0).expect("running");
        let next = turn_at(time_ms + turn_ms, Some(&config), 0).expect("running");
        prop_assert_eq!(next, turn + 1);
        prop_assert_eq!(
            phase_at(time_ms, Some(&config), 0),
            phase_at(time_ms + turn_ms, Some(&config), 0)
        );

        let turn_start = u64::from(turn) * turn_ms;
        prop_assert_eq!(phase_at(turn_start + turn_ms, Some(&config), 0), Some(Phase::Commit));
    }

    #[test]
    fn countdown_stays_within_current_phase(
        time_ms in 0u64..10_000_000,
        commit in 1u32..120,
        reveal in 1u32..120,
        action in 1u32..120,
    ) {
        let config = config(commit, reveal, action);
        let phase = phase_at(time_ms, Some(&config), 0).expect("running");
        let remaining = seconds_until_next_phase(time_ms, Some(&config), 0).expect("running");
        let length = f64::from(config.phase_length(phase));
        prop_assert!(remaining > 0.0, "remaining {remaining} must be positive");
        prop_assert!(remaining <= length, "remaining {remaining} exceeds phase length {length}");
    }
}
