#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays Broadside client sessions headlessly.

mod ledger;
mod scenario;
mod secret_transfer;
mod session;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use broadside_system_phase_clock::{world_size_at, PhaseClock};
use broadside_world::query;
use clap::{Parser, Subcommand};

use crate::{
    scenario::Scenario,
    secret_transfer::{to_hex, RevealSecret},
    session::Session,
};

/// Broadside client simulation tools.
#[derive(Parser, Debug)]
#[command(name = "broadside")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a scenario against the in-process mock ledger
    Simulate {
        /// Scenario TOML file
        scenario: PathBuf,

        /// Simulated duration in seconds
        #[arg(short, long, default_value = "120")]
        seconds: u64,

        /// Tick cadence in milliseconds
        #[arg(short, long, default_value = "250")]
        tick_ms: u64,
    },

    /// Print phase, turn and countdown of a scenario's game at an instant
    Phase {
        /// Scenario TOML file providing the game configuration
        scenario: PathBuf,

        /// Raw wall-clock instant in milliseconds since the Unix epoch
        #[arg(long)]
        at: u64,

        /// Ignore the display delay
        #[arg(long)]
        raw: bool,
    },

    /// Decode a reveal secret and print the moves it binds
    RevealSecret {
        /// Secret in `broadside:v1:<payload>` form
        secret: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match args.command {
        Commands::Simulate {
            scenario,
            seconds,
            tick_ms,
        } => simulate(&scenario, seconds, tick_ms),
        Commands::Phase {
            scenario,
            at,
            raw,
        } => phase(&scenario, at, raw),
        Commands::RevealSecret { secret } => reveal_secret(&secret),
    }
}

fn simulate(path: &Path, seconds: u64, tick_ms: u64) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let mut session = Session::new(&scenario)?;
    session.run(seconds.saturating_mul(1000), tick_ms);

    for entry in session.timeline() {
        println!("{entry}");
    }

    println!();
    println!("final fleet:");
    for ship in query::ship_view(session.world()).iter() {
        println!(
            "  ship {} (owner {}) at ({:.1}, {:.1}) heading {:.0}, health {}/{}{}",
            ship.id.get(),
            ship.owner.get(),
            ship.position.x(),
            ship.position.y(),
            ship.rotation,
            ship.health,
            ship.max_health,
            if ship.is_sunk() { ", sunk" } else { "" }
        );
    }
    Ok(())
}

fn phase(path: &Path, at: u64, raw: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let clock = if raw {
        PhaseClock::raw()
    } else {
        PhaseClock::display()
    };
    let reading = clock
        .read(at, Some(&scenario.config))
        .context("the game has not started at that instant")?;

    println!("turn:      {}", reading.turn);
    println!("phase:     {:?}", reading.phase);
    println!("remaining: {:.3}s", reading.seconds_until_next_phase);
    println!(
        "world:     radius {:.1}",
        world_size_at(reading.turn, &scenario.config)
    );
    Ok(())
}

fn reveal_secret(secret: &str) -> Result<()> {
    let secret = RevealSecret::decode(secret).context("failed to decode reveal secret")?;
    let batch = secret.batch();

    println!("game: {}", batch.game.get());
    println!("hash: {}", to_hex(&secret.hash()));
    println!("salt: {}", to_hex(batch.salt.as_bytes()));
    for entry in &batch.moves {
        println!("  ship {} plays card {}", entry.ship.get(), entry.card.get());
    }
    Ok(())
}
