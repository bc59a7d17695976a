//! Lobby Simulator CLI Tool
//!
//! Replays a TOML scenario against the matchmaking engine with a simulated
//! clock and prints the matches it produced.
//!
//! Usage:
//!   cargo run --bin lobby-sim -- run demos/class_restricted.toml
//!   cargo run --bin lobby-sim -- run demos/ai_fill.toml --json
//!   cargo run --bin lobby-sim -- validate demos/*.toml

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use triad_queue::scenario::{Scenario, ScenarioOutcome};

#[derive(Parser)]
#[command(name = "lobby-sim")]
#[command(about = "Replay lobby scenarios against the triad-queue matchmaking engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level for engine output
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print the matches
    Run {
        /// Scenario file (TOML)
        file: PathBuf,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
        /// Override the number of ticks
        #[arg(long)]
        ticks: Option<u64>,
        /// Force class-restricted teams regardless of the scenario
        #[arg(long)]
        no_class_mix: bool,
    },
    /// Check that scenario files parse and are valid
    Validate {
        /// Scenario files (TOML)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn print_outcome(outcome: &ScenarioOutcome) {
    println!("Scenario: {}", outcome.name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if outcome.matches.is_empty() {
        println!("No matches after {} ticks", outcome.ticks_run);
    }

    for found in &outcome.matches {
        println!(
            "tick {:>3} ({:>6}ms)  {:<11}  team1 {:?} +{} AI  vs  team2 {:?} +{} AI",
            found.tick,
            found.at_ms,
            found.tier.as_str(),
            found.team1,
            found.event.team1_fill,
            found.team2,
            found.event.team2_fill
        );
        for lobby in found.event.team1.iter().chain(found.event.team2.iter()) {
            println!(
                "           lobby {} (class {}) waited {}ms: {}",
                lobby.lobby_id,
                lobby.class_id,
                lobby.waited_ms,
                lobby.members.join(", ")
            );
        }
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "{} matches, {} players matched, {} synthetic, still queued: {:?}",
        outcome.stats.matches_created,
        outcome.stats.players_matched,
        outcome.stats.synthetic_players,
        outcome.remaining
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            file,
            json,
            ticks,
            no_class_mix,
        } => {
            let mut scenario = Scenario::from_file(&file)?;
            if let Some(ticks) = ticks {
                scenario.ticks = ticks;
            }
            if no_class_mix {
                scenario.matchmaking.allow_class_mix = false;
            }

            let outcome = scenario.run()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Commands::Validate { files } => {
            let mut failures = 0;
            for file in &files {
                match Scenario::from_file(file) {
                    Ok(scenario) => println!(
                        "ok    {} ({} lobbies, {} ticks)",
                        file.display(),
                        scenario.lobbies.len(),
                        scenario.ticks
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("error {}: {:#}", file.display(), e);
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{} of {} scenario files are invalid", failures, files.len());
            }
        }
    }

    Ok(())
}
