//! Headless mini RTS runner.
//!
//! Runs the simulation without graphics, controlled via JSON on stdin/stdout.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p mini_rts_headless
//!
//! # Interactive with a custom map, state after every tick
//! cargo run -p mini_rts_headless -- --scenario duel.ron run --auto-state
//!
//! # Batch of AI-vs-AI games
//! cargo run -p mini_rts_headless -- batch --count 1000 --output results/batch.json
//!
//! # Determinism check
//! cargo run -p mini_rts_headless -- verify --seed 12345 --runs 5
//!
//! # Print the default configuration as RON (add --map for the scenario)
//! cargo run -p mini_rts_headless -- defaults
//! ```
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mini_rts_core::math::Fixed;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mini_rts_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    loader::{scenario_to_ron, GameSetup},
    runner::{HeadlessConfig, HeadlessRunner},
    HeadlessError, Result,
};

#[derive(Parser)]
#[command(name = "mini_rts_headless")]
#[command(about = "Headless mini RTS runner for AI testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Simulation configuration (RON); defaults when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scenario file (RON); the stock skirmish when absent
    #[arg(long, global = true)]
    scenario: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single interactive game
    Run {
        /// Output state after every tick
        #[arg(long)]
        auto_state: bool,

        /// Seconds per tick when a tick command gives none
        #[arg(long, default_value = "0.05")]
        dt: f64,
    },

    /// Run a batch of AI-vs-AI games for balance testing
    Batch {
        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Tick limit per game (0.05 s per tick)
        #[arg(long, default_value = "12000")]
        max_ticks: u64,

        /// Write full results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Tick limit per run
        #[arg(long, default_value = "6000")]
        ticks: u64,
    },

    /// Print the active configuration, or the active map, as RON
    Defaults {
        /// Print the scenario instead of the configuration
        #[arg(long)]
        map: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging goes to stderr (stdout is for protocol)
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal");
            eprintln!("FATAL: {e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let setup = GameSetup::from_paths(cli.config.as_deref(), cli.scenario.as_deref())?;

    match cli.command {
        Some(Commands::Run { auto_state, dt }) => cmd_run(&setup, auto_state, dt),
        Some(Commands::Batch {
            count,
            seed,
            parallel,
            max_ticks,
            output,
        }) => {
            let config = BatchConfig::new(count)
                .with_seed(seed)
                .with_parallel(parallel)
                .with_max_ticks(max_ticks);
            cmd_batch(&setup, config, output)
        }
        Some(Commands::Verify { seed, runs, ticks }) => cmd_verify(&setup, seed, runs, ticks),
        Some(Commands::Defaults { map }) => cmd_defaults(&setup, map),
        // Default: interactive mode
        None => cmd_run(&setup, false, 0.05),
    }
}

/// Run a single interactive game on stdin/stdout.
fn cmd_run(setup: &GameSetup, auto_state: bool, dt: f64) -> Result<()> {
    let default_dt = Fixed::checked_from_num(dt)
        .filter(|dt| *dt >= Fixed::ZERO)
        .ok_or_else(|| HeadlessError::InvalidRun(format!("invalid --dt {dt}")))?;

    tracing::info!(auto_state, dt, "Starting interactive session");
    let config = HeadlessConfig {
        default_dt,
        auto_state_output: auto_state,
        ..HeadlessConfig::default()
    };
    let mut runner = HeadlessRunner::with_config(setup.simulation()?, config);
    runner.run(io::stdin().lock(), io::stdout().lock())
}

/// Run a batch and print the summary.
fn cmd_batch(setup: &GameSetup, config: BatchConfig, output: Option<PathBuf>) -> Result<()> {
    let results = run_batch(setup, config)?;
    let summary = &results.summary;

    println!("Games:      {}", summary.total_games);
    println!(
        "Player won: {} ({:.1}% of decided)",
        summary.player_wins,
        summary.player_win_rate * 100.0
    );
    println!("Enemy won:  {}", summary.enemy_wins);
    println!("Undecided:  {}", summary.undecided);
    println!(
        "Ticks:      avg {:.0}, min {}, max {}",
        summary.avg_duration_ticks, summary.min_duration_ticks, summary.max_duration_ticks
    );
    println!("Wall time:  {:.1}s", results.duration_seconds);
    for error in &results.errors {
        println!("Failed game {} (seed {}): {}", error.game_index, error.seed, error.message);
    }

    if let Some(path) = output {
        results.save(&path)?;
        tracing::info!(path = %path.display(), "Saved batch results");
    }
    Ok(())
}

/// Replay one seed and report whether the runs agree.
fn cmd_verify(setup: &GameSetup, seed: u64, runs: u32, ticks: u64) -> Result<()> {
    let report = verify_determinism(setup, seed, runs, ticks, Fixed::from_num(0.05))?;
    for (run, (hash, ticks)) in report.hashes.iter().zip(&report.ticks).enumerate() {
        println!("run {run}: {ticks} ticks, hash {hash:016x}");
    }
    if report.is_deterministic() {
        println!("PASS: {runs} runs of seed {seed} agree");
        Ok(())
    } else {
        Err(HeadlessError::Diverged { seed, runs })
    }
}

/// Print RON for the active configuration or scenario.
fn cmd_defaults(setup: &GameSetup, map: bool) -> Result<()> {
    let text = if map {
        scenario_to_ron(&setup.scenario)?
    } else {
        setup.config.to_ron_string()?
    };
    println!("{text}");
    Ok(())
}
