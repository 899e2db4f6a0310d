//! Batch game runner for balance testing.
//!
//! Every game is AI versus AI on the same setup: the enemy AI from the
//! configuration plus a second AI driving the player side. Games run in
//! parallel with rayon and are fully determined by their seed.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use mini_rts_core::factions::Faction;
use mini_rts_core::math::{fixed_serde, Fixed};
use mini_rts_core::simulation::Simulation;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HeadlessError, Result};
use crate::loader::GameSetup;
use crate::metrics::{BatchSummary, GameMetrics, MetricsCollector};

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of games to run.
    pub game_count: u32,
    /// Seed of the first game; game `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Tick limit per game; undecided games stop here.
    pub max_ticks: u64,
    /// Seconds per tick.
    #[serde(with = "fixed_serde")]
    pub dt: Fixed,
    /// Worker threads (0 = rayon default).
    pub parallel_games: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            game_count: 100,
            seed_start: 0,
            max_ticks: 12_000, // 10 minutes at 20 tps
            dt: Fixed::from_num(0.05),
            parallel_games: 0,
        }
    }
}

impl BatchConfig {
    /// Run `game_count` games with default limits.
    #[must_use]
    pub fn new(game_count: u32) -> Self {
        Self {
            game_count,
            ..Self::default()
        }
    }

    /// Set seed start.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the tick limit.
    #[must_use]
    pub const fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Set the worker thread count.
    #[must_use]
    pub const fn with_parallel(mut self, threads: usize) -> Self {
        self.parallel_games = threads;
        self
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual game metrics, in seed order.
    pub games: Vec<GameMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
    /// Games that could not be set up.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a pretty-printed JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// A game that failed during a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index.
    pub game_index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Outcome of running one seed several times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismReport {
    /// Seed under test.
    pub seed: u64,
    /// Final state hash of each run.
    pub hashes: Vec<u64>,
    /// Length of each run in ticks.
    pub ticks: Vec<u64>,
}

impl DeterminismReport {
    /// Whether every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
            && self.ticks.windows(2).all(|w| w[0] == w[1])
    }
}

/// Seed for the AI driving the player side.
fn player_ai_seed(seed: u64) -> u64 {
    seed.wrapping_mul(0x5851_f42d_4c95_7f2d).rotate_left(29)
}

/// Build an AI-vs-AI simulation for `seed`.
fn versus_simulation(setup: &GameSetup, seed: u64) -> Result<Simulation> {
    let seeded = setup.with_seed(seed);
    let mut sim = seeded.simulation()?;
    sim.enable_ai(Faction::Enemy, seeded.config.ai.seed);
    sim.enable_ai(Faction::Player, player_ai_seed(seed));
    Ok(sim)
}

/// Play one AI-vs-AI game to a decision or the tick limit.
pub fn run_game(setup: &GameSetup, seed: u64, max_ticks: u64, dt: Fixed) -> Result<GameMetrics> {
    let mut sim = versus_simulation(setup, seed)?;
    let mut collector = MetricsCollector::new(seed);

    while sim.get_tick() < max_ticks && sim.winner().is_none() {
        let events = sim.tick(dt).events;
        collector.record(sim.world(), &events);
    }

    let metrics = collector.finish(&sim);
    debug!(
        seed,
        ticks = metrics.duration_ticks,
        winner = ?metrics.winner,
        "Game finished"
    );
    Ok(metrics)
}

/// Run a batch of games.
pub fn run_batch(setup: &GameSetup, config: BatchConfig) -> Result<BatchResults> {
    if config.game_count == 0 {
        return Err(HeadlessError::InvalidRun("batch needs at least one game".into()));
    }
    if config.dt <= Fixed::ZERO {
        return Err(HeadlessError::InvalidRun(format!(
            "dt must be positive, got {}",
            config.dt
        )));
    }

    let start = Instant::now();
    let completed = AtomicU32::new(0);

    info!(
        games = config.game_count,
        seed_start = config.seed_start,
        max_ticks = config.max_ticks,
        "Starting batch run"
    );

    let play = || -> Vec<std::result::Result<GameMetrics, BatchError>> {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                let outcome = run_game(setup, seed, config.max_ticks, config.dt);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 10 == 0 {
                    debug!("Progress: {}/{}", done, config.game_count);
                }
                outcome.map_err(|e| {
                    warn!(game = i, seed, error = %e, "Game failed");
                    BatchError {
                        game_index: i,
                        seed,
                        message: e.to_string(),
                    }
                })
            })
            .collect()
    };

    let results = if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games)
            .build()
            .map_err(|e| HeadlessError::InvalidRun(format!("thread pool: {e}")))?
            .install(play)
    } else {
        play()
    };

    let (games, errors): (Vec<_>, Vec<_>) = results
        .into_iter()
        .partition(std::result::Result::is_ok);
    let games: Vec<GameMetrics> = games
        .into_iter()
        .filter_map(std::result::Result::ok)
        .collect();
    let errors: Vec<BatchError> = errors
        .into_iter()
        .filter_map(std::result::Result::err)
        .collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        games = games.len(),
        errors = errors.len(),
        player_wins = summary.player_wins,
        enemy_wins = summary.enemy_wins,
        undecided = summary.undecided,
        "Batch complete in {:.1}s",
        duration_seconds
    );

    Ok(BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    })
}

/// Run the same seed `runs` times and compare the final states.
pub fn verify_determinism(
    setup: &GameSetup,
    seed: u64,
    runs: u32,
    max_ticks: u64,
    dt: Fixed,
) -> Result<DeterminismReport> {
    if runs < 2 {
        return Err(HeadlessError::InvalidRun(format!(
            "determinism check needs at least two runs, got {runs}"
        )));
    }

    let games = (0..runs)
        .into_par_iter()
        .map(|_| run_game(setup, seed, max_ticks, dt))
        .collect::<Result<Vec<_>>>()?;

    let report = DeterminismReport {
        seed,
        hashes: games.iter().map(|g| g.final_state_hash).collect(),
        ticks: games.iter().map(|g| g.duration_ticks).collect(),
    };
    if report.is_deterministic() {
        info!(seed, runs, hash = report.hashes[0], "Runs agree");
    } else {
        warn!(seed, runs, hashes = ?report.hashes, "Runs diverged");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short() -> BatchConfig {
        BatchConfig::new(4).with_seed(100).with_max_ticks(200)
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new(500).with_seed(12345).with_parallel(2);
        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.parallel_games, 2);
        assert_eq!(config.dt, Fixed::from_num(0.05));
    }

    #[test]
    fn test_run_batch_small() {
        let results = run_batch(&GameSetup::skirmish(), short()).unwrap();

        assert_eq!(results.games.len(), 4);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_games, 4);
        let seeds: Vec<u64> = results.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, vec![100, 101, 102, 103]);
        assert!(results.games.iter().all(|g| g.duration_ticks <= 200));
    }

    #[test]
    fn test_batch_matches_single_games() {
        let setup = GameSetup::skirmish();
        let results = run_batch(&setup, short().with_parallel(2)).unwrap();
        let single = run_game(&setup, 102, 200, Fixed::from_num(0.05)).unwrap();
        assert_eq!(results.games[2], single);
    }

    #[test]
    fn test_both_sides_play() {
        let metrics = run_game(&GameSetup::skirmish(), 7, 1200, Fixed::from_num(0.05)).unwrap();
        assert!(metrics.player.resources_harvested > 0);
        assert!(metrics.enemy.resources_harvested > 0);
    }

    #[test]
    fn test_rejects_empty_batch() {
        let err = run_batch(&GameSetup::skirmish(), BatchConfig::new(0)).unwrap_err();
        assert!(matches!(err, HeadlessError::InvalidRun(_)));
    }

    #[test]
    fn test_verify_determinism() {
        let report =
            verify_determinism(&GameSetup::skirmish(), 12345, 3, 300, Fixed::from_num(0.05))
                .unwrap();
        assert_eq!(report.hashes.len(), 3);
        assert!(report.is_deterministic());
    }

    #[test]
    fn test_diverged_report() {
        let report = DeterminismReport {
            seed: 1,
            hashes: vec![5, 5, 6],
            ticks: vec![10, 10, 10],
        };
        assert!(!report.is_deterministic());
    }

    #[test]
    fn test_batch_results_save_load() {
        let results = run_batch(&GameSetup::skirmish(), short()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games.len(), 4);
        assert_eq!(loaded.config.seed_start, 100);
        let hashes = |r: &BatchResults| -> Vec<u64> {
            r.games.iter().map(|g| g.final_state_hash).collect()
        };
        assert_eq!(hashes(&loaded), hashes(&results));
    }
}
