//! Game metrics collection for AI-vs-AI runs.
//!
//! A [`MetricsCollector`] watches the events of every tick and tallies
//! them per faction. [`BatchSummary`] aggregates finished games.

use mini_rts_core::events::SimEvent;
use mini_rts_core::factions::Faction;
use mini_rts_core::simulation::Simulation;
use mini_rts_core::world::WorldState;
use serde::{Deserialize, Serialize};

/// Per-faction tallies for one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionMetrics {
    /// Units that finished production.
    pub units_produced: u32,
    /// Buildings placed, starting ones included.
    pub buildings_placed: u32,
    /// Units and buildings destroyed.
    pub entities_lost: u32,
    /// Resources extracted by workers.
    pub resources_harvested: u64,
    /// Resources credited by bases.
    pub income_received: u64,
    /// Damage dealt by this faction's units.
    pub damage_dealt: u64,
    /// Attack waves launched.
    pub attack_waves: u32,
    /// Commands refused.
    pub commands_rejected: u32,
}

/// Complete metrics for a single game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Seed the game was run with.
    pub seed: u64,
    /// Total game duration in ticks.
    pub duration_ticks: u64,
    /// Total game duration in simulated seconds.
    pub duration_seconds: f64,
    /// Winning faction (None = undecided when the tick limit hit).
    pub winner: Option<Faction>,
    /// Player-side tallies.
    pub player: FactionMetrics,
    /// Enemy-side tallies.
    pub enemy: FactionMetrics,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Tallies for one faction.
    #[must_use]
    pub const fn faction(&self, faction: Faction) -> &FactionMetrics {
        match faction {
            Faction::Player => &self.player,
            Faction::Enemy => &self.enemy,
        }
    }

    /// Mutable tallies for one faction.
    pub fn faction_mut(&mut self, faction: Faction) -> &mut FactionMetrics {
        match faction {
            Faction::Player => &mut self.player,
            Faction::Enemy => &mut self.enemy,
        }
    }
}

/// Accumulates [`GameMetrics`] tick by tick.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: GameMetrics,
}

impl MetricsCollector {
    /// Start collecting for a game run with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            metrics: GameMetrics {
                seed,
                ..GameMetrics::default()
            },
        }
    }

    /// Tally one tick's events. `world` is the state right after the tick,
    /// used to find the owner of events that only carry entity ids.
    pub fn record(&mut self, world: &WorldState, events: &[SimEvent]) {
        let owner = |id| world.entities().get(id).and_then(|e| e.faction());
        for event in events {
            match event {
                SimEvent::ProductionComplete { unit, .. } => {
                    if let Some(faction) = owner(*unit) {
                        self.metrics.faction_mut(faction).units_produced += 1;
                    }
                }
                SimEvent::BuildingPlaced { faction, .. } => {
                    self.metrics.faction_mut(*faction).buildings_placed += 1;
                }
                SimEvent::EntityDestroyed { faction, .. } => {
                    self.metrics.faction_mut(*faction).entities_lost += 1;
                }
                SimEvent::HarvestTick { worker, amount, .. } => {
                    if let Some(faction) = owner(*worker) {
                        self.metrics.faction_mut(faction).resources_harvested +=
                            u64::from(*amount);
                    }
                }
                SimEvent::IncomeCredited { faction, amount } => {
                    self.metrics.faction_mut(*faction).income_received += u64::from(*amount);
                }
                SimEvent::AttackLanded {
                    attacker, damage, ..
                } => {
                    if let Some(faction) = owner(*attacker) {
                        self.metrics.faction_mut(faction).damage_dealt += u64::from(*damage);
                    }
                }
                SimEvent::AttackWaveLaunched { faction, .. } => {
                    self.metrics.faction_mut(*faction).attack_waves += 1;
                }
                SimEvent::CommandRejected { faction, .. } => {
                    self.metrics.faction_mut(*faction).commands_rejected += 1;
                }
                SimEvent::UnitSpawned { .. }
                | SimEvent::ConstructionComplete { .. }
                | SimEvent::ProductionStarted { .. }
                | SimEvent::ResourceDepleted { .. } => {}
            }
        }
    }

    /// Close the game and return its metrics.
    #[must_use]
    pub fn finish(mut self, sim: &Simulation) -> GameMetrics {
        self.metrics.duration_ticks = sim.get_tick();
        self.metrics.duration_seconds = sim.now().to_num::<f64>();
        self.metrics.winner = sim.winner();
        self.metrics.final_state_hash = sim.state_hash();
        self.metrics
    }
}

/// Aggregate statistics over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total games played.
    pub total_games: u32,
    /// Games the player side won.
    pub player_wins: u32,
    /// Games the enemy side won.
    pub enemy_wins: u32,
    /// Games that hit the tick limit.
    pub undecided: u32,
    /// Player wins over decided games (0 when none were decided).
    pub player_win_rate: f64,
    /// Average game duration in ticks.
    pub avg_duration_ticks: f64,
    /// Shortest game.
    pub min_duration_ticks: u64,
    /// Longest game.
    pub max_duration_ticks: u64,
}

impl BatchSummary {
    /// Calculate summary from a list of game metrics.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            total_games: games.len() as u32,
            min_duration_ticks: u64::MAX,
            ..Self::default()
        };
        let mut duration_sum = 0u64;
        for game in games {
            match game.winner {
                Some(Faction::Player) => summary.player_wins += 1,
                Some(Faction::Enemy) => summary.enemy_wins += 1,
                None => summary.undecided += 1,
            }
            duration_sum += game.duration_ticks;
            summary.min_duration_ticks = summary.min_duration_ticks.min(game.duration_ticks);
            summary.max_duration_ticks = summary.max_duration_ticks.max(game.duration_ticks);
        }

        let decided = summary.player_wins + summary.enemy_wins;
        if decided > 0 {
            summary.player_win_rate = f64::from(summary.player_wins) / f64::from(decided);
        }
        summary.avg_duration_ticks = duration_sum as f64 / games.len() as f64;
        summary
    }
}
