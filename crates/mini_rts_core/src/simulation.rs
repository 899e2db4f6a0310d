//! Core simulation loop.
//!
//! The host drives the simulation with one [`Simulation::tick`] call per
//! frame, passing the elapsed time. Everything else (timers, the AI,
//! construction, production, unit actions, reaping the dead) happens
//! inside that call in a fixed order.
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - No system randomness (world and AI each own a seeded RNG)
//! - Consistent iteration order (sorted entity IDs)
//! - Same inputs always produce same outputs
//!
//! # Example
//!
//! ```
//! use mini_rts_core::config::SimConfig;
//! use mini_rts_core::math::Fixed;
//! use mini_rts_core::scenario::Scenario;
//! use mini_rts_core::simulation::Simulation;
//!
//! let mut sim = Simulation::from_scenario(SimConfig::default(), &Scenario::skirmish()).unwrap();
//! let events = sim.tick(Fixed::from_num(0.05));
//! assert_eq!(events.tick, 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::ai::AiScheduler;
use crate::behavior;
use crate::buildings;
use crate::config::SimConfig;
use crate::economy;
use crate::error::Result;
use crate::events::TickEvents;
use crate::factions::Faction;
use crate::math::Fixed;
use crate::scenario::Scenario;
use crate::scheduler::{TimerKind, TimerQueue};
use crate::snapshot::WorldSnapshot;
use crate::world::WorldState;

/// Timer firings allowed within one tick. Timers still due after that
/// fire on the following ticks.
pub const MAX_TIMER_FIRINGS_PER_TICK: usize = 10_000;

/// The game simulation: world state plus the clocks that drive it.
///
/// # Tick order
///
/// 1. **Clock** - advance simulation time by `dt`
/// 2. **Timers** - fire every due timer (income, auto-engage scan, AI)
/// 3. **Buildings** - construction and production progress
/// 4. **Units** - movement, attacks and harvesting
/// 5. **Reap** - remove entities at zero health
#[derive(Debug, Clone)]
pub struct Simulation {
    tick: u64,
    world: WorldState,
    timers: TimerQueue,
    ais: Vec<AiScheduler>,
}

impl Simulation {
    /// Create a simulation over an empty world.
    pub fn new(config: SimConfig) -> Result<Self> {
        let mut sim = Self {
            tick: 0,
            timers: schedule_timers(&config),
            ais: Vec::new(),
            world: WorldState::new(config)?,
        };
        if sim.world.config().ai.enabled {
            let seed = sim.world.config().ai.seed;
            sim.enable_ai(Faction::Enemy, seed);
        }
        Ok(sim)
    }

    /// Create a simulation and populate it from a scenario.
    pub fn from_scenario(config: SimConfig, scenario: &Scenario) -> Result<Self> {
        let mut sim = Self::new(config)?;
        scenario.apply(&mut sim.world)?;
        Ok(sim)
    }

    /// Hand `faction` to a timer-driven AI seeded with `seed`.
    ///
    /// Its first decisions come one interval from now. Returns false if an
    /// AI already plays that faction.
    pub fn enable_ai(&mut self, faction: Faction, seed: u64) -> bool {
        if self.ais.iter().any(|ai| ai.faction() == faction) {
            return false;
        }
        let now = self.world.now();
        let ai = &self.world.config().ai;
        for (kind, interval) in [
            (TimerKind::AiHarvest(faction), ai.harvest_interval),
            (TimerKind::AiBuild(faction), ai.build_interval),
            (TimerKind::AiAttackWave(faction), ai.attack_interval),
        ] {
            self.timers
                .schedule_repeating(kind, now.saturating_add(interval), interval);
        }
        self.ais.push(AiScheduler::new(faction, seed));
        tracing::info!(?faction, seed, "AI enabled");
        true
    }

    /// Factions currently played by the AI.
    pub fn ai_factions(&self) -> impl Iterator<Item = Faction> + '_ {
        self.ais.iter().map(AiScheduler::faction)
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulation clock in seconds.
    #[must_use]
    pub const fn now(&self) -> Fixed {
        self.world.now()
    }

    /// The world.
    #[must_use]
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    /// Mutable world access, for dispatchers and scripted setup.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Negative deltas are treated as zero and deltas above
    /// `max_tick_dt` are clamped to it. Returns the events emitted since
    /// the previous tick, including those from commands issued in between.
    pub fn tick(&mut self, dt: Fixed) -> TickEvents {
        let max_dt = self.world.config().max_tick_dt;
        if dt > max_dt {
            tracing::warn!(%dt, %max_dt, "Clamping oversized tick");
        }
        let dt = dt.clamp(Fixed::ZERO, max_dt);

        self.world.advance_clock(dt);

        let now = self.world.now();
        let mut fired = 0;
        while fired < MAX_TIMER_FIRINGS_PER_TICK {
            let Some(kind) = self.timers.pop_due(now) else {
                break;
            };
            self.fire(kind);
            fired += 1;
        }
        if fired == MAX_TIMER_FIRINGS_PER_TICK {
            tracing::warn!(fired, "Timer backlog carried into next tick");
        }

        buildings::advance_buildings(&mut self.world, dt);
        behavior::advance_units(&mut self.world, dt);
        self.world.reap_dead();

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        TickEvents {
            tick: self.tick,
            events: self.world.drain_events(),
        }
    }

    fn fire(&mut self, kind: TimerKind) {
        tracing::trace!(?kind, now = %self.world.now(), "Timer fired");
        match kind {
            TimerKind::BaseIncome => economy::apply_base_income(&mut self.world),
            TimerKind::AutoEngageScan => behavior::scan_for_targets(&mut self.world),
            TimerKind::AiHarvest(faction) => {
                if let Some(ai) = find_ai(&mut self.ais, faction) {
                    ai.harvest_tick(&mut self.world);
                }
            }
            TimerKind::AiBuild(faction) => {
                if let Some(ai) = find_ai(&mut self.ais, faction) {
                    ai.build_tick(&mut self.world);
                }
            }
            TimerKind::AiAttackWave(faction) => {
                if let Some(ai) = find_ai(&mut self.ais, faction) {
                    ai.attack_wave(&mut self.world);
                }
            }
        }
    }

    /// The faction left standing, once the other has no units and no
    /// buildings.
    #[must_use]
    pub fn winner(&self) -> Option<Faction> {
        let alive = |f: Faction| {
            let roster = self.world.roster(f);
            !roster.units.is_empty() || !roster.buildings.is_empty()
        };
        match (alive(Faction::Player), alive(Faction::Enemy)) {
            (true, false) => Some(Faction::Player),
            (false, true) => Some(Faction::Enemy),
            _ => None,
        }
    }

    /// Capture a presentation snapshot.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(&self.world, self.tick)
    }

    /// Compute a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.world.now().to_bits().hash(&mut hasher);
        self.world.ledgers().hash(&mut hasher);

        let ids = self.world.entities().sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(entity) = self.world.entities().get(id) {
                entity.hash(&mut hasher);
            }
        }

        hasher.finish()
    }
}

fn find_ai(ais: &mut [AiScheduler], faction: Faction) -> Option<&mut AiScheduler> {
    ais.iter_mut().find(|ai| ai.faction() == faction)
}

fn schedule_timers(config: &SimConfig) -> TimerQueue {
    let mut timers = TimerQueue::new();
    timers.schedule_repeating(
        TimerKind::BaseIncome,
        config.income_interval,
        config.income_interval,
    );
    timers.schedule_repeating(
        TimerKind::AutoEngageScan,
        config.detection_interval,
        config.detection_interval,
    );
    timers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BuildingKind, UnitKind};
    use crate::events::SimEvent;
    use crate::math::Vec2Fixed;

    fn quiet() -> SimConfig {
        let mut config = SimConfig::default();
        config.ai.enabled = false;
        config
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = Simulation::new(quiet()).unwrap();
        assert_eq!(sim.get_tick(), 0);
        let events = sim.tick(Fixed::from_num(0.1));
        assert_eq!(events.tick, 1);
        assert_eq!(sim.get_tick(), 1);
        assert_eq!(sim.now(), Fixed::from_num(0.1));
    }

    #[test]
    fn test_negative_dt_does_not_rewind() {
        let mut sim = Simulation::new(quiet()).unwrap();
        sim.tick(Fixed::ONE);
        sim.tick(Fixed::from_num(-5));
        assert_eq!(sim.now(), Fixed::ONE);
    }

    #[test]
    fn test_oversized_dt_is_clamped() {
        let mut sim = Simulation::new(quiet()).unwrap();
        sim.world_mut()
            .spawn_building(BuildingKind::Base, Faction::Player, Vec2Fixed::from_ints(200, 200), true)
            .unwrap();
        let max_dt = sim.world().config().max_tick_dt;

        let events = sim.tick(Fixed::MAX);
        assert_eq!(events.tick, 1);
        assert_eq!(sim.now(), max_dt);
        // one income credit per elapsed second, no more
        let credits = max_dt.to_num::<u32>();
        assert_eq!(sim.world().ledger(Faction::Player).balance(), 100 + 10 * credits);
    }

    #[test]
    fn test_ticks_at_end_of_clock_return() {
        let mut config = SimConfig::default();
        config.max_tick_dt = Fixed::MAX;
        let mut sim = Simulation::from_scenario(config, &Scenario::skirmish()).unwrap();
        sim.tick(Fixed::MAX);
        sim.tick(Fixed::MAX);
        assert_eq!(sim.now(), Fixed::MAX);
        assert_eq!(sim.get_tick(), 2);
    }

    #[test]
    fn test_base_income_per_built_base() {
        let mut sim = Simulation::new(quiet()).unwrap();
        sim.world_mut()
            .spawn_building(BuildingKind::Base, Faction::Player, Vec2Fixed::from_ints(200, 200), true)
            .unwrap();
        sim.tick(Fixed::from_num(0.5));
        assert_eq!(sim.world().ledger(Faction::Player).balance(), 100);
        let events = sim.tick(Fixed::from_num(0.5));
        assert_eq!(sim.world().ledger(Faction::Player).balance(), 110);
        assert!(events.events.contains(&SimEvent::IncomeCredited {
            faction: Faction::Player,
            amount: 10
        }));
    }

    #[test]
    fn test_long_tick_catches_up_income() {
        let mut sim = Simulation::new(quiet()).unwrap();
        sim.world_mut()
            .spawn_building(BuildingKind::Base, Faction::Player, Vec2Fixed::from_ints(200, 200), true)
            .unwrap();
        sim.tick(Fixed::from_num(3));
        assert_eq!(sim.world().ledger(Faction::Player).balance(), 130);
    }

    #[test]
    fn test_winner_after_elimination() {
        let mut sim = Simulation::new(quiet()).unwrap();
        let soldier = sim
            .world_mut()
            .spawn_unit(UnitKind::Soldier, Faction::Player, Vec2Fixed::from_ints(100, 100))
            .unwrap();
        let victim = sim
            .world_mut()
            .spawn_unit(UnitKind::Worker, Faction::Enemy, Vec2Fixed::from_ints(130, 100))
            .unwrap();
        assert_eq!(sim.winner(), None);

        behavior::order_attack(sim.world_mut(), soldier, victim).unwrap();
        for _ in 0..20 {
            sim.tick(Fixed::from_num(0.25));
        }
        assert!(!sim.world().entities().contains(victim));
        assert_eq!(sim.winner(), Some(Faction::Player));
    }

    #[test]
    fn test_deterministic_hash() {
        let run = || {
            let mut sim =
                Simulation::from_scenario(SimConfig::default(), &Scenario::skirmish()).unwrap();
            for _ in 0..200 {
                sim.tick(Fixed::from_num(0.1));
            }
            sim.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_hash_changes_with_state() {
        let mut sim = Simulation::from_scenario(quiet(), &Scenario::skirmish()).unwrap();
        let before = sim.state_hash();
        sim.tick(Fixed::from_num(0.1));
        assert_ne!(before, sim.state_hash());
    }

    #[test]
    fn test_enable_ai_for_player() {
        let mut config = quiet();
        config.ai.harvest_chance = 1.0;
        let mut sim = Simulation::from_scenario(config, &Scenario::skirmish()).unwrap();
        assert_eq!(sim.ai_factions().count(), 0);

        assert!(sim.enable_ai(Faction::Player, 4));
        assert!(!sim.enable_ai(Faction::Player, 5));
        sim.tick(Fixed::ONE);
        let busy = sim
            .world()
            .units(Faction::Player)
            .iter()
            .filter_map(|id| sim.world().entities().unit(*id))
            .filter(|u| !u.behavior.is_idle())
            .count();
        assert_eq!(busy, 5);
        assert!(sim
            .world()
            .units(Faction::Enemy)
            .iter()
            .filter_map(|id| sim.world().entities().unit(*id))
            .all(|u| u.behavior.is_idle()));
    }

    #[test]
    fn test_ai_timers_drive_enemy() {
        let mut config = SimConfig::default();
        config.ai.harvest_chance = 1.0;
        let mut sim = Simulation::from_scenario(config, &Scenario::skirmish()).unwrap();
        sim.tick(Fixed::ONE);
        let busy = sim
            .world()
            .units(Faction::Enemy)
            .iter()
            .filter_map(|id| sim.world().entities().unit(*id))
            .filter(|u| !u.behavior.is_idle())
            .count();
        assert_eq!(busy, 5);
    }
}
