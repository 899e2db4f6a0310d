//! Test fixtures and helpers.
//!
//! Pre-built configurations and simulations for consistent testing.

use fixed::types::I32F32;
use mini_rts_core::config::SimConfig;
use mini_rts_core::entity::{BuildingKind, EntityId, UnitKind};
use mini_rts_core::events::SimEvent;
use mini_rts_core::factions::Faction;
use mini_rts_core::math::Vec2Fixed;
use mini_rts_core::scenario::Scenario;
use mini_rts_core::simulation::Simulation;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a position from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Default configuration with the AI switched off and no base income,
/// so tests only see the effects they cause.
#[must_use]
pub fn quiet_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.ai.enabled = false;
    config.base_income = 0;
    config
}

/// Empty simulation with [`quiet_config`].
///
/// # Panics
///
/// Panics if the default configuration is rejected.
#[must_use]
pub fn quiet_sim() -> Simulation {
    Simulation::new(quiet_config()).unwrap_or_else(|e| panic!("quiet config rejected: {e}"))
}

/// The standard skirmish with the given configuration.
///
/// # Panics
///
/// Panics if the configuration or scenario is rejected.
#[must_use]
pub fn skirmish_sim(config: SimConfig) -> Simulation {
    Simulation::from_scenario(config, &Scenario::skirmish())
        .unwrap_or_else(|e| panic!("skirmish setup failed: {e}"))
}

/// Skirmish with the AI running from a specific seed.
#[must_use]
pub fn seeded_skirmish(seed: u64) -> Simulation {
    let mut config = SimConfig::default();
    config.seed = seed;
    config.ai.seed = seed.wrapping_mul(31).wrapping_add(7);
    skirmish_sim(config)
}

/// Spawn a unit.
///
/// # Panics
///
/// Panics if the unit kind has no blueprint.
pub fn spawn_unit(
    sim: &mut Simulation,
    kind: UnitKind,
    faction: Faction,
    x: i32,
    y: i32,
) -> EntityId {
    sim.world_mut()
        .spawn_unit(kind, faction, pos(x, y))
        .unwrap_or_else(|e| panic!("spawn_unit failed: {e}"))
}

/// Spawn a building, constructed or not.
///
/// # Panics
///
/// Panics if the building kind has no blueprint.
pub fn spawn_building(
    sim: &mut Simulation,
    kind: BuildingKind,
    faction: Faction,
    x: i32,
    y: i32,
    constructed: bool,
) -> EntityId {
    sim.world_mut()
        .spawn_building(kind, faction, pos(x, y), constructed)
        .unwrap_or_else(|e| panic!("spawn_building failed: {e}"))
}

/// Tick `count` times with a fixed `dt`, collecting every event.
pub fn run_ticks(sim: &mut Simulation, count: u32, dt: I32F32) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for _ in 0..count {
        events.extend(sim.tick(dt).events);
    }
    events
}
