//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A seeded game must replay identically. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`mini_rts_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted entity ID order.
//!
//! - **System randomness**: The world and the AI each own a seeded `StdRng`.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual state machines (movement, combat, etc.)
//! 2. **Property tests**: Random order scripts must still replay exactly
//! 3. **Integration tests**: Full AI skirmishes are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use mini_rts_core::dispatcher::CommandDispatcher;
use mini_rts_core::entity::UnitKind;
use mini_rts_core::factions::Faction;
use mini_rts_core::math::Fixed;
use mini_rts_core::simulation::Simulation;

use crate::fixtures::pos;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use mini_rts_test_utils::determinism::verify_determinism;
/// use mini_rts_test_utils::fixtures::{fixed_f, seeded_skirmish};
///
/// let result = verify_determinism(
///     3,
///     100,
///     || seeded_skirmish(42),
///     |sim| { sim.tick(fixed_f(0.1)); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`Simulation`].
///
/// Runs the simulation twice with identical setup and a constant `dt`,
/// and checks the final state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick(dt);
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// or memory layout differences.
///
/// # Panics
///
/// Re-raises a panic from any simulation thread.
#[must_use]
pub fn run_parallel_simulations<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
    dt: Fixed,
) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick(dt);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// Useful for debugging non-determinism by finding exactly when
/// simulations start to differ.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick(dt);
        sim2.tick(dt);

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A player order addressed by roster index rather than entity id, so
/// generated scripts stay meaningful as units come and go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOrder {
    /// Move the n-th player unit.
    Move {
        /// Index into the player's unit roster.
        unit: usize,
        /// Destination x.
        x: i32,
        /// Destination y.
        y: i32,
    },
    /// Send the n-th player unit to the n-th resource node.
    Harvest {
        /// Index into the player's unit roster.
        unit: usize,
        /// Index into the resource list.
        node: usize,
    },
    /// Attack the n-th enemy unit with the n-th player unit.
    Attack {
        /// Index into the player's unit roster.
        unit: usize,
        /// Index into the enemy unit roster.
        target: usize,
    },
    /// Queue a worker at the first player building.
    ProduceWorker,
    /// Let time pass.
    Wait {
        /// Ticks to run.
        ticks: u8,
    },
}

/// Apply one scripted order through a player dispatcher, then tick once.
///
/// Refused orders are part of the script; they simply change nothing.
pub fn apply_scripted_order(
    sim: &mut Simulation,
    dispatcher: &mut CommandDispatcher,
    order: &ScriptedOrder,
    dt: Fixed,
) {
    let pick = |list: &[u64], index: usize| -> Option<u64> {
        (!list.is_empty()).then(|| list[index % list.len()])
    };
    let world = sim.world_mut();
    match *order {
        ScriptedOrder::Move { unit, x, y } => {
            if let Some(id) = pick(world.units(Faction::Player), unit) {
                let _ = dispatcher.select(world, id, false);
                let _ = dispatcher.issue_move(world, pos(x, y));
            }
        }
        ScriptedOrder::Harvest { unit, node } => {
            let ids = (
                pick(world.units(Faction::Player), unit),
                pick(world.resources(), node),
            );
            if let (Some(id), Some(node)) = ids {
                let _ = dispatcher.select(world, id, false);
                let _ = dispatcher.issue_harvest(world, node);
            }
        }
        ScriptedOrder::Attack { unit, target } => {
            let ids = (
                pick(world.units(Faction::Player), unit),
                pick(world.units(Faction::Enemy), target),
            );
            if let (Some(id), Some(target)) = ids {
                let _ = dispatcher.select(world, id, false);
                let _ = dispatcher.issue_attack(world, target);
            }
        }
        ScriptedOrder::ProduceWorker => {
            if let Some(building) = pick(world.buildings(Faction::Player), 0) {
                let _ = dispatcher.request_production(world, building, UnitKind::Worker);
            }
        }
        ScriptedOrder::Wait { ticks } => {
            for _ in 0..ticks {
                sim.tick(dt);
            }
        }
    }
    sim.tick(dt);
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use mini_rts_core::math::{Fixed, Vec2Fixed};
    use proptest::prelude::*;

    use super::ScriptedOrder;

    /// Generate a coordinate inside the default 2000x2000 map.
    pub fn arb_coordinate() -> impl Strategy<Value = i32> {
        0i32..=2000i32
    }

    /// Generate a fixed-point position inside the default map.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_coordinate(), arb_coordinate()).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// Generate a frame delta between 10 ms and 250 ms.
    pub fn arb_dt() -> impl Strategy<Value = Fixed> {
        (10i32..=250i32).prop_map(|ms| Fixed::from_num(ms) / Fixed::from_num(1000))
    }

    /// Generate health values (1-1000).
    pub fn arb_health() -> impl Strategy<Value = u32> {
        1u32..1000u32
    }

    /// Generate damage values (0-2000), including overkill.
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        0u32..2000u32
    }

    /// Generate one scripted order.
    pub fn arb_order() -> impl Strategy<Value = ScriptedOrder> {
        prop_oneof![
            (0usize..8, arb_coordinate(), arb_coordinate())
                .prop_map(|(unit, x, y)| ScriptedOrder::Move { unit, x, y }),
            (0usize..8, 0usize..5).prop_map(|(unit, node)| ScriptedOrder::Harvest { unit, node }),
            (0usize..8, 0usize..8)
                .prop_map(|(unit, target)| ScriptedOrder::Attack { unit, target }),
            Just(ScriptedOrder::ProduceWorker),
            (1u8..20).prop_map(|ticks| ScriptedOrder::Wait { ticks }),
        ]
    }

    /// Generate a sequence of scripted orders.
    pub fn arb_script(max_len: usize) -> impl Strategy<Value = Vec<ScriptedOrder>> {
        proptest::collection::vec(arb_order(), 0..max_len)
    }
}
