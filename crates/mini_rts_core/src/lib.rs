//! # Mini RTS Core
//!
//! Deterministic simulation core for Mini RTS.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO
//! - No system randomness (seeded RNGs only)
//! - No floating-point math in the tick (uses fixed-point)
//!
//! The host feeds input through a [`dispatcher::CommandDispatcher`] (or
//! an [`input::InputRouter`] wrapping one), then calls
//! [`simulation::Simulation::tick`] once per frame and draws from the
//! returned events and [`snapshot::WorldSnapshot`].
//!
//! ## Crate Structure
//!
//! - [`entity`] - Units, buildings, resource nodes and their storage
//! - [`world`] - The single mutable world state
//! - [`behavior`] - Unit state machine
//! - [`buildings`] - Construction, placement and production progress
//! - [`dispatcher`] - Selection and order validation
//! - [`ai`] - Timer-driven opponent
//! - [`simulation`] - Core simulation loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod behavior;
pub mod buildings;
pub mod config;
pub mod dispatcher;
pub mod economy;
pub mod entity;
pub mod error;
pub mod events;
pub mod factions;
pub mod input;
pub mod math;
pub mod production;
pub mod scenario;
pub mod scheduler;
pub mod simulation;
pub mod snapshot;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AiConfig, MapConfig, SimConfig};
    pub use crate::dispatcher::CommandDispatcher;
    pub use crate::economy::{Ledger, Ledgers};
    pub use crate::entity::{
        BehaviorState, Building, BuildingKind, BuildingState, Entity, EntityId, Health,
        ProductionState, ResourceNode, Unit, UnitKind,
    };
    pub use crate::error::{CommandError, GameError, Result};
    pub use crate::events::{SimEvent, TickEvents};
    pub use crate::factions::Faction;
    pub use crate::input::{InputEvent, InputOutcome, InputRouter, PointerButton};
    pub use crate::math::{Fixed, Rect, Vec2Fixed};
    pub use crate::production::{BlueprintRegistry, BuildingBlueprint, ProductionError, UnitBlueprint};
    pub use crate::scenario::Scenario;
    pub use crate::simulation::Simulation;
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::world::WorldState;
}
