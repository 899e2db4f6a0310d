//! Read-only views of the world for presentation and tooling.

use serde::{Deserialize, Serialize};

use crate::entity::{
    BehaviorState, BuildingKind, BuildingState, Entity, EntityId, ProductionState, UnitKind,
};
use crate::factions::Faction;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::world::WorldState;

/// One unit as the host draws it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Owner.
    pub faction: Faction,
    /// Unit type.
    pub kind: UnitKind,
    /// Position.
    pub position: Vec2Fixed,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
    /// Current action.
    pub behavior: BehaviorState,
}

/// One building as the host draws it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingSnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Owner.
    pub faction: Faction,
    /// Building type.
    pub kind: BuildingKind,
    /// Position.
    pub position: Vec2Fixed,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
    /// Lifecycle state.
    pub state: BuildingState,
    /// Construction progress, 0-100.
    pub construction_percent: u32,
    /// Unit in production.
    pub production: Option<UnitKind>,
    /// Production progress, 0-100.
    pub production_percent: Option<u32>,
}

/// One resource node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Position.
    pub position: Vec2Fixed,
    /// Remaining amount.
    pub amount: u32,
    /// Starting amount.
    pub max_amount: u32,
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Ticks run so far.
    pub tick: u64,
    /// Simulation clock in seconds.
    #[serde(with = "fixed_serde")]
    pub time: Fixed,
    /// Player ledger balance.
    pub player_resources: u32,
    /// Units in id order.
    pub units: Vec<UnitSnapshot>,
    /// Buildings in id order.
    pub buildings: Vec<BuildingSnapshot>,
    /// Resource nodes in id order.
    pub resources: Vec<ResourceSnapshot>,
}

impl WorldSnapshot {
    /// Capture the current world.
    #[must_use]
    pub fn capture(world: &WorldState, tick: u64) -> Self {
        let mut snapshot = Self {
            tick,
            time: world.now(),
            player_resources: world.ledger(Faction::Player).balance(),
            units: Vec::new(),
            buildings: Vec::new(),
            resources: Vec::new(),
        };

        for id in world.entities().sorted_ids() {
            match world.entities().get(id) {
                Some(Entity::Unit(u)) => snapshot.units.push(UnitSnapshot {
                    id,
                    faction: u.faction,
                    kind: u.kind,
                    position: u.position,
                    health: u.health.current,
                    max_health: u.health.max,
                    behavior: u.behavior,
                }),
                Some(Entity::Building(b)) => snapshot.buildings.push(BuildingSnapshot {
                    id,
                    faction: b.faction,
                    kind: b.kind,
                    position: b.position,
                    health: b.health.current,
                    max_health: b.health.max,
                    state: b.state(),
                    construction_percent: b.construction_percentage(),
                    production: match b.production {
                        ProductionState::Producing { unit, .. } => Some(unit),
                        ProductionState::Idle => None,
                    },
                    production_percent: b.production_percentage(),
                }),
                Some(Entity::Resource(r)) => snapshot.resources.push(ResourceSnapshot {
                    id,
                    position: r.position,
                    amount: r.amount,
                    max_amount: r.max_amount,
                }),
                None => {}
            }
        }
        snapshot
    }

    /// Units owned by `faction`.
    pub fn units_of(&self, faction: Faction) -> impl Iterator<Item = &UnitSnapshot> + '_ {
        self.units.iter().filter(move |u| u.faction == faction)
    }
}
