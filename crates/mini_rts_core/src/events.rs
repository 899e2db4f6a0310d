//! One-shot simulation events for the host (effects, sounds, UI toasts).

use serde::Serialize;

use crate::entity::{BuildingKind, EntityId, UnitKind};
use crate::factions::Faction;
use crate::math::Vec2Fixed;

/// Something that happened in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A unit entered the world.
    UnitSpawned {
        /// New unit.
        id: EntityId,
        /// Unit type.
        kind: UnitKind,
        /// Owner.
        faction: Faction,
        /// Spawn position.
        position: Vec2Fixed,
    },
    /// A building was placed (initial setup or construction start).
    BuildingPlaced {
        /// New building.
        id: EntityId,
        /// Building type.
        kind: BuildingKind,
        /// Owner.
        faction: Faction,
        /// Building position.
        position: Vec2Fixed,
    },
    /// Construction finished.
    ConstructionComplete {
        /// The building.
        id: EntityId,
        /// Building type.
        kind: BuildingKind,
        /// Owner.
        faction: Faction,
    },
    /// A production job began.
    ProductionStarted {
        /// Producing building.
        building: EntityId,
        /// Unit being produced.
        unit: UnitKind,
        /// Owner.
        faction: Faction,
    },
    /// A production job finished and its unit spawned.
    ProductionComplete {
        /// Producing building.
        building: EntityId,
        /// The new unit.
        unit: EntityId,
        /// Unit type.
        kind: UnitKind,
    },
    /// An attack hit.
    AttackLanded {
        /// Attacking unit.
        attacker: EntityId,
        /// Damaged entity.
        target: EntityId,
        /// Damage dealt.
        damage: u32,
        /// Target health after the hit.
        remaining_health: u32,
    },
    /// A worker extracted resources.
    HarvestTick {
        /// Harvesting worker.
        worker: EntityId,
        /// Harvested node.
        node: EntityId,
        /// Amount extracted.
        amount: u32,
        /// Amount left in the node.
        remaining: u32,
    },
    /// A node reached zero.
    ResourceDepleted {
        /// The node.
        node: EntityId,
    },
    /// A unit or building was removed.
    EntityDestroyed {
        /// Removed entity.
        id: EntityId,
        /// Its owner.
        faction: Faction,
    },
    /// Periodic base income landed in a ledger.
    IncomeCredited {
        /// Credited faction.
        faction: Faction,
        /// Amount credited.
        amount: u32,
    },
    /// The AI launched an attack wave.
    AttackWaveLaunched {
        /// Attacking faction.
        faction: Faction,
        /// Units in the wave.
        units: usize,
        /// Wave target.
        target: EntityId,
    },
    /// A command was refused.
    CommandRejected {
        /// Issuing faction.
        faction: Faction,
        /// Stable reason code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },
}

/// Events generated during a simulation tick.
///
/// Includes anything commands emitted since the previous tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickEvents {
    /// Tick these events were drained on.
    pub tick: u64,
    /// Events in emission order.
    pub events: Vec<SimEvent>,
}

impl TickEvents {
    /// Entities that died this tick.
    pub fn deaths(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter_map(|e| match e {
            SimEvent::EntityDestroyed { id, .. } => Some(*id),
            _ => None,
        })
    }

    /// Units spawned this tick.
    pub fn spawned(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter_map(|e| match e {
            SimEvent::UnitSpawned { id, .. } => Some(*id),
            _ => None,
        })
    }

    /// Whether no events were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_event_filters() {
        let events = TickEvents {
            tick: 3,
            events: vec![
                SimEvent::UnitSpawned {
                    id: 4,
                    kind: UnitKind::Worker,
                    faction: Faction::Player,
                    position: Vec2Fixed::from_ints(1, 1),
                },
                SimEvent::EntityDestroyed {
                    id: 9,
                    faction: Faction::Enemy,
                },
                SimEvent::ResourceDepleted { node: 2 },
            ],
        };
        assert!(!events.is_empty());
        assert_eq!(events.spawned().collect::<Vec<_>>(), vec![4]);
        assert_eq!(events.deaths().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(SimEvent::ResourceDepleted { node: 2 }).unwrap();
        assert_eq!(json["event"], "resource_depleted");
        assert_eq!(json["node"], 2);
    }
}
