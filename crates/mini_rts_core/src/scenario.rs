//! Initial map layouts.
//!
//! A scenario lists the resource nodes, buildings and units present at
//! tick zero. Scenario buildings start fully constructed.

use serde::{Deserialize, Serialize};

use crate::economy::Ledger;
use crate::entity::{BuildingKind, UnitKind};
use crate::error::{GameError, Result};
use crate::factions::Faction;
use crate::math::Vec2Fixed;
use crate::world::WorldState;

/// A resource node at game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpawn {
    /// Position.
    pub position: Vec2Fixed,
    /// Starting amount.
    pub amount: u32,
}

/// A pre-built building at game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingSpawn {
    /// Owner.
    pub faction: Faction,
    /// Building type.
    pub kind: BuildingKind,
    /// Position.
    pub position: Vec2Fixed,
}

/// A unit at game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpawn {
    /// Owner.
    pub faction: Faction,
    /// Unit type.
    pub kind: UnitKind,
    /// Position.
    pub position: Vec2Fixed,
}

/// Initial map contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Display name.
    pub name: String,
    /// Overrides the configured player starting balance.
    pub starting_resources: Option<u32>,
    /// Resource nodes.
    pub resources: Vec<ResourceSpawn>,
    /// Buildings, spawned constructed.
    pub buildings: Vec<BuildingSpawn>,
    /// Units.
    pub units: Vec<UnitSpawn>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "empty".to_string(),
            starting_resources: None,
            resources: Vec::new(),
            buildings: Vec::new(),
            units: Vec::new(),
        }
    }
}

impl Scenario {
    /// The standard one-versus-one layout: a base and five workers per
    /// side in opposite corners, four corner nodes and one central node.
    #[must_use]
    pub fn skirmish() -> Self {
        let resources = [(400, 400), (1600, 400), (400, 1600), (1600, 1600), (1000, 1000)]
            .into_iter()
            .map(|(x, y)| ResourceSpawn {
                position: Vec2Fixed::from_ints(x, y),
                amount: 500,
            })
            .collect();

        let buildings = vec![
            BuildingSpawn {
                faction: Faction::Player,
                kind: BuildingKind::Base,
                position: Vec2Fixed::from_ints(200, 200),
            },
            BuildingSpawn {
                faction: Faction::Enemy,
                kind: BuildingKind::Base,
                position: Vec2Fixed::from_ints(1800, 1800),
            },
        ];

        let mut units = Vec::with_capacity(10);
        for i in 0..5 {
            units.push(UnitSpawn {
                faction: Faction::Player,
                kind: UnitKind::Worker,
                position: Vec2Fixed::from_ints(250 + i * 30, 250),
            });
        }
        for i in 0..5 {
            units.push(UnitSpawn {
                faction: Faction::Enemy,
                kind: UnitKind::Worker,
                position: Vec2Fixed::from_ints(1750 - i * 30, 1750),
            });
        }

        Self {
            name: "skirmish".to_string(),
            starting_resources: None,
            resources,
            buildings,
            units,
        }
    }

    /// Parse a scenario from RON.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "scenario".to_string(),
            message: e.to_string(),
        })
    }

    /// Spawn everything into `world`.
    ///
    /// Resources first, then buildings, then units, so ids follow that
    /// order on an empty world.
    pub fn apply(&self, world: &mut WorldState) -> Result<()> {
        if let Some(balance) = self.starting_resources {
            *world.ledger_mut(Faction::Player) = Ledger::new(balance);
        }
        for node in &self.resources {
            world.spawn_resource(node.position, node.amount);
        }
        for building in &self.buildings {
            world.spawn_building(building.kind, building.faction, building.position, true)?;
        }
        for unit in &self.units {
            world.spawn_unit(unit.kind, unit.faction, unit.position)?;
        }
        tracing::debug!(
            scenario = %self.name,
            resources = self.resources.len(),
            buildings = self.buildings.len(),
            units = self.units.len(),
            "Scenario applied"
        );
        Ok(())
    }
}
