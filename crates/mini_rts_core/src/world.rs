//! The world: every piece of mutable simulation state in one place.
//!
//! The dispatcher, the per-tick state machines and the AI all operate on
//! a `&mut WorldState`; nothing else holds simulation state.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{PickRadii, SimConfig};
use crate::economy::{Ledger, Ledgers};
use crate::entity::{
    Building, BuildingKind, Entity, EntityId, EntityStorage, ResourceNode, Unit, UnitKind,
};
use crate::error::{CommandError, GameError, Result};
use crate::events::SimEvent;
use crate::factions::Faction;
use crate::math::{Fixed, Vec2Fixed};
use crate::production::{self, find_spawn_point, SpawnPoint};

/// Ordered id lists of one faction's entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Roster {
    /// Unit ids in spawn order.
    pub units: Vec<EntityId>,
    /// Building ids in spawn order.
    pub buildings: Vec<EntityId>,
}

impl Roster {
    /// Remove an id from whichever list holds it.
    ///
    /// Returns `false` if the id was not present.
    fn remove(&mut self, id: EntityId) -> bool {
        for list in [&mut self.units, &mut self.buildings] {
            if let Some(index) = list.iter().position(|&e| e == id) {
                list.remove(index);
                return true;
            }
        }
        false
    }
}

/// All mutable simulation state.
#[derive(Debug, Clone)]
pub struct WorldState {
    config: SimConfig,
    entities: EntityStorage,
    player: Roster,
    enemy: Roster,
    resources: Vec<EntityId>,
    ledgers: Ledgers,
    now: Fixed,
    events: Vec<SimEvent>,
    rng: StdRng,
}

impl WorldState {
    /// Create an empty world.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entities: EntityStorage::new(),
            player: Roster::default(),
            enemy: Roster::default(),
            resources: Vec::new(),
            ledgers: Ledgers::new(config.starting_resources),
            now: Fixed::ZERO,
            events: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current simulation time in seconds.
    #[must_use]
    pub const fn now(&self) -> Fixed {
        self.now
    }

    /// Advance the clock. Negative deltas are ignored.
    pub fn advance_clock(&mut self, dt: Fixed) {
        if dt > Fixed::ZERO {
            self.now = self.now.saturating_add(dt);
        }
    }

    /// Entity arena.
    #[must_use]
    pub fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Mutable entity arena.
    pub fn entities_mut(&mut self) -> &mut EntityStorage {
        &mut self.entities
    }

    /// A faction's roster.
    #[must_use]
    pub fn roster(&self, faction: Faction) -> &Roster {
        match faction {
            Faction::Player => &self.player,
            Faction::Enemy => &self.enemy,
        }
    }

    fn roster_mut(&mut self, faction: Faction) -> &mut Roster {
        match faction {
            Faction::Player => &mut self.player,
            Faction::Enemy => &mut self.enemy,
        }
    }

    /// A faction's unit ids.
    #[must_use]
    pub fn units(&self, faction: Faction) -> &[EntityId] {
        &self.roster(faction).units
    }

    /// A faction's building ids.
    #[must_use]
    pub fn buildings(&self, faction: Faction) -> &[EntityId] {
        &self.roster(faction).buildings
    }

    /// Resource node ids.
    #[must_use]
    pub fn resources(&self) -> &[EntityId] {
        &self.resources
    }

    /// Both ledgers.
    #[must_use]
    pub const fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    /// A faction's ledger.
    #[must_use]
    pub const fn ledger(&self, faction: Faction) -> &Ledger {
        self.ledgers.get(faction)
    }

    /// A faction's ledger, mutably.
    pub fn ledger_mut(&mut self, faction: Faction) -> &mut Ledger {
        self.ledgers.get_mut(faction)
    }

    /// Queue an event for the host.
    pub fn push_event(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Take all queued events.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Spawn an idle unit.
    pub fn spawn_unit(
        &mut self,
        kind: UnitKind,
        faction: Faction,
        position: Vec2Fixed,
    ) -> Result<EntityId> {
        let blueprint = self
            .config
            .blueprints
            .unit(kind)
            .ok_or_else(|| GameError::UnknownBlueprint(kind.name().to_string()))?;
        let unit = Unit::new(faction, position, blueprint);
        let id = self.entities.insert(Entity::Unit(unit));
        self.roster_mut(faction).units.push(id);
        self.push_event(SimEvent::UnitSpawned {
            id,
            kind,
            faction,
            position,
        });
        tracing::debug!(id, kind = kind.name(), faction = faction.display_name(), "Unit spawned");
        Ok(id)
    }

    /// Spawn a building, either already constructed or as a fresh site.
    pub fn spawn_building(
        &mut self,
        kind: BuildingKind,
        faction: Faction,
        position: Vec2Fixed,
        constructed: bool,
    ) -> Result<EntityId> {
        let blueprint = self
            .config
            .blueprints
            .building(kind)
            .ok_or_else(|| GameError::UnknownBlueprint(kind.name().to_string()))?;
        let building = if constructed {
            Building::constructed(faction, position, blueprint)
        } else {
            Building::new(faction, position, blueprint)
        };
        let id = self.entities.insert(Entity::Building(building));
        self.roster_mut(faction).buildings.push(id);
        self.push_event(SimEvent::BuildingPlaced {
            id,
            kind,
            faction,
            position,
        });
        tracing::debug!(id, kind = kind.name(), faction = faction.display_name(), "Building placed");
        Ok(id)
    }

    /// Spawn a full resource node.
    pub fn spawn_resource(&mut self, position: Vec2Fixed, amount: u32) -> EntityId {
        let id = self
            .entities
            .insert(Entity::Resource(ResourceNode::new(position, amount)));
        self.resources.push(id);
        id
    }

    /// Remove an entity from its roster and the arena.
    ///
    /// Returns `true` only the first time; later calls for the same id
    /// are no-ops, so an entity is announced destroyed exactly once.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get(id) else {
            return false;
        };
        let removed = match entity.faction() {
            Some(faction) => self.roster_mut(faction).remove(id),
            None => match self.resources.iter().position(|&r| r == id) {
                Some(index) => {
                    self.resources.remove(index);
                    true
                }
                None => false,
            },
        };
        if !removed {
            return false;
        }

        if let Some(entity) = self.entities.remove(id) {
            if let Some(faction) = entity.faction() {
                self.push_event(SimEvent::EntityDestroyed { id, faction });
            }
        }
        true
    }

    /// Apply damage to a unit or building.
    ///
    /// Returns the health left, or `None` if the entity cannot be damaged.
    /// Dead entities stay in place until [`reap_dead`](Self::reap_dead).
    pub fn apply_damage(&mut self, target: EntityId, amount: u32) -> Option<u32> {
        let health = self.entities.get_mut(target)?.health_mut()?;
        health.apply_damage(amount);
        Some(health.current)
    }

    /// Remove every unit and building at zero health.
    ///
    /// Collects first and removes afterwards so no entry is skipped or
    /// visited twice.
    pub fn reap_dead(&mut self) -> Vec<EntityId> {
        let dead: Vec<EntityId> = self
            .entities
            .sorted_ids()
            .into_iter()
            .filter(|id| {
                self.entities
                    .get(*id)
                    .and_then(Entity::health)
                    .is_some_and(|h| h.is_dead())
            })
            .collect();

        dead.into_iter().filter(|id| self.despawn(*id)).collect()
    }

    /// The entity under a point, if any.
    ///
    /// Units are checked before buildings, buildings before resources; the
    /// lowest id wins within a category.
    #[must_use]
    pub fn entity_at(&self, point: Vec2Fixed) -> Option<EntityId> {
        pick_entity(&self.entities, self.config.pick_radius, point)
    }

    /// Pick where a unit produced at `origin` appears.
    pub fn spawn_point_near(&mut self, origin: Vec2Fixed) -> SpawnPoint {
        let (entities, config) = (&self.entities, &self.config);
        find_spawn_point(
            origin,
            config.spawn_offset,
            |p| spawn_point_free(entities, config, p),
            &mut self.rng,
        )
    }

    /// Start a production job in a building, paid from its owner's ledger.
    ///
    /// Returns the owning faction. Refusals change nothing.
    pub fn start_production(
        &mut self,
        building_id: EntityId,
        unit: UnitKind,
    ) -> std::result::Result<Faction, CommandError> {
        let building = self
            .entities
            .building_mut(building_id)
            .ok_or(CommandError::EntityNotFound(building_id))?;
        let faction = building.faction;
        production::start_production(
            building,
            unit,
            &self.config.blueprints,
            self.ledgers.get_mut(faction),
        )?;
        Ok(faction)
    }

    /// Whether a new building may be placed at `point`.
    ///
    /// The point must lie in the buildable area and at least the clearance
    /// distance away, on some axis, from every existing building.
    #[must_use]
    pub fn can_place_building(&self, point: Vec2Fixed) -> bool {
        if !self.config.map.buildable_area().contains(point) {
            return false;
        }
        let clearance = self.config.map.building_clearance;
        Faction::ALL
            .iter()
            .flat_map(|f| self.buildings(*f).iter())
            .filter_map(|id| self.entities.building(*id))
            .all(|b| {
                (b.position.x - point.x).abs() >= clearance
                    || (b.position.y - point.y).abs() >= clearance
            })
    }
}

fn pick_entity(entities: &EntityStorage, radii: PickRadii, point: Vec2Fixed) -> Option<EntityId> {
    let hit = |position: Vec2Fixed, radius: Fixed| {
        (position.x - point.x).abs() <= radius && (position.y - point.y).abs() <= radius
    };
    let ids = entities.sorted_ids();
    let pick = |matches: &dyn Fn(&Entity) -> bool| {
        ids.iter()
            .copied()
            .find(|id| entities.get(*id).is_some_and(|e| matches(e)))
    };

    pick(&|e| matches!(e, Entity::Unit(u) if hit(u.position, radii.unit)))
        .or_else(|| pick(&|e| matches!(e, Entity::Building(b) if hit(b.position, radii.building))))
        .or_else(|| pick(&|e| matches!(e, Entity::Resource(r) if hit(r.position, radii.resource))))
}

fn spawn_point_free(entities: &EntityStorage, config: &SimConfig, point: Vec2Fixed) -> bool {
    config.map.bounds().contains(point) && pick_entity(entities, config.pick_radius, point).is_none()
}
