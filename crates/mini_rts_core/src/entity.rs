//! Entity model: units, buildings and resource nodes.
//!
//! Every entity lives in one [`EntityStorage`] arena keyed by a stable
//! [`EntityId`]. Cross-entity references (attack targets, harvest nodes,
//! selections) are ids, re-resolved every time they are used, so a
//! destroyed entity can never be reached through a stale reference.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::factions::Faction;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::production::{BuildingBlueprint, UnitBlueprint};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Health for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health at full.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if entity is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction to prevent underflow.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current = self.current.saturating_sub(actual);
        actual
    }

    /// Get health as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.max == 0 {
            0
        } else {
            let percent = u64::from(self.current) * 100 / u64::from(self.max);
            u32::try_from(percent).unwrap_or(100)
        }
    }
}

/// Unit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Gatherer; the only unit that can harvest.
    Worker,
    /// Combat unit with auto-engagement.
    Soldier,
}

impl UnitKind {
    /// Every unit kind.
    pub const ALL: [Self; 2] = [Self::Worker, Self::Soldier];

    /// Lowercase name used in logs and protocol messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Soldier => "soldier",
        }
    }
}

/// Building types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    /// Headquarters; produces workers and generates income.
    Base,
    /// Produces soldiers.
    Barracks,
}

impl BuildingKind {
    /// Every building kind.
    pub const ALL: [Self; 2] = [Self::Base, Self::Barracks];

    /// Lowercase name used in logs and protocol messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Barracks => "barracks",
        }
    }
}

/// Per-unit combat and movement stats, copied from the blueprint at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitStats {
    /// Movement speed in world units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Damage per attack.
    pub damage: u32,
    /// Maximum attack distance.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// Attacks per second.
    #[serde(with = "fixed_serde")]
    pub attack_speed: Fixed,
    /// Resources extracted per harvest tick (workers only).
    pub harvest_amount: u32,
    /// Radius scanned by auto-engagement.
    #[serde(with = "fixed_serde")]
    pub detection_range: Fixed,
    /// Whether the unit engages enemies on its own while idle.
    pub auto_attack: bool,
}

impl Default for UnitStats {
    fn default() -> Self {
        Self {
            speed: Fixed::ZERO,
            damage: 0,
            attack_range: Fixed::ZERO,
            attack_speed: Fixed::ONE,
            harvest_amount: 0,
            detection_range: Fixed::ZERO,
            auto_attack: false,
        }
    }
}

/// What a unit is currently doing.
///
/// Entering any action state replaces the previous one, which is the
/// only cancellation mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BehaviorState {
    /// No active order.
    #[default]
    Idle,
    /// Walking to a point. When `harvest_on_arrival` is set this is the
    /// approach leg of a harvest order and ends once the node is in range.
    Moving {
        /// Where the unit is headed.
        destination: Vec2Fixed,
        /// Resource node to start harvesting on arrival.
        harvest_on_arrival: Option<EntityId>,
    },
    /// Attacking (and pursuing) an opposing entity.
    Attacking {
        /// The entity under attack.
        target: EntityId,
    },
    /// Extracting from a resource node.
    Harvesting {
        /// The node being harvested.
        node: EntityId,
    },
}

impl BehaviorState {
    /// Whether the unit has no active order.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The entity this action refers to, if any.
    #[must_use]
    pub const fn target(&self) -> Option<EntityId> {
        match self {
            Self::Idle => None,
            Self::Moving {
                harvest_on_arrival, ..
            } => *harvest_on_arrival,
            Self::Attacking { target } => Some(*target),
            Self::Harvesting { node } => Some(*node),
        }
    }

    /// Short state name for snapshots and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving { .. } => "moving",
            Self::Attacking { .. } => "attacking",
            Self::Harvesting { .. } => "harvesting",
        }
    }
}

/// A mobile unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unit {
    /// Unique identifier, assigned by [`EntityStorage::insert`].
    pub id: EntityId,
    /// Owning faction.
    pub faction: Faction,
    /// Unit type.
    pub kind: UnitKind,
    /// World position.
    pub position: Vec2Fixed,
    /// Hit points.
    pub health: Health,
    /// Movement and combat stats.
    pub stats: UnitStats,
    /// Current action.
    pub behavior: BehaviorState,
    /// Target named by the last explicit attack order; checked first
    /// when the unit auto-engages.
    pub priority_target: Option<EntityId>,
    /// Simulation time of the last attack.
    pub last_attack_at: Option<Fixed>,
    /// Simulation time of the last harvest extraction.
    pub last_harvest_at: Option<Fixed>,
}

impl Unit {
    /// Create an idle unit from its blueprint.
    #[must_use]
    pub fn new(faction: Faction, position: Vec2Fixed, blueprint: &UnitBlueprint) -> Self {
        Self {
            id: 0,
            faction,
            kind: blueprint.kind,
            position,
            health: Health::new(blueprint.health),
            stats: blueprint.stats,
            behavior: BehaviorState::Idle,
            priority_target: None,
            last_attack_at: None,
            last_harvest_at: None,
        }
    }

    /// Whether this unit can harvest.
    #[must_use]
    pub fn is_worker(&self) -> bool {
        self.kind == UnitKind::Worker
    }

    /// Whether this unit scans for enemies on its own.
    #[must_use]
    pub fn auto_engages(&self) -> bool {
        !self.is_worker() && self.stats.auto_attack
    }

    /// Minimum time between attacks (`1 / attack_speed`).
    #[must_use]
    pub fn attack_interval(&self) -> Fixed {
        if self.stats.attack_speed <= Fixed::ZERO {
            return Fixed::MAX;
        }
        Fixed::ONE.saturating_div(self.stats.attack_speed)
    }

    /// Whether enough time has passed since the last attack.
    #[must_use]
    pub fn can_attack_at(&self, now: Fixed) -> bool {
        ready_at(self.last_attack_at, now, self.attack_interval())
    }

    /// Whether enough time has passed since the last extraction.
    #[must_use]
    pub fn can_harvest_at(&self, now: Fixed, interval: Fixed) -> bool {
        ready_at(self.last_harvest_at, now, interval)
    }
}

fn ready_at(last: Option<Fixed>, now: Fixed, interval: Fixed) -> bool {
    last.map_or(true, |at| now.saturating_sub(at) >= interval)
}

/// Production job state of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProductionState {
    /// Not producing.
    #[default]
    Idle,
    /// Producing one unit.
    Producing {
        /// What is being produced.
        unit: UnitKind,
        /// Seconds accumulated.
        #[serde(with = "fixed_serde")]
        progress: Fixed,
        /// Seconds required.
        #[serde(with = "fixed_serde")]
        total: Fixed,
    },
}

/// Derived lifecycle state of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingState {
    /// Still being built.
    Constructing,
    /// Built, not producing.
    Idle,
    /// Built and producing a unit.
    Producing,
}

/// A static structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Building {
    /// Unique identifier, assigned by [`EntityStorage::insert`].
    pub id: EntityId,
    /// Owning faction.
    pub faction: Faction,
    /// Building type.
    pub kind: BuildingKind,
    /// World position (center).
    pub position: Vec2Fixed,
    /// Hit points.
    pub health: Health,
    /// Seconds required to finish construction.
    pub build_time: Fixed,
    /// Seconds of construction accumulated, never above `build_time`.
    pub build_progress: Fixed,
    /// Unit types this building can produce.
    pub produces: Vec<UnitKind>,
    /// Active production job.
    pub production: ProductionState,
}

impl Building {
    /// Create a building under construction.
    #[must_use]
    pub fn new(faction: Faction, position: Vec2Fixed, blueprint: &BuildingBlueprint) -> Self {
        Self {
            id: 0,
            faction,
            kind: blueprint.kind,
            position,
            health: Health::new(blueprint.health),
            build_time: blueprint.build_time,
            build_progress: Fixed::ZERO,
            produces: blueprint.produces.clone(),
            production: ProductionState::Idle,
        }
    }

    /// Create a fully constructed building (initial base setup).
    #[must_use]
    pub fn constructed(faction: Faction, position: Vec2Fixed, blueprint: &BuildingBlueprint) -> Self {
        let mut building = Self::new(faction, position, blueprint);
        building.build_progress = building.build_time;
        building
    }

    /// Whether construction has finished.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.build_progress >= self.build_time
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BuildingState {
        if !self.is_built() {
            BuildingState::Constructing
        } else if matches!(self.production, ProductionState::Producing { .. }) {
            BuildingState::Producing
        } else {
            BuildingState::Idle
        }
    }

    /// Whether this building can produce a given unit type.
    #[must_use]
    pub fn can_produce(&self, unit: UnitKind) -> bool {
        self.produces.contains(&unit)
    }

    /// Get construction progress as a percentage (0-100).
    #[must_use]
    pub fn construction_percentage(&self) -> u32 {
        percentage(self.build_progress, self.build_time)
    }

    /// Get production progress as a percentage (0-100), if producing.
    #[must_use]
    pub fn production_percentage(&self) -> Option<u32> {
        match self.production {
            ProductionState::Idle => None,
            ProductionState::Producing {
                progress, total, ..
            } => Some(percentage(progress, total)),
        }
    }

    /// Advance construction by `dt` seconds.
    ///
    /// Returns `true` only on the tick construction completes.
    pub fn tick_construction(&mut self, dt: Fixed) -> bool {
        if self.is_built() {
            return false;
        }
        self.build_progress = self.build_progress.saturating_add(dt).min(self.build_time);
        self.is_built()
    }

    /// Advance the production job by `dt` seconds.
    ///
    /// Returns the finished unit kind and resets to idle when the job
    /// completes. Unbuilt buildings make no progress.
    pub fn tick_production(&mut self, dt: Fixed) -> Option<UnitKind> {
        if !self.is_built() {
            return None;
        }
        let ProductionState::Producing {
            unit,
            progress,
            total,
        } = self.production
        else {
            return None;
        };
        let progress = progress.saturating_add(dt).min(total);
        if progress >= total {
            self.production = ProductionState::Idle;
            Some(unit)
        } else {
            self.production = ProductionState::Producing {
                unit,
                progress,
                total,
            };
            None
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentage(progress: Fixed, total: Fixed) -> u32 {
    if total <= Fixed::ZERO {
        return 100;
    }
    let ratio = (progress / total).min(Fixed::ONE).max(Fixed::ZERO);
    (ratio * Fixed::from_num(100)).to_num::<i64>() as u32
}

/// A harvestable resource deposit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceNode {
    /// Unique identifier, assigned by [`EntityStorage::insert`].
    pub id: EntityId,
    /// World position.
    pub position: Vec2Fixed,
    /// Remaining resources.
    pub amount: u32,
    /// Initial resources.
    pub max_amount: u32,
}

impl ResourceNode {
    /// Create a full node.
    #[must_use]
    pub const fn new(position: Vec2Fixed, amount: u32) -> Self {
        Self {
            id: 0,
            position,
            amount,
            max_amount: amount,
        }
    }

    /// Whether nothing is left to harvest.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.amount == 0
    }

    /// Remove up to `requested` resources.
    ///
    /// Returns the actual amount extracted (may be less than requested if node is nearly depleted).
    pub fn extract(&mut self, requested: u32) -> u32 {
        let extracted = requested.min(self.amount);
        self.amount -= extracted;
        extracted
    }
}

/// Any entity in the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entity {
    /// A mobile unit.
    Unit(Unit),
    /// A structure.
    Building(Building),
    /// A resource deposit.
    Resource(ResourceNode),
}

impl Entity {
    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        match self {
            Self::Unit(u) => u.id,
            Self::Building(b) => b.id,
            Self::Resource(r) => r.id,
        }
    }

    fn set_id(&mut self, id: EntityId) {
        match self {
            Self::Unit(u) => u.id = id,
            Self::Building(b) => b.id = id,
            Self::Resource(r) => r.id = id,
        }
    }

    /// Owning faction; resource nodes are neutral.
    #[must_use]
    pub const fn faction(&self) -> Option<Faction> {
        match self {
            Self::Unit(u) => Some(u.faction),
            Self::Building(b) => Some(b.faction),
            Self::Resource(_) => None,
        }
    }

    /// World position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        match self {
            Self::Unit(u) => u.position,
            Self::Building(b) => b.position,
            Self::Resource(r) => r.position,
        }
    }

    /// Health, for damageable entities.
    #[must_use]
    pub const fn health(&self) -> Option<Health> {
        match self {
            Self::Unit(u) => Some(u.health),
            Self::Building(b) => Some(b.health),
            Self::Resource(_) => None,
        }
    }

    /// Mutable health, for damageable entities.
    pub fn health_mut(&mut self) -> Option<&mut Health> {
        match self {
            Self::Unit(u) => Some(&mut u.health),
            Self::Building(b) => Some(&mut b.health),
            Self::Resource(_) => None,
        }
    }

    /// Whether this entity can be attacked right now.
    #[must_use]
    pub fn is_attackable(&self) -> bool {
        self.health().is_some_and(|h| !h.is_dead())
    }
}

/// Storage for all entities in the simulation.
///
/// Uses a `HashMap` for O(1) entity lookup by ID, with deterministic
/// iteration via sorted keys when processing systems.
#[derive(Debug, Clone, Default)]
pub struct EntityStorage {
    /// Map of entity ID to entity data.
    entities: HashMap<EntityId, Entity>,
    /// Next entity ID to assign.
    next_id: EntityId,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new entity and return its ID.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        entity.set_id(id);
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        match self.entities.get(&id) {
            Some(Entity::Unit(unit)) => Some(unit),
            _ => None,
        }
    }

    /// Look up a unit mutably.
    pub fn unit_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        match self.entities.get_mut(&id) {
            Some(Entity::Unit(unit)) => Some(unit),
            _ => None,
        }
    }

    /// Look up a building.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        match self.entities.get(&id) {
            Some(Entity::Building(building)) => Some(building),
            _ => None,
        }
    }

    /// Look up a building mutably.
    pub fn building_mut(&mut self, id: EntityId) -> Option<&mut Building> {
        match self.entities.get_mut(&id) {
            Some(Entity::Building(building)) => Some(building),
            _ => None,
        }
    }

    /// Look up a resource node.
    #[must_use]
    pub fn resource(&self, id: EntityId) -> Option<&ResourceNode> {
        match self.entities.get(&id) {
            Some(Entity::Resource(node)) => Some(node),
            _ => None,
        }
    }

    /// Look up a resource node mutably.
    pub fn resource_mut(&mut self, id: EntityId) -> Option<&mut ResourceNode> {
        match self.entities.get_mut(&id) {
            Some(Entity::Resource(node)) => Some(node),
            _ => None,
        }
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted ids of all units.
    #[must_use]
    pub fn sorted_unit_ids(&self) -> Vec<EntityId> {
        self.sorted_ids_where(|e| matches!(e, Entity::Unit(_)))
    }

    /// Sorted ids of all buildings.
    #[must_use]
    pub fn sorted_building_ids(&self) -> Vec<EntityId> {
        self.sorted_ids_where(|e| matches!(e, Entity::Building(_)))
    }

    fn sorted_ids_where(&self, filter: impl Fn(&Entity) -> bool) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .entities
            .iter()
            .filter(|(_, e)| filter(e))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }
}
