//! Blueprints and the production pipeline.
//!
//! Blueprints describe what each unit and building costs and how it is
//! built. A building runs at most one production job at a time; the
//! cost is debited when the job starts, and the finished unit spawns at
//! the first free point next to the building.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::economy::Ledger;
use crate::entity::{Building, BuildingKind, ProductionState, UnitKind, UnitStats};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Blueprint defining a unit type's properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitBlueprint {
    /// Unit type this blueprint builds.
    pub kind: UnitKind,
    /// Display name of the unit.
    pub name: String,
    /// Resource cost to produce this unit.
    pub cost: u32,
    /// Seconds to produce this unit.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Maximum health points.
    pub health: u32,
    /// Movement and combat stats.
    pub stats: UnitStats,
}

impl UnitBlueprint {
    /// Create a new unit blueprint.
    #[must_use]
    pub fn new(
        kind: UnitKind,
        name: impl Into<String>,
        cost: u32,
        build_time: Fixed,
        health: u32,
        speed: Fixed,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            cost,
            build_time,
            health,
            stats: UnitStats {
                speed,
                ..UnitStats::default()
            },
        }
    }

    /// Add combat stats.
    #[must_use]
    pub fn with_combat(mut self, damage: u32, range: Fixed, attack_speed: Fixed) -> Self {
        self.stats.damage = damage;
        self.stats.attack_range = range;
        self.stats.attack_speed = attack_speed;
        self
    }

    /// Set the per-tick harvest yield.
    #[must_use]
    pub fn with_harvest(mut self, amount: u32) -> Self {
        self.stats.harvest_amount = amount;
        self
    }

    /// Enable auto-engagement within `detection_range`.
    #[must_use]
    pub fn with_auto_attack(mut self, detection_range: Fixed) -> Self {
        self.stats.auto_attack = true;
        self.stats.detection_range = detection_range;
        self
    }
}

/// Blueprint defining a building type's properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingBlueprint {
    /// Building type this blueprint builds.
    pub kind: BuildingKind,
    /// Display name of the building.
    pub name: String,
    /// Resource cost to construct this building.
    pub cost: u32,
    /// Seconds to construct this building.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Maximum health points.
    pub health: u32,
    /// Unit types this building can produce.
    pub produces: Vec<UnitKind>,
}

impl BuildingBlueprint {
    /// Create a new building blueprint.
    #[must_use]
    pub fn new(
        kind: BuildingKind,
        name: impl Into<String>,
        cost: u32,
        build_time: Fixed,
        health: u32,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            cost,
            build_time,
            health,
            produces: Vec::new(),
        }
    }

    /// Add unit types this building can produce.
    #[must_use]
    pub fn with_produces(mut self, units: Vec<UnitKind>) -> Self {
        self.produces = units;
        self
    }

    /// Check if this building can produce a given unit type.
    #[must_use]
    pub fn can_produce(&self, unit: UnitKind) -> bool {
        self.produces.contains(&unit)
    }
}

/// Registry of all unit and building blueprints.
///
/// The default registry holds the stock skirmish roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintRegistry {
    units: BTreeMap<UnitKind, UnitBlueprint>,
    buildings: BTreeMap<BuildingKind, BuildingBlueprint>,
}

impl BlueprintRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            units: BTreeMap::new(),
            buildings: BTreeMap::new(),
        }
    }

    /// Register (or replace) a unit blueprint.
    pub fn register_unit(&mut self, blueprint: UnitBlueprint) {
        self.units.insert(blueprint.kind, blueprint);
    }

    /// Register (or replace) a building blueprint.
    pub fn register_building(&mut self, blueprint: BuildingBlueprint) {
        self.buildings.insert(blueprint.kind, blueprint);
    }

    /// Get a unit blueprint.
    #[must_use]
    pub fn unit(&self, kind: UnitKind) -> Option<&UnitBlueprint> {
        self.units.get(&kind)
    }

    /// Get a building blueprint.
    #[must_use]
    pub fn building(&self, kind: BuildingKind) -> Option<&BuildingBlueprint> {
        self.buildings.get(&kind)
    }

    /// Mutable access to a unit blueprint, for tuning.
    pub fn unit_mut(&mut self, kind: UnitKind) -> Option<&mut UnitBlueprint> {
        self.units.get_mut(&kind)
    }
}

impl Default for BlueprintRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_unit(
            UnitBlueprint::new(
                UnitKind::Worker,
                "Worker",
                50,
                Fixed::from_num(10),
                50,
                Fixed::from_num(100),
            )
            .with_combat(5, Fixed::from_num(20), Fixed::ONE)
            .with_harvest(20),
        );
        registry.register_unit(
            UnitBlueprint::new(
                UnitKind::Soldier,
                "Soldier",
                80,
                Fixed::from_num(15),
                100,
                Fixed::from_num(80),
            )
            .with_combat(20, Fixed::from_num(50), Fixed::from_num(1.5))
            .with_auto_attack(Fixed::from_num(150)),
        );
        registry.register_building(
            BuildingBlueprint::new(BuildingKind::Base, "Base", 0, Fixed::ZERO, 500)
                .with_produces(vec![UnitKind::Worker]),
        );
        registry.register_building(
            BuildingBlueprint::new(
                BuildingKind::Barracks,
                "Barracks",
                100,
                Fixed::from_num(15),
                300,
            )
            .with_produces(vec![UnitKind::Soldier]),
        );
        registry
    }
}

/// Errors that can occur when starting production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionError {
    /// A job is already running.
    AlreadyProducing,
    /// Cannot afford the unit cost.
    InsufficientResources {
        /// Unit cost.
        required: u32,
        /// Ledger balance.
        available: u32,
    },
    /// The building cannot produce this unit type.
    CannotProduceUnit,
    /// The building is not yet constructed.
    BuildingNotConstructed,
    /// The requested unit type has no blueprint.
    BlueprintNotFound,
}

impl ProductionError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AlreadyProducing => "already_producing",
            Self::InsufficientResources { .. } => "insufficient_resources",
            Self::CannotProduceUnit => "cannot_produce_unit",
            Self::BuildingNotConstructed => "building_not_constructed",
            Self::BlueprintNotFound => "blueprint_not_found",
        }
    }
}

impl std::fmt::Display for ProductionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyProducing => write!(f, "Building is already producing"),
            Self::InsufficientResources {
                required,
                available,
            } => write!(f, "Insufficient resources: need {required}, have {available}"),
            Self::CannotProduceUnit => write!(f, "Building cannot produce this unit type"),
            Self::BuildingNotConstructed => write!(f, "Building is not yet constructed"),
            Self::BlueprintNotFound => write!(f, "Blueprint not found"),
        }
    }
}

impl std::error::Error for ProductionError {}

/// Start producing a unit in a building.
///
/// Validates the request in order (constructed, producible, idle,
/// affordable) and only then debits the cost and starts the job, so a
/// refusal leaves both the building and the ledger untouched.
pub fn start_production(
    building: &mut Building,
    unit: UnitKind,
    blueprints: &BlueprintRegistry,
    ledger: &mut Ledger,
) -> Result<(), ProductionError> {
    if !building.is_built() {
        return Err(ProductionError::BuildingNotConstructed);
    }

    if !building.can_produce(unit) {
        return Err(ProductionError::CannotProduceUnit);
    }

    if matches!(building.production, ProductionState::Producing { .. }) {
        return Err(ProductionError::AlreadyProducing);
    }

    let blueprint = blueprints
        .unit(unit)
        .ok_or(ProductionError::BlueprintNotFound)?;

    if !ledger.debit(blueprint.cost) {
        return Err(ProductionError::InsufficientResources {
            required: blueprint.cost,
            available: ledger.available(),
        });
    }

    building.production = ProductionState::Producing {
        unit,
        progress: Fixed::ZERO,
        total: blueprint.build_time,
    };
    Ok(())
}

/// Where a produced unit should appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnPoint {
    /// The chosen position.
    pub position: Vec2Fixed,
    /// Whether every fixed candidate was occupied and a random offset was used.
    pub fallback: bool,
}

/// Pick a spawn point next to `origin`.
///
/// Tries `offset` to the right, left, below and above, in that order,
/// and takes the first point `is_free` accepts. When all four are taken
/// the unit goes to a random offset within `offset` on each axis.
pub fn find_spawn_point<R: Rng>(
    origin: Vec2Fixed,
    offset: Fixed,
    is_free: impl Fn(Vec2Fixed) -> bool,
    rng: &mut R,
) -> SpawnPoint {
    let candidates = [
        Vec2Fixed::new(origin.x + offset, origin.y),
        Vec2Fixed::new(origin.x - offset, origin.y),
        Vec2Fixed::new(origin.x, origin.y + offset),
        Vec2Fixed::new(origin.x, origin.y - offset),
    ];

    if let Some(position) = candidates.into_iter().find(|p| is_free(*p)) {
        return SpawnPoint {
            position,
            fallback: false,
        };
    }

    let bits = offset.abs().to_bits();
    let dx = Fixed::from_bits(rng.gen_range(-bits..=bits));
    let dy = Fixed::from_bits(rng.gen_range(-bits..=bits));
    SpawnPoint {
        position: Vec2Fixed::new(origin.x + dx, origin.y + dy),
        fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factions::Faction;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn barracks(built: bool) -> Building {
        let registry = BlueprintRegistry::default();
        let blueprint = registry.building(BuildingKind::Barracks).unwrap();
        if built {
            Building::constructed(Faction::Player, Vec2Fixed::ZERO, blueprint)
        } else {
            Building::new(Faction::Player, Vec2Fixed::ZERO, blueprint)
        }
    }

    #[test]
    fn test_default_blueprints_match_roster() {
        let registry = BlueprintRegistry::default();
        let worker = registry.unit(UnitKind::Worker).unwrap();
        assert_eq!(worker.cost, 50);
        assert_eq!(worker.stats.harvest_amount, 20);
        assert!(!worker.stats.auto_attack);

        let soldier = registry.unit(UnitKind::Soldier).unwrap();
        assert_eq!(soldier.cost, 80);
        assert_eq!(soldier.stats.damage, 20);
        assert_eq!(soldier.stats.attack_speed, Fixed::from_num(1.5));

        let base = registry.building(BuildingKind::Base).unwrap();
        assert!(base.can_produce(UnitKind::Worker));
        assert!(!base.can_produce(UnitKind::Soldier));
        assert_eq!(registry.building(BuildingKind::Barracks).unwrap().cost, 100);
    }

    #[test]
    fn test_start_production_debits_once() {
        let registry = BlueprintRegistry::default();
        let mut building = barracks(true);
        let mut ledger = Ledger::new(200);

        start_production(&mut building, UnitKind::Soldier, &registry, &mut ledger).unwrap();
        assert_eq!(ledger.balance(), 120);

        let err = start_production(&mut building, UnitKind::Soldier, &registry, &mut ledger);
        assert_eq!(err, Err(ProductionError::AlreadyProducing));
        assert_eq!(ledger.balance(), 120);
    }

    #[test]
    fn test_start_production_insufficient_leaves_state() {
        let registry = BlueprintRegistry::default();
        let mut building = barracks(true);
        let mut ledger = Ledger::new(79);

        let err = start_production(&mut building, UnitKind::Soldier, &registry, &mut ledger);
        assert_eq!(
            err,
            Err(ProductionError::InsufficientResources {
                required: 80,
                available: 79
            })
        );
        assert_eq!(ledger.balance(), 79);
        assert_eq!(building.production, ProductionState::Idle);
    }

    #[test]
    fn test_start_production_rejects_unbuilt_and_wrong_kind() {
        let registry = BlueprintRegistry::default();
        let mut ledger = Ledger::new(1000);

        let mut unbuilt = barracks(false);
        assert_eq!(
            start_production(&mut unbuilt, UnitKind::Soldier, &registry, &mut ledger),
            Err(ProductionError::BuildingNotConstructed)
        );

        let mut built = barracks(true);
        assert_eq!(
            start_production(&mut built, UnitKind::Worker, &registry, &mut ledger),
            Err(ProductionError::CannotProduceUnit)
        );
        assert_eq!(ledger.balance(), 1000);
    }

    #[test]
    fn test_spawn_point_prefers_fixed_candidates() {
        let mut rng = StdRng::seed_from_u64(1);
        let origin = Vec2Fixed::from_ints(200, 200);
        let right = Vec2Fixed::from_ints(260, 200);
        let below = Vec2Fixed::from_ints(200, 260);

        let spawn = find_spawn_point(origin, Fixed::from_num(60), |p| p != right, &mut rng);
        assert_eq!(spawn.position, Vec2Fixed::from_ints(140, 200));
        assert!(!spawn.fallback);

        let spawn = find_spawn_point(origin, Fixed::from_num(60), |p| p == below, &mut rng);
        assert_eq!(spawn.position, below);
    }

    #[test]
    fn test_spawn_point_falls_back_within_offset() {
        let mut rng = StdRng::seed_from_u64(7);
        let origin = Vec2Fixed::from_ints(200, 200);
        let offset = Fixed::from_num(60);

        for _ in 0..50 {
            let spawn = find_spawn_point(origin, offset, |_| false, &mut rng);
            assert!(spawn.fallback);
            assert!((spawn.position.x - origin.x).abs() <= offset);
            assert!((spawn.position.y - origin.y).abs() <= offset);
        }
    }
}
