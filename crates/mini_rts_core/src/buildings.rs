//! Building state machine and placement.
//!
//! ```text
//! Constructing -> Idle <-> Producing
//! ```

use crate::entity::{BuildingKind, EntityId, UnitKind};
use crate::error::CommandError;
use crate::events::SimEvent;
use crate::factions::Faction;
use crate::math::{Fixed, Vec2Fixed};
use crate::production::ProductionError;
use crate::world::WorldState;

/// Place a new construction site for `faction`.
///
/// Checks the site and the cost before touching anything; on success the
/// cost is debited once and a Constructing building appears.
pub fn place_building(
    world: &mut WorldState,
    faction: Faction,
    kind: BuildingKind,
    position: Vec2Fixed,
) -> Result<EntityId, CommandError> {
    if !world.can_place_building(position) {
        return Err(CommandError::InvalidPlacement);
    }
    let cost = building_cost(world, kind)?;
    if !world.ledger_mut(faction).debit(cost) {
        return Err(CommandError::InsufficientResources {
            required: cost,
            available: world.ledger(faction).available(),
        });
    }

    let id = world
        .spawn_building(kind, faction, position, false)
        .map_err(|_| ProductionError::BlueprintNotFound)?;
    tracing::info!(
        id,
        kind = kind.name(),
        faction = faction.display_name(),
        cost,
        "Construction started"
    );
    Ok(id)
}

/// Cost of a building kind from the active blueprints.
pub fn building_cost(world: &WorldState, kind: BuildingKind) -> Result<u32, CommandError> {
    world
        .config()
        .blueprints
        .building(kind)
        .map(|b| b.cost)
        .ok_or(CommandError::Production(ProductionError::BlueprintNotFound))
}

/// Start a production job in a building and announce it.
pub fn request_production(
    world: &mut WorldState,
    building: EntityId,
    unit: UnitKind,
) -> Result<(), CommandError> {
    let faction = world.start_production(building, unit)?;
    world.push_event(SimEvent::ProductionStarted {
        building,
        unit,
        faction,
    });
    tracing::debug!(building, unit = unit.name(), "Production started");
    Ok(())
}

/// Advance construction and production of every building by `dt`.
///
/// Construction completion is reported once, on the tick it happens.
pub fn advance_buildings(world: &mut WorldState, dt: Fixed) {
    for id in world.entities().sorted_building_ids() {
        let Some(building) = world.entities_mut().building_mut(id) else {
            continue;
        };
        if building.health.is_dead() {
            continue;
        }

        if building.tick_construction(dt) {
            let (kind, faction) = (building.kind, building.faction);
            tracing::info!(id, kind = kind.name(), "Construction complete");
            world.push_event(SimEvent::ConstructionComplete { id, kind, faction });
            continue;
        }

        if let Some(unit) = building.tick_production(dt) {
            let (origin, faction) = (building.position, building.faction);
            complete_production(world, id, unit, faction, origin);
        }
    }
}

fn complete_production(
    world: &mut WorldState,
    building: EntityId,
    kind: UnitKind,
    faction: Faction,
    origin: Vec2Fixed,
) {
    let spawn = world.spawn_point_near(origin);
    if spawn.fallback {
        tracing::warn!(building, "No free spawn point, using random offset");
    }

    match world.spawn_unit(kind, faction, spawn.position) {
        Ok(unit) => {
            tracing::info!(building, unit, kind = kind.name(), "Production complete");
            world.push_event(SimEvent::ProductionComplete {
                building,
                unit,
                kind,
            });
        }
        Err(err) => tracing::warn!(building, %err, "Produced unit could not spawn"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::entity::{BuildingState, ProductionState};

    fn world() -> WorldState {
        WorldState::new(SimConfig::default()).unwrap()
    }

    #[test]
    fn test_place_building_debits_once() {
        let mut world = world();
        let id = place_building(
            &mut world,
            Faction::Player,
            BuildingKind::Barracks,
            Vec2Fixed::from_ints(500, 500),
        )
        .unwrap();
        assert_eq!(world.ledger(Faction::Player).balance(), 0);
        assert_eq!(
            world.entities().building(id).unwrap().state(),
            BuildingState::Constructing
        );
    }

    #[test]
    fn test_invalid_site_debits_nothing() {
        let mut world = world();
        let result = place_building(
            &mut world,
            Faction::Player,
            BuildingKind::Barracks,
            Vec2Fixed::from_ints(10, 10),
        );
        assert_eq!(result, Err(CommandError::InvalidPlacement));
        assert_eq!(world.ledger(Faction::Player).balance(), 100);
        assert!(world.buildings(Faction::Player).is_empty());
    }

    #[test]
    fn test_construction_then_production() {
        let mut world = world();
        world.ledger_mut(Faction::Player).credit(80);
        let barracks = place_building(
            &mut world,
            Faction::Player,
            BuildingKind::Barracks,
            Vec2Fixed::from_ints(500, 500),
        )
        .unwrap();

        assert_eq!(
            request_production(&mut world, barracks, UnitKind::Soldier),
            Err(CommandError::Production(
                ProductionError::BuildingNotConstructed
            ))
        );

        world.drain_events();
        for _ in 0..15 {
            advance_buildings(&mut world, Fixed::ONE);
        }
        let completions = world
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SimEvent::ConstructionComplete { .. }))
            .count();
        assert_eq!(completions, 1);

        request_production(&mut world, barracks, UnitKind::Soldier).unwrap();
        assert_eq!(world.ledger(Faction::Player).balance(), 0);
        for _ in 0..15 {
            advance_buildings(&mut world, Fixed::ONE);
        }

        let building = world.entities().building(barracks).unwrap();
        assert_eq!(building.production, ProductionState::Idle);
        let soldiers: Vec<_> = world
            .units(Faction::Player)
            .iter()
            .filter_map(|id| world.entities().unit(*id))
            .collect();
        assert_eq!(soldiers.len(), 1);
        assert_eq!(soldiers[0].kind, UnitKind::Soldier);
        assert_eq!(soldiers[0].position, Vec2Fixed::from_ints(560, 500));
    }
}
