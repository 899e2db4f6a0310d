//! Command dispatcher: one faction's selection and orders.
//!
//! The dispatcher is the only way a controller (human input or a script)
//! touches units. Every order is checked against ownership, unit type and
//! cost before anything changes; a refusal is returned as a
//! [`CommandError`] and recorded as a `CommandRejected` event.

use crate::behavior;
use crate::buildings;
use crate::entity::{BuildingKind, EntityId, UnitKind};
use crate::error::CommandError;
use crate::events::SimEvent;
use crate::factions::Faction;
use crate::math::{Rect, Vec2Fixed};
use crate::world::WorldState;

/// Selection and placement state of one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDispatcher {
    faction: Faction,
    selection: Vec<EntityId>,
    placement: Option<BuildingKind>,
}

impl CommandDispatcher {
    /// Create a dispatcher issuing orders for `faction`.
    #[must_use]
    pub const fn new(faction: Faction) -> Self {
        Self {
            faction,
            selection: Vec::new(),
            placement: None,
        }
    }

    /// Dispatcher for the human player.
    #[must_use]
    pub const fn player() -> Self {
        Self::new(Faction::Player)
    }

    /// The issuing faction.
    #[must_use]
    pub const fn faction(&self) -> Faction {
        self.faction
    }

    /// Currently selected entity ids, in selection order.
    #[must_use]
    pub fn selection(&self) -> &[EntityId] {
        &self.selection
    }

    /// Building kind being placed, if placement mode is active.
    #[must_use]
    pub const fn placement(&self) -> Option<BuildingKind> {
        self.placement
    }

    /// Select one owned entity, replacing the selection unless `additive`.
    pub fn select(
        &mut self,
        world: &mut WorldState,
        id: EntityId,
        additive: bool,
    ) -> Result<(), CommandError> {
        let owner = match world.entities().get(id) {
            None => return Err(self.reject(world, CommandError::EntityNotFound(id))),
            Some(entity) => entity.faction(),
        };
        if owner != Some(self.faction) {
            return Err(self.reject(world, CommandError::NotOwned(id)));
        }

        if !additive {
            self.selection.clear();
        }
        if !self.selection.contains(&id) {
            self.selection.push(id);
        }
        Ok(())
    }

    /// Select every owned unit inside `area`.
    ///
    /// Buildings are never box-selected. Returns the new selection size.
    pub fn select_area(&mut self, world: &WorldState, area: Rect, additive: bool) -> usize {
        if !additive {
            self.selection.clear();
        }
        for &id in world.units(self.faction) {
            let inside = world
                .entities()
                .unit(id)
                .is_some_and(|u| !u.health.is_dead() && area.contains(u.position));
            if inside && !self.selection.contains(&id) {
                self.selection.push(id);
            }
        }
        self.selection.len()
    }

    /// Drop the whole selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Move every selected unit to `destination`.
    ///
    /// Returns how many units received the order.
    pub fn issue_move(
        &mut self,
        world: &mut WorldState,
        destination: Vec2Fixed,
    ) -> Result<usize, CommandError> {
        let units = self.selected_units(world);
        if units.is_empty() {
            return Err(self.reject(world, CommandError::NoUnitsSelected));
        }
        for &id in &units {
            if let Some(unit) = world.entities_mut().unit_mut(id) {
                unit.priority_target = None;
            }
            behavior::order_move(world, id, destination);
        }
        tracing::debug!(units = units.len(), "Move ordered");
        Ok(units.len())
    }

    /// Attack `target` with every selected unit.
    ///
    /// A friendly target is refused before any unit changes state. A
    /// target that is gone or dead is refused after the selected units
    /// drop their current actions. Otherwise the target becomes each
    /// unit's priority target for auto-engagement.
    pub fn issue_attack(
        &mut self,
        world: &mut WorldState,
        target: EntityId,
    ) -> Result<usize, CommandError> {
        let units = self.selected_units(world);
        if units.is_empty() {
            return Err(self.reject(world, CommandError::NoUnitsSelected));
        }
        if let Err(err) = behavior::validate_attack_target(world, self.faction, target) {
            if behavior::is_target_gone(world, target) {
                for &id in &units {
                    behavior::set_idle(world, id);
                }
            }
            return Err(self.reject(world, err));
        }

        let mut ordered = 0;
        for &id in &units {
            if behavior::order_attack(world, id, target).is_ok() {
                if let Some(unit) = world.entities_mut().unit_mut(id) {
                    unit.priority_target = Some(target);
                }
                ordered += 1;
            }
        }
        tracing::debug!(units = ordered, target, "Attack ordered");
        Ok(ordered)
    }

    /// Send the selected workers to harvest `node`.
    ///
    /// Non-workers in the selection are left alone.
    pub fn issue_harvest(
        &mut self,
        world: &mut WorldState,
        node: EntityId,
    ) -> Result<usize, CommandError> {
        let workers: Vec<EntityId> = self
            .selected_units(world)
            .into_iter()
            .filter(|id| world.entities().unit(*id).is_some_and(|u| u.is_worker()))
            .collect();
        if workers.is_empty() {
            return Err(self.reject(world, CommandError::NoWorkersSelected));
        }

        let check = match world.entities().resource(node) {
            None => Err(CommandError::NotAResource(node)),
            Some(resource) if resource.is_depleted() => Err(CommandError::ResourceDepleted(node)),
            Some(_) => Ok(()),
        };
        if let Err(err) = check {
            return Err(self.reject(world, err));
        }

        for &id in &workers {
            if let Some(unit) = world.entities_mut().unit_mut(id) {
                unit.priority_target = None;
            }
            if let Err(err) = behavior::order_harvest(world, id, node) {
                tracing::debug!(worker = id, %err, "Harvest order dropped");
            }
        }
        tracing::debug!(workers = workers.len(), node, "Harvest ordered");
        Ok(workers.len())
    }

    /// Enter placement mode for `kind` if the faction can afford it.
    pub fn begin_build_placement(
        &mut self,
        world: &mut WorldState,
        kind: BuildingKind,
    ) -> Result<(), CommandError> {
        let cost = match buildings::building_cost(world, kind) {
            Ok(cost) => cost,
            Err(err) => return Err(self.reject(world, err)),
        };
        let ledger = world.ledger(self.faction);
        if !ledger.can_afford(cost) {
            let err = CommandError::InsufficientResources {
                required: cost,
                available: ledger.available(),
            };
            return Err(self.reject(world, err));
        }
        self.placement = Some(kind);
        tracing::debug!(kind = kind.name(), "Placement mode entered");
        Ok(())
    }

    /// Whether a building could be placed at `point`.
    #[must_use]
    pub fn can_place(&self, world: &WorldState, point: Vec2Fixed) -> bool {
        world.can_place_building(point)
    }

    /// Place the pending building at `point`.
    ///
    /// An invalid site keeps placement mode active so the player can try
    /// another spot.
    pub fn confirm_build_placement(
        &mut self,
        world: &mut WorldState,
        point: Vec2Fixed,
    ) -> Result<EntityId, CommandError> {
        let Some(kind) = self.placement else {
            return Err(self.reject(world, CommandError::NoPlacementInProgress));
        };
        match buildings::place_building(world, self.faction, kind, point) {
            Ok(id) => {
                self.placement = None;
                Ok(id)
            }
            Err(err) => Err(self.reject(world, err)),
        }
    }

    /// Leave placement mode. Returns whether a placement was active.
    pub fn cancel(&mut self) -> bool {
        self.placement.take().is_some()
    }

    /// Start producing `unit` in an owned building.
    pub fn request_production(
        &mut self,
        world: &mut WorldState,
        building: EntityId,
        unit: UnitKind,
    ) -> Result<(), CommandError> {
        let owner = world.entities().building(building).map(|b| b.faction);
        let check = match owner {
            None => Err(CommandError::EntityNotFound(building)),
            Some(owner) if owner != self.faction => Err(CommandError::NotOwned(building)),
            Some(_) => buildings::request_production(world, building, unit),
        };
        check.map_err(|err| self.reject(world, err))
    }

    /// Prune destroyed entities, then return the selected units.
    fn selected_units(&mut self, world: &WorldState) -> Vec<EntityId> {
        self.selection.retain(|id| {
            world
                .entities()
                .get(*id)
                .and_then(|e| e.health())
                .is_some_and(|h| !h.is_dead())
        });
        self.selection
            .iter()
            .copied()
            .filter(|id| world.entities().unit(*id).is_some())
            .collect()
    }

    fn reject(&self, world: &mut WorldState, err: CommandError) -> CommandError {
        tracing::debug!(faction = self.faction.display_name(), code = err.code(), %err, "Command rejected");
        world.push_event(SimEvent::CommandRejected {
            faction: self.faction,
            code: err.code(),
            message: err.to_string(),
        });
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::entity::{BehaviorState, BuildingState, ProductionState};
    use crate::production::ProductionError;

    fn at(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn world() -> WorldState {
        WorldState::new(SimConfig::default()).unwrap()
    }

    fn rejected_codes(world: &mut WorldState) -> Vec<&'static str> {
        world
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                SimEvent::CommandRejected { code, .. } => Some(code),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_select_only_own_entities() {
        let mut world = world();
        let own = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(100, 100))
            .unwrap();
        let foe = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(200, 100))
            .unwrap();
        let mut dispatcher = CommandDispatcher::player();

        dispatcher.select(&mut world, own, false).unwrap();
        assert_eq!(
            dispatcher.select(&mut world, foe, true),
            Err(CommandError::NotOwned(foe))
        );
        assert_eq!(dispatcher.selection(), &[own]);
        assert_eq!(rejected_codes(&mut world), vec!["not_owned"]);
    }

    #[test]
    fn test_select_area_picks_units_only() {
        let mut world = world();
        let a = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(100, 100))
            .unwrap();
        let b = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(150, 120))
            .unwrap();
        world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(900, 900))
            .unwrap();
        world
            .spawn_building(BuildingKind::Base, Faction::Player, at(120, 110), true)
            .unwrap();
        world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(110, 110))
            .unwrap();

        let mut dispatcher = CommandDispatcher::player();
        let area = Rect::from_corners(at(200, 200), at(50, 50));
        assert_eq!(dispatcher.select_area(&world, area, false), 2);
        assert_eq!(dispatcher.selection(), &[a, b]);
    }

    #[test]
    fn test_issue_move_requires_units() {
        let mut world = world();
        let mut dispatcher = CommandDispatcher::player();
        assert_eq!(
            dispatcher.issue_move(&mut world, at(500, 500)),
            Err(CommandError::NoUnitsSelected)
        );
    }

    #[test]
    fn test_issue_move_orders_selection() {
        let mut world = world();
        let id = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let mut dispatcher = CommandDispatcher::player();
        dispatcher.select(&mut world, id, false).unwrap();
        assert_eq!(dispatcher.issue_move(&mut world, at(500, 500)), Ok(1));
        assert_eq!(
            world.entities().unit(id).unwrap().behavior,
            BehaviorState::Moving {
                destination: at(500, 500),
                harvest_on_arrival: None
            }
        );
    }

    #[test]
    fn test_friendly_attack_changes_nothing() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let friend = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(120, 100))
            .unwrap();
        let mut dispatcher = CommandDispatcher::player();
        dispatcher.select(&mut world, soldier, false).unwrap();

        assert_eq!(
            dispatcher.issue_attack(&mut world, friend),
            Err(CommandError::FriendlyTarget)
        );
        let unit = world.entities().unit(soldier).unwrap();
        assert!(unit.behavior.is_idle());
        assert_eq!(unit.priority_target, None);
        assert_eq!(world.entities().unit(friend).unwrap().health.current, 50);
    }

    #[test]
    fn test_attack_on_dead_target_stops_selection() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let foe = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(400, 100))
            .unwrap();
        let mut dispatcher = CommandDispatcher::player();
        dispatcher.select(&mut world, soldier, false).unwrap();
        dispatcher.issue_move(&mut world, at(900, 900)).unwrap();
        world.apply_damage(foe, 50).unwrap();

        assert_eq!(
            dispatcher.issue_attack(&mut world, foe),
            Err(CommandError::InvalidTarget(foe))
        );
        assert!(world.entities().unit(soldier).unwrap().behavior.is_idle());
        assert_eq!(rejected_codes(&mut world), vec!["invalid_target"]);
    }

    #[test]
    fn test_attack_sets_priority_target() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let foe = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(400, 100))
            .unwrap();
        let mut dispatcher = CommandDispatcher::player();
        dispatcher.select(&mut world, soldier, false).unwrap();

        assert_eq!(dispatcher.issue_attack(&mut world, foe), Ok(1));
        let unit = world.entities().unit(soldier).unwrap();
        assert_eq!(unit.behavior, BehaviorState::Attacking { target: foe });
        assert_eq!(unit.priority_target, Some(foe));
    }

    #[test]
    fn test_harvest_requires_workers() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let node = world.spawn_resource(at(400, 400), 500);
        let mut dispatcher = CommandDispatcher::player();
        dispatcher.select(&mut world, soldier, false).unwrap();

        let err = dispatcher.issue_harvest(&mut world, node).unwrap_err();
        assert_eq!(err, CommandError::NoWorkersSelected);
        assert_eq!(err.to_string(), "Workers required");
        assert!(world.entities().unit(soldier).unwrap().behavior.is_idle());
    }

    #[test]
    fn test_harvest_skips_non_workers() {
        let mut world = world();
        let worker = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(100, 100))
            .unwrap();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(130, 100))
            .unwrap();
        let node = world.spawn_resource(at(400, 400), 500);
        let mut dispatcher = CommandDispatcher::player();
        dispatcher.select(&mut world, worker, false).unwrap();
        dispatcher.select(&mut world, soldier, true).unwrap();

        assert_eq!(dispatcher.issue_harvest(&mut world, node), Ok(1));
        assert_eq!(
            world.entities().unit(worker).unwrap().behavior.target(),
            Some(node)
        );
        assert!(world.entities().unit(soldier).unwrap().behavior.is_idle());
    }

    #[test]
    fn test_placement_round_trip() {
        let mut world = world();
        let mut dispatcher = CommandDispatcher::player();
        dispatcher
            .begin_build_placement(&mut world, BuildingKind::Barracks)
            .unwrap();

        assert_eq!(
            dispatcher.confirm_build_placement(&mut world, at(20, 20)),
            Err(CommandError::InvalidPlacement)
        );
        assert_eq!(dispatcher.placement(), Some(BuildingKind::Barracks));
        assert_eq!(world.ledger(Faction::Player).balance(), 100);

        let id = dispatcher
            .confirm_build_placement(&mut world, at(600, 600))
            .unwrap();
        assert_eq!(dispatcher.placement(), None);
        assert_eq!(world.ledger(Faction::Player).balance(), 0);
        assert_eq!(
            world.entities().building(id).unwrap().state(),
            BuildingState::Constructing
        );
    }

    #[test]
    fn test_begin_placement_needs_funds() {
        let mut config = SimConfig::default();
        config.starting_resources = 40;
        let mut world = WorldState::new(config).unwrap();
        let mut dispatcher = CommandDispatcher::player();
        assert_eq!(
            dispatcher.begin_build_placement(&mut world, BuildingKind::Barracks),
            Err(CommandError::InsufficientResources {
                required: 100,
                available: 40
            })
        );
        assert_eq!(dispatcher.placement(), None);
    }

    #[test]
    fn test_cancel_has_no_side_effects() {
        let mut world = world();
        let mut dispatcher = CommandDispatcher::player();
        assert!(!dispatcher.cancel());
        dispatcher
            .begin_build_placement(&mut world, BuildingKind::Barracks)
            .unwrap();
        assert!(dispatcher.cancel());
        assert_eq!(dispatcher.placement(), None);
        assert_eq!(world.ledger(Faction::Player).balance(), 100);
        assert_eq!(
            dispatcher.confirm_build_placement(&mut world, at(600, 600)),
            Err(CommandError::NoPlacementInProgress)
        );
    }

    #[test]
    fn test_request_production_checks_owner() {
        let mut world = world();
        let enemy_base = world
            .spawn_building(BuildingKind::Base, Faction::Enemy, at(1800, 1800), true)
            .unwrap();
        let own_base = world
            .spawn_building(BuildingKind::Base, Faction::Player, at(200, 200), true)
            .unwrap();
        let mut dispatcher = CommandDispatcher::player();

        assert_eq!(
            dispatcher.request_production(&mut world, enemy_base, UnitKind::Worker),
            Err(CommandError::NotOwned(enemy_base))
        );
        assert_eq!(
            dispatcher.request_production(&mut world, own_base, UnitKind::Soldier),
            Err(CommandError::Production(ProductionError::CannotProduceUnit))
        );
        dispatcher
            .request_production(&mut world, own_base, UnitKind::Worker)
            .unwrap();
        assert!(matches!(
            world.entities().building(own_base).unwrap().production,
            ProductionState::Producing { .. }
        ));
        assert_eq!(world.ledger(Faction::Player).balance(), 50);
    }

    #[test]
    fn test_dead_units_are_pruned_from_selection() {
        let mut world = world();
        let id = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(100, 100))
            .unwrap();
        let mut dispatcher = CommandDispatcher::player();
        dispatcher.select(&mut world, id, false).unwrap();
        world.apply_damage(id, 1000);
        world.reap_dead();

        assert_eq!(
            dispatcher.issue_move(&mut world, at(300, 300)),
            Err(CommandError::NoUnitsSelected)
        );
        assert!(dispatcher.selection().is_empty());
    }
}
