//! Unit state machine: orders, per-tick progression and auto-engagement.
//!
//! ```text
//! Idle -> Moving -> Idle
//! Idle -> Attacking -> Idle
//! Idle -> Moving(harvest approach) -> Harvesting -> Idle
//! ```
//!
//! Issuing an order replaces whatever the unit was doing. Targets are
//! ids and are looked up again on every tick; a missing or dead target
//! (or a depleted node) sends the unit back to Idle.

use crate::entity::{BehaviorState, Entity, EntityId, Unit};
use crate::error::CommandError;
use crate::events::SimEvent;
use crate::factions::Faction;
use crate::math::{Fixed, Vec2Fixed};
use crate::world::WorldState;

/// Order a unit to walk to a point.
///
/// Destinations off the map are pulled onto its edge. Returns `false` if
/// the unit does not exist.
pub fn order_move(world: &mut WorldState, unit_id: EntityId, destination: Vec2Fixed) -> bool {
    let destination = world.config().map.bounds().clamp(destination);
    let Some(unit) = world.entities_mut().unit_mut(unit_id) else {
        return false;
    };
    unit.behavior = BehaviorState::Moving {
        destination,
        harvest_on_arrival: None,
    };
    true
}

/// Order a unit to attack an opposing unit or building.
///
/// A friendly or non-damageable target is refused without side effects.
/// A target that is gone or already dead is refused too, but the order
/// still cancels the unit's current action. When the target is already
/// in range and the attack cooldown allows, the first strike lands
/// immediately.
pub fn order_attack(
    world: &mut WorldState,
    unit_id: EntityId,
    target: EntityId,
) -> Result<(), CommandError> {
    let faction = world
        .entities()
        .unit(unit_id)
        .map(|u| u.faction)
        .ok_or(CommandError::EntityNotFound(unit_id))?;
    if let Err(err) = validate_attack_target(world, faction, target) {
        if is_target_gone(world, target) {
            set_idle(world, unit_id);
        }
        return Err(err);
    }

    if let Some(unit) = world.entities_mut().unit_mut(unit_id) {
        unit.behavior = BehaviorState::Attacking { target };
    }
    try_strike(world, unit_id, target);
    Ok(())
}

/// Check that `target` is something `faction` may attack.
pub fn validate_attack_target(
    world: &WorldState,
    faction: Faction,
    target: EntityId,
) -> Result<(), CommandError> {
    let entity = world
        .entities()
        .get(target)
        .ok_or(CommandError::EntityNotFound(target))?;
    match entity.faction() {
        None => Err(CommandError::InvalidTarget(target)),
        Some(owner) if owner == faction => Err(CommandError::FriendlyTarget),
        Some(_) if !entity.is_attackable() => Err(CommandError::InvalidTarget(target)),
        Some(_) => Ok(()),
    }
}

/// Whether `target` was removed or has no health left.
#[must_use]
pub fn is_target_gone(world: &WorldState, target: EntityId) -> bool {
    world
        .entities()
        .get(target)
        .map_or(true, |e| e.health().is_some_and(|h| h.is_dead()))
}

/// Order a worker to harvest a resource node.
///
/// Out of range, the worker first walks to the node and starts
/// harvesting on arrival.
pub fn order_harvest(
    world: &mut WorldState,
    unit_id: EntityId,
    node: EntityId,
) -> Result<(), CommandError> {
    let unit = world
        .entities()
        .unit(unit_id)
        .ok_or(CommandError::EntityNotFound(unit_id))?;
    if !unit.is_worker() {
        return Err(CommandError::NotAWorker(unit_id));
    }
    let unit_position = unit.position;

    let resource = world
        .entities()
        .resource(node)
        .ok_or(CommandError::NotAResource(node))?;
    if resource.is_depleted() {
        return Err(CommandError::ResourceDepleted(node));
    }
    let node_position = resource.position;
    let in_range = unit_position.within(node_position, world.config().harvest_range);
    let approach = world.config().map.bounds().clamp(node_position);

    if let Some(unit) = world.entities_mut().unit_mut(unit_id) {
        unit.behavior = if in_range {
            BehaviorState::Harvesting { node }
        } else {
            BehaviorState::Moving {
                destination: approach,
                harvest_on_arrival: Some(node),
            }
        };
    }
    if in_range {
        try_harvest(world, unit_id, node);
    }
    Ok(())
}

/// Advance every unit's action by `dt` seconds, in id order.
pub fn advance_units(world: &mut WorldState, dt: Fixed) {
    for id in world.entities().sorted_unit_ids() {
        let Some(unit) = world.entities().unit(id) else {
            continue;
        };
        if unit.health.is_dead() {
            continue;
        }

        let behavior = unit.behavior;
        match behavior {
            BehaviorState::Idle => {}
            BehaviorState::Moving {
                destination,
                harvest_on_arrival: None,
            } => advance_move(world, id, destination, dt),
            BehaviorState::Moving {
                harvest_on_arrival: Some(node),
                ..
            } => advance_harvest_approach(world, id, node, dt),
            BehaviorState::Attacking { target } => advance_attack(world, id, target, dt),
            BehaviorState::Harvesting { node } => advance_harvest(world, id, node),
        }
    }
}

fn advance_move(world: &mut WorldState, id: EntityId, destination: Vec2Fixed, dt: Fixed) {
    let epsilon = world.config().arrival_epsilon;
    let Some(unit) = world.entities_mut().unit_mut(id) else {
        return;
    };
    unit.position = unit
        .position
        .step_towards(destination, unit.stats.speed.saturating_mul(dt));
    if unit.position.distance_squared(destination) < epsilon.saturating_mul(epsilon) {
        unit.behavior = BehaviorState::Idle;
    }
}

fn advance_harvest_approach(world: &mut WorldState, id: EntityId, node: EntityId, dt: Fixed) {
    let Some((node_position, depleted)) = world
        .entities()
        .resource(node)
        .map(|r| (r.position, r.is_depleted()))
    else {
        set_idle(world, id);
        return;
    };
    if depleted {
        set_idle(world, id);
        return;
    }

    let range = world.config().harvest_range;
    let Some(unit) = world.entities_mut().unit_mut(id) else {
        return;
    };
    unit.position = unit
        .position
        .step_towards(node_position, unit.stats.speed.saturating_mul(dt));
    if unit.position.within(node_position, range) {
        unit.behavior = BehaviorState::Harvesting { node };
        tracing::debug!(unit = id, node, "Arrived at resource, harvesting");
    }
}

fn advance_attack(world: &mut WorldState, id: EntityId, target: EntityId, dt: Fixed) {
    let target_position = match world.entities().get(target) {
        Some(entity) if entity.is_attackable() => entity.position(),
        _ => {
            set_idle(world, id);
            return;
        }
    };

    let Some(unit) = world.entities().unit(id) else {
        return;
    };
    if unit.position.within(target_position, unit.stats.attack_range) {
        try_strike(world, id, target);
    } else if let Some(unit) = world.entities_mut().unit_mut(id) {
        unit.position = unit
            .position
            .step_towards(target_position, unit.stats.speed.saturating_mul(dt));
    }
}

fn advance_harvest(world: &mut WorldState, id: EntityId, node: EntityId) {
    let Some((node_position, depleted)) = world
        .entities()
        .resource(node)
        .map(|r| (r.position, r.is_depleted()))
    else {
        set_idle(world, id);
        return;
    };
    if depleted {
        set_idle(world, id);
        return;
    }

    let range = world.config().harvest_range;
    let Some(unit) = world.entities_mut().unit_mut(id) else {
        return;
    };
    if unit.position.within(node_position, range) {
        try_harvest(world, id, node);
    } else {
        unit.behavior = BehaviorState::Moving {
            destination: node_position,
            harvest_on_arrival: Some(node),
        };
    }
}

/// Land one attack if the target is in range and the cooldown has passed.
///
/// A killing blow (or a target that is already gone) returns the unit to
/// Idle. Returns the damage dealt.
fn try_strike(world: &mut WorldState, id: EntityId, target: EntityId) -> Option<u32> {
    let now = world.now();
    let target_position = match world.entities().get(target) {
        Some(entity) if entity.is_attackable() => entity.position(),
        _ => {
            set_idle(world, id);
            return None;
        }
    };

    let unit = world.entities().unit(id)?;
    if !unit.position.within(target_position, unit.stats.attack_range) || !unit.can_attack_at(now)
    {
        return None;
    }
    let damage = unit.stats.damage;

    let remaining_health = world.apply_damage(target, damage)?;
    if let Some(unit) = world.entities_mut().unit_mut(id) {
        unit.last_attack_at = Some(now);
        if remaining_health == 0 {
            unit.behavior = BehaviorState::Idle;
            if unit.priority_target == Some(target) {
                unit.priority_target = None;
            }
        }
    }
    world.push_event(SimEvent::AttackLanded {
        attacker: id,
        target,
        damage,
        remaining_health,
    });
    if remaining_health == 0 {
        tracing::debug!(attacker = id, target, "Target destroyed");
    }
    Some(damage)
}

/// Extract once if the harvest interval has passed.
///
/// Credits the worker's faction ledger (a no-op for unlimited ledgers)
/// and stops the worker when the node runs dry.
fn try_harvest(world: &mut WorldState, id: EntityId, node: EntityId) -> Option<u32> {
    let now = world.now();
    let interval = world.config().harvest_interval;
    let unit = world.entities().unit(id)?;
    if !unit.can_harvest_at(now, interval) {
        return None;
    }
    let (faction, requested) = (unit.faction, unit.stats.harvest_amount);

    let resource = world.entities_mut().resource_mut(node)?;
    let amount = resource.extract(requested);
    let remaining = resource.amount;

    world.ledger_mut(faction).credit(amount);
    if let Some(unit) = world.entities_mut().unit_mut(id) {
        unit.last_harvest_at = Some(now);
        if remaining == 0 {
            unit.behavior = BehaviorState::Idle;
        }
    }
    world.push_event(SimEvent::HarvestTick {
        worker: id,
        node,
        amount,
        remaining,
    });
    if remaining == 0 {
        tracing::info!(node, "Resource node depleted");
        world.push_event(SimEvent::ResourceDepleted { node });
    }
    Some(amount)
}

/// Drop whatever the unit is doing.
pub fn set_idle(world: &mut WorldState, id: EntityId) {
    if let Some(unit) = world.entities_mut().unit_mut(id) {
        unit.behavior = BehaviorState::Idle;
    }
}

/// Auto-engagement scan.
///
/// Every idle, auto-attacking combat unit looks for something to fight:
/// its priority target first (if still alive and within detection
/// range), otherwise the nearest opposing unit in range, lowest id on
/// ties. Engagement goes through [`order_attack`] like any other order.
pub fn scan_for_targets(world: &mut WorldState) {
    for id in world.entities().sorted_unit_ids() {
        let Some(unit) = world.entities().unit(id) else {
            continue;
        };
        if !unit.auto_engages() || !unit.behavior.is_idle() || unit.health.is_dead() {
            continue;
        }

        let Some(target) = pick_engagement_target(world, unit) else {
            continue;
        };
        if order_attack(world, id, target).is_ok() {
            tracing::debug!(unit = id, target, "Auto-engaging");
        }
    }
}

fn pick_engagement_target(world: &WorldState, unit: &Unit) -> Option<EntityId> {
    let range = unit.stats.detection_range;
    let opposing = unit.faction.opposing();

    if let Some(priority) = unit.priority_target {
        let in_range = world.entities().get(priority).is_some_and(|e| {
            e.faction() == Some(opposing)
                && e.is_attackable()
                && unit.position.within(e.position(), range)
        });
        if in_range {
            return Some(priority);
        }
    }

    world
        .units(opposing)
        .iter()
        .filter_map(|id| match world.entities().get(*id) {
            Some(Entity::Unit(other)) if !other.health.is_dead() => Some(other),
            _ => None,
        })
        .filter(|other| unit.position.within(other.position, range))
        .min_by_key(|other| (unit.position.distance_squared(other.position), other.id))
        .map(|other| other.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::entity::UnitKind;

    fn world() -> WorldState {
        WorldState::new(SimConfig::default()).unwrap()
    }

    fn at(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    #[test]
    fn test_move_arrives_and_idles() {
        let mut world = world();
        let worker = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(0, 0))
            .unwrap();
        assert!(order_move(&mut world, worker, at(100, 0)));

        // speed 100, so one second covers the whole trip
        advance_units(&mut world, Fixed::from_num(0.5));
        assert!(!world.entities().unit(worker).unwrap().behavior.is_idle());
        advance_units(&mut world, Fixed::from_num(0.5));

        let unit = world.entities().unit(worker).unwrap();
        assert!(unit.behavior.is_idle());
        assert_eq!(unit.position, at(100, 0));
    }

    #[test]
    fn test_attack_friendly_is_refused_without_change() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let friend = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(110, 100))
            .unwrap();

        let result = order_attack(&mut world, soldier, friend);
        assert_eq!(result, Err(CommandError::FriendlyTarget));
        assert!(world.entities().unit(soldier).unwrap().behavior.is_idle());
        assert_eq!(world.entities().unit(friend).unwrap().health.current, 50);
    }

    #[test]
    fn test_attack_resource_is_invalid() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let node = world.spawn_resource(at(110, 100), 500);
        assert_eq!(
            order_attack(&mut world, soldier, node),
            Err(CommandError::InvalidTarget(node))
        );
    }

    #[test]
    fn test_attack_in_range_strikes_immediately() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let enemy = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(130, 100))
            .unwrap();

        order_attack(&mut world, soldier, enemy).unwrap();
        assert_eq!(world.entities().unit(enemy).unwrap().health.current, 30);
    }

    #[test]
    fn test_attack_out_of_range_pursues() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let enemy = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(300, 100))
            .unwrap();

        order_attack(&mut world, soldier, enemy).unwrap();
        assert_eq!(world.entities().unit(enemy).unwrap().health.current, 50);

        advance_units(&mut world, Fixed::ONE);
        let unit = world.entities().unit(soldier).unwrap();
        assert_eq!(unit.position, at(180, 100));
        assert_eq!(unit.behavior, BehaviorState::Attacking { target: enemy });
    }

    #[test]
    fn test_attack_reverts_to_idle_when_target_vanishes() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let enemy = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(500, 100))
            .unwrap();
        order_attack(&mut world, soldier, enemy).unwrap();

        assert!(world.despawn(enemy));
        advance_units(&mut world, Fixed::from_num(0.1));
        assert!(world.entities().unit(soldier).unwrap().behavior.is_idle());
    }

    #[test]
    fn test_attack_on_dead_target_cancels_current_action() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let enemy = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(500, 100))
            .unwrap();
        assert!(order_move(&mut world, soldier, at(900, 900)));
        world.apply_damage(enemy, 50).unwrap();

        assert_eq!(
            order_attack(&mut world, soldier, enemy),
            Err(CommandError::InvalidTarget(enemy))
        );
        assert!(world.entities().unit(soldier).unwrap().behavior.is_idle());

        assert!(order_move(&mut world, soldier, at(900, 900)));
        assert!(world.despawn(enemy));
        assert_eq!(
            order_attack(&mut world, soldier, enemy),
            Err(CommandError::EntityNotFound(enemy))
        );
        assert!(world.entities().unit(soldier).unwrap().behavior.is_idle());
    }

    #[test]
    fn test_move_off_map_is_clamped_to_edge() {
        let mut world = world();
        let worker = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(100, 100))
            .unwrap();
        assert!(order_move(&mut world, worker, Vec2Fixed::new(Fixed::MIN, Fixed::ZERO)));
        assert_eq!(
            world.entities().unit(worker).unwrap().behavior,
            BehaviorState::Moving {
                destination: at(0, 0),
                harvest_on_arrival: None,
            }
        );

        for _ in 0..40 {
            advance_units(&mut world, Fixed::from_num(0.05));
        }
        let unit = world.entities().unit(worker).unwrap();
        assert!(unit.behavior.is_idle());
        assert!(unit.position.within(at(0, 0), Fixed::from_num(5)));
    }

    #[test]
    fn test_harvest_requires_worker() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(100, 100))
            .unwrap();
        let node = world.spawn_resource(at(110, 100), 500);
        assert_eq!(
            order_harvest(&mut world, soldier, node),
            Err(CommandError::NotAWorker(soldier))
        );
    }

    #[test]
    fn test_harvest_approach_then_extract() {
        let mut world = world();
        let worker = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(0, 0))
            .unwrap();
        let node = world.spawn_resource(at(200, 0), 500);
        order_harvest(&mut world, worker, node).unwrap();
        assert!(matches!(
            world.entities().unit(worker).unwrap().behavior,
            BehaviorState::Moving {
                harvest_on_arrival: Some(_),
                ..
            }
        ));

        // 170 units to cover before the node is within 30
        advance_units(&mut world, Fixed::ONE);
        advance_units(&mut world, Fixed::ONE);
        assert_eq!(
            world.entities().unit(worker).unwrap().behavior,
            BehaviorState::Harvesting { node }
        );

        world.advance_clock(Fixed::ONE);
        advance_units(&mut world, Fixed::ONE);
        assert_eq!(world.entities().resource(node).unwrap().amount, 480);
        assert_eq!(world.ledger(Faction::Player).balance(), 120);
    }

    #[test]
    fn test_enemy_harvest_does_not_touch_player_ledger() {
        let mut world = world();
        let worker = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(1600, 1600))
            .unwrap();
        let node = world.spawn_resource(at(1610, 1600), 500);
        order_harvest(&mut world, worker, node).unwrap();

        assert_eq!(world.entities().resource(node).unwrap().amount, 480);
        assert_eq!(world.ledger(Faction::Player).balance(), 100);
    }

    #[test]
    fn test_scan_prefers_priority_target() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(500, 500))
            .unwrap();
        let _near = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(600, 500))
            .unwrap();
        let far = world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(640, 500))
            .unwrap();
        world.entities_mut().unit_mut(soldier).unwrap().priority_target = Some(far);

        scan_for_targets(&mut world);
        assert_eq!(
            world.entities().unit(soldier).unwrap().behavior,
            BehaviorState::Attacking { target: far }
        );
    }

    #[test]
    fn test_scan_ignores_targets_beyond_detection() {
        let mut world = world();
        let soldier = world
            .spawn_unit(UnitKind::Soldier, Faction::Player, at(500, 500))
            .unwrap();
        world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(700, 500))
            .unwrap();

        scan_for_targets(&mut world);
        assert!(world.entities().unit(soldier).unwrap().behavior.is_idle());
    }

    #[test]
    fn test_workers_never_auto_engage() {
        let mut world = world();
        let worker = world
            .spawn_unit(UnitKind::Worker, Faction::Player, at(500, 500))
            .unwrap();
        world
            .spawn_unit(UnitKind::Worker, Faction::Enemy, at(510, 500))
            .unwrap();

        scan_for_targets(&mut world);
        assert!(world.entities().unit(worker).unwrap().behavior.is_idle());
    }
}
