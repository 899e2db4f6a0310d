//! Opponent AI driven by the simulation timers.
//!
//! Each callback re-reads the world and issues the same orders a player
//! would (move, harvest, place, produce, attack). Decisions draw from a
//! dedicated seeded RNG, so a given seed replays the same game.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::behavior;
use crate::buildings;
use crate::entity::{BuildingKind, EntityId, ProductionState};
use crate::events::SimEvent;
use crate::factions::Faction;
use crate::math::{Fixed, Rect, Vec2Fixed};
use crate::world::WorldState;

/// Distance from the base at which the AI tries barracks sites.
const BARRACKS_SITE_DISTANCE: i32 = 150;

/// Timer-driven controller for one faction.
#[derive(Debug, Clone)]
pub struct AiScheduler {
    faction: Faction,
    rng: StdRng,
}

impl AiScheduler {
    /// Create a controller for `faction` with its own seed.
    #[must_use]
    pub fn new(faction: Faction, seed: u64) -> Self {
        Self {
            faction,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The faction this AI plays.
    #[must_use]
    pub const fn faction(&self) -> Faction {
        self.faction
    }

    /// Send idle workers harvesting, or wandering around home territory.
    pub fn harvest_tick(&mut self, world: &mut WorldState) {
        let chance = world.config().ai.harvest_chance;
        let territory = self.territory(world);

        let idle_workers: Vec<EntityId> = world
            .units(self.faction)
            .iter()
            .copied()
            .filter(|id| {
                world
                    .entities()
                    .unit(*id)
                    .is_some_and(|u| u.is_worker() && u.behavior.is_idle())
            })
            .collect();

        for worker in idle_workers {
            if self.rng.gen_bool(chance) {
                let nodes: Vec<EntityId> = world
                    .resources()
                    .iter()
                    .copied()
                    .filter(|id| {
                        world
                            .entities()
                            .resource(*id)
                            .is_some_and(|r| !r.is_depleted())
                    })
                    .collect();
                if let Some(&node) = nodes.choose(&mut self.rng) {
                    if behavior::order_harvest(world, worker, node).is_ok() {
                        continue;
                    }
                }
            }
            let x = random_between(&mut self.rng, territory.min.x, territory.max.x);
            let y = random_between(&mut self.rng, territory.min.y, territory.max.y);
            behavior::order_move(world, worker, Vec2Fixed::new(x, y));
        }
    }

    /// Where idle workers wander. The configured territory belongs to the
    /// enemy; a player-side AI uses its mirror image across the map center.
    fn territory(&self, world: &WorldState) -> Rect {
        let config = world.config();
        let home = config.ai.territory;
        match self.faction {
            Faction::Enemy => home,
            Faction::Player => {
                let far = config.map.bounds().max;
                Rect::from_corners(far - home.max, far - home.min)
            }
        }
    }

    /// Maybe build a barracks, then maybe start production somewhere.
    pub fn build_tick(&mut self, world: &mut WorldState) {
        let (barracks_chance, produce_chance) = {
            let ai = &world.config().ai;
            (ai.barracks_chance, ai.produce_chance)
        };

        if !self.has_building(world, BuildingKind::Barracks) && self.rng.gen_bool(barracks_chance)
        {
            self.try_place_barracks(world);
        }

        if !self.rng.gen_bool(produce_chance) {
            return;
        }
        let candidates: Vec<(EntityId, crate::entity::UnitKind)> = world
            .buildings(self.faction)
            .iter()
            .filter_map(|id| world.entities().building(*id))
            .filter(|b| b.is_built() && b.production == ProductionState::Idle)
            .filter_map(|b| b.produces.first().map(|unit| (b.id, *unit)))
            .collect();
        let Some(&(building, unit)) = candidates.choose(&mut self.rng) else {
            return;
        };
        match buildings::request_production(world, building, unit) {
            Ok(()) => tracing::debug!(building, unit = unit.name(), "AI started production"),
            Err(err) => tracing::debug!(building, %err, "AI production refused"),
        }
    }

    /// Launch an attack wave with a random share of the army.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn attack_wave(&mut self, world: &mut WorldState) {
        let (min_fraction, max_fraction) = {
            let ai = &world.config().ai;
            (ai.wave_min_fraction, ai.wave_max_fraction)
        };

        let mut army: Vec<EntityId> = world.units(self.faction).to_vec();
        if army.is_empty() {
            return;
        }
        army.shuffle(&mut self.rng);
        let fraction = if max_fraction > min_fraction {
            self.rng.gen_range(min_fraction..=max_fraction)
        } else {
            min_fraction
        };
        let count = ((army.len() as f64) * fraction).floor() as usize;
        if count == 0 {
            return;
        }

        let Some(target) = self.pick_wave_target(world) else {
            return;
        };
        let sent = army
            .into_iter()
            .take(count)
            .filter(|unit| behavior::order_attack(world, *unit, target).is_ok())
            .count();
        if sent > 0 {
            tracing::info!(units = sent, target, "AI attack wave launched");
            world.push_event(SimEvent::AttackWaveLaunched {
                faction: self.faction,
                units: sent,
                target,
            });
        }
    }

    /// Opposing base first, then any opposing building, then a random unit.
    fn pick_wave_target(&mut self, world: &WorldState) -> Option<EntityId> {
        let opposing = self.faction.opposing();
        let buildings = world.buildings(opposing);
        let base = buildings.iter().copied().find(|id| {
            world
                .entities()
                .building(*id)
                .is_some_and(|b| b.kind == BuildingKind::Base && !b.health.is_dead())
        });
        base.or_else(|| {
            buildings.iter().copied().find(|id| {
                world
                    .entities()
                    .building(*id)
                    .is_some_and(|b| !b.health.is_dead())
            })
        })
        .or_else(|| world.units(opposing).choose(&mut self.rng).copied())
    }

    fn has_building(&self, world: &WorldState, kind: BuildingKind) -> bool {
        world
            .buildings(self.faction)
            .iter()
            .filter_map(|id| world.entities().building(*id))
            .any(|b| b.kind == kind)
    }

    fn try_place_barracks(&mut self, world: &mut WorldState) {
        let Some(origin) = world
            .buildings(self.faction)
            .iter()
            .filter_map(|id| world.entities().building(*id))
            .find(|b| b.kind == BuildingKind::Base)
            .map(|b| b.position)
        else {
            return;
        };

        let d = Fixed::from_num(BARRACKS_SITE_DISTANCE);
        let mut sites = vec![
            Vec2Fixed::new(origin.x - d, origin.y),
            Vec2Fixed::new(origin.x, origin.y - d),
            Vec2Fixed::new(origin.x + d, origin.y),
            Vec2Fixed::new(origin.x, origin.y + d),
            Vec2Fixed::new(origin.x - d, origin.y - d),
            Vec2Fixed::new(origin.x + d, origin.y - d),
            Vec2Fixed::new(origin.x - d, origin.y + d),
            Vec2Fixed::new(origin.x + d, origin.y + d),
        ];
        sites.shuffle(&mut self.rng);

        let Some(site) = sites.into_iter().find(|p| world.can_place_building(*p)) else {
            tracing::debug!("AI found no barracks site");
            return;
        };
        match buildings::place_building(world, self.faction, BuildingKind::Barracks, site) {
            Ok(id) => tracing::info!(id, "AI placed barracks"),
            Err(err) => tracing::debug!(%err, "AI barracks placement refused"),
        }
    }
}

fn random_between<R: Rng>(rng: &mut R, low: Fixed, high: Fixed) -> Fixed {
    if high <= low {
        return low;
    }
    Fixed::from_bits(rng.gen_range(low.to_bits()..=high.to_bits()))
}
