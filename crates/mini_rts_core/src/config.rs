//! Simulation tuning.
//!
//! [`SimConfig::default`] reproduces the stock skirmish. Every field can be
//! overridden from a RON file; missing fields keep their defaults.

use serde::{Deserialize, Serialize};

use crate::entity::{BuildingKind, UnitKind};
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed, Rect, Vec2Fixed};
use crate::production::BlueprintRegistry;

/// Map dimensions and placement rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map width.
    #[serde(with = "fixed_serde")]
    pub width: Fixed,
    /// Map height.
    #[serde(with = "fixed_serde")]
    pub height: Fixed,
    /// Buildings must stay this far from the map edge.
    #[serde(with = "fixed_serde")]
    pub placement_margin: Fixed,
    /// Per-axis distance a new building must keep from every other building.
    #[serde(with = "fixed_serde")]
    pub building_clearance: Fixed,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: Fixed::from_num(2000),
            height: Fixed::from_num(2000),
            placement_margin: Fixed::from_num(50),
            building_clearance: Fixed::from_num(80),
        }
    }
}

impl MapConfig {
    /// The whole map.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect {
            min: Vec2Fixed::ZERO,
            max: Vec2Fixed::new(self.width, self.height),
        }
    }

    /// The area building centers may occupy.
    #[must_use]
    pub fn buildable_area(&self) -> Rect {
        Rect {
            min: Vec2Fixed::new(self.placement_margin, self.placement_margin),
            max: Vec2Fixed::new(
                self.width - self.placement_margin,
                self.height - self.placement_margin,
            ),
        }
    }
}

/// Half-extents used when picking an entity at a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickRadii {
    /// Units.
    #[serde(with = "fixed_serde")]
    pub unit: Fixed,
    /// Buildings.
    #[serde(with = "fixed_serde")]
    pub building: Fixed,
    /// Resource nodes.
    #[serde(with = "fixed_serde")]
    pub resource: Fixed,
}

impl Default for PickRadii {
    fn default() -> Self {
        Self {
            unit: Fixed::from_num(20),
            building: Fixed::from_num(40),
            resource: Fixed::from_num(30),
        }
    }
}

/// Opponent AI timers and odds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Whether the enemy AI runs at all.
    pub enabled: bool,
    /// Seed for AI decisions.
    pub seed: u64,
    /// Seconds between harvest/wander decisions.
    #[serde(with = "fixed_serde")]
    pub harvest_interval: Fixed,
    /// Seconds between build/produce decisions.
    #[serde(with = "fixed_serde")]
    pub build_interval: Fixed,
    /// Seconds between attack waves.
    #[serde(with = "fixed_serde")]
    pub attack_interval: Fixed,
    /// Chance an idle worker goes harvesting instead of wandering.
    pub harvest_chance: f64,
    /// Chance a build tick starts production.
    pub produce_chance: f64,
    /// Chance a build tick places a barracks when the AI has none.
    pub barracks_chance: f64,
    /// Smallest share of the army sent in a wave.
    pub wave_min_fraction: f64,
    /// Largest share of the army sent in a wave.
    pub wave_max_fraction: f64,
    /// Where idle AI workers wander.
    pub territory: Rect,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: 0x5eed_a1,
            harvest_interval: Fixed::ONE,
            build_interval: Fixed::from_num(15),
            attack_interval: Fixed::from_num(30),
            harvest_chance: 0.5,
            produce_chance: 0.5,
            barracks_chance: 0.5,
            wave_min_fraction: 0.1,
            wave_max_fraction: 0.5,
            territory: Rect {
                min: Vec2Fixed::from_ints(1600, 1600),
                max: Vec2Fixed::from_ints(1950, 1950),
            },
        }
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Map and placement rules.
    pub map: MapConfig,
    /// Player ledger at game start.
    pub starting_resources: u32,
    /// A plain move ends once the unit is closer than this.
    #[serde(with = "fixed_serde")]
    pub arrival_epsilon: Fixed,
    /// Workers harvest within this distance of a node.
    #[serde(with = "fixed_serde")]
    pub harvest_range: Fixed,
    /// Seconds between extractions of one worker.
    #[serde(with = "fixed_serde")]
    pub harvest_interval: Fixed,
    /// Income per constructed base per income interval.
    pub base_income: u32,
    /// Seconds between income credits.
    #[serde(with = "fixed_serde")]
    pub income_interval: Fixed,
    /// Seconds between auto-engagement scans.
    #[serde(with = "fixed_serde")]
    pub detection_interval: Fixed,
    /// Longest frame one tick advances; larger deltas are clamped.
    #[serde(with = "fixed_serde")]
    pub max_tick_dt: Fixed,
    /// Distance from a building at which produced units appear.
    #[serde(with = "fixed_serde")]
    pub spawn_offset: Fixed,
    /// Entity pick sizes.
    pub pick_radius: PickRadii,
    /// Seed for world randomness (spawn fallbacks).
    pub seed: u64,
    /// Enemy AI.
    pub ai: AiConfig,
    /// Unit and building definitions.
    pub blueprints: BlueprintRegistry,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            map: MapConfig::default(),
            starting_resources: 100,
            arrival_epsilon: Fixed::from_num(5),
            harvest_range: Fixed::from_num(30),
            harvest_interval: Fixed::ONE,
            base_income: 10,
            income_interval: Fixed::ONE,
            detection_interval: Fixed::from_num(0.5),
            max_tick_dt: Fixed::from_num(10),
            spawn_offset: Fixed::from_num(60),
            pick_radius: PickRadii::default(),
            seed: 0x0bad_5eed,
            ai: AiConfig::default(),
            blueprints: BlueprintRegistry::default(),
        }
    }
}

impl SimConfig {
    /// Parse a RON document and validate it.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "config".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()).map_err(|e| {
            GameError::DataParseError {
                path: "config".to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("map.width", self.map.width),
            ("map.height", self.map.height),
            ("arrival_epsilon", self.arrival_epsilon),
            ("harvest_interval", self.harvest_interval),
            ("income_interval", self.income_interval),
            ("detection_interval", self.detection_interval),
            ("max_tick_dt", self.max_tick_dt),
            ("ai.harvest_interval", self.ai.harvest_interval),
            ("ai.build_interval", self.ai.build_interval),
            ("ai.attack_interval", self.ai.attack_interval),
        ];
        for (name, value) in positive {
            if value <= Fixed::ZERO {
                return Err(invalid(format!("{name} must be positive, got {value}")));
            }
        }

        let non_negative = [
            ("map.placement_margin", self.map.placement_margin),
            ("map.building_clearance", self.map.building_clearance),
            ("harvest_range", self.harvest_range),
            ("spawn_offset", self.spawn_offset),
        ];
        for (name, value) in non_negative {
            if value < Fixed::ZERO {
                return Err(invalid(format!("{name} must not be negative, got {value}")));
            }
        }

        let two = Fixed::from_num(2);
        if self.map.placement_margin.saturating_mul(two) >= self.map.width.min(self.map.height) {
            return Err(invalid("map.placement_margin leaves no buildable area".to_string()));
        }

        let chances = [
            ("ai.harvest_chance", self.ai.harvest_chance),
            ("ai.produce_chance", self.ai.produce_chance),
            ("ai.barracks_chance", self.ai.barracks_chance),
            ("ai.wave_min_fraction", self.ai.wave_min_fraction),
            ("ai.wave_max_fraction", self.ai.wave_max_fraction),
        ];
        for (name, value) in chances {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        if self.ai.wave_min_fraction > self.ai.wave_max_fraction {
            return Err(invalid(
                "ai.wave_min_fraction must not exceed ai.wave_max_fraction".to_string(),
            ));
        }
        if !self.ai.territory.is_inside(&self.map.bounds()) {
            return Err(invalid("ai.territory must lie inside the map".to_string()));
        }

        for kind in UnitKind::ALL {
            let blueprint = self
                .blueprints
                .unit(kind)
                .ok_or_else(|| GameError::UnknownBlueprint(kind.name().to_string()))?;
            check_health(kind.name(), blueprint.health)?;
            let stats = &blueprint.stats;
            if stats.attack_speed <= Fixed::ZERO {
                return Err(invalid(format!("{} attack_speed must be positive", kind.name())));
            }
            if stats.speed < Fixed::ZERO || blueprint.build_time < Fixed::ZERO {
                return Err(invalid(format!(
                    "{} speed and build_time must not be negative",
                    kind.name()
                )));
            }
        }
        for kind in BuildingKind::ALL {
            let blueprint = self
                .blueprints
                .building(kind)
                .ok_or_else(|| GameError::UnknownBlueprint(kind.name().to_string()))?;
            check_health(kind.name(), blueprint.health)?;
            if blueprint.build_time < Fixed::ZERO {
                return Err(invalid(format!("{} build_time must not be negative", kind.name())));
            }
        }
        Ok(())
    }
}

/// Largest blueprint health accepted from data files.
pub const MAX_BLUEPRINT_HEALTH: u32 = 1_000_000;

fn check_health(name: &str, health: u32) -> Result<()> {
    if (1..=MAX_BLUEPRINT_HEALTH).contains(&health) {
        Ok(())
    } else {
        Err(invalid(format!(
            "{name} health must be within [1, {MAX_BLUEPRINT_HEALTH}], got {health}"
        )))
    }
}

fn invalid(message: String) -> GameError {
    GameError::InvalidConfig(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = SimConfig::from_ron_str("(base_income: 5, harvest_interval: 2.0)").unwrap();
        assert_eq!(config.base_income, 5);
        assert_eq!(config.harvest_interval, Fixed::from_num(2));
        assert_eq!(config.starting_resources, 100);
        assert_eq!(config.map, MapConfig::default());
    }

    #[test]
    fn test_ron_round_trip_of_defaults() {
        let config = SimConfig::default();
        let text = config.to_ron_string().unwrap();
        let parsed = SimConfig::from_ron_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let mut config = SimConfig::default();
        config.detection_interval = Fixed::ZERO;
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_max_tick_dt() {
        let mut config = SimConfig::default();
        config.max_tick_dt = Fixed::ZERO;
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_inverted_wave_fractions() {
        let mut config = SimConfig::default();
        config.ai.wave_min_fraction = 0.6;
        config.ai.wave_max_fraction = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_missing_blueprint() {
        let mut config = SimConfig::default();
        config.blueprints = BlueprintRegistry::empty();
        assert!(matches!(config.validate(), Err(GameError::UnknownBlueprint(_))));
    }

    #[test]
    fn test_rejects_unbounded_blueprint_health() {
        let mut config = SimConfig::default();
        let mut base = config.blueprints.building(BuildingKind::Base).unwrap().clone();
        base.health = 4_000_000_000;
        config.blueprints.register_building(base);
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_attack_speed() {
        let mut config = SimConfig::default();
        config
            .blueprints
            .unit_mut(UnitKind::Soldier)
            .unwrap()
            .stats
            .attack_speed = Fixed::ZERO;
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = SimConfig::from_ron_str("(base_income: \"lots\")").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { .. }));
    }
}
