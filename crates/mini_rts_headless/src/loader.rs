//! Loading simulation configuration and scenarios from RON files.
//!
//! Both files are optional on the command line: a missing `--config`
//! means [`SimConfig::default`], a missing `--scenario` means the stock
//! skirmish.

use std::fs;
use std::path::{Path, PathBuf};

use mini_rts_core::config::SimConfig;
use mini_rts_core::scenario::Scenario;
use mini_rts_core::simulation::Simulation;

use crate::error::{HeadlessError, Result};

/// Configuration and scenario for one or more games.
#[derive(Debug, Clone, Default)]
pub struct GameSetup {
    /// Simulation tuning.
    pub config: SimConfig,
    /// Initial map.
    pub scenario: Scenario,
}

impl GameSetup {
    /// Default configuration on the stock skirmish.
    #[must_use]
    pub fn skirmish() -> Self {
        Self {
            config: SimConfig::default(),
            scenario: Scenario::skirmish(),
        }
    }

    /// Load whichever files are given, defaulting the rest.
    pub fn from_paths(config: Option<&Path>, scenario: Option<&Path>) -> Result<Self> {
        let config = config.map_or_else(|| Ok(SimConfig::default()), load_config)?;
        let scenario = scenario.map_or_else(|| Ok(Scenario::skirmish()), load_scenario)?;
        Ok(Self { config, scenario })
    }

    /// The same setup with both RNG streams derived from `seed`.
    #[must_use]
    pub fn with_seed(&self, seed: u64) -> Self {
        let mut setup = self.clone();
        setup.config.seed = seed;
        setup.config.ai.seed = seed.rotate_left(17) ^ 0x9e37_79b9_7f4a_7c15;
        setup
    }

    /// Build a fresh simulation.
    pub fn simulation(&self) -> Result<Simulation> {
        Ok(Simulation::from_scenario(
            self.config.clone(),
            &self.scenario,
        )?)
    }
}

/// Read and validate a [`SimConfig`] RON file.
pub fn load_config(path: &Path) -> Result<SimConfig> {
    let source = read(path)?;
    let config = SimConfig::from_ron_str(&source).map_err(|source| HeadlessError::Data {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Read a [`Scenario`] RON file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let source = read(path)?;
    let scenario = Scenario::from_ron_str(&source).map_err(|source| HeadlessError::Data {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        path = %path.display(),
        name = %scenario.name,
        units = scenario.units.len(),
        buildings = scenario.buildings.len(),
        "Loaded scenario"
    );
    Ok(scenario)
}

/// Render a scenario as a pretty RON document that [`load_scenario`]
/// reads back.
pub fn scenario_to_ron(scenario: &Scenario) -> Result<String> {
    Ok(ron::ser::to_string_pretty(
        scenario,
        ron::ser::PrettyConfig::default(),
    )?)
}

fn read(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(HeadlessError::FileNotFound(PathBuf::from(path)));
    }
    fs::read_to_string(path).map_err(|source| HeadlessError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use mini_rts_core::error::GameError;
    use tempfile::NamedTempFile;

    fn ron_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_paths() {
        let setup = GameSetup::from_paths(None, None).unwrap();
        assert_eq!(setup.config, SimConfig::default());
        assert_eq!(setup.scenario.units.len(), 10);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let file = ron_file("(starting_resources: 250, ai: (enabled: false))");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.starting_resources, 250);
        assert!(!config.ai.enabled);
        assert_eq!(config.base_income, SimConfig::default().base_income);
    }

    #[test]
    fn test_invalid_config_is_data_error() {
        let file = ron_file("(harvest_interval: 0.0)");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(
            err,
            HeadlessError::Data {
                source: GameError::InvalidConfig(_),
                ..
            }
        ));
    }

    #[test]
    fn test_unparseable_scenario() {
        let file = ron_file("(units: [oops");
        let err = load_scenario(file.path()).unwrap_err();
        assert!(matches!(
            err,
            HeadlessError::Data {
                source: GameError::DataParseError { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.ron");
        assert!(matches!(
            GameSetup::from_paths(Some(&path), None),
            Err(HeadlessError::FileNotFound(p)) if p == path
        ));
    }

    #[test]
    fn test_scenario_file_builds_simulation() {
        let file = ron_file(
            r#"(
                name: "duel",
                units: [
                    (faction: player, kind: soldier, position: (x: 100.0, y: 100.0)),
                    (faction: enemy, kind: soldier, position: (x: 300.0, y: 100.0)),
                ],
            )"#,
        );
        let setup = GameSetup::from_paths(None, Some(file.path())).unwrap();
        let sim = setup.simulation().unwrap();
        assert_eq!(sim.world().entities().len(), 2);
    }

    #[test]
    fn test_rendered_skirmish_loads_back() {
        let text = scenario_to_ron(&Scenario::skirmish()).unwrap();
        let file = ron_file(&text);
        assert_eq!(load_scenario(file.path()).unwrap(), Scenario::skirmish());
    }

    #[test]
    fn test_with_seed_changes_both_streams() {
        let base = GameSetup::skirmish();
        let a = base.with_seed(1);
        let b = base.with_seed(2);
        assert_ne!(a.config.seed, b.config.seed);
        assert_ne!(a.config.ai.seed, b.config.ai.seed);
        assert_eq!(a.config.ai.seed, base.with_seed(1).config.ai.seed);
    }
}
