//! Scenario definition and RON file loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use starsand_core::SimConfig;
use std::path::Path;

use super::actions::ScenarioAction;
use super::verification::VerificationCondition;

/// Top-level scenario definition loaded from RON files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    /// Scenario name
    pub name: String,

    /// Description
    pub description: String,

    /// Simulation settings for this scenario, replacing the host config
    #[serde(default)]
    pub simulation: Option<SimConfig>,

    /// Initial setup actions (run before main scenario)
    #[serde(default)]
    pub setup: Vec<ScenarioAction>,

    /// Main scenario actions
    pub actions: Vec<ScenarioAction>,

    /// Verification checks to run after scenario
    #[serde(default)]
    pub verify: Vec<VerificationCondition>,

    /// Checks that must hold after every frame of the main actions
    #[serde(default)]
    pub invariants: Vec<VerificationCondition>,
}

impl ScenarioDefinition {
    /// Load scenario from RON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;

        let scenario = ron::from_str(&content)
            .with_context(|| format!("Failed to parse RON scenario: {}", path.display()))?;

        Ok(scenario)
    }

    /// Simulation settings to run with: the scenario's own, else `fallback`
    pub fn simulation_config(&self, fallback: &SimConfig) -> SimConfig {
        self.simulation.clone().unwrap_or_else(|| fallback.clone())
    }

    /// Save scenario to RON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let ron = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("Failed to serialize scenario to RON")?;

        std::fs::write(path.as_ref(), ron).with_context(|| {
            format!("Failed to write scenario file: {}", path.as_ref().display())
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_serialization() {
        let scenario = ScenarioDefinition {
            name: "Test Scenario".to_string(),
            description: "A test scenario".to_string(),
            simulation: None,
            setup: vec![ScenarioAction::Pour { grains: 20 }],
            actions: vec![
                ScenarioAction::AdvanceFrames { frames: 60 },
                ScenarioAction::Log {
                    message: "Test message".to_string(),
                },
            ],
            verify: vec![VerificationCondition::AliveCount {
                expected: 20,
                tolerance: None,
            }],
            invariants: vec![],
        };

        let ron = ron::ser::to_string_pretty(&scenario, ron::ser::PrettyConfig::default()).unwrap();
        assert!(ron.contains("Test Scenario"));
        assert!(ron.contains("AdvanceFrames"));

        let deserialized: ScenarioDefinition = ron::from_str(&ron).unwrap();
        assert_eq!(deserialized.name, scenario.name);
        assert_eq!(deserialized.actions, scenario.actions);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shake.ron");
        let scenario = ScenarioDefinition {
            name: "Shake".to_string(),
            description: "Shake a settled pile".to_string(),
            simulation: Some(SimConfig {
                capacity: 64,
                ..Default::default()
            }),
            setup: vec![ScenarioAction::PlaceSettled {
                x: 0.0,
                y: -1.0,
                z: 0.0,
            }],
            actions: vec![ScenarioAction::Shake { strength: 1.0 }],
            verify: vec![],
            invariants: vec![],
        };
        scenario.to_file(&path).unwrap();

        let loaded = ScenarioDefinition::from_file(&path).unwrap();
        assert_eq!(loaded.simulation.map(|s| s.capacity), Some(64));
        assert_eq!(loaded.setup, scenario.setup);
    }

    #[test]
    fn test_bundled_scenarios_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
        let mut found = 0;
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|ext| ext == "ron") {
                ScenarioDefinition::from_file(&path)
                    .unwrap_or_else(|e| panic!("{}: {e:#}", path.display()));
                found += 1;
            }
        }
        assert!(found >= 3);
    }

    #[test]
    fn test_missing_file() {
        let err = ScenarioDefinition::from_file("no/such/scenario.ron").unwrap_err();
        assert!(err.to_string().contains("Failed to read scenario file"));
    }
}
