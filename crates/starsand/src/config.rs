//! Host configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `starsand.ron` in the working directory, or the file passed with `--config`
//! 3. Environment variables prefixed with `STARSAND_`
//!
//! Example environment variable: `STARSAND_SIMULATION__PHYSICS__RESTITUTION=0.05`

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use starsand_core::SimConfig;

/// Everything the headless host needs
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimConfig,

    #[serde(default)]
    pub run: RunConfig,
}

/// Frame pacing and output settings for headless runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Frame delta fed to `advance_frame` (seconds)
    pub frame_dt: f32,
    /// Directory execution reports are written to
    pub report_dir: String,
    /// Log every scenario action as it runs
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frame_dt: 1.0 / 60.0,
            report_dir: "reports".to_string(),
            verbose: false,
        }
    }
}

impl AppConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. `starsand.ron` if present, or `path` which must then exist
    /// 3. Environment variables prefixed with `STARSAND_` (highest priority)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults =
            Config::try_from(&AppConfig::default()).context("Failed to encode default configuration")?;

        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Ron).required(true),
            None => File::with_name("starsand")
                .format(FileFormat::Ron)
                .required(false),
        };

        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .add_source(defaults)
            // Layer 2: Config file
            .add_source(file)
            // Layer 3: Environment variables (STARSAND_SIMULATION__CAPACITY, etc.)
            .add_source(
                Environment::with_prefix("STARSAND")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Pretty RON rendering of the effective configuration
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("Failed to serialize configuration to RON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.simulation.capacity, 1000);
        assert!((config.run.frame_dt - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(config.run.report_dir, "reports");
    }

    #[test]
    fn test_load_config_with_defaults() {
        // Should load defaults when no config file exists
        let config = AppConfig::load(None).expect("Failed to load config");
        assert_eq!(config.simulation.capacity, 1000);
        assert_eq!(config.simulation.physics.solver_iterations, 4);
        assert_eq!(config.simulation.vessel, starsand_core::VesselParams::default());
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".ron").tempfile().unwrap();
        writeln!(
            file,
            "(simulation: (capacity: 250, seed: 9, emission: (rate: 60.0)), run: (verbose: true))"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.simulation.capacity, 250);
        assert_eq!(config.simulation.seed, 9);
        assert_eq!(config.simulation.emission.rate, 60.0);
        assert!(config.run.verbose);
        // Untouched keys keep their defaults
        assert_eq!(config.simulation.grains.radius_max, 0.07);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("definitely/not/here.ron"))).is_err());
    }

    #[test]
    fn test_to_ron_round_trip() {
        let config = AppConfig::default();
        let ron = config.to_ron().unwrap();
        assert!(ron.contains("capacity"));
        let parsed: AppConfig = ron::from_str(&ron).unwrap();
        assert_eq!(parsed.simulation, config.simulation);
    }
}
