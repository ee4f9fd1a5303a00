//! Headless host for the star-sand simulation
//!
//! Loads layered configuration, runs RON scenarios against
//! `starsand_core::GrainSimulation` and writes JSON execution reports.

pub mod config;
pub mod scenario;

pub use config::{AppConfig, RunConfig};
pub use scenario::{
    ExecutionReport, ScenarioAction, ScenarioDefinition, ScenarioExecutor,
    ScenarioExecutorConfig, VerificationCondition,
};

use std::path::{Path, PathBuf};

/// Where a report for `scenario_name` goes inside `report_dir`
pub fn report_path(report_dir: impl AsRef<Path>, scenario_name: &str) -> PathBuf {
    let slug: String = scenario_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    report_dir.as_ref().join(format!("{}.json", slug))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_path_slug() {
        let path = report_path("reports", "Pour 500 Grains!");
        assert_eq!(path, Path::new("reports").join("pour_500_grains_.json"));
    }
}
