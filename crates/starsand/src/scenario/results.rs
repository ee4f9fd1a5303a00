//! Scenario run reports

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use starsand_core::StepCounters;

use super::verification::VerificationResult;

/// Wall-clock cost of the frames a scenario rendered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTiming {
    pub wall_ms: f64,
    pub ticks: u64,
    pub mean_frame_ms: f64,
    pub worst_frame_ms: f64,
}

impl FrameTiming {
    /// Fold per-frame samples (milliseconds) into a timing summary
    pub fn from_samples(samples: &[f64], ticks: u64, wall_ms: f64) -> Self {
        let (mean_frame_ms, worst_frame_ms) = if samples.is_empty() {
            (0.0, 0.0)
        } else {
            let sum: f64 = samples.iter().sum();
            (
                sum / samples.len() as f64,
                samples.iter().copied().fold(0.0, f64::max),
            )
        };
        Self {
            wall_ms,
            ticks,
            mean_frame_ms,
            worst_frame_ms,
        }
    }

    pub fn ms_per_tick(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.wall_ms / self.ticks as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ticks in {:.1}ms ({:.3}ms/tick) | frame mean {:.2}ms, worst {:.2}ms",
            self.ticks,
            self.wall_ms,
            self.ms_per_tick(),
            self.mean_frame_ms,
            self.worst_frame_ms
        )
    }
}

/// Outcome of one scenario run, saved as JSON next to the other reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub scenario_name: String,
    /// RFC 3339, UTC
    pub timestamp: String,
    pub passed: bool,
    pub frames_executed: usize,
    pub alive_grains: usize,
    /// Deepest grain-grain contact left by the final tick
    pub deepest_overlap: f32,
    /// Broken invariants first, then failed checks
    pub failures: Vec<VerificationResult>,
    pub log: Vec<String>,
    pub stats: StepCounters,
    pub timing: FrameTiming,
}

impl ExecutionReport {
    pub fn new(scenario_name: impl Into<String>) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            passed: false,
            frames_executed: 0,
            alive_grains: 0,
            deepest_overlap: 0.0,
            failures: Vec::new(),
            log: Vec::new(),
            stats: StepCounters::default(),
            timing: FrameTiming::default(),
        }
    }

    /// Write pretty JSON, creating the report directory if needed
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to encode report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))
    }

    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse report {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_keeps_counters() {
        let mut report = ExecutionReport::new("Pour");
        report.passed = true;
        report.frames_executed = 300;
        report.alive_grains = 500;
        report.deepest_overlap = 0.0015;
        report.stats.emitted = 500;
        report.failures.push(VerificationResult {
            passed: false,
            message: "[frame 12] grains 3 and 9 overlap".to_string(),
            actual_value: Some("0.02".to_string()),
        });

        let json = serde_json::to_string_pretty(&report).unwrap();
        assert!(json.contains("\"alive_grains\": 500"));
        assert!(json.contains("\"emitted\": 500"));

        let back: ExecutionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stats, report.stats);
        assert_eq!(back.failures.len(), 1);
        assert_eq!(back.deepest_overlap, 0.0015);
    }

    #[test]
    fn test_save_creates_report_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("pour.json");
        let report = ExecutionReport::new("Nested");
        report.save_json(&path).unwrap();

        let loaded = ExecutionReport::from_json(&path).unwrap();
        assert_eq!(loaded.timestamp, report.timestamp);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(ExecutionReport::from_json(&path).is_err());
    }

    #[test]
    fn test_frame_timing_from_samples() {
        let timing = FrameTiming::from_samples(&[1.0, 3.0, 2.0], 6, 12.0);
        assert_eq!(timing.mean_frame_ms, 2.0);
        assert_eq!(timing.worst_frame_ms, 3.0);
        assert_eq!(timing.ms_per_tick(), 2.0);
        assert!(timing.summary().starts_with("6 ticks"));

        let empty = FrameTiming::from_samples(&[], 0, 0.0);
        assert_eq!(empty.ms_per_tick(), 0.0);
        assert_eq!(empty.mean_frame_ms, 0.0);
    }
}
