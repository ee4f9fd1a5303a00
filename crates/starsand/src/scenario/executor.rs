//! Scenario execution engine

use std::time::Instant;

use anyhow::{Context, Result, bail};
use glam::Vec3;
use starsand_core::GrainSimulation;
use starsand_core::world::GrainSpawn;

use super::actions::ScenarioAction;
use super::definition::ScenarioDefinition;
use super::results::{ExecutionReport, FrameTiming};
use super::verification::{VerificationCondition, VerificationResult};

/// Configuration for scenario executor
#[derive(Debug, Clone)]
pub struct ScenarioExecutorConfig {
    /// Frame delta for frame-stepping actions (seconds)
    pub frame_dt: f32,

    /// Verbose logging
    pub verbose: bool,
}

impl Default for ScenarioExecutorConfig {
    fn default() -> Self {
        Self {
            frame_dt: 1.0 / 60.0,
            verbose: false,
        }
    }
}

/// Executes scenario actions against a simulation
pub struct ScenarioExecutor {
    /// Configuration
    config: ScenarioExecutorConfig,

    /// Current frame counter
    frame_count: usize,

    /// Action execution log
    log: Vec<String>,

    /// Frame timings (milliseconds)
    frame_times: Vec<f64>,

    /// Invariants checked after every main-phase frame
    invariants: Vec<VerificationCondition>,

    /// First failure of each invariant, by index
    invariant_failures: Vec<Option<VerificationResult>>,
}

impl ScenarioExecutor {
    /// Create new executor with default config
    pub fn new() -> Self {
        Self::with_config(ScenarioExecutorConfig::default())
    }

    /// Create new executor with custom config
    pub fn with_config(config: ScenarioExecutorConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            log: Vec::new(),
            frame_times: Vec::new(),
            invariants: Vec::new(),
            invariant_failures: Vec::new(),
        }
    }

    /// Execute a complete scenario
    pub fn execute_scenario(
        &mut self,
        scenario: &ScenarioDefinition,
        sim: &mut GrainSimulation,
    ) -> Result<ExecutionReport> {
        let start_time = Instant::now();
        let start_ticks = sim.total_stats().ticks;
        let mut report = ExecutionReport::new(scenario.name.clone());

        self.log.clear();
        self.frame_count = 0;
        self.frame_times.clear();
        self.invariants.clear();
        self.invariant_failures.clear();

        self.log(&format!("Starting scenario: {}", scenario.name));
        self.log(&format!("Description: {}", scenario.description));

        if !scenario.setup.is_empty() {
            self.log(&format!("Running {} setup actions", scenario.setup.len()));
            for (idx, action) in scenario.setup.iter().enumerate() {
                if let Err(e) = self.execute_action(action, sim) {
                    let msg = format!("Setup action {} failed: {:#}", idx, e);
                    self.log(&msg);
                    report.log = self.log.clone();
                    return Err(anyhow::anyhow!(msg));
                }
            }
        }

        // Invariants only watch the main actions
        self.invariants = scenario.invariants.clone();
        self.invariant_failures = vec![None; self.invariants.len()];

        self.log(&format!("Running {} main actions", scenario.actions.len()));
        for (idx, action) in scenario.actions.iter().enumerate() {
            if let Err(e) = self.execute_action(action, sim) {
                let msg = format!("Action {} failed: {:#}", idx, e);
                self.log(&msg);
                report.log = self.log.clone();
                return Err(anyhow::anyhow!(msg));
            }
        }

        for failure in std::mem::take(&mut self.invariant_failures).into_iter().flatten() {
            self.log(&format!("  ✗ invariant broken: {}", failure.message));
            report.failures.push(failure);
        }
        self.invariants.clear();

        if !scenario.verify.is_empty() {
            self.log(&format!("Running {} verifications", scenario.verify.len()));
            for condition in &scenario.verify {
                let result = condition.evaluate(sim);
                self.log(&format!(
                    "  {} {}",
                    if result.passed { "✓" } else { "✗" },
                    result.message
                ));

                if !result.passed {
                    report.failures.push(result);
                }
            }
        }

        report.frames_executed = self.frame_count;
        report.alive_grains = sim.alive_count();
        report.stats = *sim.total_stats();
        report.deepest_overlap = sim.deepest_overlap();
        report.passed = report.failures.is_empty();
        report.timing = FrameTiming::from_samples(
            &self.frame_times,
            sim.total_stats().ticks.saturating_sub(start_ticks),
            start_time.elapsed().as_secs_f64() * 1000.0,
        );

        self.log(&format!(
            "Scenario complete: {} ({} frames, {:.1}ms)",
            if report.passed { "PASSED" } else { "FAILED" },
            self.frame_count,
            report.timing.wall_ms
        ));
        self.log(&format!("  Timing: {}", report.timing.summary()));
        report.log = self.log.clone();

        Ok(report)
    }

    /// Execute a single action
    fn execute_action(&mut self, action: &ScenarioAction, sim: &mut GrainSimulation) -> Result<()> {
        if self.config.verbose {
            self.log(&format!("[Frame {}] {:?}", self.frame_count, action));
        }

        match action {
            ScenarioAction::Pour { grains } => {
                sim.trigger_pour_grains(*grains);
                self.log(&format!(
                    "  Pour {} grains (target {})",
                    grains,
                    sim.emission().target_grains()
                ));
            }

            ScenarioAction::PourVolume { volume } => {
                sim.trigger_pour(*volume);
                self.log(&format!(
                    "  Pour volume {} (target {} grains)",
                    volume,
                    sim.emission().target_grains()
                ));
            }

            ScenarioAction::AdvanceFrames { frames } => {
                self.simulate_frames(sim, *frames, self.config.frame_dt);
                self.log(&format!("  Advanced {} frames", frames));
            }

            ScenarioAction::AdvanceSeconds { seconds } => {
                if !seconds.is_finite() || *seconds < 0.0 {
                    bail!("AdvanceSeconds needs a finite, non-negative duration, got {}", seconds);
                }
                let frames = (seconds / self.config.frame_dt).ceil() as u32;
                self.simulate_frames(sim, frames, self.config.frame_dt);
                self.log(&format!("  Advanced {}s ({} frames)", seconds, frames));
            }

            ScenarioAction::AdvanceFramesWithDt { frames, frame_dt } => {
                self.simulate_frames(sim, *frames, *frame_dt);
                self.log(&format!("  Advanced {} frames of {}s", frames, frame_dt));
            }

            ScenarioAction::AdvanceUntilSettled { max_frames } => {
                let mut frames = 0;
                while frames < *max_frames && sim.has_active_grains() {
                    self.simulate_frames(sim, 1, self.config.frame_dt);
                    frames += 1;
                }
                if sim.has_active_grains() {
                    self.log(&format!("  Still active after {} frames", frames));
                } else {
                    self.log(&format!("  Settled after {} frames", frames));
                }
            }

            ScenarioAction::WaitUntil {
                condition,
                timeout_frames,
            } => {
                self.wait_until(sim, condition, *timeout_frames)?;
            }

            ScenarioAction::Warmup { ticks } => {
                sim.warmup(*ticks);
                self.log(&format!("  Warmed up {} ticks", ticks));
            }

            ScenarioAction::Shake { strength } => {
                sim.shake(*strength);
                self.log(&format!("  Shook with strength {}", strength));
            }

            ScenarioAction::SettleAll => {
                sim.settle_all();
                self.log("  Froze every grain");
            }

            ScenarioAction::PlaceSettled { x, y, z } => {
                let id = sim
                    .place_settled(Vec3::new(*x, *y, *z))
                    .with_context(|| format!("Failed to place grain at ({}, {}, {})", x, y, z))?;
                self.log(&format!("  Placed settled grain {:?} at ({}, {}, {})", id, x, y, z));
            }

            ScenarioAction::DropGrain { x, y, z, radius } => {
                if !radius.is_finite() || *radius <= 0.0 {
                    bail!("DropGrain needs a positive radius, got {}", radius);
                }
                let spawn = GrainSpawn::at_rest(
                    Vec3::new(*x, *y, *z),
                    *radius,
                    sim.config().grains.density,
                );
                let id = sim
                    .spawn_grain(spawn)
                    .with_context(|| format!("Failed to drop grain at ({}, {}, {})", x, y, z))?;
                self.log(&format!("  Dropped grain {:?} at ({}, {}, {})", id, x, y, z));
            }

            ScenarioAction::Reset => {
                sim.reset();
                self.log("  Reset simulation");
            }

            ScenarioAction::Log { message } => {
                self.log(&format!("  [LOG] {}", message));
            }
        }

        Ok(())
    }

    /// Wait until condition is met
    fn wait_until(
        &mut self,
        sim: &mut GrainSimulation,
        condition: &VerificationCondition,
        timeout_frames: u32,
    ) -> Result<()> {
        for frame in 0..timeout_frames {
            let result = condition.evaluate(sim);

            if result.passed {
                self.log(&format!(
                    "  Condition met after {} frames: {}",
                    frame, result.message
                ));
                return Ok(());
            }

            self.simulate_frames(sim, 1, self.config.frame_dt);
        }

        let result = condition.evaluate(sim);
        if result.passed {
            self.log(&format!(
                "  Condition met after {} frames: {}",
                timeout_frames, result.message
            ));
            return Ok(());
        }
        bail!(
            "WaitUntil timed out after {} frames: {}",
            timeout_frames,
            result.message
        );
    }

    /// Render `frames` frames of `frame_dt` seconds each
    fn simulate_frames(&mut self, sim: &mut GrainSimulation, frames: u32, frame_dt: f32) {
        for _ in 0..frames {
            let frame_start = Instant::now();
            sim.advance_frame(frame_dt);
            let frame_time = frame_start.elapsed().as_secs_f64() * 1000.0;

            self.frame_times.push(frame_time);
            self.frame_count += 1;
            self.check_invariants(sim);
        }
    }

    fn check_invariants(&mut self, sim: &GrainSimulation) {
        for (condition, failure) in self.invariants.iter().zip(&mut self.invariant_failures) {
            if failure.is_some() {
                continue;
            }
            let result = condition.evaluate(sim);
            if !result.passed {
                log::warn!(
                    "Invariant broken at frame {}: {}",
                    self.frame_count,
                    result.message
                );
                *failure = Some(VerificationResult {
                    message: format!("[frame {}] {}", self.frame_count, result.message),
                    ..result
                });
            }
        }
    }

    fn log(&mut self, message: &str) {
        log::info!("{}", message);
        self.log.push(message.to_string());
    }
}

impl Default for ScenarioExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starsand_core::{SimConfig, VesselParams};

    fn scenario(actions: Vec<ScenarioAction>, verify: Vec<VerificationCondition>) -> ScenarioDefinition {
        ScenarioDefinition {
            name: "Test".to_string(),
            description: "Executor test".to_string(),
            simulation: None,
            setup: vec![],
            actions,
            verify,
            invariants: vec![],
        }
    }

    #[test]
    fn test_executor_basic() {
        let mut sim = GrainSimulation::initialize(VesselParams::default(), 50).unwrap();
        let mut executor = ScenarioExecutor::new();

        let action = ScenarioAction::PlaceSettled {
            x: 0.0,
            y: -1.0,
            z: 0.0,
        };
        executor.execute_action(&action, &mut sim).unwrap();
        assert_eq!(sim.alive_count(), 1);
    }

    #[test]
    fn test_pour_scenario_passes() {
        let mut sim = GrainSimulation::initialize(VesselParams::default(), 100).unwrap();
        let mut executor = ScenarioExecutor::new();
        let mut def = scenario(
            vec![
                ScenarioAction::Pour { grains: 30 },
                ScenarioAction::AdvanceSeconds { seconds: 2.0 },
            ],
            vec![
                VerificationCondition::AliveCount {
                    expected: 30,
                    tolerance: None,
                },
                VerificationCondition::GrainsInsideBottle,
            ],
        );
        def.invariants = vec![VerificationCondition::InstanceCountMatchesAlive];

        let report = executor.execute_scenario(&def, &mut sim).unwrap();
        assert!(report.passed, "{:#?}", report.failures);
        assert_eq!(report.frames_executed, 120);
        assert_eq!(report.alive_grains, 30);
        assert_eq!(report.stats.emitted, 30);
        assert!(report.timing.ticks > 0);
    }

    #[test]
    fn test_failed_verification_marks_report() {
        let mut sim = GrainSimulation::initialize(VesselParams::default(), 10).unwrap();
        let mut executor = ScenarioExecutor::new();
        let def = scenario(
            vec![ScenarioAction::AdvanceFrames { frames: 2 }],
            vec![VerificationCondition::AliveCount {
                expected: 5,
                tolerance: None,
            }],
        );

        let report = executor.execute_scenario(&def, &mut sim).unwrap();
        assert!(!report.passed);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_broken_invariant_is_reported_once() {
        let mut sim = GrainSimulation::initialize(VesselParams::default(), 10).unwrap();
        let mut executor = ScenarioExecutor::new();
        let mut def = scenario(
            vec![
                ScenarioAction::PlaceSettled {
                    x: 0.0,
                    y: -1.0,
                    z: 0.0,
                },
                ScenarioAction::AdvanceFrames { frames: 10 },
            ],
            vec![],
        );
        def.invariants = vec![VerificationCondition::AliveCount {
            expected: 0,
            tolerance: None,
        }];

        let report = executor.execute_scenario(&def, &mut sim).unwrap();
        assert!(!report.passed);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.starts_with("[frame 1]"));
    }

    #[test]
    fn test_wait_until_timeout_fails_action() {
        let mut sim = GrainSimulation::initialize(VesselParams::default(), 10).unwrap();
        let mut executor = ScenarioExecutor::new();
        let def = scenario(
            vec![ScenarioAction::WaitUntil {
                condition: VerificationCondition::AliveCount {
                    expected: 1,
                    tolerance: None,
                },
                timeout_frames: 5,
            }],
            vec![],
        );

        let err = executor.execute_scenario(&def, &mut sim).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_drop_grain_over_capacity_fails() {
        let config = SimConfig {
            capacity: 1,
            ..Default::default()
        };
        let mut sim = GrainSimulation::with_config(config).unwrap();
        let mut executor = ScenarioExecutor::new();
        let drop = ScenarioAction::DropGrain {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            radius: 0.07,
        };
        executor.execute_action(&drop, &mut sim).unwrap();
        assert!(executor.execute_action(&drop, &mut sim).is_err());
        assert_eq!(sim.alive_count(), 1);
    }

    #[test]
    fn test_reset_action_empties_simulation() {
        let mut sim = GrainSimulation::initialize(VesselParams::default(), 20).unwrap();
        let mut executor = ScenarioExecutor::new();
        let def = scenario(
            vec![
                ScenarioAction::Pour { grains: 10 },
                ScenarioAction::AdvanceFrames { frames: 60 },
                ScenarioAction::Reset,
                ScenarioAction::AdvanceFrames { frames: 1 },
            ],
            vec![VerificationCondition::AliveCount {
                expected: 0,
                tolerance: None,
            }],
        );
        let report = executor.execute_scenario(&def, &mut sim).unwrap();
        assert!(report.passed);
    }
}
