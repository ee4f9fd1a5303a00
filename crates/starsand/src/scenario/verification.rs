//! Verification conditions and state checks for scenarios

use serde::{Deserialize, Serialize};
use starsand_core::GrainSimulation;

/// Conditions that can be verified against simulation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VerificationCondition {
    // === POPULATION CHECKS ===
    /// Assert alive grain count
    AliveCount {
        expected: usize,
        tolerance: Option<usize>, // Allow ±N variance
    },

    /// Assert alive grain count within range
    AliveCountRange { min: usize, max: usize },

    /// Assert the bottle is at least this full, by fill target
    FillFraction { min: f32 },

    /// Assert the instance buffer mirrors the pool
    InstanceCountMatchesAlive,

    // === CONTAINMENT CHECKS ===
    /// Assert no grain pokes through the vessel wall by more than `epsilon`
    NoWallPenetration { epsilon: f32 },

    /// Assert no two grains overlap by more than `epsilon`
    NoPairOverlap { epsilon: f32 },

    /// Assert every grain centre lies below a height
    GrainsBelow { y: f32 },

    /// Assert every grain centre lies below the bottle mouth
    GrainsInsideBottle,

    // === MOTION CHECKS ===
    /// Assert every grain is frozen
    AllSettled,

    /// Assert whether any grain is still simulated
    HasActiveGrains { expected: bool },

    /// Assert no grain moves faster than `max` m/s
    MaxSpeed { max: f32 },

    /// Assert diverged grains were reset at most `max` times
    DivergenceResets { max: u64 },

    // === LOGICAL OPERATORS ===
    /// All conditions must pass
    All {
        conditions: Vec<VerificationCondition>,
    },

    /// Any condition must pass
    Any {
        conditions: Vec<VerificationCondition>,
    },

    /// Condition must NOT pass
    Not {
        condition: Box<VerificationCondition>,
    },
}

/// Result of a verification check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub message: String,
    pub actual_value: Option<String>, // For debugging
}

impl VerificationCondition {
    /// Evaluate condition against simulation state
    pub fn evaluate(&self, sim: &GrainSimulation) -> VerificationResult {
        match self {
            VerificationCondition::AliveCount {
                expected,
                tolerance,
            } => {
                let actual = sim.alive_count();
                let tol = tolerance.unwrap_or(0);
                let passed = actual >= expected.saturating_sub(tol) && actual <= expected + tol;

                VerificationResult {
                    passed,
                    message: format!("Alive grains: expected {}±{}, got {}", expected, tol, actual),
                    actual_value: Some(actual.to_string()),
                }
            }

            VerificationCondition::AliveCountRange { min, max } => {
                let actual = sim.alive_count();
                let passed = actual >= *min && actual <= *max;

                VerificationResult {
                    passed,
                    message: format!("Alive grains: expected {}-{}, got {}", min, max, actual),
                    actual_value: Some(actual.to_string()),
                }
            }

            VerificationCondition::FillFraction { min } => {
                let actual = sim.fill_fraction();
                VerificationResult {
                    passed: actual >= *min,
                    message: format!("Fill fraction: expected >= {:.2}, got {:.2}", min, actual),
                    actual_value: Some(format!("{:.3}", actual)),
                }
            }

            VerificationCondition::InstanceCountMatchesAlive => {
                let instances = sim.instances().len();
                let alive = sim.alive_count();
                VerificationResult {
                    passed: instances == alive,
                    message: format!("Instances: {} for {} alive grains", instances, alive),
                    actual_value: Some(instances.to_string()),
                }
            }

            VerificationCondition::NoWallPenetration { epsilon } => {
                let deepest = deepest_wall_penetration(sim);
                VerificationResult {
                    passed: deepest <= *epsilon,
                    message: format!(
                        "Wall penetration: deepest {:.5}, allowed {:.5}",
                        deepest, epsilon
                    ),
                    actual_value: Some(format!("{:.5}", deepest)),
                }
            }

            VerificationCondition::NoPairOverlap { epsilon } => {
                let deepest = deepest_pair_overlap(sim);
                VerificationResult {
                    passed: deepest <= *epsilon,
                    message: format!("Pair overlap: deepest {:.5}, allowed {:.5}", deepest, epsilon),
                    actual_value: Some(format!("{:.5}", deepest)),
                }
            }

            VerificationCondition::GrainsBelow { y } => grains_below(sim, *y, "height"),

            VerificationCondition::GrainsInsideBottle => {
                grains_below(sim, sim.vessel().mouth_y(), "mouth")
            }

            VerificationCondition::AllSettled => {
                let active = sim
                    .pool()
                    .iter_alive()
                    .filter(|grain| grain.is_active())
                    .count();
                VerificationResult {
                    passed: active == 0,
                    message: format!(
                        "All settled: {} of {} grains still active",
                        active,
                        sim.alive_count()
                    ),
                    actual_value: Some(active.to_string()),
                }
            }

            VerificationCondition::HasActiveGrains { expected } => {
                let actual = sim.has_active_grains();
                VerificationResult {
                    passed: actual == *expected,
                    message: format!("Has active grains: expected {}, got {}", expected, actual),
                    actual_value: Some(actual.to_string()),
                }
            }

            VerificationCondition::MaxSpeed { max } => {
                let fastest = sim
                    .pool()
                    .iter_alive()
                    .map(|grain| grain.speed())
                    .fold(0.0f32, f32::max);
                VerificationResult {
                    passed: fastest <= *max,
                    message: format!("Max speed: expected <= {:.3}, got {:.3}", max, fastest),
                    actual_value: Some(format!("{:.3}", fastest)),
                }
            }

            VerificationCondition::DivergenceResets { max } => {
                let actual = sim.total_stats().divergence_resets;
                VerificationResult {
                    passed: actual <= *max,
                    message: format!("Divergence resets: expected <= {}, got {}", max, actual),
                    actual_value: Some(actual.to_string()),
                }
            }

            VerificationCondition::All { conditions } => {
                let mut all_passed = true;
                let mut messages = Vec::new();

                for cond in conditions {
                    let result = cond.evaluate(sim);
                    if !result.passed {
                        all_passed = false;
                    }
                    messages.push(format!("  - {}", result.message));
                }

                VerificationResult {
                    passed: all_passed,
                    message: format!("All conditions:\n{}", messages.join("\n")),
                    actual_value: None,
                }
            }

            VerificationCondition::Any { conditions } => {
                let mut any_passed = false;
                let mut messages = Vec::new();

                for cond in conditions {
                    let result = cond.evaluate(sim);
                    if result.passed {
                        any_passed = true;
                    }
                    messages.push(format!("  - {}", result.message));
                }

                VerificationResult {
                    passed: any_passed,
                    message: format!("Any condition:\n{}", messages.join("\n")),
                    actual_value: None,
                }
            }

            VerificationCondition::Not { condition } => {
                let result = condition.evaluate(sim);
                VerificationResult {
                    passed: !result.passed,
                    message: format!("NOT ({})", result.message),
                    actual_value: result.actual_value,
                }
            }
        }
    }
}

/// How far the worst grain reaches past the wall (0 when none do)
fn deepest_wall_penetration(sim: &GrainSimulation) -> f32 {
    sim.pool()
        .iter_alive()
        .map(|grain| {
            let (distance, _) = sim.vessel().signed_distance(grain.position);
            grain.radius - distance
        })
        .fold(0.0f32, f32::max)
}

/// Worst pairwise overlap (0 when no spheres intersect)
fn deepest_pair_overlap(sim: &GrainSimulation) -> f32 {
    let grains: Vec<_> = sim.pool().iter_alive().collect();
    let mut deepest = 0.0f32;
    for (i, a) in grains.iter().enumerate() {
        for b in &grains[i + 1..] {
            let overlap = a.radius + b.radius - a.position.distance(b.position);
            deepest = deepest.max(overlap);
        }
    }
    deepest
}

fn grains_below(sim: &GrainSimulation, y: f32, label: &str) -> VerificationResult {
    let above = sim
        .pool()
        .iter_alive()
        .filter(|grain| grain.position.y >= y)
        .count();
    VerificationResult {
        passed: above == 0,
        message: format!("Grains below {} {:.3}: {} above", label, y, above),
        actual_value: Some(above.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use starsand_core::VesselParams;

    fn settled_pair() -> GrainSimulation {
        let mut sim = GrainSimulation::initialize(VesselParams::default(), 10).unwrap();
        let floor = sim.vessel().floor_y();
        sim.place_settled(Vec3::new(-0.2, floor + 0.1, 0.0)).unwrap();
        sim.place_settled(Vec3::new(0.2, floor + 0.1, 0.0)).unwrap();
        sim.advance_frame(0.0);
        sim
    }

    #[test]
    fn test_alive_count_tolerance() {
        let sim = settled_pair();
        let exact = VerificationCondition::AliveCount {
            expected: 2,
            tolerance: None,
        };
        assert!(exact.evaluate(&sim).passed);

        let loose = VerificationCondition::AliveCount {
            expected: 3,
            tolerance: Some(1),
        };
        assert!(loose.evaluate(&sim).passed);

        let wrong = VerificationCondition::AliveCount {
            expected: 5,
            tolerance: Some(1),
        };
        let result = wrong.evaluate(&sim);
        assert!(!result.passed);
        assert_eq!(result.actual_value.as_deref(), Some("2"));
    }

    #[test]
    fn test_containment_checks_on_placed_grains() {
        let sim = settled_pair();
        assert!(
            VerificationCondition::NoWallPenetration { epsilon: 1e-3 }
                .evaluate(&sim)
                .passed
        );
        assert!(
            VerificationCondition::NoPairOverlap { epsilon: 1e-3 }
                .evaluate(&sim)
                .passed
        );
        assert!(VerificationCondition::GrainsInsideBottle.evaluate(&sim).passed);
        assert!(VerificationCondition::InstanceCountMatchesAlive
            .evaluate(&sim)
            .passed);
    }

    #[test]
    fn test_settled_checks() {
        let sim = settled_pair();
        assert!(VerificationCondition::AllSettled.evaluate(&sim).passed);
        assert!(
            VerificationCondition::HasActiveGrains { expected: false }
                .evaluate(&sim)
                .passed
        );
        assert!(VerificationCondition::MaxSpeed { max: 0.0 }.evaluate(&sim).passed);
    }

    #[test]
    fn test_logical_operators() {
        let sim = settled_pair();
        let pass = VerificationCondition::AliveCountRange { min: 1, max: 2 };
        let fail = VerificationCondition::AliveCountRange { min: 3, max: 4 };

        let all = VerificationCondition::All {
            conditions: vec![pass.clone(), fail.clone()],
        };
        assert!(!all.evaluate(&sim).passed);

        let any = VerificationCondition::Any {
            conditions: vec![pass.clone(), fail.clone()],
        };
        assert!(any.evaluate(&sim).passed);

        let not = VerificationCondition::Not {
            condition: Box::new(fail),
        };
        assert!(not.evaluate(&sim).passed);
    }

    #[test]
    fn test_tagged_ron_format() {
        let parsed: VerificationCondition =
            ron::from_str("(type: \"NoWallPenetration\", epsilon: 0.001)").unwrap();
        assert_eq!(
            parsed,
            VerificationCondition::NoWallPenetration { epsilon: 0.001 }
        );
    }
}
