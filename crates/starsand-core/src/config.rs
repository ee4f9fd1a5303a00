//! Simulation tuning
//!
//! Every value has a compiled default tuned for the star-sand bottle. Hosts
//! layer files and environment overrides on top (see the `starsand` crate).

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::world::VesselParams;

/// Complete configuration of one simulation instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub vessel: VesselParams,
    /// Maximum number of simultaneously alive grains
    pub capacity: usize,
    /// Seed for every random choice (spawn jitter, colors, shakes)
    pub seed: u64,
    pub physics: PhysicsConfig,
    pub emission: EmissionConfig,
    pub grains: GrainConfig,
    pub clock: ClockConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            vessel: VesselParams::default(),
            capacity: 1000,
            seed: 0x5EED_5A4D,
            physics: PhysicsConfig::default(),
            emission: EmissionConfig::default(),
            grains: GrainConfig::default(),
            clock: ClockConfig::default(),
        }
    }
}

/// Contact and integration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Acceleration applied to every active grain (m/s^2)
    pub gravity: Vec3,
    /// Fraction of linear velocity lost per second
    pub linear_damping: f32,
    /// Fraction of angular velocity lost per second
    pub angular_damping: f32,
    /// Normal velocity kept after an impact, in [0, 1)
    pub restitution: f32,
    /// Fraction of tangential velocity removed per contact, in [0, 1]
    pub friction: f32,
    /// Approach speeds below this resolve as resting contact (no bounce)
    pub bounce_threshold: f32,
    /// Mass-split relaxation passes over grain-grain contacts per tick
    pub solver_iterations: u32,
    /// Upper bound on contact passes per tick; passes beyond `solver_iterations`
    /// push load down the pile and stop once no contact is deeper than
    /// `overlap_tolerance`
    pub max_solver_iterations: u32,
    /// Grain-grain penetration accepted as resolved (m)
    pub overlap_tolerance: f32,
    /// Freeze grains that stay slow long enough
    pub sleeping: bool,
    /// Speed under which a grain counts as calm (m/s)
    pub settle_speed: f32,
    /// Consecutive calm ticks before a grain freezes
    pub settle_ticks: u32,
    /// Approach speed that wakes a frozen grain on contact (m/s)
    pub wake_speed: f32,
    /// Freeze grains after this many seconds of activity regardless of speed (0 disables)
    pub force_settle_secs: f32,
    /// Linear speed clamp (m/s)
    pub max_speed: f32,
    /// Angular speed clamp (rad/s)
    pub max_angular_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            linear_damping: 0.5,
            angular_damping: 0.3,
            restitution: 0.1,
            friction: 0.3,
            bounce_threshold: 0.5,
            solver_iterations: 4,
            max_solver_iterations: 16,
            overlap_tolerance: 0.002,
            sleeping: true,
            settle_speed: 0.05,
            settle_ticks: 30,
            wake_speed: 0.5,
            force_settle_secs: 4.5,
            max_speed: 20.0,
            max_angular_speed: 50.0,
        }
    }
}

/// What to do when the pool is full and the bottle still wants more grains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CapacityPolicy {
    /// Stop emitting until a slot frees up
    #[default]
    Skip,
    /// Replace the oldest grain with the new one
    RecycleOldest,
}

/// Pouring parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionConfig {
    /// Maximum grains emitted per second
    pub rate: f32,
    /// Height of the spawn region above the mouth
    pub spawn_height: f32,
    /// Random extra height added per grain
    pub spawn_height_variance: f32,
    /// Downward speed given to new grains (m/s)
    pub initial_speed: f32,
    /// Random horizontal speed given to new grains (m/s)
    pub horizontal_speed_jitter: f32,
    /// Grains further than this many bounding radii from the bottle are removed
    pub safety_multiple: f32,
    pub capacity_policy: CapacityPolicy,
    /// Grains poured right after initialization
    pub initial_fill_grains: u32,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            rate: 120.0,
            spawn_height: 0.25,
            spawn_height_variance: 0.2,
            initial_speed: 0.5,
            horizontal_speed_jitter: 0.1,
            safety_multiple: 4.0,
            capacity_policy: CapacityPolicy::Skip,
            initial_fill_grains: 0,
        }
    }
}

/// Size and material distribution of grains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrainConfig {
    pub radius_min: f32,
    pub radius_max: f32,
    /// Mass per unit volume
    pub density: f32,
    /// Maximum spin per axis given at spawn (rad/s)
    pub spin: f32,
}

impl Default for GrainConfig {
    fn default() -> Self {
        Self {
            radius_min: 0.05,
            radius_max: 0.07,
            density: 1000.0,
            spin: 2.5,
        }
    }
}

impl GrainConfig {
    /// Expected volume of a grain with radius uniform in `[radius_min, radius_max]`
    pub fn average_volume(&self) -> f32 {
        let (a, b) = (self.radius_min, self.radius_max);
        let mean_cube = if b > a {
            (b.powi(4) - a.powi(4)) / (4.0 * (b - a))
        } else {
            a.powi(3)
        };
        4.0 / 3.0 * std::f32::consts::PI * mean_cube
    }
}

/// Fixed-timestep clock parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Physics tick length (s)
    pub fixed_dt: f32,
    /// Upper bound on ticks run for one rendered frame
    pub max_steps_per_frame: u32,
    /// Frame deltas longer than this are clamped before accumulating (s)
    pub max_frame_dt: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_steps_per_frame: 5,
            max_frame_dt: 0.25,
        }
    }
}
