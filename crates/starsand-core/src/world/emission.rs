//! Emission controller - pours grains into the bottle mouth
//!
//! Pouring is driven by a fill target expressed in grain volume. While the
//! poured volume is below the target, grains are released at a capped rate
//! from a thin slab just above the mouth. The controller also sweeps away
//! grains that escaped far from the bottle.

use glam::Vec3;
use log::{debug, warn};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use crate::config::{CapacityPolicy, EmissionConfig, GrainConfig};
use crate::error::SimError;
use crate::render::PALETTE_SIZE;

use super::grain::{GrainId, GrainSpawn, sphere_volume};
use super::pool::GrainPool;
use super::rng_trait::GrainRng;
use super::vessel::VesselBoundary;

/// Clearance kept between spawned grains and the neck wall
const MOUTH_MARGIN: f32 = 0.01;

/// Golden angle, spreads respawned grains around the neck
const GOLDEN_ANGLE: f32 = 2.399_963;

/// What one emission tick did to the pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedCount {
    /// New grains spawned into free slots
    pub emitted: u32,
    /// New grains that replaced the oldest alive grain
    pub recycled: u32,
    /// Grains removed by the safety sweep
    pub swept: u32,
    /// Spawns dropped because the pool was full
    pub skipped: u32,
}

impl EmittedCount {
    pub fn spawned(&self) -> u32 {
        self.emitted + self.recycled
    }
}

/// Safe location inside the neck used to re-place diverged grains
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RespawnAnchor {
    center: Vec3,
    ring_radius: f32,
}

impl RespawnAnchor {
    /// Deterministic spot for a grain, spread on a ring so resets don't stack
    pub fn position_for(&self, id: GrainId) -> Vec3 {
        let angle = id.index() as f32 * GOLDEN_ANGLE;
        self.center + Vec3::new(angle.cos(), 0.0, angle.sin()) * self.ring_radius
    }
}

pub struct EmissionController {
    config: EmissionConfig,
    grains: GrainConfig,
    rng: Xoshiro256StarStar,
    /// Fill target in grain volume
    target_volume: f32,
    /// Fractional grains carried between ticks by the rate cap
    budget: f32,
    average_volume: f32,
    spawn_center: Vec3,
    spawn_radius: f32,
    sweep_center: Vec3,
    sweep_radius: f32,
    anchor: RespawnAnchor,
    /// Whether the last tick found the target reached
    satisfied: bool,
    completed_at: Option<f64>,
}

impl EmissionController {
    pub fn new(
        config: EmissionConfig,
        grains: GrainConfig,
        vessel: &VesselBoundary,
        seed: u64,
    ) -> Self {
        let spawn_radius =
            (vessel.mouth_radius() - grains.radius_max - MOUTH_MARGIN).max(0.0);
        let spawn_center = Vec3::new(
            0.0,
            vessel.mouth_y() + config.spawn_height + grains.radius_max,
            0.0,
        );
        let anchor = RespawnAnchor {
            center: spawn_center,
            ring_radius: spawn_radius * 0.5,
        };
        Self {
            average_volume: grains.average_volume(),
            sweep_center: vessel.center(),
            sweep_radius: config.safety_multiple.max(1.0) * vessel.bounding_radius(),
            config,
            grains,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            target_volume: 0.0,
            budget: 0.0,
            spawn_center,
            spawn_radius,
            anchor,
            satisfied: true,
            completed_at: None,
        }
    }

    /// Reseed and forget the fill target
    pub fn reset(&mut self, seed: u64) {
        self.rng = Xoshiro256StarStar::seed_from_u64(seed);
        self.clear_target();
    }

    pub fn target_volume(&self) -> f32 {
        self.target_volume
    }

    /// Grain count the current target corresponds to
    pub fn target_grains(&self) -> u32 {
        if self.average_volume > 0.0 {
            (self.target_volume / self.average_volume).round() as u32
        } else {
            0
        }
    }

    pub fn average_grain_volume(&self) -> f32 {
        self.average_volume
    }

    /// Raise the fill target by a volume
    pub fn raise_target(&mut self, extra_volume: f32) {
        if !extra_volume.is_finite() || extra_volume <= 0.0 {
            return;
        }
        self.target_volume += extra_volume;
        self.completed_at = None;
    }

    /// Raise the fill target by a number of average grains
    pub fn raise_target_grains(&mut self, grains: u32) {
        self.raise_target(grains as f32 * self.average_volume);
    }

    pub fn clear_target(&mut self) {
        self.target_volume = 0.0;
        self.budget = 0.0;
        self.satisfied = true;
        self.completed_at = None;
    }

    /// Poured volume over target, 1.0 when there is nothing left to pour
    pub fn fill_fraction(&self, pool: &GrainPool) -> f32 {
        if self.target_volume <= 0.0 {
            return 1.0;
        }
        (pool.alive_count() as f32 * self.average_volume / self.target_volume).min(1.0)
    }

    /// Simulated time at which the current target was last reached
    pub fn pour_completed_at(&self) -> Option<f64> {
        self.completed_at
    }

    pub fn respawn_anchor(&self) -> RespawnAnchor {
        self.anchor
    }

    /// Sweep escaped grains, then pour toward the target
    pub fn tick(&mut self, dt: f32, elapsed: f64, pool: &mut GrainPool) -> EmittedCount {
        let mut count = EmittedCount {
            swept: self.sweep(pool),
            ..Default::default()
        };

        let wanted = self.target_grains() as usize;
        let alive = pool.alive_count();
        if alive >= wanted {
            if !self.satisfied {
                self.satisfied = true;
                self.budget = 0.0;
                self.completed_at = Some(elapsed);
                debug!("Pour target of {} grains reached at t={:.2}s", wanted, elapsed);
            }
            return count;
        }
        self.satisfied = false;

        self.budget += self.config.rate.max(0.0) * dt.max(0.0);
        let remaining = wanted - alive;
        let due = (self.budget.floor() as usize).min(remaining);
        self.budget -= due as f32;

        let mut skipped_full = false;
        for _ in 0..due {
            let spawn = self.next_spawn();
            match pool.spawn(spawn.clone()) {
                Ok(_) => count.emitted += 1,
                Err(SimError::CapacityExceeded { .. }) => match self.config.capacity_policy {
                    CapacityPolicy::Skip => {
                        count.skipped += 1;
                        skipped_full = true;
                    }
                    CapacityPolicy::RecycleOldest => {
                        if pool.recycle_oldest(spawn).is_ok() {
                            count.recycled += 1;
                        } else {
                            count.skipped += 1;
                        }
                    }
                },
                Err(_) => count.skipped += 1,
            }
        }

        // A full pool cannot take more; don't bank rate for later
        if skipped_full {
            self.budget = self.budget.min(1.0);
        }

        count
    }

    fn next_spawn(&mut self) -> GrainSpawn {
        let radius = self
            .rng
            .gen_between(self.grains.radius_min, self.grains.radius_max.max(self.grains.radius_min));
        let offset = self.rng.gen_in_disk(self.spawn_radius);
        let lift = self.rng.gen_f32() * self.config.spawn_height_variance.max(0.0);
        let jitter = self.rng.gen_in_disk(self.config.horizontal_speed_jitter.max(0.0));

        GrainSpawn {
            position: self.spawn_center + Vec3::new(offset.x, lift, offset.y),
            orientation: self.rng.gen_rotation(),
            linear_velocity: Vec3::new(jitter.x, -self.config.initial_speed, jitter.y),
            angular_velocity: self.rng.gen_vec3(self.grains.spin),
            radius,
            mass: self.grains.density * sphere_volume(radius),
            color_index: self.rng.gen_below(PALETTE_SIZE as u32) as u8,
            frozen: false,
        }
    }

    fn sweep(&self, pool: &mut GrainPool) -> u32 {
        let center = self.sweep_center;
        let limit_sq = self.sweep_radius * self.sweep_radius;
        let escaped: Vec<GrainId> = pool
            .iter_alive()
            .filter(|grain| {
                !grain.position.is_finite() || grain.position.distance_squared(center) > limit_sq
            })
            .map(|grain| grain.id)
            .collect();

        for &id in &escaped {
            pool.despawn(id);
        }
        if !escaped.is_empty() {
            warn!("Safety sweep removed {} escaped grains", escaped.len());
        }
        escaped.len() as u32
    }
}
