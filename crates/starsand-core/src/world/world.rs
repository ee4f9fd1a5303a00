//! GrainSimulation - the handle a host drives once per rendered frame

use glam::Vec3;
use log::info;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use super::clock::SimulationClock;
use super::emission::EmissionController;
use super::grain::{GrainId, GrainSpawn};
use super::pool::GrainPool;
use super::rng_trait::GrainRng;
use super::stats::StepCounters;
use super::vessel::{VesselBoundary, VesselParams};
use crate::config::SimConfig;
use crate::error::SimResult;
use crate::render::{InstanceBuffer, InstanceSync, PALETTE_SIZE};
use crate::simulation::PhysicsStep;

/// Separates the shake/placement stream from the emission stream
const DISTURBANCE_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Push-out rounds tried when restoring a settled grain among the wall and the pile
const PLACEMENT_PROJECTIONS: usize = 8;

/// One star-sand bottle: grains, vessel, pouring, physics and output
pub struct GrainSimulation {
    config: SimConfig,
    pool: GrainPool,
    vessel: VesselBoundary,
    emission: EmissionController,
    physics: PhysicsStep,
    clock: SimulationClock,
    sync: InstanceSync,
    /// Randomness for shakes and restored grains
    rng: Xoshiro256StarStar,
    last_frame: StepCounters,
    totals: StepCounters,
}

impl GrainSimulation {
    /// Default tuning with the given bottle and pool size
    pub fn initialize(vessel: VesselParams, capacity: usize) -> SimResult<Self> {
        Self::with_config(SimConfig {
            vessel,
            capacity,
            ..Default::default()
        })
    }

    pub fn with_config(config: SimConfig) -> SimResult<Self> {
        let vessel = VesselBoundary::new(config.vessel)?;
        let emission = EmissionController::new(
            config.emission.clone(),
            config.grains.clone(),
            &vessel,
            config.seed,
        );
        let physics = PhysicsStep::new(config.physics.clone(), &config.grains);
        let clock = SimulationClock::new(config.clock.fixed_dt, config.clock.max_steps_per_frame)
            .with_max_frame_dt(config.clock.max_frame_dt);

        info!(
            "Star sand initialized: capacity {}, mouth at y={:.2} (r={:.2}), floor at y={:.2}",
            config.capacity,
            vessel.mouth_y(),
            vessel.mouth_radius(),
            vessel.floor_y()
        );

        let mut sim = Self {
            pool: GrainPool::new(config.capacity),
            rng: Xoshiro256StarStar::seed_from_u64(config.seed ^ DISTURBANCE_SEED_SALT),
            vessel,
            emission,
            physics,
            clock,
            sync: InstanceSync::new(),
            last_frame: StepCounters::default(),
            totals: StepCounters::default(),
            config,
        };

        if sim.config.emission.initial_fill_grains > 0 {
            sim.emission
                .raise_target_grains(sim.config.emission.initial_fill_grains);
        }

        Ok(sim)
    }

    /// Run the physics ticks this frame is owed, then sync instances
    ///
    /// Never fails; numerical trouble is repaired inside the step.
    pub fn advance_frame(&mut self, frame_dt: f32) -> &InstanceBuffer {
        let steps = self.clock.advance(frame_dt);
        let mut frame = StepCounters::default();
        for _ in 0..steps {
            self.tick(&mut frame);
        }
        self.last_frame = frame;
        self.totals.merge(&frame);
        self.sync.sync(&self.pool)
    }

    fn tick(&mut self, counters: &mut StepCounters) {
        let dt = self.clock.fixed_dt();
        let emitted = self
            .emission
            .tick(dt, self.clock.simulated_time(), &mut self.pool);
        counters.emitted += emitted.emitted as u64;
        counters.recycled += emitted.recycled as u64;
        counters.swept += emitted.swept as u64;

        let anchor = self.emission.respawn_anchor();
        self.physics
            .step(dt, &mut self.pool, &self.vessel, &anchor, counters);
        self.clock.count_tick();
        counters.ticks += 1;
    }

    /// Raise the fill target by a volume and wake the pile
    pub fn trigger_pour(&mut self, extra_fill_amount: f32) {
        self.emission.raise_target(extra_fill_amount);
        let woken = self.wake_all();
        info!(
            "Pour: target now {} grains ({} alive, {} woken)",
            self.emission.target_grains(),
            self.pool.alive_count(),
            woken
        );
    }

    /// Raise the fill target by a number of average grains
    pub fn trigger_pour_grains(&mut self, grains: u32) {
        let volume = grains as f32 * self.emission.average_grain_volume();
        self.trigger_pour(volume);
    }

    /// Remove every grain, zero the clock and forget the fill target
    pub fn reset(&mut self) {
        let removed = self.pool.alive_count();
        self.pool.clear();
        self.clock.reset();
        self.emission.reset(self.config.seed);
        self.rng = Xoshiro256StarStar::seed_from_u64(self.config.seed ^ DISTURBANCE_SEED_SALT);
        self.sync.clear();
        self.last_frame = StepCounters::default();
        self.totals = StepCounters::default();
        info!("Star sand reset, {} grains removed", removed);
    }

    /// Wake every grain and give it a random kick of up to `strength` m/s
    pub fn shake(&mut self, strength: f32) {
        let strength = if strength.is_finite() { strength.max(0.0) } else { 0.0 };
        let rng = &mut self.rng;
        let mut shaken = 0;
        self.pool.for_each_alive(|grain| {
            grain.wake();
            let kick = Vec3::new(
                rng.gen_signed(strength),
                rng.gen_f32() * strength,
                rng.gen_signed(strength),
            );
            grain.linear_velocity += kick;
            grain.angular_velocity += rng.gen_vec3(strength * 2.0);
            shaken += 1;
        });
        info!("Shake: {} grains disturbed (strength {:.2})", shaken, strength);
    }

    /// Run `ticks` physics ticks without rendering, e.g. to pre-settle a pile
    pub fn warmup(&mut self, ticks: u32) {
        let mut counters = StepCounters::default();
        for _ in 0..ticks {
            self.tick(&mut counters);
        }
        self.totals.merge(&counters);
        self.sync.sync(&self.pool);
    }

    /// Freeze every grain where it is
    pub fn settle_all(&mut self) {
        self.pool.for_each_alive(|grain| grain.freeze());
    }

    /// Drop a single grain in by hand, bypassing the pour target
    pub fn spawn_grain(&mut self, spawn: GrainSpawn) -> SimResult<GrainId> {
        self.pool.spawn(spawn)
    }

    /// Restore a grain at rest, pushed clear of the wall
    pub fn place_settled(&mut self, position: Vec3) -> SimResult<GrainId> {
        let grains = &self.config.grains;
        let radius = self
            .rng
            .gen_between(grains.radius_min, grains.radius_max.max(grains.radius_min));

        let mut position = position;
        let mut clear = false;
        for _ in 0..PLACEMENT_PROJECTIONS {
            let (distance, normal) = self.vessel.signed_distance(position);
            let mut moved = false;
            if distance < radius {
                position += normal * (radius - distance);
                moved = true;
            }
            for other in self.pool.iter_alive() {
                let delta = position - other.position;
                let reach = radius + other.radius;
                let dist = delta.length();
                if dist >= reach {
                    continue;
                }
                let away = if dist > f32::EPSILON { delta / dist } else { Vec3::Y };
                position += away * (reach - dist);
                moved = true;
            }
            if !moved {
                clear = true;
                break;
            }
        }

        let mut spawn = GrainSpawn::at_rest(position, radius, grains.density);
        spawn.orientation = self.rng.gen_rotation();
        spawn.color_index = self.rng.gen_below(PALETTE_SIZE as u32) as u8;
        // a grain still wedged between neighbours is left for the solver
        spawn.frozen = clear;
        self.pool.spawn(spawn)
    }

    /// Any alive grain still being simulated
    pub fn has_active_grains(&self) -> bool {
        self.pool.iter_alive().any(|grain| grain.is_active())
    }

    fn wake_all(&mut self) -> u32 {
        let mut woken = 0;
        self.pool.for_each_alive(|grain| {
            if grain.frozen {
                grain.wake();
                woken += 1;
            }
        });
        woken
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn pool(&self) -> &GrainPool {
        &self.pool
    }

    pub fn vessel(&self) -> &VesselBoundary {
        &self.vessel
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn emission(&self) -> &EmissionController {
        &self.emission
    }

    /// Buffer from the last sync
    pub fn instances(&self) -> &InstanceBuffer {
        self.sync.buffer()
    }

    pub fn alive_count(&self) -> usize {
        self.pool.alive_count()
    }

    pub fn fill_fraction(&self) -> f32 {
        self.emission.fill_fraction(&self.pool)
    }

    pub fn last_frame_stats(&self) -> &StepCounters {
        &self.last_frame
    }

    pub fn total_stats(&self) -> &StepCounters {
        &self.totals
    }

    /// Deepest grain-grain penetration left after the last tick
    pub fn deepest_overlap(&self) -> f32 {
        self.physics.deepest_overlap()
    }
}
