//! Physics step - one fixed tick of the granular simulation
//!
//! Phases, in order:
//! 1. integrate active grains (gravity, damping, position, orientation)
//! 2. resolve vessel contacts
//! 3. relax grain-grain contacts, each pass followed by a vessel pass:
//!    a few mass-split passes, then load-propagation passes that hold the
//!    lower grain of a supporting contact in place, until no contact is
//!    deeper than the overlap tolerance or the pass cap is hit
//! 4. repair non-finite or runaway grains
//! 5. freeze grains that have settled and sit clear of their neighbours
//!
//! Per-grain phases go through [`GrainPool::update_alive`] and may run in
//! parallel. Pair resolution is sequential in a fixed order (bottom-up by
//! height, then by id), so results do not depend on the thread count.

use glam::{Quat, Vec3};
use log::{trace, warn};

use crate::config::{GrainConfig, PhysicsConfig};
use crate::error::SimError;
use crate::world::{Grain, GrainId, GrainPool, RespawnAnchor, SimStats, VesselBoundary};

use super::broad_phase::UniformGrid;

/// Projections tried per grain in one vessel pass (corners need more than one)
const WALL_PROJECTIONS: usize = 4;

/// Centers closer than this use a fixed contact normal
const COINCIDENT_EPSILON: f32 = 1e-6;

/// Contacts whose normal is at least this vertical count as support
const SUPPORT_NORMAL_Y: f32 = 0.3;

/// A grain may freeze only while its deepest contact is within this many tolerances
const FREEZE_OVERLAP_FACTOR: f32 = 2.0;

/// Contact response parameters shared by wall and pair contacts
#[derive(Debug, Clone, Copy)]
struct ContactMaterial {
    restitution: f32,
    friction: f32,
    bounce_threshold: f32,
    wake_speed: f32,
    overlap_tolerance: f32,
}

impl From<&PhysicsConfig> for ContactMaterial {
    fn from(config: &PhysicsConfig) -> Self {
        Self {
            restitution: config.restitution.clamp(0.0, 0.99),
            friction: config.friction.clamp(0.0, 1.0),
            bounce_threshold: config.bounce_threshold.max(0.0),
            wake_speed: config.wake_speed.max(0.0),
            overlap_tolerance: config.overlap_tolerance.max(0.0),
        }
    }
}

/// How a solver pass splits a correction between two grains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassKind {
    /// By inverse mass
    Relax,
    /// Supporting contacts move only the upper grain; frozen grains still
    /// deep in contact are woken
    Propagate,
}

pub struct PhysicsStep {
    config: PhysicsConfig,
    material: ContactMaterial,
    grid: UniformGrid,
    contact_margin: f32,
    /// Candidate pairs, ordered bottom-up
    pairs: Vec<(GrainId, GrainId)>,
    /// Deepest pair penetration per grain slot after the last tick
    contact_depth: Vec<f32>,
    deepest_overlap: f32,
    last_passes: u32,
}

impl PhysicsStep {
    pub fn new(config: PhysicsConfig, grains: &GrainConfig) -> Self {
        let max_radius = grains.radius_max.max(grains.radius_min);
        let contact_margin = max_radius * 0.25;
        Self {
            material: ContactMaterial::from(&config),
            grid: UniformGrid::new(2.0 * max_radius + contact_margin),
            config,
            contact_margin,
            pairs: Vec::new(),
            contact_depth: Vec::new(),
            deepest_overlap: 0.0,
            last_passes: 0,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Deepest grain-grain penetration left after the last tick
    pub fn deepest_overlap(&self) -> f32 {
        self.deepest_overlap
    }

    /// Contact passes the last tick needed
    pub fn last_passes(&self) -> u32 {
        self.last_passes
    }

    /// Advance every alive grain by `dt`
    ///
    /// Never fails. Grains that go non-finite are put back at `anchor`.
    pub fn step<S: SimStats>(
        &mut self,
        dt: f32,
        pool: &mut GrainPool,
        vessel: &VesselBoundary,
        anchor: &RespawnAnchor,
        stats: &mut S,
    ) {
        if pool.is_empty() || dt.is_nan() || dt <= 0.0 {
            return;
        }

        self.integrate(dt, pool);

        let material = self.material;
        let mut wall_contacts = resolve_wall_contacts(pool, vessel, &material);

        self.collect_pairs(pool);
        let relax_passes = self.config.solver_iterations.max(1);
        let max_passes = self.config.max_solver_iterations.max(relax_passes);
        let mut passes = 0;
        for pass in 0..max_passes {
            let kind = if pass < relax_passes {
                PassKind::Relax
            } else {
                PassKind::Propagate
            };

            let mut touching = 0;
            let mut pass_deepest = 0.0f32;
            for &(a, b) in &self.pairs {
                if let Some(penetration) = resolve_pair(pool, a, b, &material, kind, stats) {
                    touching += 1;
                    pass_deepest = pass_deepest.max(penetration);
                }
            }
            stats.record_grain_contacts(touching);
            wall_contacts += resolve_wall_contacts(pool, vessel, &material);
            passes += 1;

            if pass_deepest <= material.overlap_tolerance {
                break;
            }
            // Large corrections can bring grains into reach of new neighbours
            if pass_deepest > self.contact_margin * 0.5 {
                self.collect_pairs(pool);
            }
        }
        stats.record_wall_contacts(wall_contacts);

        let resets = self.sanitize(pool, anchor);
        if resets > 0 {
            stats.record_divergence_resets(resets);
        }

        self.deepest_overlap = self.measure_contacts(pool);
        self.last_passes = passes;

        let frozen = self.settle(dt, pool);
        stats.record_freezes(frozen);

        trace!(
            "Physics tick: {} pairs, {} passes, deepest overlap {:.5}, {} wall contacts, {} frozen, {} resets",
            self.pairs.len(),
            passes,
            self.deepest_overlap,
            wall_contacts,
            frozen,
            resets
        );
    }

    /// Rebuild the grid and order candidate pairs bottom-up
    fn collect_pairs(&mut self, pool: &GrainPool) {
        self.grid.rebuild(pool);
        let pairs = self.grid.candidate_pairs(
            pool,
            self.contact_margin,
            self.material.overlap_tolerance,
        );
        self.pairs.clear();
        self.pairs.extend_from_slice(pairs);
        self.pairs.sort_by(|&(a0, b0), &(a1, b1)| {
            pair_height(pool, a0, b0)
                .total_cmp(&pair_height(pool, a1, b1))
                .then((a0, b0).cmp(&(a1, b1)))
        });
    }

    /// Record each grain's deepest pair penetration; returns the overall deepest
    fn measure_contacts(&mut self, pool: &GrainPool) -> f32 {
        self.contact_depth.clear();
        self.contact_depth.resize(pool.capacity(), 0.0);

        let mut deepest = 0.0f32;
        for &(a, b) in &self.pairs {
            let (Some(ga), Some(gb)) = (pool.get(a), pool.get(b)) else {
                continue;
            };
            let overlap = ga.radius + gb.radius - ga.position.distance(gb.position);
            if overlap.is_nan() || overlap <= 0.0 {
                continue;
            }
            for id in [a, b] {
                let depth = &mut self.contact_depth[id.index()];
                *depth = depth.max(overlap);
            }
            deepest = deepest.max(overlap);
        }
        deepest
    }

    fn integrate(&self, dt: f32, pool: &mut GrainPool) {
        let gravity = self.config.gravity;
        let linear_keep = (1.0 - self.config.linear_damping * dt).max(0.0);
        let angular_keep = (1.0 - self.config.angular_damping * dt).max(0.0);

        pool.update_alive(|grain| {
            if grain.frozen {
                return 0;
            }
            grain.linear_velocity += gravity * dt;
            grain.linear_velocity *= linear_keep;
            grain.angular_velocity *= angular_keep;
            grain.position += grain.linear_velocity * dt;
            grain.orientation =
                (Quat::from_scaled_axis(grain.angular_velocity * dt) * grain.orientation).normalize();
            1
        });
    }

    /// Reset diverged grains and clamp runaway speeds; returns the reset count
    fn sanitize(&self, pool: &mut GrainPool, anchor: &RespawnAnchor) -> u32 {
        let max_speed = self.config.max_speed;
        let max_angular_speed = self.config.max_angular_speed;
        let anchor = *anchor;

        pool.update_alive(|grain| match check_finite(grain) {
            Ok(()) => {
                grain.linear_velocity = grain.linear_velocity.clamp_length_max(max_speed);
                grain.angular_velocity = grain.angular_velocity.clamp_length_max(max_angular_speed);
                0
            }
            Err(err) => {
                warn!("{err}, resetting to spawn region");
                grain.position = anchor.position_for(grain.id);
                grain.linear_velocity = Vec3::ZERO;
                grain.angular_velocity = Vec3::ZERO;
                grain.orientation = Quat::IDENTITY;
                grain.wake();
                1
            }
        })
    }

    /// Advance settle bookkeeping and freeze calm grains; returns the freeze count
    ///
    /// A grain still pressed into a neighbour never freezes, forced or not.
    fn settle(&self, dt: f32, pool: &mut GrainPool) -> u32 {
        if !self.config.sleeping {
            return 0;
        }
        let settle_speed = self.config.settle_speed;
        let settle_ticks = self.config.settle_ticks.max(1);
        let force_ticks = if self.config.force_settle_secs > 0.0 {
            (self.config.force_settle_secs / dt).ceil() as u32
        } else {
            u32::MAX
        };
        let freeze_limit = self.material.overlap_tolerance * FREEZE_OVERLAP_FACTOR;
        let depth = &self.contact_depth;

        pool.update_alive(|grain| {
            if grain.frozen {
                return 0;
            }
            grain.active_ticks = grain.active_ticks.saturating_add(1);
            if grain.speed() < settle_speed {
                grain.calm_ticks += 1;
            } else {
                grain.calm_ticks = 0;
            }

            let clear = depth.get(grain.id.index()).copied().unwrap_or(0.0) <= freeze_limit;
            if clear && (grain.calm_ticks >= settle_ticks || grain.active_ticks >= force_ticks) {
                grain.freeze();
                1
            } else {
                0
            }
        })
    }
}

fn pair_height(pool: &GrainPool, a: GrainId, b: GrainId) -> f32 {
    match (pool.get(a), pool.get(b)) {
        (Some(ga), Some(gb)) => ga.position.y.min(gb.position.y),
        _ => f32::INFINITY,
    }
}

fn check_finite(grain: &Grain) -> Result<(), SimError> {
    if grain.is_finite() {
        Ok(())
    } else {
        Err(SimError::NumericalDivergence { id: grain.id })
    }
}

fn resolve_wall_contacts(
    pool: &mut GrainPool,
    vessel: &VesselBoundary,
    material: &ContactMaterial,
) -> u32 {
    pool.update_alive(|grain| resolve_wall(grain, vessel, material))
}

/// Push one grain out of the vessel wall and damp its velocity against it
fn resolve_wall(grain: &mut Grain, vessel: &VesselBoundary, material: &ContactMaterial) -> u32 {
    if grain.frozen || !grain.position.is_finite() {
        return 0;
    }

    let mut touched = 0;
    for _ in 0..WALL_PROJECTIONS {
        let (distance, normal) = vessel.signed_distance(grain.position);
        let penetration = grain.radius - distance;
        if penetration <= 0.0 {
            break;
        }
        grain.position += normal * penetration;
        touched = 1;

        let vn = grain.linear_velocity.dot(normal);
        if vn < 0.0 {
            let tangential = grain.linear_velocity - normal * vn;
            let bounce = if -vn > material.bounce_threshold {
                -vn * material.restitution
            } else {
                0.0
            };
            grain.linear_velocity = tangential * (1.0 - material.friction) + normal * bounce;
            grain.angular_velocity *= 1.0 - material.friction;
        }
    }
    touched
}

/// Separate two overlapping grains and exchange a normal impulse
///
/// Returns the penetration found before correcting, or `None` when the
/// grains do not touch. Frozen grains have zero contact inverse mass and stay
/// put unless woken: by a fast approach, by sitting deep inside another frozen
/// grain, or by a deep contact that survived the relax passes.
fn resolve_pair<S: SimStats>(
    pool: &mut GrainPool,
    a: GrainId,
    b: GrainId,
    material: &ContactMaterial,
    kind: PassKind,
    stats: &mut S,
) -> Option<f32> {
    let (ga, gb) = pool.pair_mut(a, b)?;

    let delta = gb.position - ga.position;
    let min_distance = ga.radius + gb.radius;
    let dist_sq = delta.length_squared();
    if dist_sq.is_nan() || dist_sq >= min_distance * min_distance {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > COINCIDENT_EPSILON {
        delta / dist
    } else {
        Vec3::Y
    };
    let penetration = min_distance - dist;

    // Negative when the grains move toward each other
    let vn = (gb.linear_velocity - ga.linear_velocity).dot(normal);
    let deep = penetration > material.overlap_tolerance;
    let wake = -vn > material.wake_speed
        || (deep && ga.frozen && gb.frozen)
        || (deep && kind == PassKind::Propagate);
    if wake {
        for grain in [&mut *ga, &mut *gb] {
            if grain.frozen {
                grain.wake();
                stats.record_wake();
            }
        }
    }

    let mut wa = ga.contact_inverse_mass();
    let mut wb = gb.contact_inverse_mass();
    if kind == PassKind::Propagate && normal.y.abs() >= SUPPORT_NORMAL_Y {
        // `normal` points from a to b: b is on top when it points up
        if normal.y > 0.0 && wb > 0.0 {
            wa = 0.0;
        } else if normal.y < 0.0 && wa > 0.0 {
            wb = 0.0;
        }
    }
    let total = wa + wb;
    if total <= 0.0 {
        return Some(penetration);
    }

    ga.position -= normal * (penetration * wa / total);
    gb.position += normal * (penetration * wb / total);

    if vn < 0.0 {
        let target = if -vn > material.bounce_threshold {
            -vn * material.restitution
        } else {
            0.0
        };
        let impulse = (target - vn) / total;
        ga.linear_velocity -= normal * (impulse * wa);
        gb.linear_velocity += normal * (impulse * wb);

        let relative = gb.linear_velocity - ga.linear_velocity;
        let slip = relative - normal * relative.dot(normal);
        let friction = slip * (material.friction / total);
        ga.linear_velocity += friction * wa;
        gb.linear_velocity -= friction * wb;
    }

    Some(penetration)
}
