//! End-to-end properties of the star-sand simulation
//!
//! These drive `GrainSimulation` only through its public API, the way a
//! renderer host would.

use glam::Vec3;
use starsand_core::world::{GrainPool, GrainSpawn};
use starsand_core::{GrainSimulation, PhysicsConfig, SimConfig, SimError, VesselParams};

const DT: f32 = 1.0 / 60.0;

/// Slack allowed for the wall invariant after any tick
const WALL_EPSILON: f32 = 1e-3;

/// Slack allowed for grain-grain overlap after any tick
const PAIR_EPSILON: f32 = 0.01;

fn assert_no_wall_penetration(sim: &GrainSimulation) {
    for grain in sim.pool().iter_alive() {
        let (d, _) = sim.vessel().signed_distance(grain.position);
        assert!(
            d - grain.radius >= -WALL_EPSILON,
            "grain {:?} penetrates the wall by {}",
            grain.id,
            grain.radius - d
        );
    }
}

fn assert_no_pair_overlap(sim: &GrainSimulation) {
    let grains: Vec<_> = sim.pool().iter_alive().collect();
    for (i, a) in grains.iter().enumerate() {
        for b in &grains[i + 1..] {
            let dist = a.position.distance(b.position);
            assert!(
                dist >= a.radius + b.radius - PAIR_EPSILON,
                "grains {:?} and {:?} overlap by {}",
                a.id,
                b.id,
                a.radius + b.radius - dist
            );
        }
    }
}

// ============================================================================
// Pool capacity
// ============================================================================

#[test]
fn test_spawn_beyond_capacity_leaves_pool_unchanged() {
    let mut pool = GrainPool::new(2);
    pool.spawn(GrainSpawn::at_rest(Vec3::ZERO, 0.07, 1000.0)).unwrap();
    pool.spawn(GrainSpawn::at_rest(Vec3::X, 0.07, 1000.0)).unwrap();

    let before: Vec<_> = pool.iter_alive().cloned().collect();
    let result = pool.spawn(GrainSpawn::at_rest(Vec3::Y, 0.07, 1000.0));
    assert_eq!(result, Err(SimError::CapacityExceeded { capacity: 2 }));
    let after: Vec<_> = pool.iter_alive().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn test_pour_larger_than_capacity_never_exceeds_it() {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), 40).unwrap();
    sim.trigger_pour_grains(100);
    for _ in 0..120 {
        sim.advance_frame(DT);
        assert!(sim.alive_count() <= 40);
        assert_eq!(sim.instances().len(), sim.alive_count());
    }
    assert_eq!(sim.alive_count(), 40);
}

// ============================================================================
// Frame API
// ============================================================================

#[test]
fn test_reset_then_advance_is_empty() {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), 100).unwrap();
    sim.trigger_pour_grains(50);
    for _ in 0..60 {
        sim.advance_frame(DT);
    }
    assert!(sim.alive_count() > 0);

    sim.reset();
    assert_eq!(sim.advance_frame(DT).len(), 0);
    assert_eq!(sim.advance_frame(DT).len(), 0);
}

#[test]
fn test_sync_without_tick_is_idempotent() {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), 100).unwrap();
    sim.trigger_pour_grains(30);
    for _ in 0..45 {
        sim.advance_frame(DT);
    }

    let first = sim.instances().clone();
    let ticks = sim.clock().ticks();
    // A zero-length frame runs no tick but still syncs
    let second = sim.advance_frame(0.0).clone();
    assert_eq!(sim.clock().ticks(), ticks);
    assert_eq!(first, second);
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn test_hitch_is_capped() {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), 10).unwrap();
    sim.advance_frame(3.0);
    assert!(sim.clock().ticks() <= sim.config().clock.max_steps_per_frame as u64);
    sim.advance_frame(f32::NAN);
    sim.advance_frame(-1.0);
    assert!(sim.clock().ticks() <= sim.config().clock.max_steps_per_frame as u64);
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_same_seed_is_bit_identical() {
    let config = SimConfig {
        capacity: 200,
        seed: 1234,
        ..Default::default()
    };
    let mut a = GrainSimulation::with_config(config.clone()).unwrap();
    let mut b = GrainSimulation::with_config(config).unwrap();
    a.trigger_pour_grains(150);
    b.trigger_pour_grains(150);

    for _ in 0..180 {
        a.advance_frame(DT);
        b.advance_frame(DT);
    }

    let pa: Vec<_> = a.pool().iter_alive().map(|g| g.position.to_array()).collect();
    let pb: Vec<_> = b.pool().iter_alive().map(|g| g.position.to_array()).collect();
    assert_eq!(pa.len(), 150);
    assert_eq!(pa, pb);
    assert_eq!(a.instances().as_bytes(), b.instances().as_bytes());
}

#[test]
fn test_reset_replays_identically() {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), 100).unwrap();
    sim.trigger_pour_grains(40);
    for _ in 0..90 {
        sim.advance_frame(DT);
    }
    let first = sim.instances().clone();

    sim.reset();
    sim.trigger_pour_grains(40);
    for _ in 0..90 {
        sim.advance_frame(DT);
    }
    assert_eq!(&first, sim.instances());
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_single_grain_settles_on_flat_floor() {
    let config = SimConfig {
        vessel: VesselParams::cylinder(0.5, 2.0, 0.0),
        capacity: 1,
        physics: PhysicsConfig {
            restitution: 0.1,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut sim = GrainSimulation::with_config(config).unwrap();
    let height = 1.0;
    let id = sim
        .spawn_grain(GrainSpawn::at_rest(Vec3::new(0.0, height, 0.0), 0.07, 1000.0))
        .unwrap();

    for _ in 0..300 {
        sim.advance_frame(DT);
        assert_no_wall_penetration(&sim);
    }

    let grain = sim.pool().get(id).unwrap();
    assert!(grain.linear_velocity.y.abs() < 1e-3);
    let resting = sim.vessel().floor_y() + grain.radius;
    assert!(
        (grain.position.y - resting).abs() < 1e-3,
        "rests at {} instead of {}",
        grain.position.y,
        resting
    );
    assert!(!sim.has_active_grains());
}

#[test]
fn test_pour_500_grains_in_five_seconds() {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), 1000).unwrap();
    sim.trigger_pour_grains(500);

    for _ in 0..300 {
        sim.advance_frame(DT);
        assert_no_wall_penetration(&sim);
        assert_no_pair_overlap(&sim);
    }

    assert_eq!(sim.alive_count(), 500);
    assert_eq!(sim.instances().len(), 500);
    assert_eq!(sim.total_stats().divergence_resets, 0);
    assert!(sim.emission().pour_completed_at().is_some());
    for grain in sim.pool().iter_alive() {
        assert!(grain.position.y < sim.vessel().mouth_y());
    }
}

#[test]
fn test_pile_stays_separated_through_long_settle() {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), 1000).unwrap();
    sim.trigger_pour_grains(500);

    // 15 s: the pour, the forced freeze at 4.5 s of activity, and a long rest
    for frame in 0..900 {
        sim.advance_frame(DT);
        assert_no_wall_penetration(&sim);
        assert!(
            sim.deepest_overlap() <= PAIR_EPSILON,
            "frame {frame}: contact {} deep",
            sim.deepest_overlap()
        );
        if frame % 30 == 0 {
            assert_no_pair_overlap(&sim);
        }
    }

    assert_eq!(sim.alive_count(), 500);
    assert_no_pair_overlap(&sim);
    assert!(!sim.has_active_grains());
}

#[test]
fn test_shake_then_resettle_keeps_invariants() {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), 200).unwrap();
    sim.trigger_pour_grains(120);
    sim.warmup(240);
    assert_no_pair_overlap(&sim);
    sim.shake(1.5);
    for _ in 0..240 {
        sim.advance_frame(DT);
        assert_no_wall_penetration(&sim);
        assert_no_pair_overlap(&sim);
    }
    assert_eq!(sim.alive_count(), 120);
}

#[test]
fn test_settled_placement_among_pile_does_not_overlap() {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), 200).unwrap();
    sim.trigger_pour_grains(60);
    sim.warmup(300);
    sim.settle_all();

    let target = Vec3::new(0.0, sim.vessel().floor_y() + 0.08, 0.0);
    for _ in 0..20 {
        sim.place_settled(target).unwrap();
    }
    for _ in 0..60 {
        sim.advance_frame(DT);
        assert_no_pair_overlap(&sim);
    }
}
