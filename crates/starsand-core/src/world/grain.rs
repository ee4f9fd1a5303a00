//! Grain state - one granular particle modelled as a sphere

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Stable index of a grain slot in the pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrainId(u32);

impl GrainId {
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Volume of a sphere with the given radius
pub fn sphere_volume(radius: f32) -> f32 {
    4.0 / 3.0 * PI * radius * radius * radius
}

/// Everything needed to bring a grain to life
#[derive(Clone, Debug, PartialEq)]
pub struct GrainSpawn {
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub radius: f32,
    pub mass: f32,
    /// Index into the star palette
    pub color_index: u8,
    /// Spawn already at rest (used when restoring a saved pile)
    pub frozen: bool,
}

impl GrainSpawn {
    /// Resting grain at `position` with mass derived from `density`
    pub fn at_rest(position: Vec3, radius: f32, density: f32) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            radius,
            mass: density * sphere_volume(radius),
            color_index: 0,
            frozen: false,
        }
    }
}

/// One simulated grain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grain {
    pub id: GrainId,
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub radius: f32,
    pub mass: f32,
    pub inverse_mass: f32,
    pub color_index: u8,
    pub alive: bool,
    /// Order of creation; lower is older
    pub spawn_sequence: u64,
    /// Settled grains are skipped by integration until woken
    pub frozen: bool,
    /// Consecutive ticks spent below the settle speed
    pub calm_ticks: u32,
    /// Ticks simulated since spawn or last wake
    pub active_ticks: u32,
}

impl Grain {
    pub(crate) fn from_spawn(id: GrainId, spawn: &GrainSpawn, spawn_sequence: u64) -> Self {
        let mass = spawn.mass.max(f32::EPSILON);
        let mut grain = Self {
            id,
            position: spawn.position,
            orientation: spawn.orientation.normalize(),
            linear_velocity: spawn.linear_velocity,
            angular_velocity: spawn.angular_velocity,
            radius: spawn.radius,
            mass,
            inverse_mass: 1.0 / mass,
            color_index: spawn.color_index,
            alive: true,
            spawn_sequence,
            frozen: false,
            calm_ticks: 0,
            active_ticks: 0,
        };
        if spawn.frozen {
            grain.freeze();
        }
        grain
    }

    /// Alive and not frozen
    #[inline]
    pub fn is_active(&self) -> bool {
        self.alive && !self.frozen
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.linear_velocity.length()
    }

    pub fn volume(&self) -> f32 {
        sphere_volume(self.radius)
    }

    /// Inverse mass seen by contacts: frozen grains behave as immovable
    #[inline]
    pub fn contact_inverse_mass(&self) -> f32 {
        if self.frozen { 0.0 } else { self.inverse_mass }
    }

    /// Put the grain to sleep, dropping any residual motion
    pub fn freeze(&mut self) {
        self.frozen = true;
        self.linear_velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }

    /// Resume simulating a frozen grain
    pub fn wake(&mut self) {
        self.frozen = false;
        self.calm_ticks = 0;
        self.active_ticks = 0;
    }

    /// All kinematic state is finite
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
            && self.orientation.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_volume() {
        assert!((sphere_volume(1.0) - 4.18879).abs() < 1e-4);
        assert_eq!(sphere_volume(0.0), 0.0);
    }

    #[test]
    fn test_from_spawn_normalizes_orientation() {
        let mut spawn = GrainSpawn::at_rest(Vec3::ZERO, 0.1, 1.0);
        spawn.orientation = Quat::from_xyzw(0.0, 0.0, 0.0, 2.0);
        let grain = Grain::from_spawn(GrainId::from_index(3), &spawn, 0);

        assert!((grain.orientation.length() - 1.0).abs() < 1e-6);
        assert_eq!(grain.id.index(), 3);
        assert!((grain.inverse_mass * grain.mass - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_freeze_and_wake() {
        let mut spawn = GrainSpawn::at_rest(Vec3::ZERO, 0.1, 1.0);
        spawn.linear_velocity = Vec3::new(1.0, 2.0, 3.0);
        let mut grain = Grain::from_spawn(GrainId::from_index(0), &spawn, 0);
        assert!(grain.is_active());

        grain.freeze();
        assert!(!grain.is_active());
        assert_eq!(grain.linear_velocity, Vec3::ZERO);
        assert_eq!(grain.contact_inverse_mass(), 0.0);

        grain.calm_ticks = 10;
        grain.wake();
        assert!(grain.is_active());
        assert_eq!(grain.calm_ticks, 0);
    }

    #[test]
    fn test_spawn_frozen() {
        let mut spawn = GrainSpawn::at_rest(Vec3::ONE, 0.05, 1.0);
        spawn.frozen = true;
        let grain = Grain::from_spawn(GrainId::from_index(1), &spawn, 7);
        assert!(grain.frozen);
        assert_eq!(grain.spawn_sequence, 7);
    }

    #[test]
    fn test_non_finite_detected() {
        let spawn = GrainSpawn::at_rest(Vec3::ZERO, 0.1, 1.0);
        let mut grain = Grain::from_spawn(GrainId::from_index(0), &spawn, 0);
        assert!(grain.is_finite());
        grain.position.y = f32::NAN;
        assert!(!grain.is_finite());
    }
}
