//! RNG trait abstraction for grain randomization
//!
//! Emission and shaking only need a handful of random shapes. Keeping them
//! behind a trait lets tests drive the simulation with any seeded `rand::Rng`.

use glam::{Quat, Vec2, Vec3};
use std::f32::consts::TAU;

/// Random number generator trait for spawning and disturbing grains
pub trait GrainRng {
    /// Generate random f32 in [0.0, 1.0)
    fn gen_f32(&mut self) -> f32;

    /// Generate random u32 in [0, upper)
    fn gen_below(&mut self, upper: u32) -> u32;

    /// Uniform value in [min, max)
    fn gen_between(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.gen_f32()
    }

    /// Uniform value in [-magnitude, magnitude)
    fn gen_signed(&mut self, magnitude: f32) -> f32 {
        (self.gen_f32() * 2.0 - 1.0) * magnitude
    }

    /// Uniform point on a disk of the given radius
    fn gen_in_disk(&mut self, radius: f32) -> Vec2 {
        let r = radius * self.gen_f32().sqrt();
        let theta = self.gen_f32() * TAU;
        Vec2::new(r * theta.cos(), r * theta.sin())
    }

    /// Each component uniform in [-magnitude, magnitude)
    fn gen_vec3(&mut self, magnitude: f32) -> Vec3 {
        Vec3::new(
            self.gen_signed(magnitude),
            self.gen_signed(magnitude),
            self.gen_signed(magnitude),
        )
    }

    /// Uniformly distributed unit quaternion (Shoemake)
    fn gen_rotation(&mut self) -> Quat {
        let u1 = self.gen_f32();
        let u2 = self.gen_f32() * TAU;
        let u3 = self.gen_f32() * TAU;
        let a = (1.0 - u1).sqrt();
        let b = u1.sqrt();
        Quat::from_xyzw(a * u2.sin(), a * u2.cos(), b * u3.sin(), b * u3.cos()).normalize()
    }
}

impl<T: ?Sized + rand::Rng> GrainRng for T {
    fn gen_f32(&mut self) -> f32 {
        rand::Rng::random(self)
    }

    fn gen_below(&mut self, upper: u32) -> u32 {
        if upper == 0 {
            0
        } else {
            rand::Rng::random_range(self, 0..upper)
        }
    }
}
