//! Physics: broad phase and the fixed-tick step

mod broad_phase;
mod physics;

pub use broad_phase::UniformGrid;
pub use physics::PhysicsStep;
