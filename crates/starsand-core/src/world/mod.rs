//! World state - grains, the bottle, pouring and the simulation handle

mod clock;
mod emission;
mod grain;
mod pool;
pub mod rng_trait;
pub mod stats;
mod vessel;
#[allow(clippy::module_inception)]
mod world;

pub use clock::SimulationClock;
pub use emission::{EmissionController, EmittedCount, RespawnAnchor};
pub use grain::{Grain, GrainId, GrainSpawn, sphere_volume};
pub use pool::GrainPool;
pub use rng_trait::GrainRng;
pub use stats::{NoopStats, SimStats, StepCounters};
pub use vessel::{VesselBoundary, VesselParams};
pub use world::GrainSimulation;
