//! Star-sand granular simulation core
//!
//! Grains are poured into an analytic bottle, collide with its wall and with
//! each other on a fixed timestep, and come out as one flat instance buffer
//! per rendered frame. [`GrainSimulation`] is the only handle a host needs.

pub mod config;
pub mod error;
pub mod render;
pub mod simulation;
pub mod world;

pub use config::{CapacityPolicy, ClockConfig, EmissionConfig, GrainConfig, PhysicsConfig, SimConfig};
pub use error::{SimError, SimResult};
pub use render::{GrainInstance, InstanceBuffer, InstanceSync};
pub use world::{GrainId, GrainPool, GrainSimulation, StepCounters, VesselBoundary, VesselParams};
