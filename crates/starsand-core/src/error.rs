//! Error taxonomy for the granular simulation

use thiserror::Error;

use crate::world::GrainId;

/// Errors raised by the simulation core
///
/// Only [`SimError::CapacityExceeded`] and [`SimError::InvalidVesselParams`]
/// ever reach the host. [`SimError::NumericalDivergence`] is consumed inside the
/// physics step, which resets the offending grain instead of failing the frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Pool has no free slot left for a new grain
    #[error("grain pool is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// Vessel dimensions rejected at construction time
    #[error("invalid vessel parameters: {0}")]
    InvalidVesselParams(String),

    /// A grain's state went non-finite during integration
    #[error("grain {id:?} diverged numerically")]
    NumericalDivergence { id: GrainId },
}

pub type SimResult<T> = Result<T, SimError>;
