//! Scripted headless runs of the star-sand simulation
//!
//! A scenario is a RON file listing setup actions, main actions and the
//! checks to run afterwards. The executor drives a `GrainSimulation` frame
//! by frame and produces an `ExecutionReport`.

pub mod actions;
pub mod definition;
pub mod executor;
pub mod results;
pub mod verification;

pub use actions::ScenarioAction;
pub use definition::ScenarioDefinition;
pub use executor::{ScenarioExecutor, ScenarioExecutorConfig};
pub use results::{ExecutionReport, FrameTiming};
pub use verification::{VerificationCondition, VerificationResult};
