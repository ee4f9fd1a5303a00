//! Scenario actions - the host-side commands a scenario can issue

use serde::{Deserialize, Serialize};

use super::verification::VerificationCondition;

/// One step of a scenario, applied to a `GrainSimulation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScenarioAction {
    /// Raise the pour target by a number of average grains
    Pour { grains: u32 },

    /// Raise the pour target by a volume
    PourVolume { volume: f32 },

    /// Advance rendered frames of the configured frame length
    AdvanceFrames { frames: u32 },

    /// Advance frames until `seconds` of frame time have passed
    AdvanceSeconds { seconds: f32 },

    /// Advance frames with a custom delta (hitch and pacing tests)
    AdvanceFramesWithDt { frames: u32, frame_dt: f32 },

    /// Advance frames until every grain is frozen or `max_frames` is hit
    AdvanceUntilSettled { max_frames: u32 },

    /// Advance frames until a condition holds; fails after `timeout_frames`
    WaitUntil {
        condition: VerificationCondition,
        timeout_frames: u32,
    },

    /// Run physics ticks without rendering
    Warmup { ticks: u32 },

    /// Wake every grain and kick it randomly
    Shake { strength: f32 },

    /// Freeze every grain in place
    SettleAll,

    /// Restore a frozen grain at a position
    PlaceSettled { x: f32, y: f32, z: f32 },

    /// Drop one grain by hand
    DropGrain {
        x: f32,
        y: f32,
        z: f32,
        radius: f32,
    },

    /// Remove every grain and zero the clock
    Reset,

    /// Write a message to the execution log
    Log { message: String },
}
