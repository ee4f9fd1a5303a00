//! Renderer-facing output

mod instance;

pub use instance::{
    GrainInstance, InstanceBuffer, InstanceSync, PALETTE_SIZE, STAR_PALETTE, palette_color,
};
