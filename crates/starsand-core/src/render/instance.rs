//! Instance sync - flattens the pool into GPU-ready per-grain records
//!
//! The buffer is derived state. It is rebuilt from the pool on every sync and
//! never written back.

use bytemuck::{Pod, Zeroable};

use crate::world::{Grain, GrainPool};

/// Star colors, 0xRRGGBB
pub const STAR_PALETTE: [u32; 10] = [
    0x8b5cf6, 0x06b6d4, 0x10b981, 0xf59e0b, 0xef4444, 0xec4899, 0x6366f1, 0x14b8a6, 0xf97316,
    0x84cc16,
];

pub const PALETTE_SIZE: usize = STAR_PALETTE.len();

/// Opaque RGBA for a palette slot; out-of-range indices wrap
pub fn palette_color(index: u8) -> [f32; 4] {
    let hex = STAR_PALETTE[index as usize % PALETTE_SIZE];
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    [channel(16), channel(8), channel(0), 1.0]
}

/// One rendered grain, laid out for direct upload as instance data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GrainInstance {
    pub position: [f32; 3],
    /// Uniform scale, equal to the grain radius
    pub scale: f32,
    /// Quaternion, xyzw
    pub orientation: [f32; 4],
    pub color: [f32; 4],
}

impl From<&Grain> for GrainInstance {
    fn from(grain: &Grain) -> Self {
        Self {
            position: grain.position.to_array(),
            scale: grain.radius,
            orientation: grain.orientation.to_array(),
            color: palette_color(grain.color_index),
        }
    }
}

/// Per-frame snapshot of every alive grain, in grain id order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceBuffer {
    instances: Vec<GrainInstance>,
}

impl InstanceBuffer {
    pub fn from_pool(pool: &GrainPool) -> Self {
        let mut buffer = Self::default();
        buffer.refill(pool);
        buffer
    }

    fn refill(&mut self, pool: &GrainPool) {
        self.instances.clear();
        self.instances.extend(pool.iter_alive().map(GrainInstance::from));
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GrainInstance> {
        self.instances.iter()
    }

    pub fn as_slice(&self) -> &[GrainInstance] {
        &self.instances
    }

    /// Raw bytes for a vertex/instance buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

/// Owns the instance buffer handed to the renderer
#[derive(Debug, Default)]
pub struct InstanceSync {
    buffer: InstanceBuffer,
    syncs: u64,
}

impl InstanceSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the buffer from the current pool state
    ///
    /// Only reads the pool; two syncs with no tick in between are identical.
    pub fn sync(&mut self, pool: &GrainPool) -> &InstanceBuffer {
        self.buffer.refill(pool);
        self.syncs += 1;
        &self.buffer
    }

    /// Last synced buffer
    pub fn buffer(&self) -> &InstanceBuffer {
        &self.buffer
    }

    pub fn sync_count(&self) -> u64 {
        self.syncs
    }

    pub fn clear(&mut self) {
        self.buffer.instances.clear();
    }
}
