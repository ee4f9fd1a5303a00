//! Uniform grid broad phase
//!
//! Grains are binned into cubic cells about one grain diameter wide. A grain
//! can only touch grains in its own or the 26 neighbouring cells, so candidate
//! pairs come out in O(N) on average.

use ahash::AHashMap;
use glam::{IVec3, Vec3};
use smallvec::SmallVec;

use crate::world::{GrainId, GrainPool};

/// Grain ids sharing one grid cell
type CellList = SmallVec<[GrainId; 8]>;

pub struct UniformGrid {
    cell_size: f32,
    inv_cell_size: f32,
    cells: AHashMap<IVec3, CellList>,
    pairs: Vec<(GrainId, GrainId)>,
}

impl UniformGrid {
    /// `cell_size` should be at least one maximum grain diameter
    pub fn new(cell_size: f32) -> Self {
        let cell_size = cell_size.max(1e-4);
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: AHashMap::new(),
            pairs: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn cell_of(&self, position: Vec3) -> IVec3 {
        (position * self.inv_cell_size).floor().as_ivec3()
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Re-bin every alive grain, in ascending id order
    pub fn rebuild(&mut self, pool: &GrainPool) {
        for list in self.cells.values_mut() {
            list.clear();
        }
        for grain in pool.iter_alive() {
            if !grain.position.is_finite() {
                continue;
            }
            let cell = self.cell_of(grain.position);
            self.cells.entry(cell).or_default().push(grain.id);
        }
        self.cells.retain(|_, list| !list.is_empty());
    }

    /// Pairs of grains close enough to touch, sorted by id
    ///
    /// `margin` widens the test so contacts that form during the solver
    /// passes are still seen. Two frozen grains only make a pair when they
    /// penetrate by more than `frozen_overlap`, so the solver can wake them.
    pub fn candidate_pairs(
        &mut self,
        pool: &GrainPool,
        margin: f32,
        frozen_overlap: f32,
    ) -> &[(GrainId, GrainId)] {
        self.pairs.clear();

        for (cell, list) in &self.cells {
            for dz in -1..=1 {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let neighbour = *cell + IVec3::new(dx, dy, dz);
                        let Some(others) = self.cells.get(&neighbour) else {
                            continue;
                        };
                        for &a in list {
                            for &b in others {
                                // Each unordered pair once
                                if a >= b {
                                    continue;
                                }
                                let (Some(ga), Some(gb)) = (pool.get(a), pool.get(b)) else {
                                    continue;
                                };
                                let reach = if ga.frozen && gb.frozen {
                                    ga.radius + gb.radius - frozen_overlap
                                } else {
                                    ga.radius + gb.radius + margin
                                };
                                if reach <= 0.0 {
                                    continue;
                                }
                                if ga.position.distance_squared(gb.position) <= reach * reach {
                                    self.pairs.push((a, b));
                                }
                            }
                        }
                    }
                }
            }
        }

        // Hash map order is arbitrary; sort for reproducible solving
        self.pairs.sort_unstable();
        &self.pairs
    }
}
