//! Grain pool - fixed-capacity slot storage with a free list
//!
//! The pool owns every grain record. Physics and emission only reach grains
//! through the iteration helpers here, never through the slot layout.

use crate::error::{SimError, SimResult};

use super::grain::{Grain, GrainId, GrainSpawn};

/// Fixed-capacity storage for grain state
#[derive(Clone, Debug)]
pub struct GrainPool {
    /// Slots grow lazily up to `capacity`, dead slots stay in place
    grains: Vec<Grain>,
    /// Dead slots available for reuse (LIFO)
    free: Vec<GrainId>,
    capacity: usize,
    alive: usize,
    next_sequence: u64,
}

impl GrainPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            grains: Vec::with_capacity(capacity),
            free: Vec::new(),
            capacity,
            alive: 0,
            next_sequence: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn alive_count(&self) -> usize {
        self.alive
    }

    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    pub fn is_full(&self) -> bool {
        self.alive >= self.capacity
    }

    /// Bring a new grain to life in a free slot
    ///
    /// Fails with [`SimError::CapacityExceeded`] when every slot is alive; the
    /// pool is left untouched in that case.
    pub fn spawn(&mut self, spawn: GrainSpawn) -> SimResult<GrainId> {
        let id = if let Some(id) = self.free.pop() {
            id
        } else if self.grains.len() < self.capacity {
            let id = GrainId::from_index(self.grains.len());
            self.grains.push(Grain::from_spawn(id, &spawn, 0));
            id
        } else {
            return Err(SimError::CapacityExceeded {
                capacity: self.capacity,
            });
        };

        self.grains[id.index()] = Grain::from_spawn(id, &spawn, self.next_sequence);
        self.next_sequence += 1;
        self.alive += 1;
        Ok(id)
    }

    /// Mark a grain dead and return its slot to the free list
    ///
    /// Returns false if the id is unknown or already dead.
    pub fn despawn(&mut self, id: GrainId) -> bool {
        match self.grains.get_mut(id.index()) {
            Some(grain) if grain.alive => {
                grain.alive = false;
                grain.frozen = false;
                self.free.push(id);
                self.alive -= 1;
                true
            }
            _ => false,
        }
    }

    /// Alive grain with the lowest spawn sequence
    pub fn oldest_alive(&self) -> Option<GrainId> {
        self.iter_alive()
            .min_by_key(|grain| grain.spawn_sequence)
            .map(|grain| grain.id)
    }

    /// Replace the oldest alive grain with a new one
    pub fn recycle_oldest(&mut self, spawn: GrainSpawn) -> SimResult<GrainId> {
        match self.oldest_alive() {
            Some(oldest) => {
                self.despawn(oldest);
                self.spawn(spawn)
            }
            None => self.spawn(spawn),
        }
    }

    /// Despawn everything
    pub fn clear(&mut self) {
        self.grains.clear();
        self.free.clear();
        self.alive = 0;
    }

    pub fn get(&self, id: GrainId) -> Option<&Grain> {
        self.grains.get(id.index()).filter(|grain| grain.alive)
    }

    pub fn get_mut(&mut self, id: GrainId) -> Option<&mut Grain> {
        self.grains.get_mut(id.index()).filter(|grain| grain.alive)
    }

    /// Two distinct alive grains borrowed mutably at once
    pub fn pair_mut(&mut self, a: GrainId, b: GrainId) -> Option<(&mut Grain, &mut Grain)> {
        let (ia, ib) = (a.index(), b.index());
        if ia == ib || ia.max(ib) >= self.grains.len() {
            return None;
        }

        let (first, second) = if ia < ib {
            let (head, tail) = self.grains.split_at_mut(ib);
            (&mut head[ia], &mut tail[0])
        } else {
            let (head, tail) = self.grains.split_at_mut(ia);
            (&mut tail[0], &mut head[ib])
        };

        if first.alive && second.alive {
            Some((first, second))
        } else {
            None
        }
    }

    /// Alive grains in ascending id order
    pub fn iter_alive(&self) -> impl Iterator<Item = &Grain> {
        self.grains.iter().filter(|grain| grain.alive)
    }

    /// Visit every alive grain exactly once
    pub fn for_each_alive<F: FnMut(&mut Grain)>(&mut self, mut f: F) {
        for grain in self.grains.iter_mut().filter(|grain| grain.alive) {
            f(grain);
        }
    }

    /// Visit every unordered pair of alive grains exactly once
    pub fn for_each_alive_pair<F: FnMut(&mut Grain, &mut Grain)>(&mut self, mut f: F) {
        for i in 0..self.grains.len() {
            let (head, tail) = self.grains.split_at_mut(i + 1);
            let a = &mut head[i];
            if !a.alive {
                continue;
            }
            for b in tail.iter_mut().filter(|grain| grain.alive) {
                f(a, b);
            }
        }
    }

    /// Apply an independent per-grain update and sum what it reports
    ///
    /// Runs on the rayon pool when the `parallel` feature is on. Each call only
    /// touches its own grain, so the result does not depend on thread count.
    pub fn update_alive<F>(&mut self, f: F) -> u32
    where
        F: Fn(&mut Grain) -> u32 + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        let reported = {
            use rayon::prelude::*;
            self.grains
                .par_iter_mut()
                .filter(|grain| grain.alive)
                .map(f)
                .sum()
        };

        #[cfg(not(feature = "parallel"))]
        let reported = self
            .grains
            .iter_mut()
            .filter(|grain| grain.alive)
            .map(f)
            .sum();

        reported
    }
}
