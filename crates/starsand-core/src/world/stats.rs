//! Simulation statistics collection trait

use serde::{Deserialize, Serialize};

/// Trait for collecting per-tick physics statistics
///
/// The physics step reports through this so hosts can plug in their own
/// collectors without the core depending on them.
pub trait SimStats {
    /// Record contacts resolved against the vessel wall
    fn record_wall_contacts(&mut self, count: u32);

    /// Record grain-grain contacts resolved in one solver pass
    fn record_grain_contacts(&mut self, count: u32);

    /// Record that a frozen grain was woken by a contact
    fn record_wake(&mut self);

    /// Record grains that settled and were frozen
    fn record_freezes(&mut self, count: u32);

    /// Record diverged grains that were reset
    fn record_divergence_resets(&mut self, count: u32);
}

/// A no-op implementation for when stats collection is not needed
#[derive(Default)]
pub struct NoopStats;

impl SimStats for NoopStats {
    fn record_wall_contacts(&mut self, _count: u32) {}
    fn record_grain_contacts(&mut self, _count: u32) {}
    fn record_wake(&mut self) {}
    fn record_freezes(&mut self, _count: u32) {}
    fn record_divergence_resets(&mut self, _count: u32) {}
}

/// Plain counters, kept by the simulation for the last frame and in total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounters {
    pub ticks: u64,
    pub wall_contacts: u64,
    pub grain_contacts: u64,
    pub wakes: u64,
    pub freezes: u64,
    pub divergence_resets: u64,
    pub emitted: u64,
    pub recycled: u64,
    pub swept: u64,
}

impl StepCounters {
    /// Fold another set of counters into this one
    pub fn merge(&mut self, other: &StepCounters) {
        self.ticks += other.ticks;
        self.wall_contacts += other.wall_contacts;
        self.grain_contacts += other.grain_contacts;
        self.wakes += other.wakes;
        self.freezes += other.freezes;
        self.divergence_resets += other.divergence_resets;
        self.emitted += other.emitted;
        self.recycled += other.recycled;
        self.swept += other.swept;
    }
}

impl SimStats for StepCounters {
    fn record_wall_contacts(&mut self, count: u32) {
        self.wall_contacts += count as u64;
    }

    fn record_grain_contacts(&mut self, count: u32) {
        self.grain_contacts += count as u64;
    }

    fn record_wake(&mut self) {
        self.wakes += 1;
    }

    fn record_freezes(&mut self, count: u32) {
        self.freezes += count as u64;
    }

    fn record_divergence_resets(&mut self, count: u32) {
        self.divergence_resets += count as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_stats_all_methods() {
        let mut stats = NoopStats;
        for _ in 0..100 {
            stats.record_wall_contacts(3);
            stats.record_grain_contacts(5);
            stats.record_wake();
            stats.record_freezes(2);
            stats.record_divergence_resets(1);
        }
    }

    #[test]
    fn test_step_counters_record() {
        let mut stats = StepCounters::default();
        stats.record_wall_contacts(2);
        stats.record_wall_contacts(3);
        stats.record_grain_contacts(4);
        stats.record_wake();
        stats.record_freezes(1);
        stats.record_freezes(1);
        stats.record_divergence_resets(1);

        assert_eq!(stats.wall_contacts, 5);
        assert_eq!(stats.grain_contacts, 4);
        assert_eq!(stats.wakes, 1);
        assert_eq!(stats.freezes, 2);
        assert_eq!(stats.divergence_resets, 1);
    }

    #[test]
    fn test_step_counters_merge() {
        let mut total = StepCounters {
            ticks: 1,
            emitted: 2,
            ..Default::default()
        };
        let frame = StepCounters {
            ticks: 3,
            emitted: 1,
            swept: 4,
            ..Default::default()
        };
        total.merge(&frame);
        assert_eq!(total.ticks, 4);
        assert_eq!(total.emitted, 3);
        assert_eq!(total.swept, 4);
    }
}
