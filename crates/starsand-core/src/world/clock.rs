//! Fixed-timestep accumulator
//!
//! Rendered frames arrive at whatever rate the host manages. Physics always
//! advances in whole `fixed_dt` ticks, with a cap so a long hitch cannot turn
//! into an ever-growing catch-up backlog.

use log::warn;

#[derive(Debug, Clone)]
pub struct SimulationClock {
    fixed_dt: f32,
    max_steps_per_frame: u32,
    max_frame_dt: f32,
    accumulator: f32,
    ticks: u64,
    discarded_steps: u64,
}

impl SimulationClock {
    pub fn new(fixed_dt: f32, max_steps_per_frame: u32) -> Self {
        let fixed_dt = if fixed_dt.is_finite() && fixed_dt > 0.0 {
            fixed_dt
        } else {
            1.0 / 60.0
        };
        Self {
            fixed_dt,
            max_steps_per_frame: max_steps_per_frame.max(1),
            max_frame_dt: f32::INFINITY,
            accumulator: 0.0,
            ticks: 0,
            discarded_steps: 0,
        }
    }

    /// Clamp single frame deltas before they reach the accumulator
    pub fn with_max_frame_dt(mut self, max_frame_dt: f32) -> Self {
        if max_frame_dt > 0.0 {
            self.max_frame_dt = max_frame_dt;
        }
        self
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    pub fn max_steps_per_frame(&self) -> u32 {
        self.max_steps_per_frame
    }

    /// Account for a rendered frame and return how many ticks to run
    ///
    /// Non-finite or negative deltas count as zero. Whole steps beyond the
    /// per-frame cap are dropped; only the sub-step remainder carries over.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        let frame_dt = if frame_dt.is_finite() && frame_dt > 0.0 {
            frame_dt.min(self.max_frame_dt)
        } else {
            0.0
        };

        self.accumulator += frame_dt;

        let mut steps = 0;
        while self.accumulator >= self.fixed_dt && steps < self.max_steps_per_frame {
            self.accumulator -= self.fixed_dt;
            steps += 1;
        }

        if self.accumulator >= self.fixed_dt {
            let excess = (self.accumulator / self.fixed_dt).floor();
            self.accumulator -= excess * self.fixed_dt;
            self.discarded_steps += excess as u64;
            warn!(
                "Frame hitch: discarding {} physics steps ({:.3}s)",
                excess,
                excess * self.fixed_dt
            );
        }

        steps
    }

    /// Note that one tick of `fixed_dt` was simulated
    pub fn count_tick(&mut self) {
        self.ticks += 1;
    }

    /// Fraction of a tick left in the accumulator, in [0, 1)
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.fixed_dt).clamp(0.0, 1.0)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn simulated_time(&self) -> f64 {
        self.ticks as f64 * self.fixed_dt as f64
    }

    pub fn discarded_steps(&self) -> u64 {
        self.discarded_steps
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.ticks = 0;
        self.discarded_steps = 0;
    }
}
