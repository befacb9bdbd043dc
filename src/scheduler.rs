//! Fixed-timestep scheduling
//!
//! The simulation advances in fixed `dt` steps regardless of how wall
//! time arrives. Elapsed time goes into an accumulator and is paid out
//! in whole steps; the remainder carries to the next frame, so the step
//! count over any window matches the tick rate without drift.

use std::time::Duration;

use tracing::warn;

/// Fixed-step accumulator
///
/// Backlog is clamped to a few steps: after a long stall (debugger,
/// suspend) the simulation resumes in real time instead of fast-forwarding
/// through the gap.
#[derive(Debug, Clone)]
pub struct FixedStep {
    dt: f32,
    accumulator: f32,
    max_backlog: f32,
}

impl FixedStep {
    /// At most this many steps are paid out for one advance
    const MAX_BACKLOG_STEPS: f32 = 5.0;

    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            accumulator: 0.0,
            max_backlog: dt * Self::MAX_BACKLOG_STEPS,
        }
    }

    /// Build from a tick rate in Hz
    pub fn from_rate(tick_rate: u32) -> Self {
        Self::new(1.0 / tick_rate as f32)
    }

    /// Step duration in seconds
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Step duration for timer setup
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f32(self.dt)
    }

    /// Credit elapsed wall time and return how many fixed steps to run
    pub fn advance(&mut self, elapsed: f32) -> u32 {
        self.accumulator += elapsed;
        if self.accumulator > self.max_backlog {
            warn!(
                "Simulation fell behind by {:.0} ms, dropping backlog",
                (self.accumulator - self.max_backlog) * 1000.0
            );
            self.accumulator = self.max_backlog;
        }

        let mut steps = 0;
        while self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            steps += 1;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_steps() {
        let mut scheduler = FixedStep::new(0.02);
        assert_eq!(scheduler.advance(0.02), 1);
        assert_eq!(scheduler.advance(0.04), 2);
        assert_eq!(scheduler.advance(0.0), 0);
    }

    #[test]
    fn test_remainder_carries_over() {
        let mut scheduler = FixedStep::new(0.02);
        assert_eq!(scheduler.advance(0.03), 1);
        // 0.01 carried: another 0.01 completes the second step
        assert_eq!(scheduler.advance(0.01), 1);
    }

    #[test]
    fn test_no_drift_over_many_frames() {
        let mut scheduler = FixedStep::from_rate(50);
        let mut steps = 0;
        // Uneven 60 Hz frame times over one second
        for _ in 0..60 {
            steps += scheduler.advance(1.0 / 60.0);
        }
        assert_eq!(steps, 50);
    }

    #[test]
    fn test_backlog_clamped_after_stall() {
        let mut scheduler = FixedStep::new(0.02);
        let steps = scheduler.advance(10.0);
        assert_eq!(steps, FixedStep::MAX_BACKLOG_STEPS as u32);
    }
}
