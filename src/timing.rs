//! Per-tick counters and phase timings.

use std::time::Instant;

use log::trace;

/// Statistics of the most recent tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    pub body_count: usize,
    /// Pairs that survived the broad phase.
    pub candidate_pairs: usize,
    pub contact_count: usize,
    pub apply_forces_ms: f32,
    pub detection_ms: f32,
    pub solve_ms: f32,
    pub integrate_ms: f32,
}

impl StepStats {
    pub fn total_ms(&self) -> f32 {
        self.apply_forces_ms + self.detection_ms + self.solve_ms + self.integrate_ms
    }
}

/// Checkpoint timer: each [`lap`](Self::lap) returns the milliseconds since
/// the previous checkpoint and logs them at `trace` level.
#[derive(Debug)]
pub struct PhaseTimer {
    last_checkpoint: Instant,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::start()
    }
}

impl PhaseTimer {
    pub fn start() -> Self {
        Self {
            last_checkpoint: Instant::now(),
        }
    }

    pub fn lap(&mut self, label: &str) -> f32 {
        let now = Instant::now();
        let ms = now.duration_since(self.last_checkpoint).as_secs_f32() * 1000.0;
        self.last_checkpoint = now;
        trace!("{label}: {ms:.3} ms");
        ms
    }
}
