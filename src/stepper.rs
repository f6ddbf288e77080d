//! Fixed-timestep driving from variable frame times.

use log::{debug, warn};

use crate::world::PhysicsWorld;

/// Accumulates frame time and runs whole ticks of a fixed `dt`.
///
/// When a frame would need more than `max_steps` ticks the remaining backlog
/// is dropped, so a long stall slows the simulation down instead of making
/// every following frame catch up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedStepper {
    dt: f32,
    max_steps: u32,
    accumulator: f32,
}

impl FixedStepper {
    pub fn new(dt: f32, max_steps: u32) -> Self {
        Self {
            dt,
            max_steps: max_steps.max(1),
            accumulator: 0.0,
        }
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Time carried over to the next frame, always below `dt`.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Interpolation factor between the last two ticks, in `[0, 1)`.
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.dt
    }

    /// Feed `frame_time` seconds and run as many ticks as fit. Returns the
    /// number of ticks run.
    pub fn advance(&mut self, world: &mut PhysicsWorld, frame_time: f32) -> u32 {
        if !(self.dt > 0.0) {
            warn!("FixedStepper: non-positive dt {}", self.dt);
            return 0;
        }
        if frame_time.is_finite() && frame_time > 0.0 {
            self.accumulator += frame_time;
        }

        let mut steps = 0;
        while self.accumulator >= self.dt {
            if steps == self.max_steps {
                debug!(
                    "FixedStepper: dropping {:.4} s of backlog after {steps} ticks",
                    self.accumulator
                );
                self.accumulator = 0.0;
                break;
            }
            world.step(self.dt);
            self.accumulator -= self.dt;
            steps += 1;
        }
        steps
    }
}

impl Default for FixedStepper {
    /// 400 Hz, at most 8 ticks per frame.
    fn default() -> Self {
        Self::new(0.0025, 8)
    }
}
