//! Simulation parameters.
//!
//! Everything that would otherwise be global state (gravity, floor height,
//! solver tunables) lives here and is passed to the world explicitly.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Tunables of the sequential-impulse contact solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Gauss-Seidel passes over the contact list per tick.
    pub iterations: usize,
    /// Baumgarte factor: fraction of the penetration fed back per tick.
    pub baumgarte: f32,
    /// Penetration tolerated without correction.
    pub slop: f32,
    /// Approach speed above which restitution is applied.
    pub restitution_threshold: f32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            iterations: 15,
            baumgarte: 0.05,
            slop: 0.01,
            restitution_threshold: 1.0,
        }
    }
}

/// Per-world configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: Vector3<f32>,
    /// Height of the static ground plane (normal +Y).
    pub floor_y: f32,
    /// Extra distance added to bounding radii before a pair is rejected.
    pub broadphase_slack: f32,
    /// Linear velocity multiplier applied every tick.
    pub linear_damping: f32,
    /// Angular velocity multiplier applied every tick.
    pub angular_damping: f32,
    /// Angular speed below which orientation is not integrated.
    pub angular_epsilon: f32,
    pub solver: SolverSettings,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::new(0.0, -9.81, 0.0),
            floor_y: -2.0,
            broadphase_slack: 0.1,
            linear_damping: 0.999,
            angular_damping: 0.999,
            angular_epsilon: 1e-6,
            solver: SolverSettings::default(),
        }
    }
}

impl WorldConfig {
    /// Builder: set gravity.
    pub fn with_gravity(mut self, gravity: Vector3<f32>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder: set the floor height.
    pub fn with_floor(mut self, floor_y: f32) -> Self {
        self.floor_y = floor_y;
        self
    }

    /// Builder: set both damping factors (1.0 disables damping).
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Builder: replace the solver settings.
    pub fn with_solver(mut self, solver: SolverSettings) -> Self {
        self.solver = solver;
        self
    }
}
