//! Semi-implicit Euler integration.
//!
//! A tick is split around the solver: [`apply_forces`] updates velocities
//! before contacts are solved, [`integrate`] advances the pose with the
//! solved velocities afterwards. Updating velocity before position gives
//! better energy behaviour than explicit Euler.

use nalgebra::{UnitQuaternion, Vector3};

use crate::body::RigidBody;
use crate::config::WorldConfig;

/// Velocity update: gravity, accumulated user forces and torques, damping.
///
/// The world-space inverse inertia is refreshed first, so orientations
/// edited between ticks are seen by this tick's torques and by the solver.
/// Accumulators are cleared for every body, including fixed ones.
pub fn apply_forces(body: &mut RigidBody, config: &WorldConfig, dt: f32) {
    if !body.is_fixed() {
        body.update_inertia_world();

        // --- Linear ---
        let acceleration = config.gravity + body.force_accumulator * body.inv_mass();
        body.linear_velocity += acceleration * dt;
        body.linear_velocity *= config.linear_damping;

        // --- Angular ---
        let angular_acceleration = body.inv_inertia_world() * body.torque_accumulator;
        body.angular_velocity += angular_acceleration * dt;
        body.angular_velocity *= config.angular_damping;
    }

    body.force_accumulator = Vector3::zeros();
    body.torque_accumulator = Vector3::zeros();
}

/// Pose update from the current velocities.
///
/// Orientation uses the exponential map `q ← exp(ω·dt) ⊗ q`, skipped when
/// `|ω|` is below `config.angular_epsilon`, and is renormalised afterwards.
/// The world-space inverse inertia is refreshed for the next tick.
pub fn integrate(body: &mut RigidBody, config: &WorldConfig, dt: f32) {
    if body.is_fixed() {
        return;
    }

    body.position += body.linear_velocity * dt;

    if body.angular_velocity.norm() > config.angular_epsilon {
        let rotation = UnitQuaternion::from_scaled_axis(body.angular_velocity * dt);
        let mut orientation = rotation * body.orientation;
        orientation.renormalize();
        body.orientation = orientation;
    }

    body.update_inertia_world();
}
