//! Sequential-impulse (Projected Gauss-Seidel) contact solver.
//!
//! The solver works on a slice of [`SolverBody`] snapshots that contacts
//! address by index, so that contacts referencing the same body see each
//! other's updates within a pass. Impulses are accumulated per contact and clamped as a running total:
//! the normal accumulator never goes negative (contacts only push), and each
//! friction accumulator stays inside `±μ · normal`.
//!
//! Nothing is carried between ticks; [`ConstraintSolver::prepare`] resets the
//! accumulators.

use nalgebra::{Matrix3, Vector3};

use crate::body::RigidBody;
use crate::config::SolverSettings;
use crate::contact::ContactConstraint;

/// Velocity state and inverse mass terms of one body, as seen by the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverBody {
    pub position: Vector3<f32>,
    pub linear_velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
    pub inv_mass: f32,
    pub inv_inertia: Matrix3<f32>,
    pub restitution: f32,
    pub friction: f32,
}

impl SolverBody {
    /// Snapshot of `body`. Fixed bodies enter the solve at rest whatever
    /// velocity they carry.
    pub fn from_body(body: &RigidBody) -> Self {
        let (linear_velocity, angular_velocity) = if body.is_fixed() {
            (Vector3::zeros(), Vector3::zeros())
        } else {
            (body.linear_velocity, body.angular_velocity)
        };
        Self {
            position: body.position,
            linear_velocity,
            angular_velocity,
            inv_mass: body.inv_mass(),
            inv_inertia: body.inv_inertia_world(),
            restitution: body.restitution,
            friction: body.friction,
        }
    }

    /// Velocity of a point at offset `r` from the centre.
    #[inline]
    fn point_velocity(&self, r: &Vector3<f32>) -> Vector3<f32> {
        self.linear_velocity + self.angular_velocity.cross(r)
    }

    #[inline]
    fn apply_impulse(&mut self, impulse: &Vector3<f32>, r: &Vector3<f32>) {
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_inertia * r.cross(impulse);
    }
}

/// Effective mass `1 / K` along `direction`, or 0 when `K ≤ 0`.
fn effective_mass(
    a: &SolverBody,
    r_a: &Vector3<f32>,
    b: Option<&SolverBody>,
    r_b: &Vector3<f32>,
    direction: &Vector3<f32>,
) -> f32 {
    let ra_x = r_a.cross(direction);
    let mut k = a.inv_mass + ra_x.dot(&(a.inv_inertia * ra_x));
    if let Some(b) = b {
        let rb_x = r_b.cross(direction);
        k += b.inv_mass + rb_x.dot(&(b.inv_inertia * rb_x));
    }
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

/// Two unit tangents spanning the plane orthogonal to `normal`.
///
/// The construction avoids the component that dominates the normal.
pub fn tangent_basis(normal: &Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    // 0.577 ≈ 1/√3: at least one component of a unit vector reaches it
    let t1 = if normal.x.abs() >= 0.577 {
        Vector3::new(normal.y, -normal.x, 0.0).normalize()
    } else {
        Vector3::new(0.0, normal.z, -normal.y).normalize()
    };
    let t2 = normal.cross(&t1);
    (t1, t2)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintSolver {
    pub settings: SolverSettings,
}

impl ConstraintSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Prepare, then run the configured number of passes.
    pub fn solve(&self, bodies: &mut [SolverBody], contacts: &mut [ContactConstraint], dt: f32) {
        self.prepare(bodies, contacts, dt);
        for _ in 0..self.settings.iterations {
            self.iterate(bodies, contacts);
        }
    }

    /// Pre-step: cache lever arms, effective masses, tangents and bias, and
    /// zero the impulse accumulators.
    pub fn prepare(&self, bodies: &[SolverBody], contacts: &mut [ContactConstraint], dt: f32) {
        let s = &self.settings;
        for c in contacts.iter_mut() {
            let a = &bodies[c.index_a];
            let b = c.index_b.map(|i| &bodies[i]);

            c.r_a = c.point - a.position;
            c.r_b = b.map_or_else(Vector3::zeros, |b| c.point - b.position);

            c.mass_normal = effective_mass(a, &c.r_a, b, &c.r_b, &c.normal);
            let (t1, t2) = tangent_basis(&c.normal);
            c.tangent1 = t1;
            c.tangent2 = t2;
            c.mass_tangent1 = effective_mass(a, &c.r_a, b, &c.r_b, &t1);
            c.mass_tangent2 = effective_mass(a, &c.r_a, b, &c.r_b, &t2);

            (c.restitution, c.friction) = match b {
                Some(b) => (
                    a.restitution.min(b.restitution),
                    0.5 * (a.friction + b.friction),
                ),
                None => (a.restitution, a.friction),
            };

            let v_rel = c.normal.dot(&relative_velocity(a, &c.r_a, b, &c.r_b));
            c.bias = if v_rel < -s.restitution_threshold {
                // Impact: bounce back, penetration is recovered once resting
                -c.restitution * v_rel
            } else if dt > 0.0 {
                s.baumgarte / dt * (c.penetration - s.slop).max(0.0)
            } else {
                0.0
            };

            c.normal_impulse = 0.0;
            c.tangent_impulse1 = 0.0;
            c.tangent_impulse2 = 0.0;
        }
    }

    /// One Gauss-Seidel pass over all contacts in list order.
    pub fn iterate(&self, bodies: &mut [SolverBody], contacts: &mut [ContactConstraint]) {
        for c in contacts.iter_mut() {
            let (ia, ib) = (c.index_a, c.index_b);

            // -- Normal --
            let v_rel = c.normal.dot(&pair_velocity(bodies, ia, &c.r_a, ib, &c.r_b));
            let lambda = c.mass_normal * (c.bias - v_rel);
            let old = c.normal_impulse;
            c.normal_impulse = (old + lambda).max(0.0);
            let impulse = c.normal * (c.normal_impulse - old);
            apply_pair_impulse(bodies, ia, &c.r_a, ib, &c.r_b, &impulse);

            // -- Friction, limited by the just-updated normal impulse --
            let max_friction = c.friction * c.normal_impulse;
            for (tangent, mass, accumulated) in [
                (c.tangent1, c.mass_tangent1, &mut c.tangent_impulse1),
                (c.tangent2, c.mass_tangent2, &mut c.tangent_impulse2),
            ] {
                let vt = tangent.dot(&pair_velocity(bodies, ia, &c.r_a, ib, &c.r_b));
                let old = *accumulated;
                *accumulated = (old - mass * vt).clamp(-max_friction, max_friction);
                let impulse = tangent * (*accumulated - old);
                apply_pair_impulse(bodies, ia, &c.r_a, ib, &c.r_b, &impulse);
            }
        }
    }
}

/// Velocity of A relative to B at the contact.
fn relative_velocity(
    a: &SolverBody,
    r_a: &Vector3<f32>,
    b: Option<&SolverBody>,
    r_b: &Vector3<f32>,
) -> Vector3<f32> {
    let v_b = b.map_or_else(Vector3::zeros, |b| b.point_velocity(r_b));
    a.point_velocity(r_a) - v_b
}

fn pair_velocity(
    bodies: &[SolverBody],
    ia: usize,
    r_a: &Vector3<f32>,
    ib: Option<usize>,
    r_b: &Vector3<f32>,
) -> Vector3<f32> {
    relative_velocity(&bodies[ia], r_a, ib.map(|i| &bodies[i]), r_b)
}

/// Apply `+impulse` to A and `-impulse` to B.
fn apply_pair_impulse(
    bodies: &mut [SolverBody],
    ia: usize,
    r_a: &Vector3<f32>,
    ib: Option<usize>,
    r_b: &Vector3<f32>,
    impulse: &Vector3<f32>,
) {
    bodies[ia].apply_impulse(impulse, r_a);
    if let Some(ib) = ib {
        bodies[ib].apply_impulse(&-impulse, r_b);
    }
}
