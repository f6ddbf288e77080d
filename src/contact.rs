//! Contact constraints produced by collision detection.

use nalgebra::Vector3;

use crate::body::BodyHandle;

/// A single contact point between two bodies, or between a body and the
/// ground plane when `body_b` is `None`.
///
/// Built fresh every tick and discarded after solving; the solver-cached
/// terms are filled in by [`ConstraintSolver::prepare`](crate::solver::ConstraintSolver::prepare).
#[derive(Debug, Clone, PartialEq)]
pub struct ContactConstraint {
    pub body_a: BodyHandle,
    pub body_b: Option<BodyHandle>,
    /// World-space contact location.
    pub point: Vector3<f32>,
    /// Unit normal pointing from B toward A (world-up for the ground).
    pub normal: Vector3<f32>,
    /// Penetration depth, never negative.
    pub penetration: f32,

    // -- Solver cache --
    /// Positions of A and B in the solver's body slice. Default to the handle
    /// slots; the world rewrites them to its dense body order before solving.
    pub(crate) index_a: usize,
    pub(crate) index_b: Option<usize>,
    pub(crate) r_a: Vector3<f32>,
    pub(crate) r_b: Vector3<f32>,
    pub(crate) tangent1: Vector3<f32>,
    pub(crate) tangent2: Vector3<f32>,
    pub(crate) mass_normal: f32,
    pub(crate) mass_tangent1: f32,
    pub(crate) mass_tangent2: f32,
    pub(crate) restitution: f32,
    pub(crate) friction: f32,
    pub(crate) bias: f32,
    pub(crate) normal_impulse: f32,
    pub(crate) tangent_impulse1: f32,
    pub(crate) tangent_impulse2: f32,
}

impl ContactConstraint {
    pub fn new(
        body_a: BodyHandle,
        body_b: Option<BodyHandle>,
        point: Vector3<f32>,
        normal: Vector3<f32>,
        penetration: f32,
    ) -> Self {
        Self {
            body_a,
            body_b,
            point,
            normal,
            penetration: penetration.max(0.0),
            index_a: body_a.index(),
            index_b: body_b.map(BodyHandle::index),
            r_a: Vector3::zeros(),
            r_b: Vector3::zeros(),
            tangent1: Vector3::zeros(),
            tangent2: Vector3::zeros(),
            mass_normal: 0.0,
            mass_tangent1: 0.0,
            mass_tangent2: 0.0,
            restitution: 0.0,
            friction: 0.0,
            bias: 0.0,
            normal_impulse: 0.0,
            tangent_impulse1: 0.0,
            tangent_impulse2: 0.0,
        }
    }

    /// Contact against the static ground plane.
    pub fn ground(body: BodyHandle, point: Vector3<f32>, penetration: f32) -> Self {
        Self::new(body, None, point, Vector3::y(), penetration)
    }

    /// Target normal velocity computed during the pre-step.
    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Normal impulse accumulated over the current solve.
    pub fn normal_impulse(&self) -> f32 {
        self.normal_impulse
    }

    /// Friction impulses accumulated over the current solve.
    pub fn tangent_impulses(&self) -> (f32, f32) {
        (self.tangent_impulse1, self.tangent_impulse2)
    }

    /// Ordering key used to make the merged contact list independent of
    /// worker scheduling. Ground contacts sort before pair contacts of the
    /// same body.
    pub(crate) fn pair_key(&self) -> (usize, usize) {
        (
            self.body_a.index(),
            self.body_b.map_or(0, |b| b.index() + 1),
        )
    }
}
