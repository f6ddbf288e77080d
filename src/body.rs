//! Rigid body state and shape descriptors.
//!
//! A [`RigidBody`] carries its pose, velocities, mass properties, material
//! coefficients and a [`Shape`]. Bodies are configured with the builder
//! methods and one of the shape-initialisation calls
//! ([`RigidBody::with_box_shape`], [`RigidBody::with_sphere_shape`]) before
//! they are handed to a [`PhysicsWorld`](crate::world::PhysicsWorld).
//!
//! # Preconditions
//! Densities, sizes and radii must be positive and finite. Negative mass or
//! degenerate shapes are not detected here; validate at the boundary (see
//! [`crate::scene`]) if the input is untrusted.

use core::f32::consts::PI;

use nalgebra::{Matrix3, Matrix4, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::mesh::SampleMesh;

/// Identifier of a body inside a [`PhysicsWorld`](crate::world::PhysicsWorld).
///
/// Slots freed by removal are reused, but every handle carries the
/// generation it was issued with, so a handle to a removed body stays
/// invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle {
    index: usize,
    generation: u32,
}

impl BodyHandle {
    pub(crate) const fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index of this handle.
    pub fn index(self) -> usize {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Collision geometry of a body, centred on its position.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Oriented box. `samples` are unit-cube vertices used for contact
    /// sampling; they are stretched by `2 * half_extents`.
    Box {
        half_extents: Vector3<f32>,
        samples: SampleMesh,
    },
    /// Sphere of the given radius.
    Sphere { radius: f32 },
}

/// Shape classification handed to renderers and exporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Box,
    Sphere,
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Box { .. } => ShapeKind::Box,
            Shape::Sphere { .. } => ShapeKind::Sphere,
        }
    }

    /// Radius of a sphere enclosing the shape around its centre.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Shape::Box { half_extents, .. } => half_extents.norm(),
            Shape::Sphere { radius } => *radius,
        }
    }
}

/// A rigid body with linear and angular dynamics.
#[derive(Debug, Clone)]
pub struct RigidBody {
    // -- Pose --
    pub position: Vector3<f32>,
    /// Orientation quaternion. Kept unit-length by the integrator.
    pub orientation: UnitQuaternion<f32>,
    /// Render scale. For boxes this is the full size (`2 * half_extents`),
    /// for spheres the radius on every axis (render meshes are unit spheres).
    pub scale: Vector3<f32>,

    // -- Velocities --
    pub linear_velocity: Vector3<f32>,
    /// Angular velocity in world space (radians per second).
    pub angular_velocity: Vector3<f32>,

    // -- Mass properties --
    /// Mass in kg. `0.0` marks the body as immovable.
    pub mass: f32,
    /// Immovable regardless of mass.
    pub fixed: bool,
    /// Inverse inertia tensor in body space (diagonal, constant).
    pub inv_inertia_body: Matrix3<f32>,
    /// Inverse inertia tensor in world space. Refreshed from `orientation`
    /// by [`RigidBody::update_inertia_world`].
    inv_inertia_world: Matrix3<f32>,

    pub shape: Shape,

    /// Bounciness (0.0 = no bounce, 1.0 = perfectly elastic).
    pub restitution: f32,
    /// Coulomb friction coefficient. The pair coefficient is the mean of both
    /// bodies' values.
    pub friction: f32,

    /// Forces applied by the caller since the last tick.
    pub(crate) force_accumulator: Vector3<f32>,
    /// Torques applied by the caller since the last tick.
    pub(crate) torque_accumulator: Vector3<f32>,
}

impl RigidBody {
    /// Create a dynamic unit cube of mass 1 with identity inertia.
    ///
    /// Call [`with_box_shape`](Self::with_box_shape) or
    /// [`with_sphere_shape`](Self::with_sphere_shape) to give it real mass
    /// properties.
    pub fn new() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            mass: 1.0,
            fixed: false,
            inv_inertia_body: Matrix3::identity(),
            inv_inertia_world: Matrix3::identity(),
            shape: Shape::Box {
                half_extents: Vector3::new(0.5, 0.5, 0.5),
                samples: SampleMesh::cube_corners(),
            },
            restitution: 0.5,
            friction: 0.3,
            force_accumulator: Vector3::zeros(),
            torque_accumulator: Vector3::zeros(),
        }
    }

    /// Create an immovable body. Shape calls keep it immovable.
    pub fn new_fixed() -> Self {
        Self {
            fixed: true,
            ..Self::new()
        }
    }

    /// Builder: set initial position.
    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.position = position;
        self
    }

    /// Builder: set initial orientation.
    pub fn with_orientation(mut self, orientation: UnitQuaternion<f32>) -> Self {
        self.orientation = orientation;
        self.update_inertia_world();
        self
    }

    /// Builder: set orientation from Euler angles in degrees (roll, pitch, yaw).
    pub fn with_euler_degrees(self, euler: Vector3<f32>) -> Self {
        let r = euler.map(f32::to_radians);
        self.with_orientation(UnitQuaternion::from_euler_angles(r.x, r.y, r.z))
    }

    /// Builder: set initial linear velocity.
    pub fn with_velocity(mut self, velocity: Vector3<f32>) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Builder: set initial angular velocity (radians per second).
    pub fn with_angular_velocity(mut self, angular_velocity: Vector3<f32>) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Builder: set restitution (bounciness, 0.0..=1.0).
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Builder: set friction coefficient (0.0..=1.0).
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.clamp(0.0, 1.0);
        self
    }

    /// Builder: mark the body immovable.
    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    /// Builder: configure as a solid box of full dimensions `size`, sampled
    /// at the cube corners.
    pub fn with_box_shape(self, size: Vector3<f32>, density: f32) -> Self {
        self.with_box_mesh(size, density, SampleMesh::cube_corners())
    }

    /// Builder: configure as a solid box sampled with a caller-supplied mesh.
    pub fn with_box_mesh(mut self, size: Vector3<f32>, density: f32, samples: SampleMesh) -> Self {
        self.set_as_box(size, density, samples);
        self
    }

    /// Builder: configure as a solid sphere.
    pub fn with_sphere_shape(mut self, radius: f32, density: f32) -> Self {
        self.set_as_sphere(radius, density);
        self
    }

    /// Make this body a solid box of full dimensions `size`.
    ///
    /// Mass is `w * h * d * density`; for a box of dimensions `(w, h, d)`:
    /// - `Ixx = m * (h² + d²) / 12`
    /// - `Iyy = m * (w² + d²) / 12`
    /// - `Izz = m * (w² + h²) / 12`
    pub fn set_as_box(&mut self, size: Vector3<f32>, density: f32, samples: SampleMesh) {
        self.mass = size.x * size.y * size.z * density;
        self.scale = size;
        self.shape = Shape::Box {
            half_extents: size * 0.5,
            samples,
        };

        let (w2, h2, d2) = (size.x * size.x, size.y * size.y, size.z * size.z);
        let k = self.mass / 12.0;
        let inertia = Vector3::new(k * (h2 + d2), k * (w2 + d2), k * (w2 + h2));
        self.inv_inertia_body = Matrix3::from_diagonal(&inertia.map(|i| 1.0 / i));
        self.update_inertia_world();
    }

    /// Make this body a solid sphere.
    ///
    /// Mass is `4/3 π r³ density`; inertia `I = (2/5) m r²` on every axis.
    pub fn set_as_sphere(&mut self, radius: f32, density: f32) {
        self.mass = (4.0 / 3.0) * PI * radius * radius * radius * density;
        self.scale = Vector3::new(radius, radius, radius);
        self.shape = Shape::Sphere { radius };

        let inv_i = 1.0 / (0.4 * self.mass * radius * radius);
        self.inv_inertia_body = Matrix3::from_diagonal(&Vector3::new(inv_i, inv_i, inv_i));
        self.update_inertia_world();
    }

    /// Whether the body ignores forces and impulses.
    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.fixed || self.mass <= 0.0
    }

    #[inline]
    pub fn inv_mass(&self) -> f32 {
        if self.is_fixed() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// World-space inverse inertia; zero for immovable bodies.
    #[inline]
    pub fn inv_inertia_world(&self) -> Matrix3<f32> {
        if self.is_fixed() {
            Matrix3::zeros()
        } else {
            self.inv_inertia_world
        }
    }

    /// Recompute `I⁻¹_world = R * I⁻¹_body * Rᵀ` from the current orientation.
    pub fn update_inertia_world(&mut self) {
        let r = self.orientation.to_rotation_matrix();
        self.inv_inertia_world = r.matrix() * self.inv_inertia_body * r.matrix().transpose();
    }

    /// Apply a force (in Newtons) at the centre of mass until the next tick.
    #[inline]
    pub fn apply_force(&mut self, force: Vector3<f32>) {
        self.force_accumulator += force;
    }

    /// Apply a torque (in N·m) until the next tick.
    #[inline]
    pub fn apply_torque(&mut self, torque: Vector3<f32>) {
        self.torque_accumulator += torque;
    }

    /// Apply a force at a world-space point; contributes torque `r × F`.
    pub fn apply_force_at_point(&mut self, force: Vector3<f32>, world_point: Vector3<f32>) {
        self.force_accumulator += force;
        self.torque_accumulator += (world_point - self.position).cross(&force);
    }

    /// Apply an instantaneous impulse at the centre of mass.
    #[inline]
    pub fn apply_impulse(&mut self, impulse: Vector3<f32>) {
        self.linear_velocity += impulse * self.inv_mass();
    }

    /// Apply an instantaneous angular impulse: `Δω = I⁻¹ * impulse`.
    #[inline]
    pub fn apply_angular_impulse(&mut self, impulse: Vector3<f32>) {
        self.angular_velocity += self.inv_inertia_world() * impulse;
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.linear_velocity.norm()
    }

    /// Translational plus rotational kinetic energy.
    pub fn kinetic_energy(&self) -> f32 {
        if self.is_fixed() {
            return 0.0;
        }
        let linear = 0.5 * self.mass * self.linear_velocity.norm_squared();
        // ω · I ω with I = R I_body Rᵀ; the body-space inverse is diagonal
        let w_local = self.orientation.inverse() * self.angular_velocity;
        let inertia = self.inv_inertia_body.diagonal().map(|i| if i > 0.0 { 1.0 / i } else { 0.0 });
        let angular = 0.5 * w_local.component_mul(&inertia).dot(&w_local);
        linear + angular
    }

    /// Radius of a sphere around `position` that encloses the body.
    #[inline]
    pub fn bounding_radius(&self) -> f32 {
        self.shape.bounding_radius()
    }

    /// World-space positions of a box's sample vertices; empty for spheres.
    pub fn world_vertices(&self) -> impl Iterator<Item = Vector3<f32>> + '_ {
        let (samples, size): (&[Vector3<f32>], Vector3<f32>) = match &self.shape {
            Shape::Box {
                half_extents,
                samples,
            } => (samples.vertices(), half_extents * 2.0),
            Shape::Sphere { .. } => (&[], Vector3::zeros()),
        };
        samples
            .iter()
            .map(move |v| self.position + self.orientation * v.component_mul(&size))
    }

    /// Lowest world-space point: `center - r` for a sphere, the lowest sample
    /// vertex for a box.
    pub fn lowest_point(&self) -> f32 {
        match &self.shape {
            Shape::Sphere { radius } => self.position.y - radius,
            Shape::Box { .. } => self
                .world_vertices()
                .map(|v| v.y)
                .fold(f32::INFINITY, f32::min),
        }
    }

    /// Model matrix `T * R * S` for rendering.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.position)
            * self.orientation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// World-space axis-aligned bounds `(min, max)`.
    pub fn world_aabb(&self) -> (Vector3<f32>, Vector3<f32>) {
        match &self.shape {
            Shape::Sphere { radius } => {
                let r = Vector3::new(*radius, *radius, *radius);
                (self.position - r, self.position + r)
            }
            Shape::Box { half_extents, .. } => {
                // Project the rotated half-extents onto the world axes
                let r = self.orientation.to_rotation_matrix();
                let extent = r.matrix().abs() * half_extents;
                (self.position - extent, self.position + extent)
            }
        }
    }
}

impl Default for RigidBody {
    fn default() -> Self {
        Self::new()
    }
}
