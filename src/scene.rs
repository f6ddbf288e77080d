//! Declarative scene descriptions.
//!
//! A [`SceneDesc`] is a world configuration plus a list of [`BodySpec`]s. It
//! can be written in code, loaded from JSON, or taken from a preset, and is
//! turned into bodies by the single setup routine [`Scene::populate`].
//! This is the one place where input is validated: the physics core assumes
//! positive densities and sizes and finite values.
//!
//! ```
//! use pgs_physics::scene::{Scene, SceneDesc};
//! use pgs_physics::PhysicsWorld;
//!
//! let desc = SceneDesc::from_json(r#"{
//!     "config": { "floor_y": 0.0 },
//!     "bodies": [
//!         { "shape": { "type": "sphere", "radius": 0.5 }, "position": [0.0, 3.0, 0.0] },
//!         { "shape": { "type": "box", "size": [1.0, 1.0, 1.0] }, "density": 5.0 }
//!     ]
//! }"#).unwrap();
//!
//! let mut world = PhysicsWorld::new(desc.config);
//! let scene = Scene::populate(&desc, &mut world).unwrap();
//! assert_eq!(scene.len(), 2);
//! ```

use core::f32::consts::PI;

use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::body::{BodyHandle, RigidBody};
use crate::config::WorldConfig;
use crate::mesh::SampleMesh;
use crate::world::PhysicsWorld;

/// Reasons a single body description is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BodyError {
    #[error("density must be positive and finite, got {0}")]
    InvalidDensity(f32),

    #[error("sphere radius must be positive and finite, got {0}")]
    InvalidRadius(f32),

    #[error("box size must be positive and finite, got {0:?}")]
    InvalidSize([f32; 3]),

    /// Restitution or friction outside `[0, 1]`.
    #[error("{name} must be in [0, 1], got {value}")]
    CoefficientOutOfRange { name: &'static str, value: f32 },

    #[error("non-finite {0}")]
    NonFinite(&'static str),

    /// Custom sample vertices that are empty or non-finite.
    #[error("invalid sample mesh")]
    InvalidSamples,

    #[error("launch direction has zero length")]
    ZeroDirection,
}

/// Errors raised while loading or populating a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("invalid scene document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("body {index}: {source}")]
    Body {
        index: usize,
        #[source]
        source: BodyError,
    },
}

/// Collision shape of a described body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeSpec {
    /// Box with full dimensions `size`.
    Box { size: Vector3<f32> },
    Sphere { radius: f32 },
}

/// Description of one body. Missing JSON fields take the [`Default`] values:
/// a dynamic unit cube of density 1 at the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodySpec {
    pub shape: ShapeSpec,
    pub density: f32,
    pub position: Vector3<f32>,
    /// Euler angles (roll, pitch, yaw) in degrees.
    pub rotation_degrees: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
    pub restitution: f32,
    pub friction: f32,
    pub fixed: bool,
    /// Interior sample points per box edge, see [`SampleMesh::cube_surface`].
    pub sample_subdivisions: usize,
    /// Custom unit-cube sample vertices; overrides `sample_subdivisions`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<[f32; 3]>>,
}

impl Default for BodySpec {
    fn default() -> Self {
        Self {
            shape: ShapeSpec::Box {
                size: Vector3::new(1.0, 1.0, 1.0),
            },
            density: 1.0,
            position: Vector3::zeros(),
            rotation_degrees: Vector3::zeros(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            restitution: 0.5,
            friction: 0.3,
            fixed: false,
            sample_subdivisions: 0,
            samples: None,
        }
    }
}

impl BodySpec {
    pub fn cube(size: Vector3<f32>, density: f32) -> Self {
        Self {
            shape: ShapeSpec::Box { size },
            density,
            ..Self::default()
        }
    }

    pub fn sphere(radius: f32, density: f32) -> Self {
        Self {
            shape: ShapeSpec::Sphere { radius },
            density,
            ..Self::default()
        }
    }

    pub fn at(mut self, position: Vector3<f32>) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation_degrees(mut self, rotation: Vector3<f32>) -> Self {
        self.rotation_degrees = rotation;
        self
    }

    pub fn with_velocity(mut self, velocity: Vector3<f32>) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_subdivisions(mut self, subdivisions: usize) -> Self {
        self.sample_subdivisions = subdivisions;
        self
    }

    /// Check every field the physics core relies on.
    pub fn validate(&self) -> Result<(), BodyError> {
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(BodyError::InvalidDensity(self.density));
        }
        match self.shape {
            ShapeSpec::Sphere { radius } => {
                if !(radius.is_finite() && radius > 0.0) {
                    return Err(BodyError::InvalidRadius(radius));
                }
            }
            ShapeSpec::Box { size } => {
                if !size.iter().all(|s| s.is_finite() && *s > 0.0) {
                    return Err(BodyError::InvalidSize([size.x, size.y, size.z]));
                }
            }
        }
        for (name, value) in [("restitution", self.restitution), ("friction", self.friction)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BodyError::CoefficientOutOfRange { name, value });
            }
        }
        for (field, v) in [
            ("position", &self.position),
            ("rotation", &self.rotation_degrees),
            ("velocity", &self.velocity),
            ("angular velocity", &self.angular_velocity),
        ] {
            if !v.iter().all(|c| c.is_finite()) {
                return Err(BodyError::NonFinite(field));
            }
        }
        Ok(())
    }

    fn sample_mesh(&self) -> Result<SampleMesh, BodyError> {
        match &self.samples {
            Some(vertices) => SampleMesh::from_arrays(vertices).ok_or(BodyError::InvalidSamples),
            None => Ok(SampleMesh::cube_surface(self.sample_subdivisions)),
        }
    }

    /// Validate and construct the body.
    pub fn build(&self) -> Result<RigidBody, BodyError> {
        self.validate()?;
        let body = match self.shape {
            ShapeSpec::Sphere { radius } => RigidBody::new().with_sphere_shape(radius, self.density),
            ShapeSpec::Box { size } => {
                RigidBody::new().with_box_mesh(size, self.density, self.sample_mesh()?)
            }
        };
        Ok(body
            .with_position(self.position)
            .with_euler_degrees(self.rotation_degrees)
            .with_velocity(self.velocity)
            .with_angular_velocity(self.angular_velocity)
            .with_restitution(self.restitution)
            .with_friction(self.friction)
            .with_fixed(self.fixed))
    }
}

/// World configuration and the bodies to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDesc {
    pub config: WorldConfig,
    pub bodies: Vec<BodySpec>,
}

impl SceneDesc {
    /// Parse and validate a JSON scene document.
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let desc: Self = serde_json::from_str(json)?;
        desc.validate()?;
        Ok(desc)
    }

    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        for (index, spec) in self.bodies.iter().enumerate() {
            spec.validate()
                .map_err(|source| SceneError::Body { index, source })?;
        }
        Ok(())
    }

    /// A grid of unit boxes (density 5) resting on the floor, centred on the
    /// vertical axis: `nx` by `nz` columns, `ny` boxes high.
    pub fn box_stack(nx: usize, ny: usize, nz: usize) -> Self {
        let config = WorldConfig::default();
        let offset = |n: usize| (n as f32 - 1.0) * 0.5;
        let mut bodies = Vec::with_capacity(nx * ny * nz);
        for y in 0..ny {
            for x in 0..nx {
                for z in 0..nz {
                    let position = Vector3::new(
                        x as f32 - offset(nx),
                        config.floor_y + 0.5 + y as f32,
                        z as f32 - offset(nz),
                    );
                    bodies.push(
                        BodySpec::cube(Vector3::new(1.0, 1.0, 1.0), 5.0)
                            .at(position)
                            .with_restitution(0.1)
                            .with_subdivisions(3),
                    );
                }
            }
        }
        Self { config, bodies }
    }

    /// A single sphere of radius 1 and mass 1 dropped from `y = 5` with
    /// restitution 0.8 and no friction.
    pub fn bouncing_sphere() -> Self {
        let unit_mass_density = 3.0 / (4.0 * PI);
        Self {
            config: WorldConfig::default(),
            bodies: vec![BodySpec::sphere(1.0, unit_mass_density)
                .at(Vector3::new(0.0, 5.0, 0.0))
                .with_restitution(0.8)
                .with_friction(0.0)],
        }
    }
}

/// The bodies a [`SceneDesc`] created in a world, with their initial state.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    entries: Vec<(BodyHandle, RigidBody)>,
}

impl Scene {
    /// Validate every body description, then add all bodies to `world`.
    ///
    /// Nothing is added when any description is invalid.
    pub fn populate(desc: &SceneDesc, world: &mut PhysicsWorld) -> Result<Self, SceneError> {
        let prototypes = desc
            .bodies
            .iter()
            .enumerate()
            .map(|(index, spec)| spec.build().map_err(|source| SceneError::Body { index, source }))
            .collect::<Result<Vec<_>, _>>()?;

        let entries: Vec<_> = prototypes
            .into_iter()
            .map(|body| (world.add_body(body.clone()), body))
            .collect();
        debug!("scene populated with {} bodies", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.entries.iter().map(|(handle, _)| *handle)
    }

    /// Restore every scene body to its initial state. Bodies removed from
    /// the world since are added again under new handles.
    pub fn reset(&mut self, world: &mut PhysicsWorld) {
        let mut re_added = 0;
        for (handle, initial) in &mut self.entries {
            match world.body_mut(*handle) {
                Some(body) => *body = initial.clone(),
                None => {
                    *handle = world.add_body(initial.clone());
                    re_added += 1;
                }
            }
        }
        debug!("scene reset: {} bodies, {re_added} re-added", self.entries.len());
    }
}

/// Spawn a sphere at `origin` moving along `direction` at `speed`.
pub fn launch_sphere(
    world: &mut PhysicsWorld,
    origin: Vector3<f32>,
    direction: Vector3<f32>,
    speed: f32,
    radius: f32,
    density: f32,
) -> Result<BodyHandle, BodyError> {
    let direction = direction
        .try_normalize(f32::EPSILON)
        .ok_or(BodyError::ZeroDirection)?;
    let body = BodySpec::sphere(radius, density)
        .at(origin)
        .with_velocity(direction * speed)
        .build()?;
    Ok(world.add_body(body))
}

/// Spawn a sphere at rest at `position`.
pub fn drop_sphere(
    world: &mut PhysicsWorld,
    position: Vector3<f32>,
    radius: f32,
    density: f32,
    restitution: f32,
) -> Result<BodyHandle, BodyError> {
    let body = BodySpec::sphere(radius, density)
        .at(position)
        .with_restitution(restitution)
        .build()?;
    Ok(world.add_body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Shape;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_body_defaults_from_json() {
        let spec: BodySpec = serde_json::from_str(r#"{ "position": [1.0, 2.0, 3.0] }"#).unwrap();
        assert_eq!(spec.position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(spec.density, 1.0);
        assert!(matches!(spec.shape, ShapeSpec::Box { .. }));
    }

    #[test]
    fn test_build_box() {
        let body = BodySpec::cube(Vector3::new(2.0, 1.0, 1.0), 5.0)
            .with_subdivisions(1)
            .build()
            .unwrap();
        assert!(approx_eq(body.mass, 10.0));
        match &body.shape {
            Shape::Box { samples, half_extents } => {
                assert_eq!(samples.len(), 26);
                assert!(approx_eq(half_extents.x, 1.0));
            }
            Shape::Sphere { .. } => panic!("expected a box"),
        }
    }

    #[test]
    fn test_build_applies_rotation() {
        let body = BodySpec::cube(Vector3::new(1.0, 1.0, 1.0), 1.0)
            .with_rotation_degrees(Vector3::new(0.0, 0.0, 90.0))
            .build()
            .unwrap();
        let x = body.orientation * Vector3::x();
        assert!(approx_eq(x.y, 1.0));
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            BodySpec::sphere(1.0, 0.0).validate(),
            Err(BodyError::InvalidDensity(0.0))
        );
        assert_eq!(
            BodySpec::sphere(-1.0, 1.0).validate(),
            Err(BodyError::InvalidRadius(-1.0))
        );
        assert!(matches!(
            BodySpec::cube(Vector3::new(1.0, 0.0, 1.0), 1.0).validate(),
            Err(BodyError::InvalidSize(_))
        ));
        assert_eq!(
            BodySpec::default().with_friction(1.5).validate(),
            Err(BodyError::CoefficientOutOfRange { name: "friction", value: 1.5 })
        );
        assert_eq!(
            BodySpec::default().at(Vector3::new(f32::NAN, 0.0, 0.0)).validate(),
            Err(BodyError::NonFinite("position"))
        );
    }

    #[test]
    fn test_custom_samples() {
        let mut spec = BodySpec::default();
        spec.samples = Some(vec![[0.0, -0.5, 0.0]]);
        let body = spec.build().unwrap();
        assert_eq!(body.world_vertices().count(), 1);

        spec.samples = Some(vec![]);
        assert_eq!(spec.build().unwrap_err(), BodyError::InvalidSamples);
    }

    #[test]
    fn test_from_json_reports_body_index() {
        let err = SceneDesc::from_json(
            r#"{ "bodies": [ {}, { "shape": { "type": "sphere", "radius": 0.0 } } ] }"#,
        )
        .unwrap_err();
        match err {
            SceneError::Body { index, source } => {
                assert_eq!(index, 1);
                assert_eq!(source, BodyError::InvalidRadius(0.0));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_from_json_parse_error() {
        let err = SceneDesc::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SceneError::Parse(_)));
        assert!(err.to_string().starts_with("invalid scene document"));
    }

    #[test]
    fn test_json_round_trip() {
        let desc = SceneDesc::bouncing_sphere();
        let json = desc.to_json().unwrap();
        assert_eq!(SceneDesc::from_json(&json).unwrap(), desc);
    }

    #[test]
    fn test_box_stack_layout() {
        let desc = SceneDesc::box_stack(4, 4, 4);
        assert_eq!(desc.bodies.len(), 64);
        let lowest = desc
            .bodies
            .iter()
            .map(|b| b.position.y)
            .fold(f32::INFINITY, f32::min);
        assert!(approx_eq(lowest, desc.config.floor_y + 0.5));
        let x_sum: f32 = desc.bodies.iter().map(|b| b.position.x).sum();
        assert!(approx_eq(x_sum, 0.0));
        assert!(desc.bodies.iter().all(|b| b.density == 5.0));
    }

    #[test]
    fn test_bouncing_sphere_unit_mass() {
        let desc = SceneDesc::bouncing_sphere();
        let body = desc.bodies[0].build().unwrap();
        assert!(approx_eq(body.mass, 1.0));
        assert_eq!(body.restitution, 0.8);
    }

    #[test]
    fn test_populate_is_all_or_nothing() {
        let mut world = PhysicsWorld::default();
        let desc = SceneDesc {
            config: WorldConfig::default(),
            bodies: vec![BodySpec::default(), BodySpec::sphere(1.0, -1.0)],
        };
        assert!(Scene::populate(&desc, &mut world).is_err());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let desc = SceneDesc::bouncing_sphere();
        let mut world = PhysicsWorld::new(desc.config);
        let mut scene = Scene::populate(&desc, &mut world).unwrap();
        let handle = scene.handles().next().unwrap();

        for _ in 0..100 {
            world.step(0.0025);
        }
        assert!(world.body(handle).unwrap().position.y < 5.0);

        scene.reset(&mut world);
        assert_eq!(world.body(handle).unwrap().position, Vector3::new(0.0, 5.0, 0.0));
        assert_eq!(world.body(handle).unwrap().linear_velocity, Vector3::zeros());

        world.remove_body(handle);
        scene.reset(&mut world);
        let new_handle = scene.handles().next().unwrap();
        assert_ne!(new_handle, handle);
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_launch_sphere() {
        let mut world = PhysicsWorld::default();
        let h = launch_sphere(
            &mut world,
            Vector3::new(0.0, 1.0, 10.0),
            Vector3::new(0.0, 0.0, -2.0),
            20.0,
            0.5,
            10.0,
        )
        .unwrap();
        assert!(approx_eq(world.body(h).unwrap().linear_velocity.z, -20.0));

        let err = launch_sphere(&mut world, Vector3::zeros(), Vector3::zeros(), 1.0, 0.5, 1.0);
        assert_eq!(err, Err(BodyError::ZeroDirection));
    }

    #[test]
    fn test_drop_sphere() {
        let mut world = PhysicsWorld::default();
        let h = drop_sphere(&mut world, Vector3::new(0.0, 15.0, 0.0), 3.0, 15.0, 0.3).unwrap();
        let body = world.body(h).unwrap();
        assert_eq!(body.speed(), 0.0);
        assert_eq!(body.restitution, 0.3);
        assert!(drop_sphere(&mut world, Vector3::zeros(), 1.0, 1.0, 2.0).is_err());
    }
}
