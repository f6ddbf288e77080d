//! Rigid-body contact physics for boxes and spheres resting on a ground plane.
//!
//! Each fixed-timestep tick of a [`PhysicsWorld`] runs
//! `apply forces → detect collisions → solve → integrate`:
//!
//! - [`broadphase`] prunes pairs with inflated bounding spheres,
//! - [`narrowphase`] builds [`ContactConstraint`]s (closed-form sphere tests,
//!   SAT plus vertex sampling for boxes),
//! - [`solver`] resolves them with sequential impulses (Projected
//!   Gauss-Seidel) including restitution and Coulomb friction,
//! - [`integrator`] advances poses with semi-implicit Euler.
//!
//! Scenes can be described declaratively and loaded from JSON ([`scene`]).
//! With the default `parallel` feature, force application, detection and
//! integration run on the rayon thread pool; results do not depend on it.
//!
//! ```
//! use pgs_physics::scene::{Scene, SceneDesc};
//! use pgs_physics::{FixedStepper, PhysicsWorld};
//!
//! let desc = SceneDesc::bouncing_sphere();
//! let mut world = PhysicsWorld::new(desc.config);
//! let scene = Scene::populate(&desc, &mut world).unwrap();
//!
//! let mut stepper = FixedStepper::default();
//! stepper.advance(&mut world, 1.0 / 60.0);
//!
//! for transform in world.render_transforms() {
//!     let _ = (transform.kind, transform.model);
//! }
//! # assert_eq!(scene.len(), 1);
//! ```

pub mod body;
pub mod broadphase;
pub mod config;
pub mod contact;
pub mod integrator;
pub mod mesh;
pub mod narrowphase;
pub mod scene;
pub mod solver;
pub mod stepper;
pub mod timing;
pub mod world;

pub use body::{BodyHandle, RigidBody, Shape, ShapeKind};
pub use config::{SolverSettings, WorldConfig};
pub use contact::ContactConstraint;
pub use mesh::SampleMesh;
pub use scene::{BodySpec, Scene, SceneDesc, SceneError};
pub use stepper::FixedStepper;
pub use timing::StepStats;
pub use world::{PhysicsWorld, RenderTransform};
