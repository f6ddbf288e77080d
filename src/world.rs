//! The simulation world: body arena and the per-tick pipeline.
//!
//! One tick runs four phases in order:
//!
//! 1. **Apply forces**: gravity, user forces and damping update velocities
//!    (data-parallel over bodies).
//! 2. **Detect collisions**: broad phase, ground tests and narrow phase build
//!    a fresh contact list. Rows of the pair space are split across workers,
//!    each worker fills a private list, and the lists are merged under a
//!    single lock. The merged list is then stably sorted by body pair so the
//!    solve order never depends on scheduling.
//! 3. **Solve**: sequential impulses on the contact list (single-threaded).
//! 4. **Integrate**: positions and orientations advance with the solved
//!    velocities (data-parallel over bodies).
//!
//! Bodies may only be added, removed or edited between ticks.
//!
//! Bodies are stored densely, so every phase touches live bodies only. A
//! [`Slab`] maps handle slots to dense positions; removal swaps the last
//! body into the hole and patches its slot. Freed slots are reused under a
//! new generation, which keeps stale handles invalid.

use std::sync::{Mutex, PoisonError};

use log::{debug, warn};
use nalgebra::{Matrix4, Vector3};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use slab::Slab;

use crate::body::{BodyHandle, RigidBody, ShapeKind};
use crate::broadphase::BroadPhase;
use crate::config::WorldConfig;
use crate::contact::ContactConstraint;
use crate::integrator;
use crate::narrowphase;
use crate::solver::{ConstraintSolver, SolverBody};
use crate::timing::{PhaseTimer, StepStats};

/// Everything a renderer needs to draw one body.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTransform {
    pub handle: BodyHandle,
    /// `T * R * S`; meshes are a unit cube or a unit sphere.
    pub model: Matrix4<f32>,
    pub kind: ShapeKind,
    pub aabb_min: Vector3<f32>,
    pub aabb_max: Vector3<f32>,
}

/// Owns the bodies and steps the simulation forward.
///
/// # Example
/// ```
/// use pgs_physics::{PhysicsWorld, RigidBody, WorldConfig};
/// use nalgebra::Vector3;
///
/// let mut world = PhysicsWorld::new(WorldConfig::default());
/// let ball = RigidBody::new()
///     .with_sphere_shape(0.5, 1.0)
///     .with_position(Vector3::new(0.0, 5.0, 0.0));
/// let handle = world.add_body(ball);
///
/// world.step(1.0 / 60.0);
/// assert!(world.body(handle).unwrap().position.y < 5.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PhysicsWorld {
    /// Live bodies, densely packed.
    bodies: Vec<RigidBody>,
    /// Handle of each entry in `bodies`.
    handles: Vec<BodyHandle>,
    /// Handle slot to current entry.
    slots: Slab<Slot>,
    next_generation: u32,
    config: WorldConfig,
    /// Contacts of the last tick, with their solved impulses.
    contacts: Vec<ContactConstraint>,
    stats: StepStats,
}

/// Arena entry for one live body.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    generation: u32,
    /// Position in `PhysicsWorld::bodies`.
    dense: usize,
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            bodies: Vec::new(),
            handles: Vec::new(),
            slots: Slab::new(),
            next_generation: 0,
            config,
            contacts: Vec::new(),
            stats: StepStats::default(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut WorldConfig {
        &mut self.config
    }

    /// Set the gravity vector (e.g., `Vector3::new(0.0, -9.81, 0.0)`).
    pub fn set_gravity(&mut self, gravity: Vector3<f32>) {
        self.config.gravity = gravity;
    }

    pub fn gravity(&self) -> Vector3<f32> {
        self.config.gravity
    }

    // -- Body management --

    /// Add a body and return its handle.
    ///
    /// The world-space inertia is refreshed from the body's orientation.
    pub fn add_body(&mut self, mut body: RigidBody) -> BodyHandle {
        body.update_inertia_world();
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        let index = self.slots.insert(Slot {
            generation,
            dense: self.bodies.len(),
        });
        let handle = BodyHandle::new(index, generation);
        debug!(
            "add body {}:{} ({:?}, mass {:.3}) at {:?}",
            index,
            generation,
            body.shape.kind(),
            body.mass,
            body.position
        );
        self.bodies.push(body);
        self.handles.push(handle);
        handle
    }

    /// Remove a body, returning it. The handle stays invalid afterwards.
    ///
    /// The last body takes the removed body's place in iteration order.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let Some(dense) = self.dense_index(handle) else {
            warn!("remove_body: unknown handle {handle:?}");
            return None;
        };
        self.slots.remove(handle.index());
        let body = self.bodies.swap_remove(dense);
        self.handles.swap_remove(dense);
        if let Some(displaced) = self.handles.get(dense) {
            self.slots[displaced.index()].dense = dense;
        }
        debug!("remove body {}:{}", handle.index(), handle.generation());
        Some(body)
    }

    /// Dense position of a live body.
    fn dense_index(&self, handle: BodyHandle) -> Option<usize> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .map(|slot| slot.dense)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.dense_index(handle).map(|i| &self.bodies[i])
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.dense_index(handle).map(|i| &mut self.bodies[i])
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Iterate over live bodies in storage order: insertion order, except
    /// that a removal moves the last body into the freed place.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.handles.iter().copied().zip(&self.bodies)
    }

    pub fn bodies_mut(&mut self) -> impl Iterator<Item = (BodyHandle, &mut RigidBody)> {
        self.handles.iter().copied().zip(self.bodies.iter_mut())
    }

    /// Remove every body. Handles handed out earlier stay invalid.
    pub fn clear(&mut self) {
        debug!("clear {} bodies", self.body_count());
        self.bodies.clear();
        self.handles.clear();
        self.slots.clear();
        self.contacts.clear();
    }

    // -- Results --

    /// Contacts of the last tick, ordered by body pair.
    pub fn contacts(&self) -> &[ContactConstraint] {
        &self.contacts
    }

    pub fn last_stats(&self) -> &StepStats {
        &self.stats
    }

    /// Render transforms of all live bodies in storage order.
    pub fn render_transforms(&self) -> Vec<RenderTransform> {
        self.bodies()
            .map(|(handle, body)| {
                let (aabb_min, aabb_max) = body.world_aabb();
                RenderTransform {
                    handle,
                    model: body.model_matrix(),
                    kind: body.shape.kind(),
                    aabb_min,
                    aabb_max,
                }
            })
            .collect()
    }

    // -- Stepping --

    /// Advance the simulation by one tick of `dt` seconds.
    ///
    /// A non-positive or non-finite `dt` is logged and ignored.
    pub fn step(&mut self, dt: f32) {
        if !(dt > 0.0 && dt.is_finite()) {
            warn!("step: ignoring non-positive dt {dt}");
            return;
        }

        let mut timer = PhaseTimer::start();
        let mut stats = StepStats {
            body_count: self.body_count(),
            ..StepStats::default()
        };

        self.apply_forces(dt);
        stats.apply_forces_ms = timer.lap("apply forces");

        let (contacts, candidate_pairs) = self.detect_collisions();
        self.contacts = contacts;
        stats.candidate_pairs = candidate_pairs;
        stats.contact_count = self.contacts.len();
        stats.detection_ms = timer.lap("detect collisions");

        self.solve(dt);
        stats.solve_ms = timer.lap("solve");

        self.integrate(dt);
        stats.integrate_ms = timer.lap("integrate");

        debug!(
            "tick: {} bodies, {} candidate pairs, {} contacts, {:.3} ms",
            stats.body_count,
            stats.candidate_pairs,
            stats.contact_count,
            stats.total_ms()
        );
        self.stats = stats;
    }

    /// Advance the simulation using fixed-size substeps for stability.
    ///
    /// Divides `dt` into `substeps` equal intervals (at least one).
    pub fn step_fixed(&mut self, dt: f32, substeps: u32) {
        let substeps = substeps.max(1);
        let sub_dt = dt / substeps as f32;
        for _ in 0..substeps {
            self.step(sub_dt);
        }
    }

    fn apply_forces(&mut self, dt: f32) {
        let config = &self.config;
        #[cfg(feature = "parallel")]
        self.bodies
            .par_iter_mut()
            .for_each(|body| integrator::apply_forces(body, config, dt));
        #[cfg(not(feature = "parallel"))]
        self.bodies
            .iter_mut()
            .for_each(|body| integrator::apply_forces(body, config, dt));
    }

    fn integrate(&mut self, dt: f32) {
        let config = &self.config;
        #[cfg(feature = "parallel")]
        self.bodies
            .par_iter_mut()
            .for_each(|body| integrator::integrate(body, config, dt));
        #[cfg(not(feature = "parallel"))]
        self.bodies
            .iter_mut()
            .for_each(|body| integrator::integrate(body, config, dt));
    }

    /// Build this tick's contact list from the current poses.
    ///
    /// Returns the contacts sorted by body pair, and the number of pairs that
    /// passed the broad phase.
    pub fn detect_collisions(&self) -> (Vec<ContactConstraint>, usize) {
        let live: Vec<(BodyHandle, &RigidBody)> = self.bodies().collect();
        let broad = BroadPhase::from_config(&self.config);
        let floor_y = self.config.floor_y;

        // Row `i`: ground contacts of body i and its pairs with every j > i
        let detect_row = |(mut contacts, mut pairs): (Vec<ContactConstraint>, usize), i: usize| {
            let (ha, a) = live[i];
            if broad.is_ground_candidate(a) {
                narrowphase::ground_contacts(ha, a, floor_y, &mut contacts);
            }
            for &(hb, b) in &live[i + 1..] {
                if broad.test_pair(a, b) {
                    pairs += 1;
                    narrowphase::collide(ha, a, hb, b, &mut contacts);
                }
            }
            (contacts, pairs)
        };

        let merged = Mutex::new((Vec::new(), 0usize));
        let merge = |(contacts, pairs): (Vec<ContactConstraint>, usize)| {
            let mut guard = merged.lock().unwrap_or_else(PoisonError::into_inner);
            guard.0.extend(contacts);
            guard.1 += pairs;
        };

        #[cfg(feature = "parallel")]
        (0..live.len())
            .into_par_iter()
            .fold(|| (Vec::new(), 0usize), detect_row)
            .for_each(merge);
        #[cfg(not(feature = "parallel"))]
        merge((0..live.len()).fold((Vec::new(), 0usize), detect_row));

        let (mut contacts, pairs) = merged.into_inner().unwrap_or_else(PoisonError::into_inner);
        // Stable: contacts of one pair keep their generation order
        contacts.sort_by_key(ContactConstraint::pair_key);
        (contacts, pairs)
    }

    fn solve(&mut self, dt: f32) {
        if self.contacts.is_empty() {
            return;
        }

        // Contacts were built from live bodies this tick
        for c in &mut self.contacts {
            c.index_a = self.slots[c.body_a.index()].dense;
            c.index_b = c.body_b.map(|h| self.slots[h.index()].dense);
        }

        let mut solver_bodies: Vec<SolverBody> =
            self.bodies.iter().map(SolverBody::from_body).collect();

        ConstraintSolver::new(self.config.solver).solve(&mut solver_bodies, &mut self.contacts, dt);

        for (body, solved) in self.bodies.iter_mut().zip(&solver_bodies) {
            if !body.is_fixed() {
                body.linear_velocity = solved.linear_velocity;
                body.angular_velocity = solved.angular_velocity;
            }
        }
    }
}
