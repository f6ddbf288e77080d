//! Exact collision tests producing contact constraints.
//!
//! Normals always point from body B toward body A. Pairs are emitted as
//! `(A, B)` in the world's storage order, so for a pair `(i, j)` with
//! `i < j` the normal pushes body `i` away from body `j`.
//!
//! Box contacts are found by sampling: every sample vertex of a movable box
//! that lies below the floor or inside the opposing box becomes one contact.
//! Face-to-face rests therefore get several simultaneous contact points.

use nalgebra::{Matrix3, Vector3};

use crate::body::{BodyHandle, RigidBody, Shape};
use crate::contact::ContactConstraint;

/// Cross-product axes shorter than this come from (nearly) parallel edges
/// and cannot separate the boxes.
const AXIS_EPSILON: f32 = 1e-3;

/// Centre distances below this are treated as coincident.
const DISTANCE_EPSILON: f32 = 1e-6;

/// World-space oriented box.
#[derive(Debug, Clone, Copy)]
struct Obb {
    center: Vector3<f32>,
    rotation: Matrix3<f32>,
    axes: [Vector3<f32>; 3],
    half_extents: Vector3<f32>,
}

impl Obb {
    fn new(body: &RigidBody, half_extents: Vector3<f32>) -> Self {
        let rotation = body.orientation.to_rotation_matrix().into_inner();
        Self {
            center: body.position,
            axes: [
                rotation.column(0).into_owned(),
                rotation.column(1).into_owned(),
                rotation.column(2).into_owned(),
            ],
            rotation,
            half_extents,
        }
    }

    /// Half-length of the box projected onto a unit axis.
    fn project(&self, axis: &Vector3<f32>) -> f32 {
        self.half_extents.x * axis.dot(&self.axes[0]).abs()
            + self.half_extents.y * axis.dot(&self.axes[1]).abs()
            + self.half_extents.z * axis.dot(&self.axes[2]).abs()
    }

    fn to_local(&self, p: &Vector3<f32>) -> Vector3<f32> {
        self.rotation.transpose() * (p - self.center)
    }

    fn to_world(&self, local: &Vector3<f32>) -> Vector3<f32> {
        self.center + self.rotation * local
    }

    /// Vertex-vs-box test: whether `p` lies inside (or on) the box.
    fn contains(&self, p: &Vector3<f32>) -> bool {
        let local = self.to_local(p);
        local.x.abs() <= self.half_extents.x
            && local.y.abs() <= self.half_extents.y
            && local.z.abs() <= self.half_extents.z
    }
}

/// Emit ground-plane contacts for one body.
///
/// Spheres produce at most one contact; boxes one per sample vertex below
/// the floor. Immovable bodies never touch the ground.
pub fn ground_contacts(
    handle: BodyHandle,
    body: &RigidBody,
    floor_y: f32,
    out: &mut Vec<ContactConstraint>,
) {
    if body.is_fixed() {
        return;
    }
    match &body.shape {
        Shape::Sphere { radius } => {
            let bottom = body.position.y - radius;
            if bottom < floor_y {
                let point = body.position - Vector3::new(0.0, *radius, 0.0);
                out.push(ContactConstraint::ground(handle, point, floor_y - bottom));
            }
        }
        Shape::Box { .. } => {
            for p in body.world_vertices() {
                if p.y < floor_y {
                    out.push(ContactConstraint::ground(handle, p, floor_y - p.y));
                }
            }
        }
    }
}

/// Emit contacts between two bodies, if they overlap.
///
/// Returns the number of contacts added.
pub fn collide(
    handle_a: BodyHandle,
    a: &RigidBody,
    handle_b: BodyHandle,
    b: &RigidBody,
    out: &mut Vec<ContactConstraint>,
) -> usize {
    let before = out.len();
    match (&a.shape, &b.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            if let Some((point, normal, penetration)) =
                collide_sphere_sphere(&a.position, *ra, &b.position, *rb)
            {
                out.push(ContactConstraint::new(handle_a, Some(handle_b), point, normal, penetration));
            }
        }
        (Shape::Sphere { radius }, Shape::Box { half_extents, .. }) => {
            let obb = Obb::new(b, *half_extents);
            if let Some((point, normal, penetration)) = collide_sphere_box(&a.position, *radius, &obb) {
                out.push(ContactConstraint::new(handle_a, Some(handle_b), point, normal, penetration));
            }
        }
        (Shape::Box { half_extents, .. }, Shape::Sphere { radius }) => {
            let obb = Obb::new(a, *half_extents);
            if let Some((point, normal, penetration)) = collide_sphere_box(&b.position, *radius, &obb) {
                // Computed from the box toward the sphere, i.e. A toward B
                out.push(ContactConstraint::new(handle_a, Some(handle_b), point, -normal, penetration));
            }
        }
        (Shape::Box { half_extents: ha, .. }, Shape::Box { half_extents: hb, .. }) => {
            collide_box_box(handle_a, a, &Obb::new(a, *ha), handle_b, b, &Obb::new(b, *hb), out);
        }
    }
    out.len() - before
}

/// Sphere vs sphere.
///
/// Returns `(point, normal_b_to_a, penetration)`. The point is the middle of
/// the overlap along the line of centres.
fn collide_sphere_sphere(
    pos_a: &Vector3<f32>,
    radius_a: f32,
    pos_b: &Vector3<f32>,
    radius_b: f32,
) -> Option<(Vector3<f32>, Vector3<f32>, f32)> {
    let diff = pos_a - pos_b;
    let dist_sq = diff.norm_squared();
    let sum_r = radius_a + radius_b;

    if dist_sq >= sum_r * sum_r {
        return None;
    }

    let dist = dist_sq.sqrt();
    let penetration = sum_r - dist;
    let normal = if dist > DISTANCE_EPSILON {
        diff / dist
    } else {
        // Coincident centres: separate vertically
        Vector3::y()
    };
    let point = pos_b + normal * (radius_b - 0.5 * penetration);

    Some((point, normal, penetration))
}

/// Sphere vs oriented box.
///
/// Returns `(point, normal_box_to_sphere, penetration)`; the point lies on
/// the box surface.
fn collide_sphere_box(
    center: &Vector3<f32>,
    radius: f32,
    obb: &Obb,
) -> Option<(Vector3<f32>, Vector3<f32>, f32)> {
    let local = obb.to_local(center);
    let h = obb.half_extents;
    let clamped = Vector3::new(
        local.x.clamp(-h.x, h.x),
        local.y.clamp(-h.y, h.y),
        local.z.clamp(-h.z, h.z),
    );

    if clamped != local {
        let diff = local - clamped;
        let dist_sq = diff.norm_squared();
        if dist_sq >= radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        let normal_local = if dist > DISTANCE_EPSILON {
            diff / dist
        } else {
            face_normal(&local, &h).0
        };
        return Some((
            obb.to_world(&clamped),
            obb.rotation * normal_local,
            radius - dist,
        ));
    }

    // Centre inside the box: push out through the nearest face
    let (normal_local, depth, axis) = face_normal(&local, &h);
    let mut surface = local;
    surface[axis] = normal_local[axis] * h[axis];
    Some((
        obb.to_world(&surface),
        obb.rotation * normal_local,
        radius + depth,
    ))
}

/// Face of minimum penetration for a box-local point inside the box.
///
/// Returns `(local_normal, distance_to_face, axis_index)`.
fn face_normal(local: &Vector3<f32>, h: &Vector3<f32>) -> (Vector3<f32>, f32, usize) {
    let mut axis = 0;
    let mut depth = f32::INFINITY;
    for k in 0..3 {
        let d = h[k] - local[k].abs();
        if d < depth {
            depth = d;
            axis = k;
        }
    }
    let mut normal = Vector3::zeros();
    normal[axis] = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
    (normal, depth.max(0.0), axis)
}

/// Separating-axis test over the 15 candidate axes.
///
/// Returns the axis of minimum overlap, oriented from B toward A, and the
/// overlap along it; `None` if any axis separates the boxes.
fn sat_box_box(a: &Obb, b: &Obb) -> Option<(Vector3<f32>, f32)> {
    let d = b.center - a.center;
    let mut best: Option<(Vector3<f32>, f32)> = None;

    let mut overlaps = |axis: Vector3<f32>| -> bool {
        let len = axis.norm();
        if len < AXIS_EPSILON {
            return true;
        }
        let axis = axis / len;
        let dist = d.dot(&axis);
        let overlap = a.project(&axis) + b.project(&axis) - dist.abs();
        if overlap < 0.0 {
            return false;
        }
        if best.map_or(true, |(_, min)| overlap < min) {
            best = Some((if dist > 0.0 { -axis } else { axis }, overlap));
        }
        true
    };

    for axis in a.axes.iter().chain(b.axes.iter()) {
        if !overlaps(*axis) {
            return None;
        }
    }
    for ea in &a.axes {
        for eb in &b.axes {
            if !overlaps(ea.cross(eb)) {
                return None;
            }
        }
    }

    best
}

/// Box vs box: SAT for the normal, vertex sampling for the points.
///
/// Every contact is attributed to the pair `(A, B)` with the SAT normal.
/// A vertex of A buried in B is measured from B's face that looks toward A;
/// a vertex of B buried in A from A's face that looks toward B. When no
/// vertex is inside (edge-on-edge), a single contact at the midpoint of the
/// centres carries the SAT overlap.
fn collide_box_box(
    handle_a: BodyHandle,
    a: &RigidBody,
    obb_a: &Obb,
    handle_b: BodyHandle,
    b: &RigidBody,
    obb_b: &Obb,
    out: &mut Vec<ContactConstraint>,
) {
    let Some((normal, min_overlap)) = sat_box_box(obb_a, obb_b) else {
        return;
    };
    let before = out.len();
    let contact = |point: Vector3<f32>, depth: f32| {
        ContactConstraint::new(
            handle_a,
            Some(handle_b),
            point,
            normal,
            depth.clamp(0.0, min_overlap),
        )
    };

    if !a.is_fixed() {
        let reach = obb_b.project(&normal);
        for p in a.world_vertices().filter(|p| obb_b.contains(p)) {
            out.push(contact(p, reach - (p - obb_b.center).dot(&normal)));
        }
    }
    if !b.is_fixed() {
        let reach = obb_a.project(&normal);
        for p in b.world_vertices().filter(|p| obb_a.contains(p)) {
            out.push(contact(p, reach + (p - obb_a.center).dot(&normal)));
        }
    }

    if out.len() == before {
        out.push(contact((obb_a.center + obb_b.center) * 0.5, min_overlap));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vector3<f32>, b: &Vector3<f32>) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    fn cube(position: Vector3<f32>) -> RigidBody {
        RigidBody::new()
            .with_box_shape(Vector3::new(1.0, 1.0, 1.0), 1.0)
            .with_position(position)
    }

    fn sphere(position: Vector3<f32>, radius: f32) -> RigidBody {
        RigidBody::new()
            .with_sphere_shape(radius, 1.0)
            .with_position(position)
    }

    fn pair(a: &RigidBody, b: &RigidBody) -> Vec<ContactConstraint> {
        let mut out = Vec::new();
        collide(BodyHandle::new(0, 0), a, BodyHandle::new(1, 0), b, &mut out);
        out
    }

    // -- Ground --

    #[test]
    fn test_sphere_ground_contact() {
        let mut out = Vec::new();
        ground_contacts(BodyHandle::new(0, 0), &sphere(Vector3::new(0.0, 0.9, 0.0), 1.0), 0.0, &mut out);
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert!(c.body_b.is_none());
        assert!(approx_eq(c.penetration, 0.1));
        assert!(approx_vec_eq(&c.normal, &Vector3::y()));
        assert!(approx_vec_eq(&c.point, &Vector3::new(0.0, -0.1, 0.0)));
    }

    #[test]
    fn test_sphere_above_ground_no_contact() {
        let mut out = Vec::new();
        ground_contacts(BodyHandle::new(0, 0), &sphere(Vector3::new(0.0, 1.1, 0.0), 1.0), 0.0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_box_ground_contacts_per_vertex() {
        let mut out = Vec::new();
        ground_contacts(BodyHandle::new(0, 0), &cube(Vector3::new(0.0, 0.45, 0.0)), 0.0, &mut out);
        // The four bottom corners are below the floor
        assert_eq!(out.len(), 4);
        for c in &out {
            assert!(approx_eq(c.penetration, 0.05));
        }
    }

    #[test]
    fn test_tilted_box_touches_ground_on_edge() {
        let body = cube(Vector3::new(0.0, 0.7, 0.0))
            .with_orientation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.785_398));
        let mut out = Vec::new();
        ground_contacts(BodyHandle::new(0, 0), &body, 0.0, &mut out);
        // Resting on an edge: two corners at the same depth
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_fixed_body_ignores_ground() {
        let mut out = Vec::new();
        ground_contacts(BodyHandle::new(0, 0), &cube(Vector3::zeros()).with_fixed(true), 0.0, &mut out);
        assert!(out.is_empty());
    }

    // -- Sphere vs sphere --

    #[test]
    fn test_sphere_sphere_separated() {
        assert!(pair(&sphere(Vector3::zeros(), 1.0), &sphere(Vector3::new(3.0, 0.0, 0.0), 1.0)).is_empty());
    }

    #[test]
    fn test_sphere_sphere_touching_not_reported() {
        assert!(pair(&sphere(Vector3::zeros(), 1.0), &sphere(Vector3::new(2.0, 0.0, 0.0), 1.0)).is_empty());
    }

    #[test]
    fn test_sphere_sphere_overlapping() {
        let out = pair(&sphere(Vector3::zeros(), 1.0), &sphere(Vector3::new(1.5, 0.0, 0.0), 1.0));
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert!(approx_eq(c.penetration, 0.5));
        // From B (at +x) toward A (origin)
        assert!(approx_vec_eq(&c.normal, &Vector3::new(-1.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&c.point, &Vector3::new(0.75, 0.0, 0.0)));
    }

    #[test]
    fn test_sphere_sphere_coincident() {
        let out = pair(&sphere(Vector3::zeros(), 1.0), &sphere(Vector3::zeros(), 1.0));
        let c = &out[0];
        assert!(approx_eq(c.penetration, 2.0));
        assert!(approx_eq(c.normal.norm(), 1.0));
    }

    // -- Sphere vs box --

    #[test]
    fn test_sphere_box_face_contact() {
        let out = pair(
            &sphere(Vector3::new(0.0, 1.2, 0.0), 0.5),
            &cube(Vector3::zeros()),
        );
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert!(approx_eq(c.penetration, 0.2));
        assert!(approx_vec_eq(&c.normal, &Vector3::y()));
        assert!(approx_vec_eq(&c.point, &Vector3::new(0.0, 0.5, 0.0)));
    }

    #[test]
    fn test_box_sphere_order_flips_normal() {
        let out = pair(
            &cube(Vector3::zeros()),
            &sphere(Vector3::new(0.0, 1.2, 0.0), 0.5),
        );
        assert_eq!(out.len(), 1);
        // B is the sphere above, so the normal points down toward the box
        assert!(approx_vec_eq(&out[0].normal, &Vector3::new(0.0, -1.0, 0.0)));
    }

    #[test]
    fn test_sphere_box_separated() {
        assert!(pair(&sphere(Vector3::new(0.0, 1.1, 0.0), 0.5), &cube(Vector3::zeros())).is_empty());
    }

    #[test]
    fn test_sphere_box_rotated() {
        // Box rotated 45° about Z exposes an edge at x = sqrt(2)/2
        let rotated = cube(Vector3::zeros())
            .with_orientation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.785_398));
        let out = pair(&sphere(Vector3::new(1.0, 0.0, 0.0), 0.5), &rotated);
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert!(approx_eq(c.penetration, 0.5 - (1.0 - 0.5_f32.sqrt())));
        assert!(approx_vec_eq(&c.normal, &Vector3::x()));
    }

    #[test]
    fn test_sphere_centre_inside_box() {
        let out = pair(
            &sphere(Vector3::new(0.0, 0.3, 0.0), 0.25),
            &cube(Vector3::zeros()),
        );
        let c = &out[0];
        // Nearest face is +Y at distance 0.2
        assert!(approx_vec_eq(&c.normal, &Vector3::y()));
        assert!(approx_eq(c.penetration, 0.45));
        assert!(approx_vec_eq(&c.point, &Vector3::new(0.0, 0.5, 0.0)));
    }

    // -- Box vs box --

    #[test]
    fn test_sat_separated_boxes() {
        assert!(pair(&cube(Vector3::zeros()), &cube(Vector3::new(1.2, 0.0, 0.0))).is_empty());
    }

    #[test]
    fn test_sat_separated_on_edge_axis() {
        // Crossed edges (A's along Z, B's along X) with a small vertical gap:
        // every face axis overlaps, only Z × X = Y separates them
        let a = cube(Vector3::zeros())
            .with_orientation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.785_398));
        let b = cube(Vector3::new(0.0, 1.45, 0.0))
            .with_orientation(UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.785_398));
        let obb_a = Obb::new(&a, Vector3::new(0.5, 0.5, 0.5));
        let obb_b = Obb::new(&b, Vector3::new(0.5, 0.5, 0.5));
        let face_axes_overlap = obb_a
            .axes
            .iter()
            .chain(obb_b.axes.iter())
            .all(|axis| {
                let d = (obb_b.center - obb_a.center).dot(axis).abs();
                obb_a.project(axis) + obb_b.project(axis) >= d
            });
        assert!(face_axes_overlap);
        assert!(sat_box_box(&obb_a, &obb_b).is_none());
    }

    #[test]
    fn test_stacked_boxes_sample_both_faces() {
        let bottom = cube(Vector3::zeros());
        let top = cube(Vector3::new(0.0, 0.95, 0.0));
        let out = pair(&bottom, &top);
        // Four corners of each box are buried in the other
        assert_eq!(out.len(), 8);
        for c in &out {
            // Top is B, so the normal points down toward the bottom box
            assert!(approx_vec_eq(&c.normal, &Vector3::new(0.0, -1.0, 0.0)));
            assert!(approx_eq(c.penetration, 0.05));
            assert_eq!(c.body_a, BodyHandle::new(0, 0));
            assert_eq!(c.body_b, Some(BodyHandle::new(1, 0)));
        }
    }

    #[test]
    fn test_fixed_box_vertices_not_sampled() {
        let platform = cube(Vector3::zeros()).with_fixed(true);
        let top = cube(Vector3::new(0.0, 0.95, 0.0));
        let out = pair(&platform, &top);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_edge_edge_fallback_contact() {
        // Crossed edges: no corner of either box is inside the other
        let a = cube(Vector3::zeros())
            .with_orientation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.785_398));
        let b = cube(Vector3::new(0.0, 1.35, 0.0))
            .with_orientation(UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.785_398));
        let out = pair(&a, &b);
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert!(approx_vec_eq(&c.point, &Vector3::new(0.0, 0.675, 0.0)));
        assert!(c.normal.y < -0.99);
        assert!(approx_eq(c.penetration, 2.0_f32.sqrt() - 1.35));
    }
}
