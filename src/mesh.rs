//! Local-space vertex sets used to sample box contacts.
//!
//! Geometry construction belongs to the renderer; the physics core only needs
//! a cloud of points on the surface of each box. Points are expressed in the
//! unit-cube frame (`[-0.5, 0.5]³`) and stretched by the body's size when
//! transformed to world space, so one mesh can be shared by boxes of any size.

use std::sync::Arc;

use log::error;
use nalgebra::Vector3;

/// A shared, immutable set of sample vertices in unit-cube space.
///
/// Cloning is cheap: all clones point at the same vertex buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMesh {
    vertices: Arc<[Vector3<f32>]>,
}

impl SampleMesh {
    /// Wrap a vertex list, rejecting empty or non-finite input.
    ///
    /// Returns `None` (and logs why) when the vertex set cannot be used.
    pub fn new(vertices: Vec<Vector3<f32>>) -> Option<Self> {
        if vertices.is_empty() {
            error!("Sample mesh has no vertices");
            return None;
        }
        if let Some(bad) = vertices.iter().position(|v| !v.iter().all(|c| c.is_finite())) {
            error!("Sample mesh vertex {} is not finite", bad);
            return None;
        }
        Some(Self {
            vertices: vertices.into(),
        })
    }

    /// Build from the plain `[x, y, z]` arrays a renderer usually keeps.
    pub fn from_arrays(vertices: &[[f32; 3]]) -> Option<Self> {
        Self::new(vertices.iter().map(|v| Vector3::new(v[0], v[1], v[2])).collect())
    }

    /// The eight corners of the unit cube.
    pub fn cube_corners() -> Self {
        Self::cube_surface(0)
    }

    /// Corners plus a regular lattice on every face of the unit cube.
    ///
    /// `subdivisions` is the number of interior points per edge; `0` yields
    /// the corners only, `1` adds edge midpoints and face centres, and so on.
    /// Denser sampling gives more contact points for face-to-face rests.
    pub fn cube_surface(subdivisions: usize) -> Self {
        let k = subdivisions + 2;
        let step = 1.0 / (k - 1) as f32;
        let coord = |i: usize| -0.5 + i as f32 * step;
        let on_surface = |i: usize| i == 0 || i == k - 1;

        let mut vertices = Vec::with_capacity(6 * k * k);
        for x in 0..k {
            for y in 0..k {
                for z in 0..k {
                    if on_surface(x) || on_surface(y) || on_surface(z) {
                        vertices.push(Vector3::new(coord(x), coord(y), coord(z)));
                    }
                }
            }
        }

        Self {
            vertices: vertices.into(),
        }
    }

    pub fn vertices(&self) -> &[Vector3<f32>] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl Default for SampleMesh {
    fn default() -> Self {
        Self::cube_corners()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_corners() {
        let mesh = SampleMesh::cube_corners();
        assert_eq!(mesh.len(), 8);
        for v in mesh.vertices() {
            assert_eq!(v.x.abs(), 0.5);
            assert_eq!(v.y.abs(), 0.5);
            assert_eq!(v.z.abs(), 0.5);
        }
    }

    #[test]
    fn test_cube_surface_counts() {
        // k³ - (k-2)³ lattice points lie on the surface
        assert_eq!(SampleMesh::cube_surface(1).len(), 27 - 1);
        assert_eq!(SampleMesh::cube_surface(2).len(), 64 - 8);
    }

    #[test]
    fn test_cube_surface_points_on_surface() {
        let mesh = SampleMesh::cube_surface(3);
        for v in mesh.vertices() {
            let max = v.x.abs().max(v.y.abs()).max(v.z.abs());
            assert!((max - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_empty_mesh_rejected() {
        assert!(SampleMesh::new(Vec::new()).is_none());
    }

    #[test]
    fn test_non_finite_mesh_rejected() {
        assert!(SampleMesh::from_arrays(&[[0.0, f32::NAN, 0.0]]).is_none());
        assert!(SampleMesh::from_arrays(&[[0.0, 0.5, 0.0]]).is_some());
    }

    #[test]
    fn test_clones_share_storage() {
        let a = SampleMesh::cube_surface(2);
        let b = a.clone();
        assert!(std::ptr::eq(a.vertices().as_ptr(), b.vertices().as_ptr()));
    }
}
