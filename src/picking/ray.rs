//! Rays and ray/triangle intersection

use glam::{Mat4, Vec3};

/// Determinant and barycentric tolerance of the intersection test
pub const EPSILON: f32 = 1e-5;

/// A half-line `origin + t * direction`, `t >= 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Map the ray through `matrix`.
    ///
    /// The direction is not renormalized, so a `t` found in the target space
    /// names the same point as in the source space.
    pub fn transform(&self, matrix: &Mat4) -> Ray {
        Ray {
            origin: matrix.transform_point3(self.origin),
            direction: matrix.transform_vector3(self.direction),
        }
    }

    /// Distance along the ray to a triangle, front or back face.
    ///
    /// Möller–Trumbore.
    pub fn intersect_triangle(&self, triangle: &[Vec3; 3]) -> Option<f32> {
        let [v0, v1, v2] = *triangle;
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = self.origin - v0;
        let u = s.dot(p) * inv_det;
        if u < -EPSILON || u > 1.0 + EPSILON {
            return None;
        }

        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < -EPSILON || u + v > 1.0 + EPSILON {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        (t > EPSILON).then_some(t)
    }

    /// Closest hit among `triangles` as `(triangle index, t)`
    pub fn intersect_triangles<I>(&self, triangles: I) -> Option<(usize, f32)>
    where
        I: IntoIterator<Item = [Vec3; 3]>,
    {
        triangles
            .into_iter()
            .enumerate()
            .filter_map(|(i, tri)| self.intersect_triangle(&tri).map(|t| (i, t)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}
