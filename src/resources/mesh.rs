//! Mesh data structures and generation

use crate::backend::types::Vertex;
use glam::{Vec2, Vec3, Vec4};

/// A triangle mesh with vertex and index data
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub name: String,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate triangle corner positions, skipping triangles with
    /// out-of-range indices.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let a = self.vertices.get(tri[0] as usize)?;
            let b = self.vertices.get(tri[1] as usize)?;
            let c = self.vertices.get(tri[2] as usize)?;
            Some([a.position, b.position, c.position])
        })
    }

    /// Axis aligned bounds as `(min, max)`, `None` for an empty mesh
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (min.min(v.position), max.max(v.position))
        }))
    }

    /// A `width` x `height` quad in the xy plane, centred on the origin and
    /// facing +Z
    pub fn rectangle(width: f32, height: f32) -> Self {
        let mut mesh = Mesh::new("rectangle");
        let hw = width / 2.0;
        let hh = height / 2.0;
        let corners = [
            (Vec3::new(-hw, -hh, 0.0), Vec2::new(0.0, 1.0)),
            (Vec3::new(hw, -hh, 0.0), Vec2::new(1.0, 1.0)),
            (Vec3::new(hw, hh, 0.0), Vec2::new(1.0, 0.0)),
            (Vec3::new(-hw, hh, 0.0), Vec2::new(0.0, 0.0)),
        ];
        for (position, uv) in corners {
            mesh.vertices.push(Vertex::new(position, Vec3::Z, uv));
        }
        mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);
        mesh
    }

    /// A unit cube centred at origin
    pub fn cube() -> Self {
        let mut mesh = Mesh::new("cube");

        let faces = [Vec3::Z, -Vec3::Z, Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y];
        let uvs = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];

        for normal in faces {
            // Build the face from two axes perpendicular to the normal
            let up = if normal.y.abs() > 0.9 { Vec3::Z } else { Vec3::Y };
            let right = up.cross(normal);
            let tangent = right.extend(1.0);
            let base = mesh.vertices.len() as u32;

            let corners = [
                normal * 0.5 - right * 0.5 - up * 0.5,
                normal * 0.5 + right * 0.5 - up * 0.5,
                normal * 0.5 + right * 0.5 + up * 0.5,
                normal * 0.5 - right * 0.5 + up * 0.5,
            ];
            for (position, uv) in corners.into_iter().zip(uvs) {
                mesh.vertices.push(Vertex {
                    position,
                    normal,
                    uv,
                    tangent,
                });
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// Line list joining the 8 corners of a frustum.
    ///
    /// Corners are ordered near plane first, each plane counter clockwise
    /// starting bottom-left.
    pub fn frustum_lines(corners: &[Vec3; 8]) -> Self {
        let mut mesh = Mesh::new("frustum");
        for corner in corners {
            mesh.vertices.push(Vertex {
                position: *corner,
                normal: Vec3::Z,
                uv: Vec2::ZERO,
                tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            });
        }
        for i in 0..4u32 {
            let next = (i + 1) % 4;
            // near ring, far ring, connecting edge
            mesh.indices.extend_from_slice(&[i, next]);
            mesh.indices.extend_from_slice(&[i + 4, next + 4]);
            mesh.indices.extend_from_slice(&[i, i + 4]);
        }
        mesh
    }
}
