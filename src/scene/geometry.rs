//! Geometry components

use std::borrow::Cow;
use std::sync::Arc;

use crate::backend::PrimitiveTopology;
use crate::resources::Mesh;

/// Diamond-shaped image slice, `size` x `size` and centred on the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diamond {
    pub size: f32,
}

/// Rectangle, optionally cut to the shape of its texture's alpha
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub width: f32,
    pub height: f32,
    pub shaped: bool,
}

/// The drawable shape of an entity
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Mesh(Arc<Mesh>),
    Diamond(Diamond),
    Shape(Shape),
}

impl Geometry {
    pub fn mesh(mesh: Mesh) -> Self {
        Geometry::Mesh(Arc::new(mesh))
    }

    pub fn diamond(size: f32) -> Self {
        Geometry::Diamond(Diamond { size })
    }

    pub fn shape(width: f32, height: f32, shaped: bool) -> Self {
        Geometry::Shape(Shape {
            width,
            height,
            shaped,
        })
    }

    pub fn is_diamond(&self) -> bool {
        matches!(self, Geometry::Diamond(_))
    }

    pub fn topology(&self) -> PrimitiveTopology {
        PrimitiveTopology::TriangleList
    }

    /// Triangles used both for drawing and for ray intersection
    pub fn mesh_data(&self) -> Cow<'_, Mesh> {
        match self {
            Geometry::Mesh(mesh) => Cow::Borrowed(mesh.as_ref()),
            Geometry::Diamond(diamond) => {
                let mut mesh = Mesh::rectangle(diamond.size, diamond.size);
                mesh.name = "diamond".to_string();
                Cow::Owned(mesh)
            }
            Geometry::Shape(shape) => {
                let mut mesh = Mesh::rectangle(shape.width, shape.height);
                mesh.name = "shape".to_string();
                Cow::Owned(mesh)
            }
        }
    }
}
