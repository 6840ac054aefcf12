//! Scene management
//!
//! A [`Scene`] is a [`SceneGraph`] plus the root node painted and picked by
//! the renderer. Cameras and the light are ordinary entities; cameras may
//! live outside the painted subtree.

mod camera;
mod entity;
mod geometry;
mod graph;
mod light;
mod transform;

pub use camera::*;
pub use entity::*;
pub use geometry::*;
pub use graph::*;
pub use light::*;
pub use transform::*;

use crate::error::{RigError, RigResult};

/// The scene graph and the root of the content to render
#[derive(Debug)]
pub struct Scene {
    pub graph: SceneGraph,
    pub root: NodeId,
}

impl Scene {
    pub fn new() -> Self {
        let mut graph = SceneGraph::new();
        let root = graph.add_group();
        Self { graph, root }
    }

    /// Add an entity under the root
    pub fn add_entity(&mut self, entity: Entity) -> RigResult<NodeId> {
        let id = self.graph.add_entity(entity);
        self.graph.add_child(self.root, id)?;
        Ok(id)
    }

    /// Add an entity under the root with a local transform
    pub fn spawn(&mut self, entity: Entity, transform: Transform) -> RigResult<NodeId> {
        let id = self.add_entity(entity)?;
        self.graph.set_local_transform(id, transform)?;
        Ok(id)
    }

    /// First entity with a light component, breadth-first from the root
    pub fn light(&self) -> Option<NodeId> {
        self.graph
            .find_entity(self.root, |entity| entity.light().is_some())
    }

    pub fn camera(&self, id: NodeId) -> RigResult<&Camera> {
        self.graph
            .entity(id)?
            .camera()
            .ok_or(RigError::MissingComponent {
                node: id,
                component: ComponentType::Camera,
            })
    }

    pub fn camera_mut(&mut self, id: NodeId) -> RigResult<&mut Camera> {
        self.graph
            .entity_mut(id)?
            .camera_mut()
            .ok_or(RigError::MissingComponent {
                node: id,
                component: ComponentType::Camera,
            })
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
