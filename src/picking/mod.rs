//! Ray picking
//!
//! Picking walks the same graph as painting, with a visitor that tests each
//! pickable entity's geometry against the ray in the entity's local space.
//! Of all the hits, the one nearest to the camera wins.

mod ray;

pub use ray::*;

use glam::{Mat4, Vec4};

use crate::error::RigResult;
use crate::scene::{try_inverse, Camera, Node, NodeId, SceneGraph};
use crate::traversal::{traverse, TargetStacks, Visit, VisitContext, Visitor};
use crate::RenderMode;

/// The entity hit by a pick ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub entity: NodeId,
    /// Index of the triangle hit
    pub triangle: usize,
    /// Ray parameter of the hit, in world units along the ray
    pub t: f32,
    /// Eye-space Z of the hit point (negative in front of the camera)
    pub eye_z: f32,
}

/// Visitor keeping the hit nearest to the camera
#[derive(Debug)]
pub struct PickVisitor {
    ray: Ray,
    view: Mat4,
    mode: RenderMode,
    best: Option<PickHit>,
}

impl PickVisitor {
    /// `ray` is in the space of the traversal's base matrix, usually world
    /// space.
    pub fn new(ray: Ray, view: Mat4, mode: RenderMode) -> Self {
        Self {
            ray,
            view,
            mode,
            best: None,
        }
    }

    pub fn hit(&self) -> Option<PickHit> {
        self.best
    }

    fn consider(&mut self, hit: PickHit) {
        // Larger eye z is closer; ties go to the first entity visited
        match self.best {
            Some(best) if hit.eye_z <= best.eye_z => {}
            _ => self.best = Some(hit),
        }
    }
}

impl Visitor for PickVisitor {
    fn pre_visit(&mut self, _graph: &SceneGraph, node: &Node, ctx: &mut VisitContext<'_>) -> Visit {
        let Some(entity) = node.entity() else {
            return Visit::Continue;
        };
        if self.mode == RenderMode::Editor && !entity.visible() {
            return Visit::Continue;
        }
        let Some(geometry) = entity.geometry() else {
            return Visit::Continue;
        };

        let model = ctx.modelview();
        let Some(inverse) = try_inverse(&model) else {
            log::warn!("skipping {:?} in pick: transform is not invertible", ctx.node());
            return Visit::Continue;
        };

        let local = self.ray.transform(&inverse);
        let mesh = geometry.mesh_data();
        if let Some((triangle, t)) = local.intersect_triangles(mesh.triangles()) {
            let point = local.at(t);
            let eye = self.view * model * Vec4::new(point.x, point.y, point.z, 1.0);
            self.consider(PickHit {
                entity: ctx.node(),
                triangle,
                t,
                eye_z: eye.z,
            });
        }
        Visit::Continue
    }
}

/// Nearest entity under `root` hit by the world-space `ray`
pub fn pick(
    graph: &SceneGraph,
    root: NodeId,
    camera: &Camera,
    ray: &Ray,
    mode: RenderMode,
) -> RigResult<Option<PickHit>> {
    let base = match graph.parent(root) {
        Some(parent) => graph.combined_transform(parent)?,
        None => Mat4::IDENTITY,
    };
    let mut stacks = TargetStacks::new(base);
    let mut visitor = PickVisitor::new(*ray, camera.view_transform(), mode);
    let stats = traverse(graph, root, &mut stacks, &mut visitor)?;
    log::trace!("pick visited {} nodes", stats.nodes_visited);
    Ok(visitor.hit())
}

/// Nearest entity under a window coordinate.
///
/// Fails with [`RigError::DegenerateProjection`](crate::RigError) when the
/// camera projection can't be inverted.
pub fn pick_at(
    graph: &SceneGraph,
    root: NodeId,
    camera: &Camera,
    screen_x: f32,
    screen_y: f32,
    mode: RenderMode,
) -> RigResult<Option<PickHit>> {
    let ray = camera.create_pick_ray(screen_x, screen_y)?;
    pick(graph, root, camera, &ray, mode)
}
