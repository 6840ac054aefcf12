//! Paint visitor and draw journal
//!
//! Painting a pass is split in two: the traversal only records which
//! entities to draw and with which model-view, then the journal is sorted by
//! depth and flushed with mutable access to the entities so pipelines and
//! primitives can be cached on them.

use std::cmp::Ordering;

use glam::Mat4;

use crate::backend::{ClipRect, DrawState, FramebufferHandle, GraphicsBackend, TextureHandle};
use crate::error::RigResult;
use crate::pipeline::uniforms::{self, LightUniforms, PerDrawUniforms};
use crate::pipeline::{PipelineCache, RenderPass};
use crate::scene::{try_inverse, Camera, Node, NodeId, SceneGraph};
use crate::traversal::{Visit, VisitContext, Visitor};

/// An entity recorded for drawing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JournalEntry {
    pub entity: NodeId,
    pub modelview: Mat4,
    pub clip: Option<ClipRect>,
}

impl JournalEntry {
    /// Eye-space Z of the entity origin
    pub fn depth(&self) -> f32 {
        self.modelview.w_axis.z
    }
}

/// Visitor recording drawable entities of one pass
#[derive(Debug)]
pub struct PaintVisitor {
    pass: RenderPass,
    journal: Vec<JournalEntry>,
    entities_visited: usize,
    light: Option<NodeId>,
    saw_light: bool,
}

impl PaintVisitor {
    pub fn new(pass: RenderPass) -> Self {
        Self {
            pass,
            journal: Vec::new(),
            entities_visited: 0,
            light: None,
            saw_light: false,
        }
    }

    /// Note when the traversal passes `light`
    pub fn watch_light(mut self, light: Option<NodeId>) -> Self {
        self.light = light;
        self
    }

    pub fn entities_visited(&self) -> usize {
        self.entities_visited
    }

    /// True if the watched light entity was visited and is visible
    pub fn saw_light(&self) -> bool {
        self.saw_light
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    pub fn into_journal(self) -> Vec<JournalEntry> {
        self.journal
    }
}

impl Visitor for PaintVisitor {
    fn pre_visit(&mut self, _graph: &SceneGraph, node: &Node, ctx: &mut VisitContext<'_>) -> Visit {
        let Some(entity) = node.entity() else {
            return Visit::Continue;
        };
        self.entities_visited += 1;

        if !entity.visible() || (self.pass == RenderPass::Shadow && !entity.cast_shadow()) {
            return Visit::Continue;
        }
        if entity.geometry().is_none() {
            if Some(ctx.node()) == self.light {
                self.saw_light = true;
            }
            return Visit::Continue;
        }

        self.journal.push(JournalEntry {
            entity: ctx.node(),
            modelview: ctx.modelview(),
            clip: ctx.clip(),
        });
        Visit::Continue
    }
}

/// Sort by eye-space depth and order for `pass`.
///
/// Opaque passes draw nearest first so the depth test rejects hidden
/// fragments early; the blended pass draws farthest first so blending
/// composes correctly.
pub fn sort_journal(journal: &mut [JournalEntry], pass: RenderPass) {
    journal.sort_by(|a, b| a.depth().partial_cmp(&b.depth()).unwrap_or(Ordering::Equal));
    if pass != RenderPass::ColorBlended {
        journal.reverse();
    }
}

/// Everything the flush needs to know about the pass being painted
pub struct PassContext<'a> {
    pub pass: RenderPass,
    pub camera: &'a Camera,
    pub framebuffer: FramebufferHandle,
    pub light: Option<&'a LightUniforms>,
    pub shadow_map: Option<TextureHandle>,
}

/// Draw the journal; returns the number of draws issued
pub fn flush_journal(
    backend: &mut dyn GraphicsBackend,
    cache: &mut PipelineCache,
    graph: &mut SceneGraph,
    mut journal: Vec<JournalEntry>,
    ctx: &PassContext<'_>,
) -> RigResult<usize> {
    sort_journal(&mut journal, ctx.pass);

    let projection = ctx.camera.projection_matrix();
    let viewport = ctx.camera.viewport();
    let camera_world = try_inverse(&ctx.camera.view_transform()).unwrap_or(Mat4::IDENTITY);

    let mut draws = 0;
    for entry in journal {
        let entity = graph.entity_mut(entry.entity)?;
        let pipeline = cache.get_or_build(backend, entity, ctx.pass, ctx.shadow_map)?;

        let primitive = match entity.cached_primitive() {
            Some(primitive) => primitive,
            None => {
                let primitive = {
                    let Some(geometry) = entity.geometry() else {
                        continue;
                    };
                    let mesh = geometry.mesh_data();
                    backend.create_primitive(geometry.topology(), &mesh.vertices, &mesh.indices)?
                };
                entity.store_primitive(primitive);
                primitive
            }
        };

        match ctx.pass {
            RenderPass::ColorUnblended | RenderPass::ColorBlended => {
                let model = camera_world * entry.modelview;
                PerDrawUniforms::new(model, entry.modelview, ctx.light, entity.receive_shadow())
                    .apply(backend, pipeline);
                if let Some(light) = ctx.light {
                    uniforms::apply_light(backend, pipeline, light);
                }
                if let Some(material) = entity.material() {
                    uniforms::apply_material(backend, pipeline, material);
                }
            }
            RenderPass::DofDepth => uniforms::apply_focal_parameters(
                backend,
                pipeline,
                ctx.camera.focal_distance,
                ctx.camera.depth_of_field,
            ),
            RenderPass::Shadow => {}
        }

        log::trace!(
            "{}: drawing {:?} at depth {}",
            ctx.pass.name(),
            entry.entity,
            entry.depth()
        );
        let state = DrawState {
            modelview: entry.modelview,
            projection,
            viewport,
            clip: entry.clip,
        };
        backend.draw_primitive(ctx.framebuffer, pipeline, primitive, &state);
        draws += 1;
    }
    Ok(draws)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Entity, Geometry, Transform};
    use crate::traversal::{traverse, TargetStacks};
    use glam::Vec3;

    fn entry(z: f32) -> JournalEntry {
        let mut graph = SceneGraph::new();
        JournalEntry {
            entity: graph.add_group(),
            modelview: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
            clip: None,
        }
    }

    #[test]
    fn test_opaque_front_to_back() {
        let mut journal = vec![entry(-10.0), entry(-2.0), entry(-5.0)];
        sort_journal(&mut journal, RenderPass::ColorUnblended);
        let depths: Vec<f32> = journal.iter().map(JournalEntry::depth).collect();
        assert_eq!(depths, vec![-2.0, -5.0, -10.0]);
    }

    #[test]
    fn test_blended_back_to_front() {
        let mut journal = vec![entry(-2.0), entry(-10.0), entry(-5.0)];
        sort_journal(&mut journal, RenderPass::ColorBlended);
        let depths: Vec<f32> = journal.iter().map(JournalEntry::depth).collect();
        assert_eq!(depths, vec![-10.0, -5.0, -2.0]);
    }

    #[test]
    fn test_visitor_filters() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group();
        let drawable = graph.add_entity(Entity::new().with_geometry(Geometry::diamond(1.0)));
        let hidden = graph.add_entity(Entity::new().with_geometry(Geometry::diamond(1.0)));
        let no_shadow = graph.add_entity(
            Entity::new()
                .with_geometry(Geometry::diamond(1.0))
                .with_cast_shadow(false),
        );
        let empty = graph.add_entity(Entity::new());
        for id in [drawable, hidden, no_shadow, empty] {
            graph.add_child(root, id).unwrap();
        }
        graph.entity_mut(hidden).unwrap().set_visible(false);
        graph
            .set_local_transform(drawable, Transform::from_position(Vec3::new(0.0, 0.0, -3.0)))
            .unwrap();

        let mut color = PaintVisitor::new(RenderPass::ColorUnblended);
        traverse(&graph, root, &mut TargetStacks::new(Mat4::IDENTITY), &mut color).unwrap();
        let ids: Vec<NodeId> = color.journal().iter().map(|e| e.entity).collect();
        assert_eq!(ids, vec![drawable, no_shadow]);
        assert_eq!(color.entities_visited(), 4);
        assert_eq!(color.journal()[0].depth(), -3.0);

        let mut shadow = PaintVisitor::new(RenderPass::Shadow);
        traverse(&graph, root, &mut TargetStacks::new(Mat4::IDENTITY), &mut shadow).unwrap();
        let ids: Vec<NodeId> = shadow.journal().iter().map(|e| e.entity).collect();
        assert_eq!(ids, vec![drawable]);

        // Non-casters still write their blur factor
        let mut dof = PaintVisitor::new(RenderPass::DofDepth);
        traverse(&graph, root, &mut TargetStacks::new(Mat4::IDENTITY), &mut dof).unwrap();
        let ids: Vec<NodeId> = dof.journal().iter().map(|e| e.entity).collect();
        assert_eq!(ids, vec![drawable, no_shadow]);
    }
}
