//! Depth-first scene traversal
//!
//! [`Traversal::run`] walks a subtree of a [`SceneGraph`] keeping a render
//! target's matrix and clip stacks in lock-step with tree depth:
//!
//! - pre-order: push the node's local transform (if any), push its clip
//!   rectangle (if it is a clip region), then call [`Visitor::pre_visit`]
//! - children, in insertion order, unless the visitor returned
//!   [`Visit::SkipChildren`]
//! - post-order: call [`Visitor::post_visit`], then pop clip and matrix
//!
//! Pops are done by a [`StackGuard`] on drop, so a visitor can't unbalance
//! the stacks by pruning and an error unwinding out of a child can't either.
//!
//! Visitors may defer the current node to an overlay layer. Once the base
//! pass is done, deferred nodes are visited again with the model-view they
//! were captured with, one layer at a time, until nothing is left queued.

mod stack;

pub use stack::*;

use glam::Mat4;

use crate::backend::ClipRect;
use crate::error::{RigError, RigResult};
use crate::scene::{Node, NodeId, SceneGraph};

/// Default limit on overlay layers replayed after the base pass
pub const DEFAULT_MAX_OVERLAY_LAYERS: u32 = 64;

/// What the traversal does after a pre-visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    SkipChildren,
}

/// A node queued for painting at a higher layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeferredNode {
    pub node: NodeId,
    pub modelview: Mat4,
}

/// State handed to visitor callbacks
pub struct VisitContext<'t> {
    stacks: &'t TargetStacks,
    deferred: &'t mut Vec<DeferredNode>,
    node: NodeId,
    depth: usize,
    layer: u32,
}

impl VisitContext<'_> {
    /// Node being visited
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Tree depth below the traversal root (the root is 0)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 0 for the base pass, n for the n-th overlay replay
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Model-view matrix including the current node's transform
    pub fn modelview(&self) -> Mat4 {
        self.stacks.modelview()
    }

    pub fn clip(&self) -> Option<ClipRect> {
        self.stacks.clip()
    }

    /// Visit the current node again on the next layer
    pub fn defer(&mut self) {
        self.deferred.push(DeferredNode {
            node: self.node,
            modelview: self.stacks.modelview(),
        });
    }
}

/// Per-node callbacks of a traversal
pub trait Visitor {
    fn pre_visit(&mut self, graph: &SceneGraph, node: &Node, ctx: &mut VisitContext<'_>) -> Visit;

    fn post_visit(&mut self, _graph: &SceneGraph, _node: &Node, _ctx: &mut VisitContext<'_>) {}
}

/// Summary of a finished traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraversalStats {
    pub nodes_visited: usize,
    pub overlay_layers: u32,
    pub stacks: StackCounters,
}

/// Traversal configuration
#[derive(Debug, Clone, Copy)]
pub struct Traversal {
    max_overlay_layers: u32,
}

impl Default for Traversal {
    fn default() -> Self {
        Self {
            max_overlay_layers: DEFAULT_MAX_OVERLAY_LAYERS,
        }
    }
}

impl Traversal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_overlay_layers(mut self, layers: u32) -> Self {
        self.max_overlay_layers = layers;
        self
    }

    /// Walk the subtree under `root`, then replay deferred overlay layers.
    pub fn run<V: Visitor + ?Sized>(
        &self,
        graph: &SceneGraph,
        root: NodeId,
        stacks: &mut TargetStacks,
        visitor: &mut V,
    ) -> RigResult<TraversalStats> {
        let start = stacks.counters();
        let matrix_depth = stacks.matrices.depth();
        let clip_depth = stacks.clips.depth();

        let mut state = WalkState {
            deferred: Vec::new(),
            nodes_visited: 0,
        };
        let walked = walk(graph, root, stacks, visitor, &mut state, 0);
        let replayed = walked.and_then(|()| self.replay_layers(graph, stacks, visitor, &mut state));

        let counters = stacks.counters().since(&start);
        if !counters.is_balanced()
            || stacks.matrices.depth() != matrix_depth
            || stacks.clips.depth() != clip_depth
        {
            log::error!("traversal left stacks unbalanced: {:?}", counters);
            return Err(RigError::StackImbalance {
                pushes: counters.matrix_pushes + counters.clip_pushes,
                pops: counters.matrix_pops + counters.clip_pops,
            });
        }

        let overlay_layers = replayed?;
        Ok(TraversalStats {
            nodes_visited: state.nodes_visited,
            overlay_layers,
            stacks: counters,
        })
    }

    fn replay_layers<V: Visitor + ?Sized>(
        &self,
        graph: &SceneGraph,
        stacks: &mut TargetStacks,
        visitor: &mut V,
        state: &mut WalkState,
    ) -> RigResult<u32> {
        let mut layer = 0;
        while !state.deferred.is_empty() {
            if layer >= self.max_overlay_layers {
                log::error!(
                    "dropping {} deferred nodes after {} overlay layers",
                    state.deferred.len(),
                    layer
                );
                state.deferred.clear();
                break;
            }
            layer += 1;

            for entry in std::mem::take(&mut state.deferred) {
                let node = graph.node(entry.node)?;
                let mut guard = StackGuard::new(stacks);
                guard.replace_matrix(entry.modelview);

                let mut ctx = VisitContext {
                    stacks: &*guard,
                    deferred: &mut state.deferred,
                    node: entry.node,
                    depth: 0,
                    layer,
                };
                state.nodes_visited += 1;
                visitor.pre_visit(graph, node, &mut ctx);
                visitor.post_visit(graph, node, &mut ctx);
            }
        }
        Ok(layer)
    }
}

/// Walk with the default configuration
pub fn traverse<V: Visitor + ?Sized>(
    graph: &SceneGraph,
    root: NodeId,
    stacks: &mut TargetStacks,
    visitor: &mut V,
) -> RigResult<TraversalStats> {
    Traversal::default().run(graph, root, stacks, visitor)
}

struct WalkState {
    deferred: Vec<DeferredNode>,
    nodes_visited: usize,
}

fn walk<V: Visitor + ?Sized>(
    graph: &SceneGraph,
    id: NodeId,
    stacks: &mut TargetStacks,
    visitor: &mut V,
    state: &mut WalkState,
    depth: usize,
) -> RigResult<()> {
    let node = graph.node(id)?;

    let mut guard = StackGuard::new(stacks);
    if node.has_local_transform() {
        guard.push_matrix(node.local_matrix());
    }
    if let Some((width, height)) = node.clip_region() {
        guard.push_clip_rectangle(0.0, 0.0, width, height);
    }

    state.nodes_visited += 1;
    let flow = {
        let mut ctx = VisitContext {
            stacks: &*guard,
            deferred: &mut state.deferred,
            node: id,
            depth,
            layer: 0,
        };
        visitor.pre_visit(graph, node, &mut ctx)
    };

    if flow == Visit::Continue {
        for &child in node.children() {
            walk(graph, child, &mut guard, visitor, state, depth + 1)?;
        }
    }

    let mut ctx = VisitContext {
        stacks: &*guard,
        deferred: &mut state.deferred,
        node: id,
        depth,
        layer: 0,
    };
    visitor.post_visit(graph, node, &mut ctx);
    Ok(())
}
