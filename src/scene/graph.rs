//! Transform node tree
//!
//! Nodes live in an arena owned by [`SceneGraph`] and are addressed with
//! generational [`NodeId`]s. A parent owns its ordered list of children and
//! each child keeps a non-owning back reference to its parent. Combined
//! (world) matrices are cached per node and recomputed lazily after a local
//! transform or the tree structure changes.

use std::cell::Cell;
use std::collections::VecDeque;

use glam::Mat4;

use super::{Entity, Transform};
use crate::error::{RigError, RigResult};

/// Generational index of a node in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// What a node represents besides its transform
#[derive(Debug)]
pub enum NodeKind {
    /// Pure transform node
    Group,
    /// Node carrying components
    Entity(Entity),
    /// Clip region: children are clipped to `(0, 0, width, height)`
    Viewport { width: f32, height: f32 },
}

/// A node of the transform tree
#[derive(Debug)]
pub struct Node {
    label: Option<String>,
    kind: NodeKind,
    transform: Transform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    world: Cell<Mat4>,
    world_dirty: Cell<bool>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            label: None,
            kind,
            transform: Transform::IDENTITY,
            parent: None,
            children: Vec::new(),
            world: Cell::new(Mat4::IDENTITY),
            world_dirty: Cell::new(true),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn local_transform(&self) -> &Transform {
        &self.transform
    }

    /// False when the local transform is the identity
    pub fn has_local_transform(&self) -> bool {
        !self.transform.is_identity()
    }

    pub fn local_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn entity(&self) -> Option<&Entity> {
        match &self.kind {
            NodeKind::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn entity_mut(&mut self) -> Option<&mut Entity> {
        match &mut self.kind {
            NodeKind::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Size of the clip rectangle for clip-region nodes
    pub fn clip_region(&self) -> Option<(f32, f32)> {
        match self.kind {
            NodeKind::Viewport { width, height } => Some((width, height)),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of transform nodes forming a forest of trees
#[derive(Debug, Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an unparented node
    pub fn insert(&mut self, kind: NodeKind) -> NodeId {
        let node = Node::new(kind);
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    pub fn add_group(&mut self) -> NodeId {
        self.insert(NodeKind::Group)
    }

    pub fn add_entity(&mut self, entity: Entity) -> NodeId {
        self.insert(NodeKind::Entity(entity))
    }

    pub fn add_viewport(&mut self, width: f32, height: f32) -> NodeId {
        self.insert(NodeKind::Viewport { width, height })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn node(&self, id: NodeId) -> RigResult<&Node> {
        self.get(id).ok_or(RigError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> RigResult<&mut Node> {
        self.get_mut(id).ok_or(RigError::NodeNotFound(id))
    }

    pub fn entity(&self, id: NodeId) -> RigResult<&Entity> {
        self.node(id)?.entity().ok_or(RigError::NotAnEntity(id))
    }

    pub fn entity_mut(&mut self, id: NodeId) -> RigResult<&mut Entity> {
        self.node_mut(id)?
            .entity_mut()
            .ok_or(RigError::NotAnEntity(id))
    }

    pub fn set_label(&mut self, id: NodeId, label: &str) -> RigResult<()> {
        self.node_mut(id)?.label = Some(label.to_string());
        Ok(())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    /// True if `ancestor` is `node` or lies on the path from `node` to its root
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Replace the local transform and dirty the subtree's cached matrices
    pub fn set_local_transform(&mut self, id: NodeId, transform: Transform) -> RigResult<()> {
        self.node_mut(id)?.transform = transform;
        self.mark_dirty(id);
        Ok(())
    }

    pub fn local_transform(&self, id: NodeId) -> RigResult<Transform> {
        Ok(self.node(id)?.transform)
    }

    /// Append `child` to `parent`'s children.
    ///
    /// A child that already has a parent is moved. Fails with
    /// [`RigError::Cycle`] without touching either node when `child` is
    /// `parent` or one of its ancestors.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> RigResult<()> {
        self.node(parent)?;
        self.node(child)?;
        if self.is_ancestor(child, parent) {
            return Err(RigError::Cycle { parent, child });
        }

        if let Some(old_parent) = self.parent(child) {
            if let Some(node) = self.get_mut(old_parent) {
                node.children.retain(|&c| c != child);
            }
        }
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.mark_dirty(child);
        Ok(())
    }

    /// Detach `child` from `parent`. The subtree stays alive as its own root.
    ///
    /// Returns `false` if `child` was not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> RigResult<bool> {
        if self.parent(child) != Some(parent) {
            self.node(parent)?;
            self.node(child)?;
            return Ok(false);
        }
        self.node_mut(parent)?.children.retain(|&c| c != child);
        self.node_mut(child)?.parent = None;
        self.mark_dirty(child);
        Ok(true)
    }

    /// Free `id` and its whole subtree, returning the freed entities.
    pub fn destroy(&mut self, id: NodeId) -> RigResult<Vec<Entity>> {
        if let Some(parent) = self.node(id)?.parent {
            self.remove_child(parent, id)?;
        }

        let mut freed = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                self.len -= 1;
                pending.extend(node.children);
                if let NodeKind::Entity(entity) = node.kind {
                    freed.push(entity);
                }
            }
        }
        Ok(freed)
    }

    fn mark_dirty(&self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.get(current) {
                node.world_dirty.set(true);
                pending.extend_from_slice(&node.children);
            }
        }
    }

    /// The node's transform composed with all of its ancestors', root first
    pub fn combined_transform(&self, id: NodeId) -> RigResult<Mat4> {
        let node = self.node(id)?;
        if !node.world_dirty.get() {
            return Ok(node.world.get());
        }

        // Walk up to the nearest clean ancestor, then resolve downwards
        let mut chain = vec![id];
        let mut base = Mat4::IDENTITY;
        let mut current = node.parent;
        while let Some(parent_id) = current {
            let parent = self.node(parent_id)?;
            if !parent.world_dirty.get() {
                base = parent.world.get();
                break;
            }
            chain.push(parent_id);
            current = parent.parent;
        }

        let mut world = base;
        for &link in chain.iter().rev() {
            let node = self.node(link)?;
            world *= node.local_matrix();
            node.world.set(world);
            node.world_dirty.set(false);
        }
        Ok(world)
    }

    /// Nodes of the subtree under `root` in breadth-first order
    pub fn iter_breadth_first(&self, root: NodeId) -> BreadthFirst<'_> {
        let mut queue = VecDeque::new();
        if self.contains(root) {
            queue.push_back(root);
        }
        BreadthFirst { graph: self, queue }
    }

    /// First entity under `root`, breadth-first, matching `predicate`
    pub fn find_entity<F>(&self, root: NodeId, mut predicate: F) -> Option<NodeId>
    where
        F: FnMut(&Entity) -> bool,
    {
        self.iter_breadth_first(root)
            .find(|&id| self.get(id).and_then(Node::entity).is_some_and(&mut predicate))
    }

    /// Every live entity in the arena, attached or not
    pub fn entities_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Entity)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            let entity = slot.node.as_mut()?.entity_mut()?;
            let id = NodeId {
                index: index as u32,
                generation,
            };
            Some((id, entity))
        })
    }
}

/// Breadth-first iterator returned by [`SceneGraph::iter_breadth_first`]
pub struct BreadthFirst<'a> {
    graph: &'a SceneGraph,
    queue: VecDeque<NodeId>,
}

impl Iterator for BreadthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.queue.pop_front()?;
        self.queue.extend(self.graph.children(id).iter().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn chain(graph: &mut SceneGraph) -> (NodeId, NodeId, NodeId) {
        let a = graph.add_group();
        let b = graph.add_group();
        let c = graph.add_group();
        graph.add_child(a, b).unwrap();
        graph.add_child(b, c).unwrap();
        (a, b, c)
    }

    #[test]
    fn test_unparented_identity() {
        let mut graph = SceneGraph::new();
        let node = graph.add_group();
        assert_eq!(graph.combined_transform(node).unwrap(), Mat4::IDENTITY);
        assert!(!graph.node(node).unwrap().has_local_transform());
    }

    #[test]
    fn test_combined_transform_composes_root_first() {
        let mut graph = SceneGraph::new();
        let (a, b, c) = chain(&mut graph);
        let ta = Transform::new(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_y(0.3), Vec3::ONE);
        let tb = Transform::new(Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY, Vec3::splat(3.0));
        let tc = Transform::new(Vec3::new(0.0, 0.0, -1.0), Quat::from_rotation_x(1.0), Vec3::new(1.0, 2.0, 1.0));
        graph.set_local_transform(a, ta).unwrap();
        graph.set_local_transform(b, tb).unwrap();
        graph.set_local_transform(c, tc).unwrap();

        let expected = ta.matrix() * tb.matrix() * tc.matrix();
        assert!(graph.combined_transform(c).unwrap().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_ancestor_change_invalidates_cache() {
        let mut graph = SceneGraph::new();
        let (a, _b, c) = chain(&mut graph);
        assert_eq!(graph.combined_transform(c).unwrap(), Mat4::IDENTITY);

        graph
            .set_local_transform(a, Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))
            .unwrap();
        let world = graph.combined_transform(c).unwrap();
        assert!(world.abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)), 1e-6));
    }

    #[test]
    fn test_cycle_rejected_without_mutation() {
        let mut graph = SceneGraph::new();
        let a = graph.add_group();
        let b = graph.add_group();
        graph.add_child(a, b).unwrap();

        let err = graph.add_child(b, a).unwrap_err();
        assert!(matches!(err, RigError::Cycle { .. }));
        assert_eq!(graph.children(a), &[b]);
        assert!(graph.children(b).is_empty());
        assert_eq!(graph.parent(a), None);

        assert!(matches!(graph.add_child(a, a), Err(RigError::Cycle { .. })));
    }

    #[test]
    fn test_reparent_moves_child() {
        let mut graph = SceneGraph::new();
        let a = graph.add_group();
        let b = graph.add_group();
        let child = graph.add_group();
        graph.add_child(a, child).unwrap();
        graph.add_child(b, child).unwrap();
        assert!(graph.children(a).is_empty());
        assert_eq!(graph.children(b), &[child]);
        assert_eq!(graph.parent(child), Some(b));
    }

    #[test]
    fn test_remove_child_detaches_subtree() {
        let mut graph = SceneGraph::new();
        let (a, b, c) = chain(&mut graph);
        graph
            .set_local_transform(a, Transform::from_position(Vec3::X))
            .unwrap();
        assert!(graph.remove_child(a, b).unwrap());
        assert!(!graph.remove_child(a, b).unwrap());
        assert!(graph.contains(c));
        assert_eq!(graph.parent(b), None);
        assert_eq!(graph.combined_transform(c).unwrap(), Mat4::IDENTITY);
    }

    #[test]
    fn test_destroy_frees_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group();
        let entity = graph.add_entity(Entity::new());
        let leaf = graph.add_group();
        graph.add_child(root, entity).unwrap();
        graph.add_child(entity, leaf).unwrap();

        let freed = graph.destroy(entity).unwrap();
        assert_eq!(freed.len(), 1);
        assert!(!graph.contains(entity));
        assert!(!graph.contains(leaf));
        assert!(graph.children(root).is_empty());
        assert_eq!(graph.len(), 1);

        let reused = graph.add_group();
        assert!(!graph.contains(entity));
        assert!(matches!(graph.node(entity), Err(RigError::NodeNotFound(_))));
        assert!(graph.contains(reused));
    }

    #[test]
    fn test_breadth_first_order() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group();
        let a = graph.add_group();
        let b = graph.add_group();
        let a1 = graph.add_group();
        graph.add_child(root, a).unwrap();
        graph.add_child(root, b).unwrap();
        graph.add_child(a, a1).unwrap();
        let order: Vec<_> = graph.iter_breadth_first(root).collect();
        assert_eq!(order, vec![root, a, b, a1]);
    }
}
