//! Scene graph structure, transforms and traversal.

mod common;

use glam::{Mat4, Quat, Vec3};
use rstest::rstest;

use common::init_logging;
use rig_render::{
    scene::{Node, NodeKind},
    traversal::{traverse, TargetStacks, Traversal, Visit, VisitContext, Visitor},
    Entity, Geometry, RigError, SceneGraph, Transform,
};

/// Records pre/post order and the layer each node was visited on
#[derive(Default)]
struct Recorder {
    events: Vec<String>,
    defer_labels: Vec<&'static str>,
}

impl Visitor for Recorder {
    fn pre_visit(&mut self, _graph: &SceneGraph, node: &Node, ctx: &mut VisitContext<'_>) -> Visit {
        let label = node.label().unwrap_or("?").to_string();
        self.events.push(format!("pre {} @{}", label, ctx.layer()));
        if ctx.layer() == 0 && self.defer_labels.iter().any(|l| *l == label) {
            ctx.defer();
        }
        Visit::Continue
    }

    fn post_visit(&mut self, _graph: &SceneGraph, node: &Node, _ctx: &mut VisitContext<'_>) {
        self.events.push(format!("post {}", node.label().unwrap_or("?")));
    }
}

fn labelled(graph: &mut SceneGraph, label: &str) -> rig_render::NodeId {
    let id = graph.add_group();
    graph.set_label(id, label).unwrap();
    id
}

#[test]
fn test_traversal_order() {
    init_logging();
    let mut graph = SceneGraph::new();
    let root = labelled(&mut graph, "root");
    let a = labelled(&mut graph, "a");
    let b = labelled(&mut graph, "b");
    let c = labelled(&mut graph, "c");
    graph.add_child(root, a).unwrap();
    graph.add_child(a, c).unwrap();
    graph.add_child(root, b).unwrap();

    let mut recorder = Recorder::default();
    let stats = traverse(&graph, root, &mut TargetStacks::new(Mat4::IDENTITY), &mut recorder).unwrap();
    assert_eq!(
        recorder.events,
        vec![
            "pre root @0", "pre a @0", "pre c @0", "post c", "post a", "pre b @0", "post b",
            "post root",
        ]
    );
    assert_eq!(stats.nodes_visited, 4);
    assert!(stats.stacks.is_balanced());
}

#[test]
fn test_deferred_nodes_replay_after_base_pass() {
    init_logging();
    let mut graph = SceneGraph::new();
    let root = labelled(&mut graph, "root");
    let a = labelled(&mut graph, "a");
    let b = labelled(&mut graph, "b");
    graph.add_child(root, a).unwrap();
    graph.add_child(root, b).unwrap();

    let mut recorder = Recorder {
        defer_labels: vec!["a"],
        ..Default::default()
    };
    let stats = traverse(&graph, root, &mut TargetStacks::new(Mat4::IDENTITY), &mut recorder).unwrap();
    assert_eq!(recorder.events.last().map(String::as_str), Some("post a"));
    assert!(recorder.events.contains(&"pre a @1".to_string()));
    assert_eq!(stats.overlay_layers, 1);
}

#[rstest]
#[case(0)]
#[case(3)]
fn test_overlay_layer_limit(#[case] limit: u32) {
    /// Defers every node forever
    struct Greedy;
    impl Visitor for Greedy {
        fn pre_visit(&mut self, _: &SceneGraph, _: &Node, ctx: &mut VisitContext<'_>) -> Visit {
            ctx.defer();
            Visit::Continue
        }
    }

    init_logging();
    let mut graph = SceneGraph::new();
    let root = graph.add_group();
    let child = graph.add_group();
    graph.add_child(root, child).unwrap();
    let stats = Traversal::new()
        .with_max_overlay_layers(limit)
        .run(&graph, root, &mut TargetStacks::new(Mat4::IDENTITY), &mut Greedy)
        .unwrap();
    assert_eq!(stats.overlay_layers, limit);
    assert_eq!(stats.nodes_visited, 2 + 2 * limit as usize);
}

#[test]
fn test_reparenting_updates_world_transform() {
    init_logging();
    let mut graph = SceneGraph::new();
    let left = graph.add_group();
    let right = graph.add_group();
    let child = graph.add_entity(Entity::new().with_geometry(Geometry::diamond(1.0)));
    graph
        .set_local_transform(left, Transform::from_position(Vec3::new(-5.0, 0.0, 0.0)))
        .unwrap();
    graph
        .set_local_transform(
            right,
            Transform::new(Vec3::new(5.0, 0.0, 0.0), Quat::IDENTITY, Vec3::splat(2.0)),
        )
        .unwrap();
    graph
        .set_local_transform(child, Transform::from_position(Vec3::X))
        .unwrap();

    graph.add_child(left, child).unwrap();
    let world = graph.combined_transform(child).unwrap();
    assert!(world.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(-4.0, 0.0, 0.0), 1e-5));

    graph.add_child(right, child).unwrap();
    assert!(graph.children(left).is_empty());
    assert_eq!(graph.parent(child), Some(right));
    let world = graph.combined_transform(child).unwrap();
    assert!(world.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(7.0, 0.0, 0.0), 1e-5));
}

#[test]
fn test_cycles_are_rejected() {
    init_logging();
    let mut graph = SceneGraph::new();
    let a = graph.add_group();
    let b = graph.add_group();
    graph.add_child(a, b).unwrap();

    assert!(matches!(graph.add_child(b, a), Err(RigError::Cycle { .. })));
    assert!(matches!(graph.add_child(a, a), Err(RigError::Cycle { .. })));
    assert_eq!(graph.parent(a), None);
    assert!(graph.children(b).is_empty());
}

#[test]
fn test_destroyed_ids_are_stale() {
    init_logging();
    let mut graph = SceneGraph::new();
    let root = graph.add_group();
    let child = graph.add_entity(Entity::new());
    let grandchild = graph.add_entity(Entity::new());
    graph.add_child(root, child).unwrap();
    graph.add_child(child, grandchild).unwrap();

    let freed = graph.destroy(child).unwrap();
    assert_eq!(freed.len(), 2);
    assert!(graph.children(root).is_empty());
    assert_eq!(graph.len(), 1);

    // the slot is reused with a new generation
    let reused = graph.add_group();
    assert!([child.index(), grandchild.index()].contains(&reused.index()));
    assert_ne!(reused, child);
    assert_ne!(reused, grandchild);
    assert!(matches!(graph.node(child), Err(RigError::NodeNotFound(_))));
    assert!(matches!(graph.node(reused).map(Node::kind), Ok(NodeKind::Group)));
}

#[test]
fn test_viewport_clips_children() {
    /// Captures each entity's clip rectangle
    #[derive(Default)]
    struct Clips(Vec<Option<rig_render::backend::ClipRect>>);
    impl Visitor for Clips {
        fn pre_visit(&mut self, _: &SceneGraph, node: &Node, ctx: &mut VisitContext<'_>) -> Visit {
            if node.entity().is_some() {
                self.0.push(ctx.clip());
            }
            Visit::Continue
        }
    }

    init_logging();
    let mut graph = SceneGraph::new();
    let root = graph.add_group();
    let viewport = graph.add_viewport(50.0, 20.0);
    let inside = graph.add_entity(Entity::new());
    let outside = graph.add_entity(Entity::new());
    graph.add_child(root, viewport).unwrap();
    graph.add_child(viewport, inside).unwrap();
    graph.add_child(root, outside).unwrap();

    let mut clips = Clips::default();
    traverse(&graph, root, &mut TargetStacks::new(Mat4::IDENTITY), &mut clips).unwrap();
    assert_eq!(clips.0.len(), 2);
    assert!(clips.0[0].is_some());
    assert!(clips.0[1].is_none());
}
