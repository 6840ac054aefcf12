//! Picking through the engine facade.

mod common;

use glam::{Quat, Vec3};
use rstest::rstest;

use common::{
    init_logging, scene_with_camera, spawn_diamond, test_camera, VIEWPORT_HEIGHT, VIEWPORT_WIDTH,
};
use rig_render::{
    scene::Projection, Engine, HeadlessBackend, RenderMode, RendererConfig, RigError, Transform,
};

const CENTRE: (f32, f32) = (VIEWPORT_WIDTH / 2.0, VIEWPORT_HEIGHT / 2.0 - 1.0);

#[test]
fn test_nearest_entity_wins() {
    init_logging();
    let (mut scene, camera) = scene_with_camera(test_camera());
    let _far = spawn_diamond(&mut scene, Vec3::new(0.0, 0.0, -20.0));
    let near = spawn_diamond(&mut scene, Vec3::new(0.0, 0.0, -8.0));
    let mut engine = Engine::new(HeadlessBackend::new(), scene, RendererConfig::default());

    let hit = engine.pick_hit(camera, CENTRE.0, CENTRE.1).unwrap().unwrap();
    assert_eq!(hit.entity, near);
    assert!((hit.eye_z + 8.0).abs() < 1e-3);
}

#[test]
fn test_pick_follows_camera_transform() {
    init_logging();
    let (mut scene, camera) = scene_with_camera(test_camera());
    let target = spawn_diamond(&mut scene, Vec3::new(30.0, 0.0, -10.0));
    let mut engine = Engine::new(HeadlessBackend::new(), scene, RendererConfig::default());
    assert_eq!(engine.pick(camera, CENTRE.0, CENTRE.1).unwrap(), None);

    // Move the camera in front of the target
    engine
        .scene_mut()
        .graph
        .set_local_transform(camera, Transform::from_position(Vec3::new(30.0, 0.0, 0.0)))
        .unwrap();
    assert_eq!(engine.pick(camera, CENTRE.0, CENTRE.1).unwrap(), Some(target));
}

#[test]
fn test_back_face_is_pickable() {
    init_logging();
    let (mut scene, camera) = scene_with_camera(test_camera());
    let id = spawn_diamond(&mut scene, Vec3::ZERO);
    scene
        .graph
        .set_local_transform(
            id,
            Transform::from_position_rotation(
                Vec3::new(0.0, 0.0, -10.0),
                Quat::from_rotation_y(std::f32::consts::PI),
            ),
        )
        .unwrap();
    let mut engine = Engine::new(HeadlessBackend::new(), scene, RendererConfig::default());
    assert_eq!(engine.pick(camera, CENTRE.0, CENTRE.1).unwrap(), Some(id));
}

#[rstest]
#[case::editor(RenderMode::Editor, false)]
#[case::device(RenderMode::Device, true)]
fn test_hidden_entity_picking(#[case] mode: RenderMode, #[case] pickable: bool) {
    init_logging();
    let (mut scene, camera) = scene_with_camera(test_camera());
    let id = spawn_diamond(&mut scene, Vec3::new(0.0, 0.0, -10.0));
    scene.graph.entity_mut(id).unwrap().set_visible(false);
    let mut engine = Engine::new(
        HeadlessBackend::new(),
        scene,
        RendererConfig::default().with_mode(mode),
    );

    let picked = engine.pick(camera, CENTRE.0, CENTRE.1).unwrap();
    assert_eq!(picked.is_some(), pickable);
}

#[test]
fn test_degenerate_projection_is_an_error() {
    init_logging();
    let camera = rig_render::Camera::new(Projection::Orthographic {
        left: 1.0,
        right: 1.0,
        bottom: -1.0,
        top: 1.0,
        near: 0.1,
        far: 10.0,
    });
    let (mut scene, camera) = scene_with_camera(camera);
    spawn_diamond(&mut scene, Vec3::new(0.0, 0.0, -5.0));
    let mut engine = Engine::new(HeadlessBackend::new(), scene, RendererConfig::default());

    assert!(matches!(
        engine.pick(camera, 10.0, 10.0),
        Err(RigError::DegenerateProjection)
    ));
}
