//! Shared scene builders for the integration tests.

#![allow(dead_code)]

use glam::Vec3;
use rig_render::{
    renderer::default_light_camera,
    scene::Projection,
    Camera, Component, Entity, Geometry, Light, NodeId, RendererConfig, Scene, Transform,
};

/// Viewport of the test camera
pub const VIEWPORT_WIDTH: f32 = 200.0;
pub const VIEWPORT_HEIGHT: f32 = 100.0;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Perspective camera at the origin looking down -Z
pub fn test_camera() -> Camera {
    Camera::new(Projection::perspective(
        45.0,
        VIEWPORT_WIDTH / VIEWPORT_HEIGHT,
        0.1,
        100.0,
    ))
    .with_viewport(0.0, 0.0, VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
}

/// A scene and a camera entity living outside the painted subtree
pub fn scene_with_camera(camera: Camera) -> (Scene, NodeId) {
    let mut scene = Scene::new();
    let id = scene
        .graph
        .add_entity(Entity::new().with_component(Component::Camera(camera)));
    (scene, id)
}

pub fn spawn_diamond(scene: &mut Scene, position: Vec3) -> NodeId {
    scene
        .spawn(
            Entity::new().with_geometry(Geometry::diamond(4.0)),
            Transform::from_position(position),
        )
        .unwrap()
}

/// Light above the scene with the default orthographic light camera
pub fn spawn_light(scene: &mut Scene, config: &RendererConfig) -> NodeId {
    let light = Entity::new()
        .with_component(Component::Light(Light::default()))
        .with_component(Component::Camera(default_light_camera(config)));
    scene
        .spawn(light, Transform::from_position(Vec3::new(0.0, 0.0, 100.0)))
        .unwrap()
}
