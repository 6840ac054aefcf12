//! Headless demo painting a small scene
//!
//! Run with:
//!   cargo run --example scene_demo
//!   cargo run --example scene_demo -- --editor --dof --frames 3
//!
//! Every frame is painted through the recording backend; the stats of each
//! frame and the entity under the viewport centre are logged.

use clap::Parser;
use glam::{Quat, Vec3, Vec4};
use rig_render::{
    renderer::default_light_camera,
    resources::Material,
    scene::Projection,
    Camera, Component, Engine, Entity, Geometry, HeadlessBackend, InputEvent, Light,
    PointerButtons, RenderMode, RendererConfig, RigResult, Scene, Transform,
};

#[derive(Parser, Debug)]
#[command(about = "Paint a demo scene with the headless backend")]
struct Args {
    /// Viewport width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Number of frames to paint
    #[arg(long, default_value_t = 2)]
    frames: u32,

    /// Render in editor mode (draws the light frustum)
    #[arg(long)]
    editor: bool,

    /// Enable depth of field on the camera
    #[arg(long)]
    dof: bool,

    /// Also run the blended color pass
    #[arg(long)]
    blended: bool,
}

fn build_scene(args: &Args, config: &RendererConfig) -> RigResult<(Scene, rig_render::NodeId)> {
    let mut scene = Scene::new();

    let light = Entity::new()
        .with_component(Component::Light(Light::new()))
        .with_component(Component::Camera(default_light_camera(config)));
    let mut light_transform = Transform::from_position(Vec3::new(0.0, 50.0, 50.0));
    light_transform.look_at(Vec3::ZERO, Vec3::Y);
    scene.spawn(light, light_transform)?;

    let floor = Entity::new()
        .with_geometry(Geometry::shape(40.0, 40.0, false))
        .with_material(Material::new("floor").with_diffuse(Vec4::new(0.5, 0.5, 0.55, 1.0)))
        .with_receive_shadow(true);
    scene.spawn(
        floor,
        Transform::from_position_rotation(
            Vec3::new(0.0, -2.0, -20.0),
            Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        ),
    )?;

    for (i, x) in [-6.0f32, 0.0, 6.0].into_iter().enumerate() {
        let diamond = Entity::new()
            .with_geometry(Geometry::diamond(4.0))
            .with_material(Material::new(&format!("diamond-{i}")))
            .with_receive_shadow(true);
        scene.spawn(diamond, Transform::from_position(Vec3::new(x, 0.0, -15.0 - i as f32 * 5.0)))?;
    }

    let aspect = args.width as f32 / args.height.max(1) as f32;
    let mut camera = Camera::new(Projection::perspective(60.0, aspect, 0.1, 500.0))
        .with_viewport(0.0, 0.0, args.width as f32, args.height as f32)
        .with_background(Vec4::new(0.1, 0.1, 0.12, 1.0));
    if args.dof {
        camera = camera.with_depth_of_field(20.0, 5.0);
    }
    let camera = scene
        .graph
        .add_entity(Entity::new().with_component(Component::Camera(camera)));

    Ok((scene, camera))
}

fn run(args: Args) -> RigResult<()> {
    let mode = if args.editor {
        RenderMode::Editor
    } else {
        RenderMode::Device
    };
    let config = RendererConfig::default()
        .with_device_size(args.width, args.height)
        .with_blended_pass(args.blended)
        .with_mode(mode);

    let (scene, camera) = build_scene(&args, &config)?;
    let mut engine = Engine::new(HeadlessBackend::new(), scene, config);

    for frame in 0..args.frames {
        let stats = engine.paint(camera)?;
        let passes: Vec<&str> = stats.traversals.iter().map(|t| t.pass.name()).collect();
        log::info!(
            "frame {}: passes {:?}, {} draws, {} pipelines built, {} cache hits",
            frame,
            passes,
            stats.draws,
            stats.pipelines_built,
            stats.cache_hits
        );
    }

    let centre = InputEvent::motion(camera, args.width as f32 / 2.0, args.height as f32 / 2.0)
        .with_buttons(PointerButtons::PRIMARY);
    match engine.handle_input(&centre)? {
        Some(id) => log::info!("picked {:?} at the viewport centre", id),
        None => log::info!("nothing under the viewport centre"),
    }

    engine.shutdown();
    log::info!(
        "{} pipelines created, {} offscreens created",
        engine.backend().pipelines_created(),
        engine.backend().offscreens_created()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Args::parse()) {
        log::error!("demo failed: {}", err);
        std::process::exit(1);
    }
}
