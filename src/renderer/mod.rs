//! Multi-pass frame rendering
//!
//! A frame is painted in a fixed order:
//! 1. Shadow pass from the light camera into the shadow map
//! 2. Depth-of-field depth pass, when the camera has DoF enabled
//! 3. Color passes (unblended, then blended) into the DoF color target or
//!    straight into the camera's framebuffer
//! 4. DoF composite onto the camera's framebuffer, then end of frame
//!
//! Every offscreen the frame needs is allocated before anything is drawn, so
//! a failed allocation leaves the previous frame on screen.

mod paint;
mod targets;

pub use paint::*;
pub use targets::*;

use glam::{Mat4, Vec4};

use crate::backend::{
    ClearFlags, DepthState, DrawState, FramebufferHandle, GraphicsBackend, PipelineDescriptor,
    PipelineHandle, PrimitiveHandle, PrimitiveTopology, TextureHandle,
};
use crate::error::{RigError, RigResult};
use crate::pipeline::uniforms::LightUniforms;
use crate::pipeline::{PipelineCache, RenderPass};
use crate::resources::Mesh;
use crate::scene::{
    Camera, ComponentType, Light, NodeId, Projection, RetiredResource, Scene, SceneGraph,
};
use crate::traversal::{TargetStacks, Traversal, DEFAULT_MAX_OVERLAY_LAYERS};
use crate::RenderMode;

/// Color of the light frustum drawn in editor mode
pub const FRUSTUM_COLOR: Vec4 = Vec4::new(0.8, 0.6, 0.1, 1.0);

/// Configuration of the renderer
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Device resolution the shadow map is sized from
    pub device_width: u32,
    pub device_height: u32,
    /// Shadow map size as a multiple of the device resolution
    pub shadow_map_scale: f32,
    /// Clear color of the shadow map
    pub light_background: Vec4,
    /// Run the blended color pass after the unblended one
    pub blended_pass: bool,
    pub mode: RenderMode,
    /// Limit on overlay layers replayed per traversal
    pub max_overlay_layers: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            device_width: 1280,
            device_height: 720,
            shadow_map_scale: 2.0,
            light_background: Vec4::new(0.0, 0.3, 0.0, 1.0),
            blended_pass: false,
            mode: RenderMode::Device,
            max_overlay_layers: DEFAULT_MAX_OVERLAY_LAYERS,
        }
    }
}

impl RendererConfig {
    pub fn with_device_size(mut self, width: u32, height: u32) -> Self {
        self.device_width = width;
        self.device_height = height;
        self
    }

    pub fn with_shadow_map_scale(mut self, scale: f32) -> Self {
        self.shadow_map_scale = scale;
        self
    }

    pub fn with_light_background(mut self, color: Vec4) -> Self {
        self.light_background = color;
        self
    }

    pub fn with_blended_pass(mut self, enabled: bool) -> Self {
        self.blended_pass = enabled;
        self
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_overlay_layers(mut self, layers: u32) -> Self {
        self.max_overlay_layers = layers;
        self
    }
}

/// Camera for a light entity: orthographic, looking down the light's -Z
pub fn default_light_camera(config: &RendererConfig) -> Camera {
    Camera::new(Projection::Orthographic {
        left: -1000.0,
        right: 1000.0,
        bottom: -1000.0,
        top: 1000.0,
        near: 1.1,
        far: 1500.0,
    })
    .with_background(config.light_background)
}

/// One traversal of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub pass: RenderPass,
    pub entities_visited: usize,
    /// Nodes whose local transform was pushed onto the modelview stack
    pub matrix_pushes: usize,
}

/// What a call to [`Renderer::paint`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub traversals: Vec<PassStats>,
    pub pipelines_built: usize,
    pub draws: usize,
    pub cache_hits: usize,
}

impl FrameStats {
    /// Traversals of `pass` during the frame
    pub fn traversals_of(&self, pass: RenderPass) -> impl Iterator<Item = &PassStats> + '_ {
        self.traversals.iter().filter(move |t| t.pass == pass)
    }
}

/// The scene light, resolved for one frame
#[derive(Debug, Clone)]
struct FrameLight {
    id: NodeId,
    light: Light,
    camera: Camera,
    world: Mat4,
}

/// Paints scenes through a [`GraphicsBackend`]
#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
    cache: PipelineCache,
    traversal: Traversal,
    shadow_map: ShadowMap,
    dof: DepthOfField,
    /// Shadow map texture receivers' pipelines were built against
    bound_shadow_map: Option<TextureHandle>,
    frustum_pipeline: Option<PipelineHandle>,
    frustum_primitive: Option<PrimitiveHandle>,
    warned_no_light: bool,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            cache: PipelineCache::new(),
            traversal: Traversal::new().with_max_overlay_layers(config.max_overlay_layers),
            shadow_map: ShadowMap::new(config.shadow_map_scale),
            dof: DepthOfField::new(),
            bound_shadow_map: None,
            frustum_pipeline: None,
            frustum_primitive: None,
            warned_no_light: false,
            config,
        }
    }

    /// Use `cache` instead of an empty pipeline cache
    pub fn with_pipeline_cache(mut self, cache: PipelineCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Device resolution the shadow map is sized from; applied on the next paint
    pub fn set_device_size(&mut self, width: u32, height: u32) {
        self.config.device_width = width;
        self.config.device_height = height;
    }

    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.cache
    }

    pub fn shadow_map(&self) -> &ShadowMap {
        &self.shadow_map
    }

    pub fn depth_of_field(&self) -> &DepthOfField {
        &self.dof
    }

    /// Paint one frame of `scene` as seen from the camera entity `camera_id`
    pub fn paint(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        scene: &mut Scene,
        camera_id: NodeId,
    ) -> RigResult<FrameStats> {
        self.release_retired(backend, &mut scene.graph);
        let cache_before = self.cache.stats();

        let camera_world = scene.graph.combined_transform(camera_id)?;
        let camera = {
            let camera = scene.camera_mut(camera_id)?;
            camera.update_view(camera_world, false);
            camera.clone()
        };

        let light = self.resolve_light(scene)?;
        let shadow_pass = light.is_some() && (camera.dof_enabled || has_shadow_receivers(scene));

        // Allocate every target up front
        if shadow_pass {
            self.shadow_map
                .ensure(backend, self.config.device_width, self.config.device_height)?;
        } else if self.shadow_map.is_allocated() {
            self.shadow_map.release(backend);
        }
        let viewport = camera.viewport();
        if camera.dof_enabled {
            self.dof
                .ensure(backend, viewport.width as u32, viewport.height as u32)?;
        } else if self.dof.is_allocated() {
            self.dof.release(backend);
        }

        let shadow_texture = if shadow_pass {
            self.shadow_map.texture()
        } else {
            None
        };
        if shadow_texture != self.bound_shadow_map {
            self.invalidate_shadow_receivers(&mut scene.graph);
            self.bound_shadow_map = shadow_texture;
        }

        let mut frame = FrameStats::default();

        if let (true, Some(light)) = (shadow_pass, &light) {
            if let Some((framebuffer, width, height)) = self
                .shadow_map
                .target()
                .offscreen()
                .map(|o| (o.framebuffer, o.width, o.height))
            {
                let mut light_camera = light.camera.clone();
                light_camera.update_view(light.world, true);
                light_camera.set_viewport(0.0, 0.0, width as f32, height as f32);
                let clear = Some(self.config.light_background);
                self.run_pass(
                    backend,
                    scene,
                    &mut frame,
                    RenderPass::Shadow,
                    &light_camera,
                    framebuffer,
                    clear,
                    None,
                    None,
                )?;
            }
        }

        let light_uniforms = light.as_ref().map(|light| LightUniforms {
            light: light.light,
            direction: Light::direction_to_light(light.world, camera.view_transform()),
            shadow: shadow_texture.map(|_| (light.camera.projection_matrix(), light.world)),
        });

        let target = camera.target(backend);
        let (color_framebuffer, color_camera) = match (
            camera.dof_enabled,
            self.dof.depth_pass().framebuffer(),
            self.dof.color_pass().framebuffer(),
        ) {
            (true, Some(depth_framebuffer), Some(color_framebuffer)) => {
                let mut pass_camera = camera.clone();
                pass_camera.set_viewport(0.0, 0.0, viewport.width, viewport.height);
                self.run_pass(
                    backend,
                    scene,
                    &mut frame,
                    RenderPass::DofDepth,
                    &pass_camera,
                    depth_framebuffer,
                    Some(Vec4::ONE),
                    None,
                    None,
                )?;
                (color_framebuffer, pass_camera)
            }
            _ => (target, camera.clone()),
        };

        let clear = color_camera.clear.then_some(color_camera.background);
        let saw_light = self.run_pass(
            backend,
            scene,
            &mut frame,
            RenderPass::ColorUnblended,
            &color_camera,
            color_framebuffer,
            clear,
            light_uniforms.as_ref(),
            shadow_texture,
        )?;
        if self.config.blended_pass {
            self.run_pass(
                backend,
                scene,
                &mut frame,
                RenderPass::ColorBlended,
                &color_camera,
                color_framebuffer,
                None,
                light_uniforms.as_ref(),
                shadow_texture,
            )?;
        }

        if let (RenderMode::Editor, true, Some(light)) = (self.config.mode, saw_light, &light) {
            self.draw_light_frustum(backend, color_framebuffer, &color_camera, light)?;
            frame.draws += 1;
        }

        if let (true, Some(texture)) = (camera.dof_enabled, self.dof.color_pass().color_texture()) {
            camera.flush(backend, target);
            backend.draw_textured_rectangle(target, texture, viewport);
        }

        backend.end_frame(target)?;

        let cache_after = self.cache.stats();
        frame.pipelines_built = cache_after.built - cache_before.built;
        frame.cache_hits = cache_after.hits - cache_before.hits;
        Ok(frame)
    }

    /// Traverse the scene for one pass and flush its journal.
    ///
    /// Returns whether the scene light was passed while painting.
    #[allow(clippy::too_many_arguments)]
    fn run_pass(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        scene: &mut Scene,
        frame: &mut FrameStats,
        pass: RenderPass,
        camera: &Camera,
        framebuffer: FramebufferHandle,
        clear: Option<Vec4>,
        light: Option<&LightUniforms>,
        shadow_map: Option<TextureHandle>,
    ) -> RigResult<bool> {
        log::debug!("{} pass: begin", pass.name());
        camera.flush(backend, framebuffer);
        if let Some(color) = clear {
            backend.clear(framebuffer, ClearFlags::COLOR | ClearFlags::DEPTH, color);
        }

        let light_id = scene.light();
        let mut visitor = PaintVisitor::new(pass).watch_light(light_id);
        let mut stacks = TargetStacks::new(camera.view_transform());
        let walk = self
            .traversal
            .run(&scene.graph, scene.root, &mut stacks, &mut visitor)?;

        let entities_visited = visitor.entities_visited();
        let saw_light = visitor.saw_light();
        let ctx = PassContext {
            pass,
            camera,
            framebuffer,
            light,
            shadow_map,
        };
        let draws = flush_journal(
            backend,
            &mut self.cache,
            &mut scene.graph,
            visitor.into_journal(),
            &ctx,
        )?;

        frame.traversals.push(PassStats {
            pass,
            entities_visited,
            matrix_pushes: walk.stacks.matrix_pushes,
        });
        frame.draws += draws;
        log::debug!("{} pass: end, {} draws", pass.name(), draws);
        Ok(saw_light)
    }

    fn resolve_light(&mut self, scene: &Scene) -> RigResult<Option<FrameLight>> {
        let Some(id) = scene.light() else {
            if !self.warned_no_light {
                log::warn!("scene has no light, skipping shadows and lighting uniforms");
                self.warned_no_light = true;
            }
            return Ok(None);
        };
        self.warned_no_light = false;

        let entity = scene.graph.entity(id)?;
        let light = entity.light().copied().ok_or(RigError::MissingComponent {
            node: id,
            component: ComponentType::Light,
        })?;
        let camera = entity
            .camera()
            .cloned()
            .ok_or(RigError::MissingComponent {
                node: id,
                component: ComponentType::Camera,
            })?;
        Ok(Some(FrameLight {
            id,
            light,
            camera,
            world: scene.graph.combined_transform(id)?,
        }))
    }

    fn draw_light_frustum(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        framebuffer: FramebufferHandle,
        camera: &Camera,
        light: &FrameLight,
    ) -> RigResult<()> {
        let mut light_camera = light.camera.clone();
        light_camera.update_view(light.world, false);
        let corners = match light_camera.frustum_corners() {
            Ok(corners) => corners,
            Err(err) => {
                log::warn!("can't draw frustum of light {:?}: {}", light.id, err);
                return Ok(());
            }
        };

        let mesh = Mesh::frustum_lines(&corners);
        if let Some(old) = self.frustum_primitive.take() {
            backend.release_primitive(old);
        }
        let primitive =
            backend.create_primitive(PrimitiveTopology::LineList, &mesh.vertices, &mesh.indices)?;
        self.frustum_primitive = Some(primitive);

        let pipeline = match self.frustum_pipeline {
            Some(pipeline) => pipeline,
            None => {
                let desc = PipelineDescriptor::new("light-frustum")
                    .with_color(FRUSTUM_COLOR)
                    .with_depth(DepthState::tested());
                let pipeline = backend.create_pipeline(&desc)?;
                self.frustum_pipeline = Some(pipeline);
                pipeline
            }
        };

        let state = DrawState {
            modelview: camera.view_transform(),
            projection: camera.projection_matrix(),
            viewport: camera.viewport(),
            clip: None,
        };
        backend.draw_primitive(framebuffer, pipeline, primitive, &state);
        Ok(())
    }

    /// Force the pipeline of `id` for `pass` to be rebuilt on the next paint
    pub fn invalidate_entity_pipeline(
        &mut self,
        graph: &mut SceneGraph,
        id: NodeId,
        pass: RenderPass,
    ) -> RigResult<()> {
        let entity = graph.entity_mut(id)?;
        self.cache.invalidate(entity, pass);
        Ok(())
    }

    /// Drop every cached pipeline of `id`
    pub fn dirty_entity_pipelines(&mut self, graph: &mut SceneGraph, id: NodeId) -> RigResult<()> {
        let entity = graph.entity_mut(id)?;
        for pass in [RenderPass::ColorUnblended, RenderPass::ColorBlended] {
            self.cache.invalidate(entity, pass);
        }
        Ok(())
    }

    /// Free the subtree of `id` and release its entities' backend objects
    pub fn destroy_node(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        graph: &mut SceneGraph,
        id: NodeId,
    ) -> RigResult<()> {
        for mut entity in graph.destroy(id)? {
            release_resources(backend, entity.release_all());
        }
        Ok(())
    }

    /// Release every backend object the renderer owns
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.cache.release(backend);
        self.shadow_map.release(backend);
        self.dof.release(backend);
        self.bound_shadow_map = None;
        if let Some(pipeline) = self.frustum_pipeline.take() {
            backend.release_pipeline(pipeline);
        }
        if let Some(primitive) = self.frustum_primitive.take() {
            backend.release_primitive(primitive);
        }
    }

    fn release_retired(&mut self, backend: &mut dyn GraphicsBackend, graph: &mut SceneGraph) {
        self.cache.begin_frame(backend);
        for (_, entity) in graph.entities_mut() {
            release_resources(backend, entity.drain_retired());
        }
    }

    fn invalidate_shadow_receivers(&mut self, graph: &mut SceneGraph) {
        for (_, entity) in graph.entities_mut() {
            if entity.receive_shadow() {
                for pass in [RenderPass::ColorUnblended, RenderPass::ColorBlended] {
                    self.cache.invalidate(entity, pass);
                }
            }
        }
    }
}

fn release_resources(backend: &mut dyn GraphicsBackend, resources: Vec<RetiredResource>) {
    for resource in resources {
        match resource {
            RetiredResource::Pipeline(pipeline) => backend.release_pipeline(pipeline),
            RetiredResource::Primitive(primitive) => backend.release_primitive(primitive),
        }
    }
}

fn has_shadow_receivers(scene: &Scene) -> bool {
    scene
        .graph
        .find_entity(scene.root, |entity| {
            entity.receive_shadow() && entity.visible() && entity.geometry().is_some()
        })
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, HeadlessBackend};
    use crate::scene::{Component, Entity, Geometry, Transform};
    use glam::Vec3;

    fn scene_with_camera() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let camera = scene.graph.add_entity(
            Entity::new().with_component(Component::Camera(
                Camera::new(Projection::perspective(45.0, 1.0, 0.1, 100.0))
                    .with_viewport(0.0, 0.0, 200.0, 100.0),
            )),
        );
        (scene, camera)
    }

    fn add_light(scene: &mut Scene) -> NodeId {
        let config = RendererConfig::default();
        let light = Entity::new()
            .with_component(Component::Light(Light::default()))
            .with_component(Component::Camera(default_light_camera(&config)));
        scene
            .spawn(light, Transform::from_position(Vec3::new(0.0, 0.0, 100.0)))
            .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = RendererConfig::default();
        assert_eq!((config.device_width, config.device_height), (1280, 720));
        assert_eq!(config.shadow_map_scale, 2.0);
        assert!(!config.blended_pass);
        assert_eq!(config.mode, RenderMode::Device);
        assert_eq!(config.max_overlay_layers, 64);
    }

    #[test]
    fn test_no_light_single_color_pass() {
        let (mut scene, camera) = scene_with_camera();
        scene
            .add_entity(Entity::new().with_geometry(Geometry::diamond(1.0)).with_receive_shadow(true))
            .unwrap();
        let mut backend = HeadlessBackend::new();
        let mut renderer = Renderer::new(RendererConfig::default());

        let frame = renderer.paint(&mut backend, &mut scene, camera).unwrap();
        assert_eq!(frame.traversals.len(), 1);
        assert_eq!(frame.traversals[0].pass, RenderPass::ColorUnblended);
        assert_eq!(backend.live_offscreens(), 0);
        assert_eq!(backend.frames_presented(), 1);
    }

    #[test]
    fn test_shadow_pass_runs_first() {
        let (mut scene, camera) = scene_with_camera();
        add_light(&mut scene);
        scene
            .add_entity(Entity::new().with_geometry(Geometry::diamond(1.0)).with_receive_shadow(true))
            .unwrap();
        let mut backend = HeadlessBackend::new();
        let config = RendererConfig::default().with_device_size(64, 32);
        let mut renderer = Renderer::new(config);

        let frame = renderer.paint(&mut backend, &mut scene, camera).unwrap();
        let passes: Vec<RenderPass> = frame.traversals.iter().map(|t| t.pass).collect();
        assert_eq!(passes, vec![RenderPass::Shadow, RenderPass::ColorUnblended]);
        assert_eq!(renderer.shadow_map().target().size(), Some((128, 64)));

        // The shadow map is cleared with the light background
        let shadow_fb = renderer.shadow_map().target().framebuffer().unwrap();
        let (fb, flags, color) = backend.clears().next().unwrap();
        assert_eq!(fb, shadow_fb);
        assert!(flags.contains(ClearFlags::DEPTH));
        assert_eq!(color, Vec4::new(0.0, 0.3, 0.0, 1.0));
    }

    #[test]
    fn test_shadow_map_released_without_receivers() {
        let (mut scene, camera) = scene_with_camera();
        add_light(&mut scene);
        let receiver = scene
            .add_entity(Entity::new().with_geometry(Geometry::diamond(1.0)).with_receive_shadow(true))
            .unwrap();
        let mut backend = HeadlessBackend::new();
        let mut renderer = Renderer::new(RendererConfig::default().with_device_size(64, 32));

        renderer.paint(&mut backend, &mut scene, camera).unwrap();
        assert!(renderer.shadow_map().is_allocated());
        assert_eq!(backend.live_offscreens(), 1);

        scene
            .graph
            .entity_mut(receiver)
            .unwrap()
            .set_receive_shadow(false);
        let frame = renderer.paint(&mut backend, &mut scene, camera).unwrap();
        let passes: Vec<RenderPass> = frame.traversals.iter().map(|t| t.pass).collect();
        assert_eq!(passes, vec![RenderPass::ColorUnblended]);
        assert!(!renderer.shadow_map().is_allocated());
        assert_eq!(renderer.shadow_map().texture(), None);
        assert_eq!(backend.live_offscreens(), 0);
        assert_eq!(backend.offscreens_created(), 1);
    }

    #[test]
    fn test_light_without_camera_is_an_error() {
        let (mut scene, camera) = scene_with_camera();
        scene
            .add_entity(Entity::new().with_component(Component::Light(Light::default())))
            .unwrap();
        let mut backend = HeadlessBackend::new();
        let mut renderer = Renderer::new(RendererConfig::default());
        assert!(matches!(
            renderer.paint(&mut backend, &mut scene, camera),
            Err(RigError::MissingComponent {
                component: ComponentType::Camera,
                ..
            })
        ));
    }

    #[test]
    fn test_editor_mode_draws_light_frustum() {
        let (mut scene, camera) = scene_with_camera();
        add_light(&mut scene);
        let mut backend = HeadlessBackend::new();
        let config = RendererConfig::default().with_mode(RenderMode::Editor);
        let mut renderer = Renderer::new(config);

        let frame = renderer.paint(&mut backend, &mut scene, camera).unwrap();
        assert_eq!(frame.draws, 1);
        let line_draws = backend
            .calls()
            .iter()
            .filter(|call| match call {
                BackendCall::Draw { primitive, .. } => backend
                    .primitive(*primitive)
                    .is_some_and(|p| p.topology == PrimitiveTopology::LineList),
                _ => false,
            })
            .count();
        assert_eq!(line_draws, 1);
    }

    #[test]
    fn test_destroy_node_releases_pipelines() {
        let (mut scene, camera) = scene_with_camera();
        let id = scene
            .add_entity(Entity::new().with_geometry(Geometry::diamond(1.0)))
            .unwrap();
        let mut backend = HeadlessBackend::new();
        let mut renderer = Renderer::new(RendererConfig::default());
        renderer.paint(&mut backend, &mut scene, camera).unwrap();
        assert_eq!(backend.live_pipelines(), 1);

        renderer
            .destroy_node(&mut backend, &mut scene.graph, id)
            .unwrap();
        assert_eq!(backend.live_pipelines(), 0);
    }

    #[test]
    fn test_retired_pipelines_released_next_frame() {
        let (mut scene, camera) = scene_with_camera();
        let id = scene
            .add_entity(Entity::new().with_geometry(Geometry::diamond(1.0)))
            .unwrap();
        let mut backend = HeadlessBackend::new();
        let mut renderer = Renderer::new(RendererConfig::default());
        renderer.paint(&mut backend, &mut scene, camera).unwrap();

        renderer
            .invalidate_entity_pipeline(&mut scene.graph, id, RenderPass::ColorUnblended)
            .unwrap();
        let frame = renderer.paint(&mut backend, &mut scene, camera).unwrap();
        assert_eq!(frame.pipelines_built, 1);
        assert_eq!(backend.live_pipelines(), 1);
        assert_eq!(backend.pipelines_created(), 2);
    }
}
