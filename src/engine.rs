//! Main engine facade

use crate::backend::GraphicsBackend;
use crate::error::RigResult;
use crate::input::{InputEvent, InputEventKind, PointerButtons};
use crate::picking::{self, PickHit};
use crate::pipeline::RenderPass;
use crate::renderer::{FrameStats, Renderer, RendererConfig};
use crate::scene::{NodeId, Scene};

/// A scene, the renderer painting it and the backend it paints through
pub struct Engine<B: GraphicsBackend> {
    backend: B,
    scene: Scene,
    renderer: Renderer,
    selected: Option<NodeId>,
}

impl<B: GraphicsBackend> Engine<B> {
    pub fn new(backend: B, scene: Scene, config: RendererConfig) -> Self {
        log::debug!(
            "creating engine on {} in {:?} mode",
            backend.name(),
            config.mode
        );
        Self {
            backend,
            scene,
            renderer: Renderer::new(config),
            selected: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Get mutable reference to the scene
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Entity picked by the last primary-button motion event
    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Handle a device resize; the shadow map follows on the next frame
    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.set_device_size(width.max(1), height.max(1));
    }

    /// Paint one frame through the camera entity `camera`
    pub fn paint(&mut self, camera: NodeId) -> RigResult<FrameStats> {
        self.renderer.paint(&mut self.backend, &mut self.scene, camera)
    }

    /// Entity under window coordinates as seen through `camera`
    pub fn pick(&mut self, camera: NodeId, screen_x: f32, screen_y: f32) -> RigResult<Option<NodeId>> {
        Ok(self.pick_hit(camera, screen_x, screen_y)?.map(|hit| hit.entity))
    }

    /// Like [`Engine::pick`], with the details of the hit
    pub fn pick_hit(
        &mut self,
        camera: NodeId,
        screen_x: f32,
        screen_y: f32,
    ) -> RigResult<Option<PickHit>> {
        let world = self.scene.graph.combined_transform(camera)?;
        self.scene.camera_mut(camera)?.update_view(world, false);

        let camera = self.scene.camera(camera)?;
        picking::pick_at(
            &self.scene.graph,
            self.scene.root,
            camera,
            screen_x,
            screen_y,
            self.renderer.config().mode,
        )
    }

    /// Force `entity`'s pipeline for `pass` to be rebuilt on the next paint
    pub fn invalidate_entity_pipeline(&mut self, entity: NodeId, pass: RenderPass) -> RigResult<()> {
        self.renderer
            .invalidate_entity_pipeline(&mut self.scene.graph, entity, pass)
    }

    /// Destroy `node` and its subtree, releasing their backend objects
    pub fn destroy_node(&mut self, node: NodeId) -> RigResult<()> {
        if self.selected.is_some_and(|s| s == node || self.scene.graph.is_ancestor(node, s)) {
            self.selected = None;
        }
        self.renderer
            .destroy_node(&mut self.backend, &mut self.scene.graph, node)
    }

    /// React to an input event.
    ///
    /// Pointer motion with the primary button held selects the entity under
    /// the pointer, which is returned. Other events are not consumed.
    pub fn handle_input(&mut self, event: &InputEvent) -> RigResult<Option<NodeId>> {
        match event.kind {
            InputEventKind::Motion { x, y } if event.buttons.contains(PointerButtons::PRIMARY) => {
                let picked = self.pick(event.camera, x, y)?;
                log::debug!("selected {:?}", picked);
                self.selected = picked;
                Ok(picked)
            }
            InputEventKind::Motion { .. } | InputEventKind::Key { .. } => Ok(None),
        }
    }

    /// Release everything the renderer holds on the backend
    pub fn shutdown(&mut self) {
        self.renderer.release(&mut self.backend);
    }
}
