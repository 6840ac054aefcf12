//! Rig Render - scene-graph rendering with shadows, depth of field and picking
//!
//! The crate paints a hierarchy of entities through an abstract
//! [`GraphicsBackend`]. Each frame runs up to four passes:
//! - **Shadow**: depth of shadow casters from the light into a shadow map
//! - **DoF depth**: per-fragment blur factor when the camera has depth of field
//! - **Color**: lit geometry, unblended then optionally blended
//! - **Composite**: the DoF color target drawn onto the camera's framebuffer
//!
//! # Features
//! - Generational scene graph arena with lazily cached world transforms
//! - Depth-first traversal with balanced matrix/clip stacks and overlay layers
//! - Per-entity pipeline caching keyed by material and shadow state
//! - Ray picking against entity geometry
//! - [`HeadlessBackend`] recording every call, for tests and tooling

pub mod backend;
pub mod engine;
pub mod error;
pub mod input;
pub mod picking;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod traversal;

pub use backend::{GraphicsBackend, HeadlessBackend};
pub use engine::Engine;
pub use error::{RigError, RigResult};
pub use input::{InputEvent, InputEventKind, Modifiers, PointerButtons};
pub use picking::{PickHit, Ray};
pub use pipeline::{PipelineCache, RenderPass};
pub use renderer::{FrameStats, Renderer, RendererConfig};
pub use scene::{Camera, Component, Entity, Geometry, Light, NodeId, Scene, SceneGraph, Transform};

/// Who the frame is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Editing view: hidden entities can't be picked and the light frustum is drawn
    Editor,
    /// Final output on the device
    #[default]
    Device,
}
