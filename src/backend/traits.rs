//! Core backend abstraction traits
//!
//! The renderer talks to the GPU object layer exclusively through
//! [`GraphicsBackend`]. Objects created by a backend are referred to by
//! opaque handles; the backend owns the objects themselves.

use crate::backend::types::*;
use glam::{Mat4, Vec4};
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to allocate offscreen framebuffer: {0}")]
    OffscreenAllocationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Failed to create primitive: {0}")]
    PrimitiveCreationFailed(String),
    #[error("Failed to present: {0}")]
    PresentFailed(String),
    #[error("Unknown handle: {0}")]
    InvalidHandle(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a framebuffer (onscreen or offscreen)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a pipeline object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub(crate) u64);

/// Handle to uploaded vertex/index data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveHandle(pub(crate) u64);

impl TextureHandle {
    /// Wrap an externally created texture id
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

/// An allocated offscreen framebuffer and its attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offscreen {
    pub framebuffer: FramebufferHandle,
    pub color: Option<TextureHandle>,
    pub depth: Option<TextureHandle>,
    pub width: u32,
    pub height: u32,
}

/// Main graphics backend trait
pub trait GraphicsBackend {
    /// Human readable backend name
    fn name(&self) -> &'static str;

    /// The framebuffer presented to the screen
    fn onscreen_framebuffer(&self) -> FramebufferHandle;

    /// Allocate an offscreen framebuffer
    fn create_offscreen(&mut self, desc: &OffscreenDescriptor) -> BackendResult<Offscreen>;

    /// Free an offscreen framebuffer and its attachments
    fn destroy_offscreen(&mut self, offscreen: &Offscreen);

    /// Create a pipeline object. Every call returns a fresh handle.
    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<PipelineHandle>;

    /// Drop the renderer's reference to a pipeline object
    fn release_pipeline(&mut self, pipeline: PipelineHandle);

    /// Set a named uniform on a pipeline
    fn set_uniform(&mut self, pipeline: PipelineHandle, name: &str, value: UniformValue);

    /// Upload vertex and index data
    fn create_primitive(
        &mut self,
        topology: PrimitiveTopology,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> BackendResult<PrimitiveHandle>;

    /// Free uploaded vertex and index data
    fn release_primitive(&mut self, primitive: PrimitiveHandle);

    // Framebuffer state

    /// Set the viewport of a framebuffer
    fn set_viewport(&mut self, framebuffer: FramebufferHandle, viewport: Viewport);

    /// Set the projection matrix of a framebuffer
    fn set_projection(&mut self, framebuffer: FramebufferHandle, projection: Mat4);

    /// Clear the selected buffers of a framebuffer
    fn clear(&mut self, framebuffer: FramebufferHandle, flags: ClearFlags, color: Vec4);

    // Drawing

    /// Draw a primitive with a pipeline
    fn draw_primitive(
        &mut self,
        framebuffer: FramebufferHandle,
        pipeline: PipelineHandle,
        primitive: PrimitiveHandle,
        state: &DrawState,
    );

    /// Draw a screen-aligned rectangle textured with `texture`
    fn draw_textured_rectangle(
        &mut self,
        framebuffer: FramebufferHandle,
        texture: TextureHandle,
        rect: Viewport,
    );

    /// Finish the frame and present `framebuffer`
    fn end_frame(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()>;
}
