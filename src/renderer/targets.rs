//! Offscreen render targets kept across frames

use crate::backend::{
    FramebufferHandle, GraphicsBackend, Offscreen, OffscreenDescriptor, TextureFormat, TextureHandle,
};
use crate::error::{RigError, RigResult};

/// Describes target dimensions that can be relative to a reference size
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSize {
    /// Absolute size in pixels
    Absolute { width: u32, height: u32 },
    /// Multiple of the reference size
    Relative { scale: f32 },
}

impl TargetSize {
    pub fn resolve(&self, reference_width: u32, reference_height: u32) -> (u32, u32) {
        match *self {
            TargetSize::Absolute { width, height } => (width, height),
            TargetSize::Relative { scale } => (
                (reference_width as f32 * scale) as u32,
                (reference_height as f32 * scale) as u32,
            ),
        }
    }
}

/// A lazily (re)allocated offscreen framebuffer
#[derive(Debug)]
pub struct RenderTarget {
    label: &'static str,
    offscreen: Option<Offscreen>,
}

impl RenderTarget {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            offscreen: None,
        }
    }

    /// Make sure an offscreen of exactly `width` x `height` exists.
    ///
    /// Returns true when a new offscreen was allocated. On failure nothing is
    /// kept, so the next call tries again.
    pub fn ensure(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
    ) -> RigResult<bool> {
        if let Some(current) = &self.offscreen {
            if current.width == width && current.height == height {
                return Ok(false);
            }
        }
        self.release(backend);

        log::debug!("allocating {} target {}x{}", self.label, width, height);
        let desc = OffscreenDescriptor::new(self.label, width, height)
            .with_depth(TextureFormat::Depth32Float);
        let offscreen = backend
            .create_offscreen(&desc)
            .map_err(|source| RigError::OffscreenAllocation {
                width,
                height,
                source,
            })?;
        self.offscreen = Some(offscreen);
        Ok(true)
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(offscreen) = self.offscreen.take() {
            log::debug!("releasing {} target", self.label);
            backend.destroy_offscreen(&offscreen);
        }
    }

    pub fn offscreen(&self) -> Option<&Offscreen> {
        self.offscreen.as_ref()
    }

    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.offscreen.map(|o| o.framebuffer)
    }

    pub fn color_texture(&self) -> Option<TextureHandle> {
        self.offscreen.and_then(|o| o.color)
    }

    pub fn depth_texture(&self) -> Option<TextureHandle> {
        self.offscreen.and_then(|o| o.depth)
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.offscreen.map(|o| (o.width, o.height))
    }
}

/// Shadow map rendered from the light, a multiple of the device size
#[derive(Debug)]
pub struct ShadowMap {
    size: TargetSize,
    target: RenderTarget,
}

impl ShadowMap {
    pub fn new(scale: f32) -> Self {
        Self {
            size: TargetSize::Relative { scale },
            target: RenderTarget::new("shadow-map"),
        }
    }

    pub fn ensure(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        device_width: u32,
        device_height: u32,
    ) -> RigResult<bool> {
        let (width, height) = self.size.resolve(device_width, device_height);
        self.target.ensure(backend, width, height)
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Depth texture sampled by shadow receivers
    pub fn texture(&self) -> Option<TextureHandle> {
        self.target.depth_texture()
    }

    pub fn is_allocated(&self) -> bool {
        self.target.offscreen().is_some()
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.target.release(backend);
    }
}

/// Depth and color passes of the depth-of-field effect, sized to the viewport
#[derive(Debug)]
pub struct DepthOfField {
    depth_pass: RenderTarget,
    color_pass: RenderTarget,
}

impl Default for DepthOfField {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthOfField {
    pub fn new() -> Self {
        Self {
            depth_pass: RenderTarget::new("dof-depth"),
            color_pass: RenderTarget::new("dof-color"),
        }
    }

    pub fn ensure(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
    ) -> RigResult<()> {
        self.depth_pass.ensure(backend, width, height)?;
        self.color_pass.ensure(backend, width, height)?;
        Ok(())
    }

    pub fn depth_pass(&self) -> &RenderTarget {
        &self.depth_pass
    }

    pub fn color_pass(&self) -> &RenderTarget {
        &self.color_pass
    }

    pub fn is_allocated(&self) -> bool {
        self.depth_pass.offscreen().is_some() || self.color_pass.offscreen().is_some()
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.depth_pass.release(backend);
        self.color_pass.release(backend);
    }
}
