//! Headless backend for testing and tooling.
//!
//! This backend doesn't perform GPU work. It hands out handles, keeps the
//! objects it was asked to create, and records every framebuffer command so
//! callers can inspect what a frame would have drawn.

use std::collections::HashMap;

use glam::{Mat4, Vec4};

use super::traits::*;
use super::types::*;

/// Default largest offscreen edge, matching common desktop driver limits
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 8192;

/// A framebuffer command recorded by [`HeadlessBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SetViewport {
        framebuffer: FramebufferHandle,
        viewport: Viewport,
    },
    SetProjection {
        framebuffer: FramebufferHandle,
        projection: Mat4,
    },
    Clear {
        framebuffer: FramebufferHandle,
        flags: ClearFlags,
        color: Vec4,
    },
    Draw {
        framebuffer: FramebufferHandle,
        pipeline: PipelineHandle,
        primitive: PrimitiveHandle,
        state: DrawState,
    },
    DrawTexturedRectangle {
        framebuffer: FramebufferHandle,
        texture: TextureHandle,
        rect: Viewport,
    },
    EndFrame {
        framebuffer: FramebufferHandle,
    },
}

/// A pipeline object kept by the headless backend
#[derive(Debug, Clone)]
pub struct PipelineRecord {
    pub descriptor: PipelineDescriptor,
    pub uniforms: HashMap<String, UniformValue>,
}

/// Uploaded geometry kept by the headless backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveRecord {
    pub topology: PrimitiveTopology,
    pub vertex_count: usize,
    pub index_count: usize,
}

/// Recording backend without a GPU.
#[derive(Debug)]
pub struct HeadlessBackend {
    next_id: u64,
    onscreen: FramebufferHandle,
    offscreens: HashMap<FramebufferHandle, Offscreen>,
    pipelines: HashMap<PipelineHandle, PipelineRecord>,
    primitives: HashMap<PrimitiveHandle, PrimitiveRecord>,
    calls: Vec<BackendCall>,
    pipelines_created: usize,
    offscreens_created: usize,
    frames_presented: u64,
    max_texture_size: u32,
    fail_offscreen_allocation: bool,
}

impl HeadlessBackend {
    /// Create a new headless backend.
    pub fn new() -> Self {
        Self {
            next_id: 2,
            onscreen: FramebufferHandle(1),
            offscreens: HashMap::new(),
            pipelines: HashMap::new(),
            primitives: HashMap::new(),
            calls: Vec::new(),
            pipelines_created: 0,
            offscreens_created: 0,
            frames_presented: 0,
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            fail_offscreen_allocation: false,
        }
    }

    /// Limit the edge length of offscreen allocations.
    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    /// Make every following offscreen allocation fail (or succeed again).
    pub fn set_fail_offscreen_allocation(&mut self, fail: bool) {
        self.fail_offscreen_allocation = fail;
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// All recorded framebuffer commands
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Drain the recorded commands
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Recorded draws as `(framebuffer, pipeline, state)`
    pub fn draws(
        &self,
    ) -> impl Iterator<Item = (FramebufferHandle, PipelineHandle, &DrawState)> + '_ {
        self.calls.iter().filter_map(|call| match call {
            BackendCall::Draw {
                framebuffer,
                pipeline,
                state,
                ..
            } => Some((*framebuffer, *pipeline, state)),
            _ => None,
        })
    }

    /// Recorded clears as `(framebuffer, flags, color)`
    pub fn clears(&self) -> impl Iterator<Item = (FramebufferHandle, ClearFlags, Vec4)> + '_ {
        self.calls.iter().filter_map(|call| match call {
            BackendCall::Clear {
                framebuffer,
                flags,
                color,
            } => Some((*framebuffer, *flags, *color)),
            _ => None,
        })
    }

    pub fn pipeline(&self, pipeline: PipelineHandle) -> Option<&PipelineRecord> {
        self.pipelines.get(&pipeline)
    }

    /// Last value set for a uniform
    pub fn uniform(&self, pipeline: PipelineHandle, name: &str) -> Option<UniformValue> {
        self.pipelines
            .get(&pipeline)
            .and_then(|record| record.uniforms.get(name).copied())
    }

    pub fn primitive(&self, primitive: PrimitiveHandle) -> Option<&PrimitiveRecord> {
        self.primitives.get(&primitive)
    }

    pub fn offscreen(&self, framebuffer: FramebufferHandle) -> Option<&Offscreen> {
        self.offscreens.get(&framebuffer)
    }

    /// Total pipelines created since construction
    pub fn pipelines_created(&self) -> usize {
        self.pipelines_created
    }

    /// Pipelines created and not yet released
    pub fn live_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    /// Total offscreens allocated since construction
    pub fn offscreens_created(&self) -> usize {
        self.offscreens_created
    }

    /// Offscreens allocated and not yet destroyed
    pub fn live_offscreens(&self) -> usize {
        self.offscreens.len()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "Headless Backend"
    }

    fn onscreen_framebuffer(&self) -> FramebufferHandle {
        self.onscreen
    }

    fn create_offscreen(&mut self, desc: &OffscreenDescriptor) -> BackendResult<Offscreen> {
        log::trace!(
            "HeadlessBackend: creating offscreen {:?} ({}x{})",
            desc.label,
            desc.width,
            desc.height
        );

        if self.fail_offscreen_allocation {
            return Err(BackendError::OutOfMemory);
        }
        if desc.width == 0
            || desc.height == 0
            || desc.width > self.max_texture_size
            || desc.height > self.max_texture_size
        {
            return Err(BackendError::OffscreenAllocationFailed(format!(
                "{}x{} exceeds limit {}",
                desc.width, desc.height, self.max_texture_size
            )));
        }

        if desc.color_format.is_some_and(|f| f.is_depth())
            || desc.depth_format.is_some_and(|f| !f.is_depth())
        {
            return Err(BackendError::OffscreenAllocationFailed(format!(
                "attachment formats {:?}/{:?} don't match their slots",
                desc.color_format, desc.depth_format
            )));
        }

        let framebuffer = FramebufferHandle(self.next_id());
        let color = desc
            .color_format
            .map(|_| TextureHandle(self.next_id()));
        let depth = desc
            .depth_format
            .map(|_| TextureHandle(self.next_id()));
        let offscreen = Offscreen {
            framebuffer,
            color,
            depth,
            width: desc.width,
            height: desc.height,
        };
        self.offscreens.insert(framebuffer, offscreen);
        self.offscreens_created += 1;
        Ok(offscreen)
    }

    fn destroy_offscreen(&mut self, offscreen: &Offscreen) {
        log::trace!("HeadlessBackend: destroying offscreen {:?}", offscreen.framebuffer);
        self.offscreens.remove(&offscreen.framebuffer);
    }

    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<PipelineHandle> {
        log::trace!(
            "HeadlessBackend: creating pipeline {:?} with snippets {:?}",
            desc.label,
            desc.snippet_names()
        );
        let handle = PipelineHandle(self.next_id());
        self.pipelines.insert(
            handle,
            PipelineRecord {
                descriptor: desc.clone(),
                uniforms: HashMap::new(),
            },
        );
        self.pipelines_created += 1;
        Ok(handle)
    }

    fn release_pipeline(&mut self, pipeline: PipelineHandle) {
        log::trace!("HeadlessBackend: releasing pipeline {:?}", pipeline);
        self.pipelines.remove(&pipeline);
    }

    fn set_uniform(&mut self, pipeline: PipelineHandle, name: &str, value: UniformValue) {
        match self.pipelines.get_mut(&pipeline) {
            Some(record) => {
                record.uniforms.insert(name.to_string(), value);
            }
            None => log::warn!(
                "HeadlessBackend: uniform {} set on unknown pipeline {:?}",
                name,
                pipeline
            ),
        }
    }

    fn create_primitive(
        &mut self,
        topology: PrimitiveTopology,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> BackendResult<PrimitiveHandle> {
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(BackendError::PrimitiveCreationFailed(format!(
                "index {} out of range for {} vertices",
                bad,
                vertices.len()
            )));
        }
        let handle = PrimitiveHandle(self.next_id());
        self.primitives.insert(
            handle,
            PrimitiveRecord {
                topology,
                vertex_count: vertices.len(),
                index_count: indices.len(),
            },
        );
        Ok(handle)
    }

    fn release_primitive(&mut self, primitive: PrimitiveHandle) {
        self.primitives.remove(&primitive);
    }

    fn set_viewport(&mut self, framebuffer: FramebufferHandle, viewport: Viewport) {
        self.calls.push(BackendCall::SetViewport {
            framebuffer,
            viewport,
        });
    }

    fn set_projection(&mut self, framebuffer: FramebufferHandle, projection: Mat4) {
        self.calls.push(BackendCall::SetProjection {
            framebuffer,
            projection,
        });
    }

    fn clear(&mut self, framebuffer: FramebufferHandle, flags: ClearFlags, color: Vec4) {
        log::trace!("HeadlessBackend: clear {:?} {:?}", framebuffer, flags);
        self.calls.push(BackendCall::Clear {
            framebuffer,
            flags,
            color,
        });
    }

    fn draw_primitive(
        &mut self,
        framebuffer: FramebufferHandle,
        pipeline: PipelineHandle,
        primitive: PrimitiveHandle,
        state: &DrawState,
    ) {
        self.calls.push(BackendCall::Draw {
            framebuffer,
            pipeline,
            primitive,
            state: *state,
        });
    }

    fn draw_textured_rectangle(
        &mut self,
        framebuffer: FramebufferHandle,
        texture: TextureHandle,
        rect: Viewport,
    ) {
        self.calls.push(BackendCall::DrawTexturedRectangle {
            framebuffer,
            texture,
            rect,
        });
    }

    fn end_frame(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()> {
        self.calls.push(BackendCall::EndFrame { framebuffer });
        self.frames_presented += 1;
        Ok(())
    }
}
