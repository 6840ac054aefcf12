//! Per-pass pipeline construction and caching
//!
//! A frame is drawn in up to three kinds of pass:
//! 1. Shadow - depth of shadow casters from the light's point of view
//! 2. DoF depth - per-fragment blur factor for depth of field
//! 3. Color - lit, optionally shadowed, unblended then blended geometry
//!
//! Color pipelines depend on an entity's material and flags and are cached on
//! the entity. Shadow and DoF pipelines only need the silhouette and are
//! shared between all entities.

mod cache;
pub mod snippets;
pub mod uniforms;

pub use cache::{PipelineCache, PipelineCacheStats};

/// Render pass tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPass {
    Shadow,
    DofDepth,
    ColorUnblended,
    ColorBlended,
}

impl RenderPass {
    /// Entity cache slot of this pass, `None` for passes using shared templates
    pub fn slot(self) -> Option<PipelineSlot> {
        match self {
            RenderPass::Shadow | RenderPass::DofDepth => None,
            RenderPass::ColorUnblended => Some(PipelineSlot::ColorUnblended),
            RenderPass::ColorBlended => Some(PipelineSlot::ColorBlended),
        }
    }

    pub fn is_color(self) -> bool {
        self.slot().is_some()
    }

    /// Passes that only render entities casting shadows
    pub fn is_depth_only(self) -> bool {
        !self.is_color()
    }

    pub fn name(self) -> &'static str {
        match self {
            RenderPass::Shadow => "shadow",
            RenderPass::DofDepth => "dof-depth",
            RenderPass::ColorUnblended => "color-unblended",
            RenderPass::ColorBlended => "color-blended",
        }
    }
}

/// Per-entity pipeline cache slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineSlot {
    ColorUnblended,
    ColorBlended,
}

impl PipelineSlot {
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        match self {
            PipelineSlot::ColorUnblended => 0,
            PipelineSlot::ColorBlended => 1,
        }
    }
}
