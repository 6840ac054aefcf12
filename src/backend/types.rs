//! Common types shared between the renderer and backends

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use std::hash::{Hash, Hasher};

use super::traits::TextureHandle;

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    Depth32Float,
    Depth24PlusStencil8,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }
}

bitflags! {
    /// Buffers touched by a framebuffer clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

bitflags! {
    /// Color channels a pipeline writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u32 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

impl Default for ColorWrites {
    fn default() -> Self {
        Self::ALL
    }
}

/// Offscreen framebuffer descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OffscreenDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Color attachment format, `None` for depth-only targets
    pub color_format: Option<TextureFormat>,
    /// Depth attachment format, `None` when depth is not captured
    pub depth_format: Option<TextureFormat>,
}

impl OffscreenDescriptor {
    pub fn new(label: &str, width: u32, height: u32) -> Self {
        Self {
            label: Some(label.to_string()),
            width,
            height,
            color_format: Some(TextureFormat::Rgba8Unorm),
            depth_format: None,
        }
    }

    pub fn with_depth(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }
}

/// Pixel rectangle a camera renders into
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0.0 {
            1.0
        } else {
            self.width / self.height
        }
    }
}

/// Compare function for depth testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Depth test state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub test_enabled: bool,
    pub write_enabled: bool,
    pub compare: CompareFunction,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test_enabled: false,
            write_enabled: true,
            compare: CompareFunction::Less,
        }
    }
}

impl DepthState {
    pub fn tested() -> Self {
        Self {
            test_enabled: true,
            ..Default::default()
        }
    }
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    SrcColor,
    OneMinusSrcColor,
}

/// Blend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
}

/// Blend component state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl Default for BlendComponent {
    fn default() -> Self {
        Self {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
            operation: BlendOperation::Add,
        }
    }
}

/// Blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    /// Source replaces destination: `RGBA = ADD(SRC, 0)`
    pub fn replace() -> Self {
        Self::default()
    }

    /// Blending for colors that are already premultiplied by alpha
    pub fn premultiplied_alpha() -> Self {
        let component = BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        };
        Self {
            color: component,
            alpha: component,
        }
    }
}

/// Shader stage a snippet hooks into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnippetHook {
    Vertex,
    Fragment,
    /// Replaces the lookup of one texture layer
    LayerFragment(u32),
}

/// A named piece of GLSL appended to a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Snippet {
    pub name: &'static str,
    pub hook: SnippetHook,
    pub declarations: &'static str,
    pub pre: &'static str,
    pub post: &'static str,
}

/// A texture bound to a pipeline layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureLayer {
    pub index: u32,
    pub texture: TextureHandle,
}

/// Everything the backend needs to build a pipeline object.
///
/// Descriptors with equal contents describe the same GPU program, which lets
/// a backend share compiled programs between pipeline objects.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    pub label: Option<String>,
    pub color: Vec4,
    pub depth: DepthState,
    pub blend: BlendState,
    pub color_writes: ColorWrites,
    pub layers: Vec<TextureLayer>,
    pub snippets: Vec<Snippet>,
}

impl Default for PipelineDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            color: Vec4::ONE,
            depth: DepthState::default(),
            blend: BlendState::default(),
            color_writes: ColorWrites::ALL,
            layers: Vec::new(),
            snippets: Vec::new(),
        }
    }
}

impl PipelineDescriptor {
    pub fn new(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn with_depth(mut self, depth: DepthState) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_color_writes(mut self, writes: ColorWrites) -> Self {
        self.color_writes = writes;
        self
    }

    pub fn add_layer(&mut self, index: u32, texture: TextureHandle) {
        self.layers.retain(|layer| layer.index != index);
        self.layers.push(TextureLayer { index, texture });
    }

    pub fn add_snippet(&mut self, snippet: Snippet) {
        self.snippets.push(snippet);
    }

    /// Names of the appended snippets, in order
    pub fn snippet_names(&self) -> Vec<&'static str> {
        self.snippets.iter().map(|s| s.name).collect()
    }
}

impl Eq for PipelineDescriptor {}

impl Hash for PipelineDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
        for c in self.color.to_array() {
            c.to_bits().hash(state);
        }
        self.depth.hash(state);
        self.blend.hash(state);
        self.color_writes.hash(state);
        self.layers.hash(state);
        self.snippets.hash(state);
    }
}

/// A uniform value set on a pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    LineList,
    TriangleList,
    TriangleStrip,
}

/// Standard vertex with position, normal, UV, and tangent
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec4,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
            tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
        }
    }
}

/// Rectangle clip pushed by a clip-region node, in the coordinate space of `modelview`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub modelview: Mat4,
}

/// Transform and clip state for a single draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawState {
    pub modelview: Mat4,
    pub projection: Mat4,
    pub viewport: Viewport,
    pub clip: Option<ClipRect>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(desc: &PipelineDescriptor) -> u64 {
        let mut hasher = DefaultHasher::new();
        desc.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_descriptor_hash_is_structural() {
        let a = PipelineDescriptor::new("p").with_depth(DepthState::tested());
        let b = PipelineDescriptor::new("p").with_depth(DepthState::tested());
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = a.clone().with_color(Vec4::new(0.5, 0.5, 0.5, 1.0));
        assert_ne!(hash_of(&a), hash_of(&c));
    }

    #[test]
    fn test_add_layer_replaces_index() {
        let mut desc = PipelineDescriptor::new("layers");
        desc.add_layer(0, TextureHandle(1));
        desc.add_layer(0, TextureHandle(2));
        assert_eq!(desc.layers.len(), 1);
        assert_eq!(desc.layers[0].texture, TextureHandle(2));
    }

    #[test]
    fn test_color_writes_all() {
        assert!(ColorWrites::ALL.contains(ColorWrites::ALPHA));
        assert_eq!(ColorWrites::default(), ColorWrites::ALL);
    }
}
