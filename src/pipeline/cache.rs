//! Pipeline cache
//!
//! Color pipelines are cached on the entity, one per color pass slot, and
//! tagged with the entity's content generation so edits to geometry or
//! material make them stale. Depth-only passes share three templates owned by
//! the cache: the default one, a diamond variant and a shape variant with an
//! alpha cutoff.

use glam::Vec4;

use super::snippets::*;
use super::{uniforms, PipelineSlot, RenderPass};
use crate::backend::{
    BlendState, ColorWrites, DepthState, GraphicsBackend, PipelineDescriptor, PipelineHandle,
    TextureHandle,
};
use crate::error::RigResult;
use crate::scene::{Entity, Geometry};

/// Base color of color pipelines before lighting
pub const BASE_COLOR: Vec4 = Vec4::new(0.8, 0.8, 0.8, 1.0);

/// Focal parameters the depth-of-field templates are created with
pub const DEFAULT_FOCAL_DISTANCE: f32 = 30.0;
pub const DEFAULT_DEPTH_OF_FIELD: f32 = 3.0;

/// Counters since the cache was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineCacheStats {
    /// Pipelines created on the backend, templates included
    pub built: usize,
    /// Requests answered from a cached pipeline
    pub hits: usize,
}

/// Builds and caches pipelines per entity and pass
#[derive(Debug, Default)]
pub struct PipelineCache {
    dof_default: Option<PipelineHandle>,
    dof_diamond: Option<PipelineHandle>,
    dof_shape: Option<PipelineHandle>,
    diamond_texture: Option<TextureHandle>,
    /// Per-draw copies of the shape template, released at the next frame
    transient: Vec<PipelineHandle>,
    stats: PipelineCacheStats,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texture whose alpha cuts diamonds into their round silhouette
    pub fn with_diamond_texture(mut self, texture: TextureHandle) -> Self {
        self.diamond_texture = Some(texture);
        self
    }

    pub fn stats(&self) -> PipelineCacheStats {
        self.stats
    }

    /// Fetch the pipeline `entity` is drawn with in `pass`, building it if
    /// needed.
    ///
    /// `shadow_map` is the texture of the current shadow map; color pipelines
    /// of shadow receivers sample it when present.
    pub fn get_or_build(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        entity: &mut Entity,
        pass: RenderPass,
        shadow_map: Option<TextureHandle>,
    ) -> RigResult<PipelineHandle> {
        match pass.slot() {
            Some(slot) => self.color_pipeline(backend, entity, slot, shadow_map),
            None => self.silhouette_pipeline(backend, entity),
        }
    }

    /// Force `entity`'s pipeline for `pass` to be rebuilt on the next paint.
    ///
    /// Depth-only passes draw with shared templates, there is nothing
    /// per-entity to drop.
    pub fn invalidate(&mut self, entity: &mut Entity, pass: RenderPass) {
        match pass.slot() {
            Some(slot) => entity.invalidate_pipeline(slot),
            None => log::trace!("{} pipelines are shared, nothing to invalidate", pass.name()),
        }
    }

    /// Release per-draw pipeline copies of the previous frame
    pub fn begin_frame(&mut self, backend: &mut dyn GraphicsBackend) {
        for pipeline in self.transient.drain(..) {
            backend.release_pipeline(pipeline);
        }
    }

    /// Release every pipeline the cache owns
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.begin_frame(backend);
        let templates = [
            self.dof_default.take(),
            self.dof_diamond.take(),
            self.dof_shape.take(),
        ];
        for pipeline in templates.into_iter().flatten() {
            backend.release_pipeline(pipeline);
        }
    }

    fn color_pipeline(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        entity: &mut Entity,
        slot: PipelineSlot,
        shadow_map: Option<TextureHandle>,
    ) -> RigResult<PipelineHandle> {
        if let Some(pipeline) = entity.cached_pipeline(slot) {
            self.stats.hits += 1;
            return Ok(pipeline);
        }

        let desc = color_descriptor(entity, slot, shadow_map);
        log::trace!("building {:?} pipeline: {:?}", slot, desc.snippet_names());
        let pipeline = backend.create_pipeline(&desc)?;
        self.stats.built += 1;
        entity.store_pipeline(slot, pipeline);
        Ok(pipeline)
    }

    fn silhouette_pipeline(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        entity: &Entity,
    ) -> RigResult<PipelineHandle> {
        self.ensure_templates(backend)?;

        match entity.geometry() {
            Some(Geometry::Diamond(_)) => self.template(self.dof_diamond),
            Some(Geometry::Shape(_)) => {
                let textures = entity.material().map(|m| (&m.color_source, &m.alpha_mask));
                match textures {
                    Some((color, mask)) if color.is_some() || mask.is_some() => {
                        let mut desc = shape_descriptor();
                        if let Some(color) = color {
                            desc.add_layer(COLOR_LAYER, color.texture);
                        }
                        if let Some(mask) = mask {
                            desc.add_layer(ALPHA_MASK_LAYER, mask.texture);
                            desc.add_snippet(ALPHA_MASK);
                        }
                        let pipeline = backend.create_pipeline(&desc)?;
                        self.stats.built += 1;
                        if let Some(material) = entity.material() {
                            uniforms::apply_material(backend, pipeline, material);
                        }
                        uniforms::apply_focal_parameters(
                            backend,
                            pipeline,
                            DEFAULT_FOCAL_DISTANCE,
                            DEFAULT_DEPTH_OF_FIELD,
                        );
                        self.transient.push(pipeline);
                        Ok(pipeline)
                    }
                    _ => self.template(self.dof_shape),
                }
            }
            _ => self.template(self.dof_default),
        }
    }

    fn template(&mut self, pipeline: Option<PipelineHandle>) -> RigResult<PipelineHandle> {
        self.stats.hits += 1;
        pipeline.ok_or_else(|| {
            crate::backend::BackendError::InvalidHandle("missing depth template".into()).into()
        })
    }

    fn ensure_templates(&mut self, backend: &mut dyn GraphicsBackend) -> RigResult<()> {
        if self.dof_default.is_none() {
            let mut desc = silhouette_template("dof");
            desc.add_snippet(DOF_ALPHA);
            self.dof_default = Some(self.build_template(backend, &desc)?);
        }
        if self.dof_diamond.is_none() {
            let mut desc = silhouette_template("dof-diamond");
            if let Some(texture) = self.diamond_texture {
                desc.add_layer(COLOR_LAYER, texture);
            }
            desc.add_snippet(DIAMOND_MASK);
            self.dof_diamond = Some(self.build_template(backend, &desc)?);
        }
        if self.dof_shape.is_none() {
            self.dof_shape = Some(self.build_template(backend, &shape_descriptor())?);
        }
        Ok(())
    }

    fn build_template(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        desc: &PipelineDescriptor,
    ) -> RigResult<PipelineHandle> {
        log::trace!("building depth template {:?}", desc.label);
        let pipeline = backend.create_pipeline(desc)?;
        uniforms::apply_focal_parameters(
            backend,
            pipeline,
            DEFAULT_FOCAL_DISTANCE,
            DEFAULT_DEPTH_OF_FIELD,
        );
        self.stats.built += 1;
        Ok(pipeline)
    }
}

/// Alpha-only, depth tested, writing the blur factor
fn silhouette_template(label: &str) -> PipelineDescriptor {
    let mut desc = PipelineDescriptor::new(label)
        .with_color_writes(ColorWrites::ALPHA)
        .with_blend(BlendState::replace())
        .with_depth(DepthState::tested());
    desc.add_snippet(DOF_BLUR);
    desc
}

fn shape_descriptor() -> PipelineDescriptor {
    let mut desc = silhouette_template("dof-shape");
    desc.add_snippet(ALPHA_CUTOFF_MASK);
    desc
}

/// Descriptor of an entity's color pipeline.
///
/// Snippet order only depends on the material, its normal map and whether
/// shadows are received.
pub fn color_descriptor(
    entity: &Entity,
    slot: PipelineSlot,
    shadow_map: Option<TextureHandle>,
) -> PipelineDescriptor {
    let blended = slot == PipelineSlot::ColorBlended;
    let material = entity.material();
    let normal_mapped = material.is_some_and(|m| m.has_normal_map());
    let shadow_map = shadow_map.filter(|_| entity.receive_shadow());

    let mut depth = DepthState::tested();
    depth.write_enabled = !blended;
    let blend = if blended {
        BlendState::premultiplied_alpha()
    } else {
        BlendState::replace()
    };
    let label = if blended { "color-blended" } else { "color-unblended" };
    let mut desc = PipelineDescriptor::new(label)
        .with_color(BASE_COLOR)
        .with_depth(depth)
        .with_blend(blend);

    if let Some(material) = material {
        if let Some(asset) = &material.color_source {
            desc.add_layer(COLOR_LAYER, asset.texture);
        }
        if let Some(asset) = &material.alpha_mask {
            desc.add_layer(ALPHA_MASK_LAYER, asset.texture);
        }
        if let Some(asset) = &material.normal_map {
            desc.add_layer(NORMAL_MAP_LAYER, asset.texture);
        }
    }

    desc.add_snippet(LIGHTING_VERTEX);
    if normal_mapped {
        desc.add_snippet(NORMAL_MAP_VERTEX);
    }
    if shadow_map.is_some() {
        desc.add_snippet(SHADOW_MAPPING_VERTEX);
    }

    desc.add_snippet(if blended {
        BLENDED_DISCARD
    } else {
        UNBLENDED_DISCARD
    });
    desc.add_snippet(UNPREMULTIPLY);

    match material {
        Some(material) => {
            if material.alpha_mask.is_some() {
                desc.add_snippet(ALPHA_MASK);
            }
            desc.add_snippet(if normal_mapped {
                NORMAL_MAP_FRAGMENT
            } else {
                MATERIAL_LIGHTING
            });
        }
        None => desc.add_snippet(SIMPLE_LIGHTING),
    }

    if let Some(texture) = shadow_map {
        desc.add_layer(SHADOW_MAP_LAYER, texture);
        desc.add_snippet(SHADOW_MAPPING_FRAGMENT);
    }

    desc.add_snippet(PREMULTIPLY);
    desc
}
