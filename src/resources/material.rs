//! Material component for Phong-lit entities

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use super::TextureAsset;

/// Surface response and texture assets of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub shininess: f32,
    /// Fragments whose alpha-mask value is below this are discarded
    pub alpha_mask_threshold: f32,

    pub color_source: Option<TextureAsset>,
    pub normal_map: Option<TextureAsset>,
    pub alpha_mask: Option<TextureAsset>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            ambient: Vec4::new(0.23, 0.23, 0.23, 1.0),
            diffuse: Vec4::new(0.75, 0.75, 0.75, 1.0),
            specular: Vec4::new(0.64, 0.64, 0.64, 1.0),
            shininess: 100.0,
            alpha_mask_threshold: 0.5,
            color_source: None,
            normal_map: None,
            alpha_mask: None,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_ambient(mut self, ambient: Vec4) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_diffuse(mut self, diffuse: Vec4) -> Self {
        self.diffuse = diffuse;
        self
    }

    pub fn with_specular(mut self, specular: Vec4) -> Self {
        self.specular = specular;
        self
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    pub fn with_color_source(mut self, asset: TextureAsset) -> Self {
        self.color_source = Some(asset);
        self
    }

    pub fn with_normal_map(mut self, asset: TextureAsset) -> Self {
        self.normal_map = Some(asset);
        self
    }

    pub fn with_alpha_mask(mut self, asset: TextureAsset, threshold: f32) -> Self {
        self.alpha_mask = Some(asset);
        self.alpha_mask_threshold = threshold;
        self
    }

    pub fn has_normal_map(&self) -> bool {
        self.normal_map.is_some()
    }

    /// Create a uniform data struct for GPU
    pub fn uniform_data(&self) -> MaterialUniformData {
        MaterialUniformData {
            ambient: self.ambient,
            diffuse: self.diffuse,
            specular: self.specular,
            shininess_threshold: [self.shininess, self.alpha_mask_threshold, 0.0, 0.0],
        }
    }
}

/// Material uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniformData {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub shininess_threshold: [f32; 4], // x=shininess, y=alpha threshold, zw=padding
}
