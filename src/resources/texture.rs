//! Texture assets referenced by materials

use crate::backend::TextureHandle;

/// A texture uploaded by the asset layer and referenced by materials
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureAsset {
    pub name: String,
    pub texture: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl TextureAsset {
    pub fn new(name: &str, texture: TextureHandle, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            texture,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
