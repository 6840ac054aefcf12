//! Resource types
//!
//! Meshes, materials and texture assets consumed by scene components.

mod material;
mod mesh;
mod texture;

pub use material::*;
pub use mesh::*;
pub use texture::*;
