//! Light component

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Directional light shining along the owning entity's -Z axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(0.6, 0.6, 0.6, 1.0),
            specular: Vec4::new(0.4, 0.4, 0.4, 1.0),
        }
    }
}

impl Light {
    pub fn new() -> Self {
        Self::default()
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

    /// Unit vector pointing towards the light, in the eye space of `view`
    pub fn direction_to_light(light_world: Mat4, view: Mat4) -> Vec3 {
        let world = light_world.transform_vector3(Vec3::Z);
        view.transform_vector3(world).normalize_or_zero()
    }

    /// Build uniform data for shaders
    pub fn uniform_data(&self, light_world: Mat4, view: Mat4) -> LightUniformData {
        LightUniformData {
            ambient: self.ambient,
            diffuse: self.diffuse,
            specular: self.specular,
            direction: Self::direction_to_light(light_world, view).extend(0.0),
        }
    }
}

/// Light uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightUniformData {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub direction: Vec4, // xyz=direction to light, w unused
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_direction_follows_rotation() {
        let world = Mat4::from_quat(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        let dir = Light::direction_to_light(world, Mat4::IDENTITY);
        assert!(dir.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_direction_ignores_translation_and_scale() {
        let world = Mat4::from_scale_rotation_translation(
            Vec3::splat(100.0),
            Quat::IDENTITY,
            Vec3::new(5.0, 6.0, 7.0),
        );
        let data = Light::default().uniform_data(world, Mat4::IDENTITY);
        assert!(data.direction.truncate().abs_diff_eq(Vec3::Z, 1e-5));
    }
}
