//! Per-draw uniform math

use glam::{Mat3, Mat4, Vec3};

use crate::backend::{GraphicsBackend, PipelineHandle, UniformValue};
use crate::resources::Material;
use crate::scene::{try_inverse, Light};

/// Maps clip space -1..1 to texture space 0..1 on x, y and z
pub fn bias_matrix() -> Mat4 {
    Mat4::from_translation(Vec3::splat(0.5)) * Mat4::from_scale(Vec3::splat(0.5))
}

/// Model space to shadow map texture space:
/// `bias * light_projection * light_view * model`.
///
/// `light_world` is the light entity's world transform; its inverse is the
/// light view. A singular light transform gives `None`.
pub fn light_shadow_matrix(light_projection: Mat4, light_world: Mat4, model: Mat4) -> Option<Mat4> {
    let light_view = try_inverse(&light_world)?;
    Some(bias_matrix() * light_projection * light_view * model)
}

/// Inverse-transpose of the upper-left 3x3 of the model-view
pub fn normal_matrix(modelview: Mat4) -> Mat3 {
    let linear = Mat3::from_mat4(modelview);
    if linear.determinant().abs() < f32::EPSILON {
        return Mat3::IDENTITY;
    }
    linear.inverse().transpose()
}

/// Light parameters in the eye space of the pass camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightUniforms {
    pub light: Light,
    pub direction: Vec3,
    /// Light projection and world transform, when a shadow map is in use
    pub shadow: Option<(Mat4, Mat4)>,
}

/// Uniforms set on every color draw, cache hit or not
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerDrawUniforms {
    pub normal_matrix: Mat3,
    pub light_shadow_matrix: Option<Mat4>,
}

impl PerDrawUniforms {
    /// `model` is the entity's world transform, `modelview` includes the view
    pub fn new(model: Mat4, modelview: Mat4, light: Option<&LightUniforms>, receive_shadow: bool) -> Self {
        let light_shadow_matrix = light
            .and_then(|l| l.shadow)
            .filter(|_| receive_shadow)
            .and_then(|(projection, world)| light_shadow_matrix(projection, world, model));
        Self {
            normal_matrix: normal_matrix(modelview),
            light_shadow_matrix,
        }
    }

    pub fn apply(&self, backend: &mut dyn GraphicsBackend, pipeline: PipelineHandle) {
        backend.set_uniform(pipeline, "normal_matrix", UniformValue::Mat3(self.normal_matrix));
        if let Some(matrix) = self.light_shadow_matrix {
            backend.set_uniform(pipeline, "light_shadow_matrix", UniformValue::Mat4(matrix));
        }
    }
}

pub fn apply_light(backend: &mut dyn GraphicsBackend, pipeline: PipelineHandle, light: &LightUniforms) {
    backend.set_uniform(pipeline, "light0_ambient", UniformValue::Vec4(light.light.ambient));
    backend.set_uniform(pipeline, "light0_diffuse", UniformValue::Vec4(light.light.diffuse));
    backend.set_uniform(pipeline, "light0_specular", UniformValue::Vec4(light.light.specular));
    backend.set_uniform(
        pipeline,
        "light0_direction_norm",
        UniformValue::Vec3(light.direction),
    );
}

pub fn apply_material(backend: &mut dyn GraphicsBackend, pipeline: PipelineHandle, material: &Material) {
    backend.set_uniform(pipeline, "material_ambient", UniformValue::Vec4(material.ambient));
    backend.set_uniform(pipeline, "material_diffuse", UniformValue::Vec4(material.diffuse));
    backend.set_uniform(pipeline, "material_specular", UniformValue::Vec4(material.specular));
    backend.set_uniform(
        pipeline,
        "material_shininess",
        UniformValue::Float(material.shininess),
    );
    backend.set_uniform(
        pipeline,
        "material_alpha_threshold",
        UniformValue::Float(material.alpha_mask_threshold),
    );
}

/// Focal parameters of the depth-of-field templates.
///
/// The camera looks down -Z, so a focal distance in front of it is passed
/// negated.
pub fn apply_focal_parameters(
    backend: &mut dyn GraphicsBackend,
    pipeline: PipelineHandle,
    focal_distance: f32,
    depth_of_field: f32,
) {
    backend.set_uniform(pipeline, "dof_focal_distance", UniformValue::Float(-focal_distance));
    backend.set_uniform(
        pipeline,
        "dof_depth_of_field",
        UniformValue::Float(depth_of_field),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, PipelineDescriptor};
    use glam::{Quat, Vec4};

    #[test]
    fn test_bias_maps_clip_cube_to_unit_cube() {
        let bias = bias_matrix();
        assert!(bias
            .transform_point3(Vec3::splat(-1.0))
            .abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(bias
            .transform_point3(Vec3::splat(1.0))
            .abs_diff_eq(Vec3::ONE, 1e-6));
        assert!(bias
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::splat(0.5), 1e-6));
    }

    #[test]
    fn test_light_shadow_matrix_composition() {
        let projection = Mat4::orthographic_rh_gl(-10.0, 10.0, -10.0, 10.0, 1.0, 50.0);
        let light_world = Mat4::from_translation(Vec3::new(0.0, 0.0, 20.0));
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

        let matrix = light_shadow_matrix(projection, light_world, model).unwrap();
        let expected = bias_matrix() * projection * light_world.inverse() * model;
        assert!(matrix.abs_diff_eq(expected, 1e-5));

        // The origin of the model lands inside the shadow map
        let p = matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(p.x > 0.0 && p.x < 1.0 && p.y > 0.0 && p.y < 1.0);
    }

    #[test]
    fn test_singular_light_transform() {
        let light_world = Mat4::from_scale(Vec3::ZERO);
        assert!(light_shadow_matrix(Mat4::IDENTITY, light_world, Mat4::IDENTITY).is_none());
    }

    #[test]
    fn test_normal_matrix_ignores_translation() {
        let modelview = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 2.0, 2.0),
            Quat::from_rotation_z(0.3),
            Vec3::new(9.0, 9.0, 9.0),
        );
        let n = normal_matrix(modelview);
        let expected = Mat3::from_mat4(modelview).inverse().transpose();
        assert!(n.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        let modelview = Mat4::from_scale(Vec3::new(1.0, 4.0, 1.0));
        let n = normal_matrix(modelview);
        // normals are scaled by the inverse of the geometry scale
        assert!((n * Vec3::Y).abs_diff_eq(Vec3::new(0.0, 0.25, 0.0), 1e-6));
    }

    #[test]
    fn test_per_draw_shadow_matrix_only_for_receivers() {
        let light = LightUniforms {
            light: Light::default(),
            direction: Vec3::Z,
            shadow: Some((Mat4::IDENTITY, Mat4::IDENTITY)),
        };
        let receiver = PerDrawUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, Some(&light), true);
        assert!(receiver.light_shadow_matrix.is_some());
        let other = PerDrawUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, Some(&light), false);
        assert!(other.light_shadow_matrix.is_none());
        let unlit = PerDrawUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, None, true);
        assert!(unlit.light_shadow_matrix.is_none());
    }

    #[test]
    fn test_focal_distance_is_negated() {
        let mut backend = HeadlessBackend::new();
        let pipeline = backend
            .create_pipeline(&PipelineDescriptor::new("dof"))
            .unwrap();
        apply_focal_parameters(&mut backend, pipeline, 30.0, 3.0);
        assert_eq!(
            backend.uniform(pipeline, "dof_focal_distance"),
            Some(UniformValue::Float(-30.0))
        );
        assert_eq!(
            backend.uniform(pipeline, "dof_depth_of_field"),
            Some(UniformValue::Float(3.0))
        );
    }
}
