//! Camera component

use glam::{Mat4, Vec3, Vec4};

use crate::backend::{FramebufferHandle, GraphicsBackend, Viewport};
use crate::error::{RigError, RigResult};
use crate::picking::Ray;

/// Smallest |determinant| for which a matrix is treated as invertible
pub const SINGULAR_EPSILON: f32 = 1e-12;

/// Inverse of `matrix`, or `None` if it is singular or not finite
pub fn try_inverse(matrix: &Mat4) -> Option<Mat4> {
    if !matrix.is_finite() {
        return None;
    }
    let det = matrix.determinant();
    if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
        return None;
    }
    let inverse = matrix.inverse();
    inverse.is_finite().then_some(inverse)
}

/// Vertical flip pre-multiplied into the view for the shadow pass.
///
/// Offscreen textures are addressed with y pointing the other way from the
/// screen, so shadow lookups only line up when the shadow map is rendered
/// flipped.
pub fn shadow_flip() -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
}

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Projection::Orthographic {
            left: -half_w,
            right: half_w,
            bottom: -half_h,
            top: half_h,
            near,
            far,
        }
    }

    /// OpenGL-style projection matrix (clip depth -1..1)
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh_gl(fov_y, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh_gl(left, right, bottom, top, near, far),
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } => *near,
            Projection::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } => *far,
            Projection::Orthographic { far, .. } => *far,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = self {
            *a = aspect;
        }
    }
}

/// Projection, view and target surface used to render or pick a scene
#[derive(Debug, Clone)]
pub struct Camera {
    projection: Projection,
    projection_matrix: Mat4,
    inverse_projection: Option<Mat4>,
    viewport: Viewport,
    base_view: Mat4,
    view: Mat4,
    framebuffer: Option<FramebufferHandle>,

    pub background: Vec4,
    pub clear: bool,
    pub dof_enabled: bool,
    pub focal_distance: f32,
    pub depth_of_field: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Projection::default())
    }
}

impl Camera {
    pub fn new(projection: Projection) -> Self {
        let projection_matrix = projection.matrix();
        Self {
            projection,
            projection_matrix,
            inverse_projection: try_inverse(&projection_matrix),
            viewport: Viewport::new(0.0, 0.0, 1280.0, 720.0),
            base_view: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            framebuffer: None,
            background: Vec4::new(0.9, 0.9, 0.9, 1.0),
            clear: true,
            dof_enabled: false,
            focal_distance: 30.0,
            depth_of_field: 3.0,
        }
    }

    pub fn with_viewport(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.set_viewport(x, y, width, height);
        self
    }

    pub fn with_background(mut self, color: Vec4) -> Self {
        self.background = color;
        self
    }

    pub fn with_base_view(mut self, base_view: Mat4) -> Self {
        self.base_view = base_view;
        self
    }

    pub fn with_depth_of_field(mut self, focal_distance: f32, depth_of_field: f32) -> Self {
        self.dof_enabled = true;
        self.focal_distance = focal_distance;
        self.depth_of_field = depth_of_field;
        self
    }

    /// Replace the projection and recompute its matrix and inverse
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.projection_matrix = projection.matrix();
        self.inverse_projection = try_inverse(&self.projection_matrix);
        if self.inverse_projection.is_none() {
            log::warn!("camera projection {:?} is not invertible", projection);
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    /// Exact inverse of the current projection matrix
    pub fn inverse_projection(&self) -> RigResult<Mat4> {
        self.inverse_projection.ok_or(RigError::DegenerateProjection)
    }

    pub fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.viewport = Viewport::new(x, y, width, height);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_view_transform(&mut self, view: Mat4) {
        self.view = view;
    }

    pub fn view_transform(&self) -> Mat4 {
        self.view
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view
    }

    /// Derive the view from the owning entity's world transform.
    ///
    /// The shadow pass drops the base view and pre-multiplies
    /// [`shadow_flip`]. A singular world transform leaves the view unchanged.
    pub fn update_view(&mut self, world: Mat4, shadow_pass: bool) {
        let Some(inverse) = try_inverse(&world) else {
            log::warn!("camera transform is not invertible, keeping previous view");
            return;
        };
        self.view = if shadow_pass {
            shadow_flip() * inverse
        } else {
            self.base_view * inverse
        };
    }

    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    pub fn set_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffer = Some(framebuffer);
    }

    /// Resolve the target, falling back to the backend's onscreen framebuffer
    pub fn target(&self, backend: &dyn GraphicsBackend) -> FramebufferHandle {
        self.framebuffer
            .unwrap_or_else(|| backend.onscreen_framebuffer())
    }

    /// Begin-frame bracket: load viewport and projection into the target
    pub fn flush(&self, backend: &mut dyn GraphicsBackend, framebuffer: FramebufferHandle) {
        backend.set_viewport(framebuffer, self.viewport);
        backend.set_projection(framebuffer, self.projection_matrix);
    }

    /// Eye space to world space
    fn camera_transform(&self) -> RigResult<Mat4> {
        try_inverse(&self.view).ok_or(RigError::DegenerateProjection)
    }

    /// Corners of the view frustum in world space.
    ///
    /// Near plane first, each plane counter clockwise from bottom-left.
    pub fn frustum_corners(&self) -> RigResult<[Vec3; 8]> {
        let to_world = self.camera_transform()? * self.inverse_projection()?;
        let mut corners = [Vec3::ZERO; 8];
        let ndc = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        for (plane, z) in [-1.0f32, 1.0].into_iter().enumerate() {
            for (i, (x, y)) in ndc.iter().enumerate() {
                corners[plane * 4 + i] = to_world.project_point3(Vec3::new(*x, *y, z));
            }
        }
        Ok(corners)
    }

    /// World-space point under a window coordinate at clip depth `ndc_z`
    /// (0 is the middle of the -1..1 range, 1 the far plane).
    ///
    /// `screen_x`/`screen_y` are window pixels with y growing downwards; the
    /// viewport origin is subtracted first.
    pub fn unproject(&self, screen_x: f32, screen_y: f32, ndc_z: f32) -> RigResult<Vec3> {
        let to_world = self.camera_transform()? * self.inverse_projection()?;

        let width = self.viewport.width;
        let height = self.viewport.height;
        if width <= 0.0 || height <= 0.0 {
            return Err(RigError::DegenerateProjection);
        }
        let x = screen_x - self.viewport.x;
        let y = screen_y - self.viewport.y;
        let ndc_x = x * 2.0 / width - 1.0;
        let ndc_y = (height - 1.0 - y) * 2.0 / height - 1.0;

        let point = to_world * Vec4::new(ndc_x, ndc_y, ndc_z, 1.0);
        let point = point.truncate() / point.w;
        if !point.is_finite() {
            return Err(RigError::DegenerateProjection);
        }
        Ok(point)
    }

    /// World-space ray through a window coordinate
    pub fn create_pick_ray(&self, screen_x: f32, screen_y: f32) -> RigResult<Ray> {
        let near = self.unproject(screen_x, screen_y, 0.0)?;
        let far = self.unproject(screen_x, screen_y, 1.0)?;

        let direction = (far - near).normalize_or_zero();
        if direction == Vec3::ZERO {
            return Err(RigError::DegenerateProjection);
        }
        Ok(Ray::new(near, direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_is_involution() {
        let flip = shadow_flip();
        let point = Vec3::new(3.0, -7.5, 2.25);
        let twice = flip.transform_point3(flip.transform_point3(point));
        assert!(twice.abs_diff_eq(point, 1e-6));
        assert!((flip * flip).abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_unproject_centre_lies_on_view_axis() {
        let camera = Camera::new(Projection::perspective(60.0, 1.0, 1.0, 100.0))
            .with_viewport(10.0, 10.0, 101.0, 101.0);
        let far = camera.unproject(60.5, 59.5, 1.0).unwrap();
        assert!(far.x.abs() < 1e-3 && far.y.abs() < 1e-3);
        assert!((far.z + 100.0).abs() < 0.1);

        let flat = Camera::new(Projection::perspective(60.0, 1.0, 1.0, 100.0))
            .with_viewport(0.0, 0.0, 0.0, 10.0);
        assert!(matches!(
            flat.unproject(0.0, 0.0, 0.0),
            Err(RigError::DegenerateProjection)
        ));
    }

    #[test]
    fn test_inverse_projection_is_exact() {
        let camera = Camera::new(Projection::perspective(60.0, 1.5, 0.5, 100.0));
        let inverse = camera.inverse_projection().unwrap();
        assert!((camera.projection_matrix() * inverse).abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn test_degenerate_projection() {
        let mut camera = Camera::new(Projection::perspective(0.0, 1.0, 0.1, 10.0));
        assert!(matches!(
            camera.inverse_projection(),
            Err(RigError::DegenerateProjection)
        ));
        assert!(camera.create_pick_ray(10.0, 10.0).is_err());

        camera.set_projection(Projection::perspective(45.0, 1.0, 0.1, 10.0));
        assert!(camera.inverse_projection().is_ok());
    }

    #[test]
    fn test_zero_volume_ortho_is_degenerate() {
        let camera = Camera::new(Projection::orthographic(0.0, 10.0, 0.1, 10.0));
        assert!(camera.inverse_projection().is_err());
    }

    #[test]
    fn test_update_view_shadow_pass_flips() {
        let world = Mat4::from_translation(Vec3::new(0.0, 2.0, 10.0));
        let mut camera = Camera::default();
        camera.update_view(world, false);
        let normal_view = camera.view_transform();
        camera.update_view(world, true);
        assert!(camera
            .view_transform()
            .abs_diff_eq(shadow_flip() * normal_view, 1e-6));
    }

    #[test]
    fn test_pick_ray_through_centre() {
        let mut camera = Camera::new(Projection::perspective(45.0, 1.0, 1.0, 100.0))
            .with_viewport(0.0, 0.0, 100.0, 100.0);
        camera.update_view(Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0)), false);

        // y is flipped around h - 1, so the centre row is 49
        let ray = camera.create_pick_ray(50.0, 49.0).unwrap();
        assert!(ray.direction.abs_diff_eq(-Vec3::Z, 1e-4));
        assert!((ray.origin.x).abs() < 1e-4 && (ray.origin.y).abs() < 1e-4);
    }

    #[test]
    fn test_pick_ray_respects_viewport_offset() {
        let camera = Camera::new(Projection::perspective(45.0, 1.0, 1.0, 100.0))
            .with_viewport(100.0, 200.0, 100.0, 100.0);
        let offset = camera.create_pick_ray(150.0, 249.0).unwrap();
        assert!(offset.direction.abs_diff_eq(-Vec3::Z, 1e-4));
    }

    #[test]
    fn test_frustum_corners_ortho() {
        let camera = Camera::new(Projection::orthographic(4.0, 2.0, 1.0, 5.0));
        let corners = camera.frustum_corners().unwrap();
        assert!(corners[0].abs_diff_eq(Vec3::new(-2.0, -1.0, -1.0), 1e-4));
        assert!(corners[6].abs_diff_eq(Vec3::new(2.0, 1.0, -5.0), 1e-4));
    }
}
