//! Local transform of a scene node

use glam::{Mat4, Quat, Vec3};

/// Translation, rotation and scale of a node relative to its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn from_scale(scale: Vec3) -> Self {
        Self {
            scale,
            ..Self::IDENTITY
        }
    }

    /// `T * R * S`
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// True when the transform leaves points unchanged
    pub fn is_identity(&self) -> bool {
        self.position == Vec3::ZERO && self.rotation == Quat::IDENTITY && self.scale == Vec3::ONE
    }

    /// Get forward direction (local -Z in parent space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// Point -Z at `target`
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);

        self.rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert!(Transform::IDENTITY.is_identity());
        assert_eq!(Transform::default().matrix(), Mat4::IDENTITY);
        assert!(!Transform::from_position(Vec3::X).is_identity());
    }

    #[test]
    fn test_matrix_order_is_trs() {
        let t = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::splat(2.0),
        );
        let expected = Mat4::from_translation(t.position)
            * Mat4::from_quat(t.rotation)
            * Mat4::from_scale(t.scale);
        assert!(t.matrix().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_look_at_points_forward() {
        let mut t = Transform::from_position(Vec3::new(0.0, 0.0, 10.0));
        t.look_at(Vec3::ZERO, Vec3::Y);
        assert!(t.forward().abs_diff_eq(-Vec3::Z, 1e-5));
    }
}
