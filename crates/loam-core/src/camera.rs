//! Cameras.

use crate::math::{Matrix4x4, Vector3D};

/// A camera, described in the local space of the node with the same name.
///
/// All fields default to zero, which the native library reads as "not
/// specified" (an aspect ratio of zero means "derive from the viewport").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Camera {
    /// Name of the node this camera is attached to.
    pub name: String,
    /// Position relative to the owning node.
    pub position: Vector3D,
    /// Up vector relative to the owning node.
    pub up: Vector3D,
    /// Viewing direction relative to the owning node.
    pub direction: Vector3D,
    /// Half horizontal field of view, in radians.
    pub field_of_view: f32,
    /// Distance to the near clipping plane.
    pub clip_plane_near: f32,
    /// Distance to the far clipping plane.
    pub clip_plane_far: f32,
    /// Width over height of the viewport.
    pub aspect_ratio: f32,
}

impl Camera {
    /// A named camera with all other fields at their defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Right-handed view matrix built from position, direction, and up.
    ///
    /// Row-major with the translation in the last column (`m[0..3][3]`,
    /// natively `a4`, `b4`, `c4`), the layout `aiCamera::GetCameraMatrix`
    /// produces. Transpose it for APIs that keep translation in the last
    /// row.
    ///
    /// Degenerate inputs (zero direction or up parallel to direction)
    /// produce a matrix with zero rows rather than NaNs.
    pub fn view_matrix(&self) -> Matrix4x4 {
        let forward = self.direction.normalized();
        let right = self.up.cross(forward).normalized();
        let up = forward.cross(right);
        Matrix4x4::from_rows([
            [right.x, right.y, right.z, -right.dot(self.position)],
            [up.x, up.y, up.z, -up.dot(self.position)],
            [forward.x, forward.y, forward.z, -forward.dot(self.position)],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_is_all_zero() {
        let cam = Camera::default();
        assert_eq!(cam.position, Vector3D::ZERO);
        assert_eq!(cam.field_of_view, 0.0);
        assert_eq!(cam.aspect_ratio, 0.0);
        assert!(cam.name.is_empty());
    }

    #[test]
    fn view_matrix_translates_by_negated_position() {
        let cam = Camera {
            position: Vector3D::new(0.0, 0.0, 5.0),
            up: Vector3D::new(0.0, 1.0, 0.0),
            direction: Vector3D::new(0.0, 0.0, 1.0),
            ..Camera::new("main")
        };
        let view = cam.view_matrix();
        assert_eq!(view.get(2, 3), -5.0);
        assert_eq!(view.get(3, 3), 1.0);
        // The bottom row carries no translation.
        assert_eq!(view.rows()[3], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(view.transposed().get(3, 2), -5.0);
    }
}
