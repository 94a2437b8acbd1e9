//! Camera contract.

use loam_arena::NativeArena;
use loam_core::{Camera, InteropError};

use crate::marshal::Marshal;
use crate::types::{AiCamera, AiString};

impl Marshal for Camera {
    type Native = AiCamera;

    fn to_native(
        &self,
        _arena: &NativeArena,
        _this: *mut AiCamera,
    ) -> Result<AiCamera, InteropError> {
        Ok(AiCamera {
            name: AiString::new(&self.name)?,
            position: self.position.into(),
            up: self.up.into(),
            look_at: self.direction.into(),
            horizontal_fov: self.field_of_view,
            clip_plane_near: self.clip_plane_near,
            clip_plane_far: self.clip_plane_far,
            aspect: self.aspect_ratio,
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiCamera) -> Result<Self, InteropError> {
        Ok(Self {
            name: native.name.to_string_lossy()?,
            position: native.position.into(),
            up: native.up.into(),
            direction: native.look_at.into(),
            field_of_view: native.horizontal_fov,
            clip_plane_near: native.clip_plane_near,
            clip_plane_far: native.clip_plane_far,
            aspect_ratio: native.aspect,
        })
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiCamera, free_self: bool) {
        if free_self {
            arena.free_address(native);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::Vector3D;
    use std::ptr;

    #[test]
    #[allow(unsafe_code)]
    fn camera_round_trip() {
        let arena = NativeArena::with_defaults();
        let cam = Camera {
            name: "MyCamera".into(),
            position: Vector3D::new(1.0, 2.0, 3.0),
            up: Vector3D::new(0.0, 1.0, 0.0),
            direction: Vector3D::new(0.0, 0.0, -1.0),
            field_of_view: 0.78,
            clip_plane_near: 0.1,
            clip_plane_far: 1000.0,
            aspect_ratio: 16.0 / 9.0,
        };
        let native = cam.to_native(&arena, ptr::null_mut()).unwrap();
        // SAFETY: `native` was built above and holds no pointers.
        let back = unsafe { Camera::from_native(&native) }.unwrap();
        assert_eq!(back, cam);
        assert_eq!(arena.live_allocations(), 0);
    }

    #[test]
    fn default_camera_marshals_to_zeroes() {
        let arena = NativeArena::with_defaults();
        let native = Camera::default()
            .to_native(&arena, ptr::null_mut())
            .unwrap();
        assert_eq!(native.name.length, 0);
        assert_eq!(native.aspect, 0.0);
        assert_eq!(native.look_at.z, 0.0);
    }
}
