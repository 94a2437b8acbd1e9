//! Light contract.

use loam_arena::NativeArena;
use loam_core::{InteropError, Light, LightSourceType};

use crate::marshal::Marshal;
use crate::types::{AiLight, AiString};

impl Marshal for Light {
    type Native = AiLight;

    fn to_native(
        &self,
        _arena: &NativeArena,
        _this: *mut AiLight,
    ) -> Result<AiLight, InteropError> {
        Ok(AiLight {
            name: AiString::new(&self.name)?,
            light_type: self.light_type as u32,
            position: self.position.into(),
            direction: self.direction.into(),
            up: self.up.into(),
            attenuation_constant: self.attenuation_constant,
            attenuation_linear: self.attenuation_linear,
            attenuation_quadratic: self.attenuation_quadratic,
            color_diffuse: self.color_diffuse.into(),
            color_specular: self.color_specular.into(),
            color_ambient: self.color_ambient.into(),
            angle_inner_cone: self.angle_inner_cone,
            angle_outer_cone: self.angle_outer_cone,
            size: self.area_size.into(),
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiLight) -> Result<Self, InteropError> {
        Ok(Self {
            name: native.name.to_string_lossy()?,
            light_type: LightSourceType::from_raw(native.light_type),
            position: native.position.into(),
            direction: native.direction.into(),
            up: native.up.into(),
            attenuation_constant: native.attenuation_constant,
            attenuation_linear: native.attenuation_linear,
            attenuation_quadratic: native.attenuation_quadratic,
            color_diffuse: native.color_diffuse.into(),
            color_specular: native.color_specular.into(),
            color_ambient: native.color_ambient.into(),
            angle_inner_cone: native.angle_inner_cone,
            angle_outer_cone: native.angle_outer_cone,
            area_size: native.size.into(),
        })
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiLight, free_self: bool) {
        if free_self {
            arena.free_address(native);
        }
    }
}
