//! Light sources.

use crate::math::{Color3D, Vector2D, Vector3D};

/// Kind of light source. Values match `aiLightSourceType`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LightSourceType {
    /// Unspecified.
    #[default]
    Undefined = 0,
    /// Infinitely distant light with a direction only.
    Directional = 1,
    /// Omnidirectional point light.
    Point = 2,
    /// Cone-shaped spot light.
    Spot = 3,
    /// Ambient light with no position or direction.
    Ambient = 4,
    /// Area light with a size.
    Area = 5,
}

impl LightSourceType {
    /// Parse a native value. Unknown values map to `Undefined`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Directional,
            2 => Self::Point,
            3 => Self::Spot,
            4 => Self::Ambient,
            5 => Self::Area,
            _ => Self::Undefined,
        }
    }
}

/// A light source, described in the local space of the node with the same
/// name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Light {
    /// Name of the node this light is attached to.
    pub name: String,
    /// Light kind.
    pub light_type: LightSourceType,
    /// Position relative to the owning node.
    pub position: Vector3D,
    /// Direction relative to the owning node.
    pub direction: Vector3D,
    /// Up vector relative to the owning node.
    pub up: Vector3D,
    /// Constant attenuation factor.
    pub attenuation_constant: f32,
    /// Linear attenuation factor.
    pub attenuation_linear: f32,
    /// Quadratic attenuation factor.
    pub attenuation_quadratic: f32,
    /// Diffuse colour.
    pub color_diffuse: Color3D,
    /// Specular colour.
    pub color_specular: Color3D,
    /// Ambient colour.
    pub color_ambient: Color3D,
    /// Inner cone angle of a spot light, in radians.
    pub angle_inner_cone: f32,
    /// Outer cone angle of a spot light, in radians.
    pub angle_outer_cone: f32,
    /// Extent of an area light.
    pub area_size: Vector2D,
}

impl Light {
    /// A named light of the given kind with all other fields zero.
    pub fn new(name: impl Into<String>, light_type: LightSourceType) -> Self {
        Self {
            name: name.into(),
            light_type,
            ..Self::default()
        }
    }

    /// Attenuation at `distance`: `1 / (c + l*d + q*d^2)`, or 1.0 when all
    /// factors are zero.
    pub fn attenuation_at(&self, distance: f32) -> f32 {
        let denom = self.attenuation_constant
            + self.attenuation_linear * distance
            + self.attenuation_quadratic * distance * distance;
        if denom == 0.0 {
            1.0
        } else {
            1.0 / denom
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_round_trip() {
        for t in [
            LightSourceType::Undefined,
            LightSourceType::Directional,
            LightSourceType::Point,
            LightSourceType::Spot,
            LightSourceType::Ambient,
            LightSourceType::Area,
        ] {
            assert_eq!(LightSourceType::from_raw(t as u32), t);
        }
        assert_eq!(LightSourceType::from_raw(99), LightSourceType::Undefined);
    }

    #[test]
    fn attenuation() {
        let mut light = Light::new("lamp", LightSourceType::Point);
        assert_eq!(light.attenuation_at(10.0), 1.0);
        light.attenuation_constant = 1.0;
        light.attenuation_linear = 0.5;
        assert_eq!(light.attenuation_at(2.0), 0.5);
    }
}
