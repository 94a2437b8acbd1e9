//! Materials as ordered property lists.
//!
//! The native library stores a material as a flat list of typed byte
//! buffers keyed by `(name, texture semantic, texture index)`. The managed
//! [`Material`] keeps exactly that shape so marshaling is lossless, and adds
//! typed accessors for the common keys on top.

use indexmap::IndexMap;

/// Key of the material name property.
pub const KEY_NAME: &str = "?mat.name";
/// Key of the diffuse colour property.
pub const KEY_COLOR_DIFFUSE: &str = "$clr.diffuse";
/// Key of the ambient colour property.
pub const KEY_COLOR_AMBIENT: &str = "$clr.ambient";
/// Key of the specular colour property.
pub const KEY_COLOR_SPECULAR: &str = "$clr.specular";
/// Key of the emissive colour property.
pub const KEY_COLOR_EMISSIVE: &str = "$clr.emissive";
/// Key of the shininess exponent property.
pub const KEY_SHININESS: &str = "$mat.shininess";
/// Key of the opacity property.
pub const KEY_OPACITY: &str = "$mat.opacity";
/// Key of texture file path properties.
pub const KEY_TEXTURE_FILE: &str = "$tex.file";

/// Storage type of a property's bytes. Values match `aiPropertyTypeInfo`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// Array of `f32`.
    Float,
    /// Array of `f64`.
    Double,
    /// Length-prefixed, NUL-terminated string.
    String,
    /// Array of `i32`.
    Integer,
    /// Opaque bytes.
    Buffer,
}

impl PropertyType {
    /// Native discriminant.
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Float => 0x1,
            Self::Double => 0x2,
            Self::String => 0x3,
            Self::Integer => 0x4,
            Self::Buffer => 0x5,
        }
    }

    /// Parse a native discriminant.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0x1 => Some(Self::Float),
            0x2 => Some(Self::Double),
            0x3 => Some(Self::String),
            0x4 => Some(Self::Integer),
            0x5 => Some(Self::Buffer),
            _ => None,
        }
    }
}

/// Texture semantic of a property. Values match `aiTextureType`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TextureType {
    /// Not a texture property.
    #[default]
    None = 0,
    /// Diffuse map.
    Diffuse = 1,
    /// Specular map.
    Specular = 2,
    /// Ambient map.
    Ambient = 3,
    /// Emissive map.
    Emissive = 4,
    /// Height map.
    Height = 5,
    /// Normal map.
    Normals = 6,
    /// Shininess map.
    Shininess = 7,
    /// Opacity map.
    Opacity = 8,
    /// Displacement map.
    Displacement = 9,
    /// Lightmap / ambient occlusion.
    Lightmap = 10,
    /// Reflection map.
    Reflection = 11,
    /// Unknown semantic.
    Unknown = 12,
}

impl TextureType {
    /// Parse a native value; anything out of range maps to `Unknown`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Diffuse,
            2 => Self::Specular,
            3 => Self::Ambient,
            4 => Self::Emissive,
            5 => Self::Height,
            6 => Self::Normals,
            7 => Self::Shininess,
            8 => Self::Opacity,
            9 => Self::Displacement,
            10 => Self::Lightmap,
            11 => Self::Reflection,
            _ => Self::Unknown,
        }
    }
}

/// One typed material property.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialProperty {
    /// Property key, e.g. `$clr.diffuse`.
    pub name: String,
    /// How `data` is encoded.
    pub property_type: PropertyType,
    /// Texture semantic (`None` for non-texture properties).
    pub texture_type: TextureType,
    /// Texture slot index (0 for non-texture properties).
    pub texture_index: u32,
    /// Raw property bytes in native encoding.
    pub data: Vec<u8>,
}

impl MaterialProperty {
    /// A property holding an array of floats.
    pub fn from_floats(name: impl Into<String>, values: &[f32]) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Float,
            texture_type: TextureType::None,
            texture_index: 0,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// A property holding an array of integers.
    pub fn from_integers(name: impl Into<String>, values: &[i32]) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Integer,
            texture_type: TextureType::None,
            texture_index: 0,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// A property holding a string, in the native `u32 length + bytes + NUL`
    /// encoding.
    pub fn from_string(name: impl Into<String>, value: &str) -> Self {
        let mut data = Vec::with_capacity(value.len() + 5);
        data.extend_from_slice(&(value.len() as u32).to_le_bytes());
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        Self {
            name: name.into(),
            property_type: PropertyType::String,
            texture_type: TextureType::None,
            texture_index: 0,
            data,
        }
    }

    /// Builder: attach a texture semantic and slot.
    pub fn with_texture(mut self, texture_type: TextureType, texture_index: u32) -> Self {
        self.texture_type = texture_type;
        self.texture_index = texture_index;
        self
    }

    /// Fully qualified key: `name,semantic,index`.
    pub fn fully_qualified_name(&self) -> String {
        fully_qualified_name(&self.name, self.texture_type, self.texture_index)
    }

    /// Decode as floats. Returns `None` for non-float properties.
    pub fn as_floats(&self) -> Option<Vec<f32>> {
        if self.property_type != PropertyType::Float {
            return None;
        }
        Some(
            self.data
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    /// Decode as integers. Returns `None` for non-integer properties.
    pub fn as_integers(&self) -> Option<Vec<i32>> {
        if self.property_type != PropertyType::Integer {
            return None;
        }
        Some(
            self.data
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }

    /// Decode as a string. Returns `None` for non-string or truncated data.
    pub fn as_string(&self) -> Option<String> {
        if self.property_type != PropertyType::String || self.data.len() < 4 {
            return None;
        }
        let len = u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
            as usize;
        let bytes = self.data.get(4..4 + len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn fully_qualified_name(name: &str, texture_type: TextureType, texture_index: u32) -> String {
    format!("{name},{},{texture_index}", texture_type as u32)
}

/// A material: an ordered set of properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    properties: IndexMap<String, MaterialProperty>,
}

impl Material {
    /// An empty material.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty material with a name property.
    pub fn named(name: &str) -> Self {
        let mut material = Self::new();
        material.set_name(name);
        material
    }

    /// Insert or replace a property. Returns the replaced property, if any.
    pub fn add_property(&mut self, property: MaterialProperty) -> Option<MaterialProperty> {
        self.properties
            .insert(property.fully_qualified_name(), property)
    }

    /// Remove a property by key, semantic, and index.
    pub fn remove_property(
        &mut self,
        name: &str,
        texture_type: TextureType,
        texture_index: u32,
    ) -> Option<MaterialProperty> {
        self.properties
            .shift_remove(&fully_qualified_name(name, texture_type, texture_index))
    }

    /// Look up a property by key, semantic, and index.
    pub fn property(
        &self,
        name: &str,
        texture_type: TextureType,
        texture_index: u32,
    ) -> Option<&MaterialProperty> {
        self.properties
            .get(&fully_qualified_name(name, texture_type, texture_index))
    }

    /// Properties in insertion order.
    pub fn properties(&self) -> impl Iterator<Item = &MaterialProperty> {
        self.properties.values()
    }

    /// Number of properties.
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Material name, or an empty string when unnamed.
    pub fn name(&self) -> String {
        self.property(KEY_NAME, TextureType::None, 0)
            .and_then(MaterialProperty::as_string)
            .unwrap_or_default()
    }

    /// Set the material name.
    pub fn set_name(&mut self, name: &str) {
        self.add_property(MaterialProperty::from_string(KEY_NAME, name));
    }

    /// Diffuse colour as RGBA, if present.
    pub fn color_diffuse(&self) -> Option<crate::Color4D> {
        self.color(KEY_COLOR_DIFFUSE)
    }

    /// Set the diffuse colour.
    pub fn set_color_diffuse(&mut self, color: crate::Color4D) {
        self.set_color(KEY_COLOR_DIFFUSE, color);
    }

    /// Ambient colour as RGBA, if present.
    pub fn color_ambient(&self) -> Option<crate::Color4D> {
        self.color(KEY_COLOR_AMBIENT)
    }

    /// Set the ambient colour.
    pub fn set_color_ambient(&mut self, color: crate::Color4D) {
        self.set_color(KEY_COLOR_AMBIENT, color);
    }

    /// Specular colour as RGBA, if present.
    pub fn color_specular(&self) -> Option<crate::Color4D> {
        self.color(KEY_COLOR_SPECULAR)
    }

    /// Set the specular colour.
    pub fn set_color_specular(&mut self, color: crate::Color4D) {
        self.set_color(KEY_COLOR_SPECULAR, color);
    }

    /// Emissive colour as RGBA, if present.
    pub fn color_emissive(&self) -> Option<crate::Color4D> {
        self.color(KEY_COLOR_EMISSIVE)
    }

    /// Set the emissive colour.
    pub fn set_color_emissive(&mut self, color: crate::Color4D) {
        self.set_color(KEY_COLOR_EMISSIVE, color);
    }

    /// Shininess exponent, if present.
    pub fn shininess(&self) -> Option<f32> {
        self.scalar(KEY_SHININESS)
    }

    /// Set the shininess exponent.
    pub fn set_shininess(&mut self, value: f32) {
        self.add_property(MaterialProperty::from_floats(KEY_SHININESS, &[value]));
    }

    /// Opacity, if present.
    pub fn opacity(&self) -> Option<f32> {
        self.scalar(KEY_OPACITY)
    }

    /// Set the opacity.
    pub fn set_opacity(&mut self, value: f32) {
        self.add_property(MaterialProperty::from_floats(KEY_OPACITY, &[value]));
    }

    /// Texture file path for a semantic and slot, if present.
    pub fn texture_file(&self, texture_type: TextureType, index: u32) -> Option<String> {
        self.property(KEY_TEXTURE_FILE, texture_type, index)
            .and_then(MaterialProperty::as_string)
    }

    /// Set a texture file path for a semantic and slot.
    pub fn set_texture_file(&mut self, texture_type: TextureType, index: u32, path: &str) {
        self.add_property(
            MaterialProperty::from_string(KEY_TEXTURE_FILE, path).with_texture(texture_type, index),
        );
    }

    fn color(&self, key: &str) -> Option<crate::Color4D> {
        let values = self.property(key, TextureType::None, 0)?.as_floats()?;
        match values.as_slice() {
            [r, g, b, a, ..] => Some(crate::Color4D::new(*r, *g, *b, *a)),
            [r, g, b] => Some(crate::Color4D::new(*r, *g, *b, 1.0)),
            _ => None,
        }
    }

    fn set_color(&mut self, key: &str, c: crate::Color4D) {
        self.add_property(MaterialProperty::from_floats(key, &[c.r, c.g, c.b, c.a]));
    }

    fn scalar(&self, key: &str) -> Option<f32> {
        self.property(key, TextureType::None, 0)?
            .as_floats()?
            .first()
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color4D;

    #[test]
    fn name_round_trips_through_string_encoding() {
        let mat = Material::named("MyMaterial");
        assert_eq!(mat.name(), "MyMaterial");
        let prop = mat.property(KEY_NAME, TextureType::None, 0).unwrap();
        assert_eq!(prop.data.len(), 4 + "MyMaterial".len() + 1);
        assert_eq!(*prop.data.last().unwrap(), 0);
    }

    #[test]
    fn unnamed_material_has_empty_name() {
        assert_eq!(Material::new().name(), "");
    }

    #[test]
    fn replacing_a_property_keeps_one_entry() {
        let mut mat = Material::new();
        mat.set_shininess(10.0);
        mat.set_shininess(20.0);
        assert_eq!(mat.property_count(), 1);
        assert_eq!(mat.shininess(), Some(20.0));
    }

    #[test]
    fn colors_and_textures() {
        let mut mat = Material::new();
        mat.set_color_diffuse(Color4D::new(0.5, 0.25, 1.0, 1.0));
        mat.set_texture_file(TextureType::Diffuse, 0, "albedo.png");
        assert_eq!(mat.color_diffuse(), Some(Color4D::new(0.5, 0.25, 1.0, 1.0)));
        assert_eq!(
            mat.texture_file(TextureType::Diffuse, 0).as_deref(),
            Some("albedo.png")
        );
        assert!(mat.texture_file(TextureType::Normals, 0).is_none());
    }

    #[test]
    fn typed_accessors_reject_other_types() {
        let prop = MaterialProperty::from_integers("$mat.twosided", &[1]);
        assert_eq!(prop.as_integers(), Some(vec![1]));
        assert!(prop.as_floats().is_none());
        assert!(prop.as_string().is_none());
    }

    #[test]
    fn property_type_raw_values_round_trip() {
        for t in [
            PropertyType::Float,
            PropertyType::Double,
            PropertyType::String,
            PropertyType::Integer,
            PropertyType::Buffer,
        ] {
            assert_eq!(PropertyType::from_raw(t.to_raw()), Some(t));
        }
        assert_eq!(PropertyType::from_raw(42), None);
    }
}
