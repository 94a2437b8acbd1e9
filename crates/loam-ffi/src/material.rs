//! Material contract.
//!
//! A native material is a flat list of keyed byte payloads. The managed
//! side keeps the payload bytes verbatim, so any property type survives a
//! round trip even if this crate has no typed accessor for it.

use loam_arena::NativeArena;
use loam_core::{InteropError, Material, MaterialProperty, PropertyType, TextureType};

use crate::marshal::{
    alloc_pointer_array, alloc_values, free_pointer_array, native_count, read_pointer_array,
    read_values, Marshal,
};
use crate::types::{AiMaterial, AiMaterialProperty, AiString};

impl Marshal for MaterialProperty {
    type Native = AiMaterialProperty;

    fn to_native(
        &self,
        arena: &NativeArena,
        _this: *mut AiMaterialProperty,
    ) -> Result<AiMaterialProperty, InteropError> {
        Ok(AiMaterialProperty {
            key: AiString::new(&self.name)?,
            semantic: self.texture_type as u32,
            index: self.texture_index,
            data_length: native_count(self.data.len(), "material property data")?,
            property_type: self.property_type.to_raw(),
            data: alloc_values(arena, &self.data)?.cast(),
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiMaterialProperty) -> Result<Self, InteropError> {
        let name = native.key.to_string_lossy()?;
        let property_type = PropertyType::from_raw(native.property_type).ok_or_else(|| {
            InteropError::marshal(format!(
                "material property {name:?}: unknown type {}",
                native.property_type
            ))
        })?;
        // SAFETY: `data` is valid for `data_length` bytes per the contract.
        let data: Vec<u8> = unsafe {
            read_values(
                native.data.cast::<u8>(),
                native.data_length as usize,
                "material property data",
            )?
        };
        Ok(Self {
            name,
            property_type,
            texture_type: TextureType::from_raw(native.semantic),
            texture_index: native.index,
            data,
        })
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiMaterialProperty, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let property = unsafe { &*native };
        arena.free_address(property.data);
        if free_self {
            arena.free_address(native);
        }
    }
}

impl Marshal for Material {
    type Native = AiMaterial;

    fn to_native(
        &self,
        arena: &NativeArena,
        _this: *mut AiMaterial,
    ) -> Result<AiMaterial, InteropError> {
        let properties: Vec<MaterialProperty> = self.properties().cloned().collect();
        let count = native_count(properties.len(), "material properties")?;
        Ok(AiMaterial {
            properties: alloc_pointer_array(arena, &properties)?,
            num_properties: count,
            num_allocated: count,
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiMaterial) -> Result<Self, InteropError> {
        // SAFETY: `properties` is valid for `num_properties` per the contract.
        let properties: Vec<MaterialProperty> = unsafe {
            read_pointer_array::<MaterialProperty>(
                native.properties,
                native.num_properties as usize,
                "material properties",
            )?
        };
        let mut material = Material::new();
        for property in properties {
            material.add_property(property);
        }
        Ok(material)
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiMaterial, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let material = unsafe { *native };
        // SAFETY: valid for `num_properties` per the contract.
        unsafe {
            free_pointer_array::<MaterialProperty>(
                arena,
                material.properties,
                material.num_properties as usize,
            );
        }
        if free_self {
            arena.free_address(native);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::alloc_boxed;
    use loam_core::Color4D;
    use std::ptr;

    #[test]
    #[allow(unsafe_code)]
    fn material_round_trip_keeps_order_and_payloads() {
        let arena = NativeArena::with_defaults();
        let mut material = Material::named("brick");
        material.set_color_diffuse(Color4D::new(0.8, 0.2, 0.1, 1.0));
        material.set_shininess(12.5);
        material.set_texture_file(TextureType::Diffuse, 0, "brick.png");
        material.add_property(MaterialProperty {
            name: "$raw.blob".into(),
            property_type: PropertyType::Buffer,
            texture_type: TextureType::None,
            texture_index: 0,
            data: vec![1, 2, 3, 4, 5],
        });

        let ptr = alloc_boxed(&arena, &material).unwrap();
        // SAFETY: `ptr` was just written by `alloc_boxed`.
        let back = unsafe { Material::from_native(&*ptr) }.unwrap();
        assert_eq!(back, material);
        assert_eq!(back.name(), "brick");
        assert_eq!(
            back.texture_file(TextureType::Diffuse, 0).as_deref(),
            Some("brick.png")
        );

        // SAFETY: as above.
        unsafe { Material::free_native(&arena, ptr, true) };
        assert_eq!(arena.live_allocations(), 0);
    }

    #[test]
    #[allow(unsafe_code)]
    fn unknown_property_type_is_marshal_failure() {
        let arena = NativeArena::with_defaults();
        let mut native = MaterialProperty::from_floats("$mat.opacity", &[0.5])
            .to_native(&arena, ptr::null_mut())
            .unwrap();
        native.property_type = 42;
        // SAFETY: `native` was just built.
        let err = unsafe { MaterialProperty::from_native(&native) }.unwrap_err();
        assert!(matches!(err, InteropError::MarshalFailure { .. }));
    }

    #[test]
    fn empty_material_has_non_null_property_array() {
        let arena = NativeArena::with_defaults();
        let native = Material::new().to_native(&arena, ptr::null_mut()).unwrap();
        assert!(!native.properties.is_null());
        assert_eq!(native.num_properties, 0);
        assert_eq!(native.num_allocated, 0);
    }
}
