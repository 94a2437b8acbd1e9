//! Embedded texture contract.

use loam_arena::NativeArena;
use loam_core::{EmbeddedTexture, InteropError, Texel};

use crate::marshal::{alloc_blittable, alloc_values, read_values, Marshal};
use crate::types::{AiTexel, AiTexture};

fn encode_hint(hint: &str) -> Result<[u8; 4], InteropError> {
    if hint.len() > 3 || !hint.is_ascii() || hint.contains('\0') {
        return Err(InteropError::marshal(format!(
            "texture format hint {hint:?} must be at most 3 ASCII characters"
        )));
    }
    let mut out = [0u8; 4];
    out[..hint.len()].copy_from_slice(hint.as_bytes());
    Ok(out)
}

fn decode_hint(raw: &[u8; 4]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl Marshal for EmbeddedTexture {
    type Native = AiTexture;

    fn to_native(
        &self,
        arena: &NativeArena,
        _this: *mut AiTexture,
    ) -> Result<AiTexture, InteropError> {
        match self {
            EmbeddedTexture::Compressed { format_hint, data } => {
                let width = u32::try_from(data.len())
                    .map_err(|_| InteropError::marshal("compressed texture exceeds u32 bytes"))?;
                Ok(AiTexture {
                    width,
                    height: 0,
                    format_hint: encode_hint(format_hint)?,
                    data: alloc_values(arena, data)?.cast(),
                })
            }
            EmbeddedTexture::Uncompressed {
                width,
                height,
                texels,
            } => {
                if !self.is_consistent() {
                    return Err(InteropError::marshal(format!(
                        "texture is {width}x{height} but holds {} texels",
                        texels.len()
                    )));
                }
                Ok(AiTexture {
                    width: *width,
                    height: *height,
                    format_hint: [0; 4],
                    data: alloc_blittable::<Texel, AiTexel>(arena, texels)?,
                })
            }
        }
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiTexture) -> Result<Self, InteropError> {
        if native.height == 0 {
            // SAFETY: a compressed texture holds `width` bytes.
            let data: Vec<u8> = unsafe {
                read_values(native.data.cast::<u8>(), native.width as usize, "texture bytes")?
            };
            return Ok(EmbeddedTexture::Compressed {
                format_hint: decode_hint(&native.format_hint),
                data,
            });
        }
        let count = (native.width as usize)
            .checked_mul(native.height as usize)
            .ok_or_else(|| InteropError::marshal("texture dimensions overflow"))?;
        // SAFETY: an uncompressed texture holds `width * height` texels.
        let texels = unsafe { read_values(native.data, count, "texture texels")? };
        Ok(EmbeddedTexture::Uncompressed {
            width: native.width,
            height: native.height,
            texels,
        })
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiTexture, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let texture = unsafe { &*native };
        arena.free_address(texture.data);
        if free_self {
            arena.free_address(native);
        }
    }
}
