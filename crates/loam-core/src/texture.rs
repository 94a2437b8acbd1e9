//! Embedded textures.

/// One texel of an uncompressed texture, stored BGRA like the native layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Texel {
    /// Blue.
    pub b: u8,
    /// Green.
    pub g: u8,
    /// Red.
    pub r: u8,
    /// Alpha.
    pub a: u8,
}

impl Texel {
    /// Create a texel from RGBA components.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }
}

/// A texture stored inside the scene rather than referenced by path.
///
/// Natively a height of zero marks a compressed texture whose width is the
/// byte length of the encoded file; that encoding is resolved into the two
/// variants here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbeddedTexture {
    /// An encoded image file (PNG, JPEG, ...).
    Compressed {
        /// File extension hint, at most three ASCII characters (e.g. `png`).
        format_hint: String,
        /// Encoded file bytes.
        data: Vec<u8>,
    },
    /// Raw texels in row-major order.
    Uncompressed {
        /// Width in texels.
        width: u32,
        /// Height in texels.
        height: u32,
        /// `width * height` texels.
        texels: Vec<Texel>,
    },
}

impl EmbeddedTexture {
    /// Whether this is an encoded image file.
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed { .. })
    }

    /// Number of bytes in the payload.
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Compressed { data, .. } => data.len(),
            Self::Uncompressed { texels, .. } => texels.len() * 4,
        }
    }

    /// Whether the declared dimensions match the payload.
    pub fn is_consistent(&self) -> bool {
        match self {
            Self::Compressed { format_hint, .. } => format_hint.len() <= 3 && format_hint.is_ascii(),
            Self::Uncompressed {
                width,
                height,
                texels,
            } => (*width as usize) * (*height as usize) == texels.len() && *height > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency() {
        let ok = EmbeddedTexture::Uncompressed {
            width: 2,
            height: 1,
            texels: vec![Texel::rgba(255, 0, 0, 255); 2],
        };
        assert!(ok.is_consistent());
        assert_eq!(ok.byte_len(), 8);

        let bad = EmbeddedTexture::Uncompressed {
            width: 2,
            height: 2,
            texels: vec![Texel::default(); 3],
        };
        assert!(!bad.is_consistent());

        let long_hint = EmbeddedTexture::Compressed {
            format_hint: "jpeg".into(),
            data: vec![1, 2, 3],
        };
        assert!(!long_hint.is_consistent());
        assert!(long_hint.is_compressed());
    }
}
