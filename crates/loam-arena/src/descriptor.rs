//! Struct layout descriptors: `TypeId` → [`StructLayout`].
//!
//! Every native struct the marshaling layer reads or writes implements
//! [`NativeLayout`], declaring the size the native library compiles it to
//! and its field offsets. [`describe`] checks the declaration against the
//! Rust layout once per type and caches the result for the life of the
//! process; a mismatch is a configuration error that must stop the first
//! import or export, not corrupt it.

use std::any::TypeId;
use std::mem::{align_of, size_of};
use std::sync::{Mutex, OnceLock, PoisonError};

use indexmap::IndexMap;

use crate::error::ArenaError;

/// One field of a native struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    /// Field name as the native header spells it.
    pub name: &'static str,
    /// Byte offset from the start of the struct.
    pub offset: usize,
    /// Size of the field in bytes.
    pub size: usize,
}

impl FieldLayout {
    /// Create a field descriptor.
    pub const fn new(name: &'static str, offset: usize, size: usize) -> Self {
        Self { name, offset, size }
    }

    /// One past the last byte of the field.
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Size of the field that `project` borrows. Used by [`field_layout!`].
pub fn field_size<T, F>(_project: impl Fn(&T) -> &F) -> usize {
    size_of::<F>()
}

/// Build a [`FieldLayout`] for `$ty.$field` from `offset_of!` and the
/// field's type.
#[macro_export]
macro_rules! field_layout {
    ($ty:ty, $field:ident) => {
        $crate::descriptor::FieldLayout::new(
            stringify!($field),
            ::std::mem::offset_of!($ty, $field),
            $crate::descriptor::field_size(|v: &$ty| &v.$field),
        )
    };
}

/// A `#[repr(C)]` struct shared with the native library.
pub trait NativeLayout: Copy + 'static {
    /// Native type name, e.g. `aiMesh`.
    const NAME: &'static str;
    /// Size the native library compiles this struct to, in bytes.
    const NATIVE_SIZE: usize;
    /// Whether the struct can be copied as plain bytes (no pointers, no
    /// padding, no strings).
    const BLITTABLE: bool;

    /// Field list in declaration order.
    fn fields() -> Vec<FieldLayout>;
}

/// Validated layout of a native struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructLayout {
    /// Native type name.
    pub name: &'static str,
    /// Total size in bytes.
    pub size: usize,
    /// Alignment in bytes.
    pub align: usize,
    /// Whether the struct is copied as plain bytes.
    pub blittable: bool,
    /// Fields in declaration order.
    pub fields: Vec<FieldLayout>,
}

impl StructLayout {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Compare against the size a loaded native library reports.
    pub fn verify_native_size(&self, reported: usize) -> Result<(), ArenaError> {
        if reported != self.size {
            return Err(ArenaError::InvalidLayout {
                type_name: self.name.into(),
                expected: reported,
                actual: self.size,
            });
        }
        Ok(())
    }

    fn build<T: NativeLayout>() -> Result<Self, ArenaError> {
        let size = size_of::<T>();
        if size != T::NATIVE_SIZE {
            return Err(ArenaError::InvalidLayout {
                type_name: T::NAME.into(),
                expected: T::NATIVE_SIZE,
                actual: size,
            });
        }

        let fields = T::fields();
        if let Some(last) = fields.iter().map(FieldLayout::end).max() {
            if last > size {
                return Err(ArenaError::InvalidLayout {
                    type_name: T::NAME.into(),
                    expected: size,
                    actual: last,
                });
            }
        }

        if T::BLITTABLE {
            let packed: usize = fields.iter().map(|f| f.size).sum();
            if packed != size {
                return Err(ArenaError::InvalidLayout {
                    type_name: T::NAME.into(),
                    expected: size,
                    actual: packed,
                });
            }
        }

        Ok(Self {
            name: T::NAME,
            size,
            align: align_of::<T>(),
            blittable: T::BLITTABLE,
            fields,
        })
    }
}

type LayoutCache = Mutex<IndexMap<TypeId, &'static StructLayout>>;

fn cache() -> &'static LayoutCache {
    static CACHE: OnceLock<LayoutCache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(IndexMap::new()))
}

/// Validated, cached layout of `T`.
///
/// The first call per type checks the declaration; later calls return the
/// cached descriptor. Failures are not cached, so a misdeclared type fails
/// on every use.
pub fn describe<T: NativeLayout>() -> Result<&'static StructLayout, ArenaError> {
    let id = TypeId::of::<T>();
    let mut cache = cache().lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(layout) = cache.get(&id) {
        return Ok(layout);
    }
    let layout: &'static StructLayout = Box::leak(Box::new(StructLayout::build::<T>()?));
    cache.insert(id, layout);
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    #[repr(C)]
    struct Packed {
        x: f32,
        y: f32,
        z: f32,
    }

    impl NativeLayout for Packed {
        const NAME: &'static str = "packed";
        const NATIVE_SIZE: usize = 12;
        const BLITTABLE: bool = true;

        fn fields() -> Vec<FieldLayout> {
            vec![
                field_layout!(Packed, x),
                field_layout!(Packed, y),
                field_layout!(Packed, z),
            ]
        }
    }

    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    #[repr(C)]
    struct Padded {
        time: f64,
        value: [f32; 3],
    }

    impl NativeLayout for Padded {
        const NAME: &'static str = "padded";
        const NATIVE_SIZE: usize = 24;
        const BLITTABLE: bool = true;

        fn fields() -> Vec<FieldLayout> {
            vec![field_layout!(Padded, time), field_layout!(Padded, value)]
        }
    }

    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    #[repr(C)]
    struct WrongSize {
        a: u32,
    }

    impl NativeLayout for WrongSize {
        const NAME: &'static str = "wrong";
        const NATIVE_SIZE: usize = 8;
        const BLITTABLE: bool = true;

        fn fields() -> Vec<FieldLayout> {
            vec![field_layout!(WrongSize, a)]
        }
    }

    #[test]
    fn packed_struct_is_described_and_cached() {
        let a = describe::<Packed>().unwrap();
        let b = describe::<Packed>().unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.size, 12);
        assert_eq!(a.field("z").map(|f| f.offset), Some(8));
        a.verify_native_size(12).unwrap();
        assert!(a.verify_native_size(16).is_err());
    }

    #[test]
    fn hidden_padding_is_rejected_for_blittable() {
        assert!(matches!(
            describe::<Padded>(),
            Err(ArenaError::InvalidLayout {
                expected: 24,
                actual: 20,
                ..
            })
        ));
    }

    #[test]
    fn size_mismatch_is_rejected() {
        assert!(matches!(
            describe::<WrongSize>(),
            Err(ArenaError::InvalidLayout {
                expected: 8,
                actual: 4,
                ..
            })
        ));
    }
}
