//! Animation contracts.

use std::ptr;

use loam_arena::NativeArena;
use loam_core::{
    Animation, AnimationBehaviour, InteropError, NodeAnimationChannel, QuaternionKey, VectorKey,
};

use crate::marshal::{
    alloc_blittable, alloc_inline_array, alloc_pointer_array, free_inline_array,
    free_pointer_array, native_count, read_inline_array, read_pointer_array, read_values, Marshal,
};
use crate::types::{AiAnimation, AiNodeAnim, AiQuatKey, AiString, AiVectorKey};

impl Marshal for VectorKey {
    type Native = AiVectorKey;

    fn to_native(
        &self,
        _arena: &NativeArena,
        _this: *mut AiVectorKey,
    ) -> Result<AiVectorKey, InteropError> {
        Ok(AiVectorKey {
            time: self.time,
            value: self.value.into(),
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiVectorKey) -> Result<Self, InteropError> {
        Ok(VectorKey::new(native.time, native.value.into()))
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiVectorKey, free_self: bool) {
        if free_self {
            arena.free_address(native);
        }
    }
}

impl Marshal for QuaternionKey {
    type Native = AiQuatKey;

    fn to_native(
        &self,
        _arena: &NativeArena,
        _this: *mut AiQuatKey,
    ) -> Result<AiQuatKey, InteropError> {
        Ok((*self).into())
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiQuatKey) -> Result<Self, InteropError> {
        Ok((*native).into())
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiQuatKey, free_self: bool) {
        if free_self {
            arena.free_address(native);
        }
    }
}

impl Marshal for NodeAnimationChannel {
    type Native = AiNodeAnim;

    fn to_native(
        &self,
        arena: &NativeArena,
        _this: *mut AiNodeAnim,
    ) -> Result<AiNodeAnim, InteropError> {
        Ok(AiNodeAnim {
            node_name: AiString::new(&self.node_name)?,
            num_position_keys: native_count(self.position_keys.len(), "position keys")?,
            position_keys: alloc_inline_array(arena, &self.position_keys)?,
            num_rotation_keys: native_count(self.rotation_keys.len(), "rotation keys")?,
            rotation_keys: alloc_blittable(arena, &self.rotation_keys)?,
            num_scaling_keys: native_count(self.scaling_keys.len(), "scaling keys")?,
            scaling_keys: alloc_inline_array(arena, &self.scaling_keys)?,
            pre_state: self.pre_state as u32,
            post_state: self.post_state as u32,
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiNodeAnim) -> Result<Self, InteropError> {
        let mut channel = NodeAnimationChannel::new(native.node_name.to_string_lossy()?);
        // SAFETY: each key array is valid for its declared count.
        unsafe {
            channel.position_keys = read_inline_array::<VectorKey>(
                native.position_keys,
                native.num_position_keys as usize,
                "position keys",
            )?;
            channel.rotation_keys = read_values(
                native.rotation_keys,
                native.num_rotation_keys as usize,
                "rotation keys",
            )?;
            channel.scaling_keys = read_inline_array::<VectorKey>(
                native.scaling_keys,
                native.num_scaling_keys as usize,
                "scaling keys",
            )?;
        }
        channel.pre_state = AnimationBehaviour::from_raw(native.pre_state);
        channel.post_state = AnimationBehaviour::from_raw(native.post_state);
        Ok(channel)
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiNodeAnim, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let channel = unsafe { *native };
        // SAFETY: key arrays are valid for their declared counts.
        unsafe {
            free_inline_array::<VectorKey>(
                arena,
                channel.position_keys,
                channel.num_position_keys as usize,
            );
            free_inline_array::<VectorKey>(
                arena,
                channel.scaling_keys,
                channel.num_scaling_keys as usize,
            );
        }
        arena.free_address(channel.rotation_keys);
        if free_self {
            arena.free_address(native);
        }
    }
}

impl Marshal for Animation {
    type Native = AiAnimation;

    fn to_native(
        &self,
        arena: &NativeArena,
        _this: *mut AiAnimation,
    ) -> Result<AiAnimation, InteropError> {
        Ok(AiAnimation {
            name: AiString::new(&self.name)?,
            duration: self.duration_in_ticks,
            ticks_per_second: self.ticks_per_second,
            num_channels: native_count(self.node_channels.len(), "animation channels")?,
            channels: alloc_pointer_array(arena, &self.node_channels)?,
            num_mesh_channels: 0,
            mesh_channels: ptr::null_mut(),
            num_morph_mesh_channels: 0,
            morph_mesh_channels: ptr::null_mut(),
        })
    }

    #[allow(unsafe_code)]
    unsafe fn from_native(native: &AiAnimation) -> Result<Self, InteropError> {
        let mut animation = Animation::new(
            native.name.to_string_lossy()?,
            native.duration,
            native.ticks_per_second,
        );
        // SAFETY: `channels` is valid for `num_channels` per the contract.
        animation.node_channels = unsafe {
            read_pointer_array::<NodeAnimationChannel>(
                native.channels,
                native.num_channels as usize,
                "animation channels",
            )?
        };
        Ok(animation)
    }

    #[allow(unsafe_code)]
    unsafe fn free_native(arena: &NativeArena, native: *mut AiAnimation, free_self: bool) {
        if native.is_null() {
            return;
        }
        // SAFETY: non-null and valid per the contract.
        let animation = unsafe { *native };
        // SAFETY: valid for `num_channels` per the contract.
        unsafe {
            free_pointer_array::<NodeAnimationChannel>(
                arena,
                animation.channels,
                animation.num_channels as usize,
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
    use loam_core::{Quaternion, Vector3D};

    fn walk_cycle() -> Animation {
        let mut channel = NodeAnimationChannel::new("hips");
        channel.position_keys = vec![
            VectorKey::new(0.0, Vector3D::ZERO),
            VectorKey::new(12.5, Vector3D::new(0.0, 0.0, 1.0)),
        ];
        channel.rotation_keys = vec![
            QuaternionKey::new(0.0, Quaternion::IDENTITY),
            QuaternionKey::new(25.0, Quaternion::new(0.0, 1.0, 0.0, 0.0)),
        ];
        channel.scaling_keys = vec![VectorKey::new(0.0, Vector3D::new(1.0, 1.0, 1.0))];
        channel.pre_state = AnimationBehaviour::Constant;
        channel.post_state = AnimationBehaviour::Repeat;

        let mut animation = Animation::new("walk", 25.0, 24.0);
        animation.node_channels = vec![channel, NodeAnimationChannel::new("empty")];
        animation
    }

    #[test]
    #[allow(unsafe_code)]
    fn animation_round_trip_and_balance() {
        let arena = NativeArena::with_defaults();
        let animation = walk_cycle();
        let ptr = alloc_boxed(&arena, &animation).unwrap();
        // SAFETY: `ptr` was just written by `alloc_boxed`.
        let back = unsafe { Animation::from_native(&*ptr) }.unwrap();
        assert_eq!(back, animation);
        // SAFETY: as above.
        unsafe {
            assert!((*ptr).mesh_channels.is_null());
            assert_eq!((*ptr).num_morph_mesh_channels, 0);
            Animation::free_native(&arena, ptr, true);
        }
        assert_eq!(arena.live_allocations(), 0);
    }

    #[test]
    fn unknown_behaviour_reads_as_default() {
        assert_eq!(AnimationBehaviour::from_raw(99), AnimationBehaviour::Default);
    }
}
