//! Scene graph marshaling.
//!
//! A scene is exported bottom-up: the flat entity arrays first, then the
//! node tree, which only refers to meshes by index. Import walks top-down
//! and re-checks every index before handing the scene out.

use std::mem::size_of;
use std::ptr;

use loam_arena::{ArenaConfig, NativeArena};
use loam_core::{
    Animation, Camera, EmbeddedTexture, InteropError, Light, Material, Mesh, Node, Scene,
    SceneFlags,
};

use crate::marshal::{
    alloc_boxed, alloc_pointer_array, free_pointer_array, native_count, read_pointer_array,
    Marshal,
};
use crate::types::AiScene;

/// Marshal `scene` into `arena` and return the native root.
///
/// References are validated before anything is allocated. On failure part
/// of the graph may already live in `arena`; callers that need all-or-
/// nothing behaviour use [`NativeScene`], which discards its arena.
pub fn export_scene(scene: &Scene, arena: &NativeArena) -> Result<*mut AiScene, InteropError> {
    scene.validate_references()?;

    let block = arena.allocate(size_of::<AiScene>())?;
    let meshes = alloc_pointer_array(arena, &scene.meshes)?;
    let materials = alloc_pointer_array(arena, &scene.materials)?;
    let animations = alloc_pointer_array(arena, &scene.animations)?;
    let textures = alloc_pointer_array(arena, &scene.textures)?;
    let lights = alloc_pointer_array(arena, &scene.lights)?;
    let cameras = alloc_pointer_array(arena, &scene.cameras)?;
    let root_node = match &scene.root_node {
        Some(root) => alloc_boxed(arena, root)?,
        None => ptr::null_mut(),
    };

    let native = AiScene {
        flags: scene.flags.bits(),
        root_node,
        num_meshes: native_count(scene.meshes.len(), "meshes")?,
        meshes,
        num_materials: native_count(scene.materials.len(), "materials")?,
        materials,
        num_animations: native_count(scene.animations.len(), "animations")?,
        animations,
        num_textures: native_count(scene.textures.len(), "textures")?,
        textures,
        num_lights: native_count(scene.lights.len(), "lights")?,
        lights,
        num_cameras: native_count(scene.cameras.len(), "cameras")?,
        cameras,
        private: ptr::null_mut(),
    };
    arena.write_struct(&block, 0, native)?;
    log::trace!(
        "exported scene: {} meshes, {} materials, {} nodes",
        scene.meshes.len(),
        scene.materials.len(),
        scene.root_node.as_ref().map_or(0, Node::subtree_len)
    );
    Ok(block.cast())
}

/// Build a managed copy of a native scene.
///
/// # Safety
///
/// `native` must be null or point to a scene whose arrays are valid for
/// their declared counts. Null fails with `MarshalFailure`.
#[allow(unsafe_code)]
pub unsafe fn import_scene(native: *const AiScene) -> Result<Scene, InteropError> {
    if native.is_null() {
        return Err(InteropError::marshal("null scene pointer"));
    }
    // SAFETY: non-null and valid per the caller.
    let s = unsafe { &*native };
    // SAFETY: every array is valid for its declared count per the caller.
    let scene = unsafe {
        Scene {
            flags: SceneFlags::from_bits_truncate(s.flags),
            root_node: if s.root_node.is_null() {
                None
            } else {
                Some(Node::from_native(&*s.root_node)?)
            },
            meshes: read_pointer_array::<Mesh>(s.meshes, s.num_meshes as usize, "meshes")?,
            materials: read_pointer_array::<Material>(
                s.materials,
                s.num_materials as usize,
                "materials",
            )?,
            animations: read_pointer_array::<Animation>(
                s.animations,
                s.num_animations as usize,
                "animations",
            )?,
            textures: read_pointer_array::<EmbeddedTexture>(
                s.textures,
                s.num_textures as usize,
                "textures",
            )?,
            lights: read_pointer_array::<Light>(s.lights, s.num_lights as usize, "lights")?,
            cameras: read_pointer_array::<Camera>(s.cameras, s.num_cameras as usize, "cameras")?,
        }
    };
    scene.validate_references()?;
    Ok(scene)
}

/// Release everything [`export_scene`] allocated, and the scene struct
/// itself when `free_self`.
///
/// Addresses `arena` does not own are skipped, so this is harmless on a
/// scene owned by the native library.
///
/// # Safety
///
/// `native` must be null or point to a valid scene.
#[allow(unsafe_code)]
pub unsafe fn free_scene(arena: &NativeArena, native: *mut AiScene, free_self: bool) {
    if native.is_null() {
        return;
    }
    // SAFETY: non-null and valid per the caller.
    let s = unsafe { *native };
    // SAFETY: arrays are valid for their declared counts per the caller.
    unsafe {
        Node::free_native(arena, s.root_node, true);
        free_pointer_array::<Mesh>(arena, s.meshes, s.num_meshes as usize);
        free_pointer_array::<Material>(arena, s.materials, s.num_materials as usize);
        free_pointer_array::<Animation>(arena, s.animations, s.num_animations as usize);
        free_pointer_array::<EmbeddedTexture>(arena, s.textures, s.num_textures as usize);
        free_pointer_array::<Light>(arena, s.lights, s.num_lights as usize);
        free_pointer_array::<Camera>(arena, s.cameras, s.num_cameras as usize);
    }
    if free_self {
        arena.free_address(native);
    }
}

/// An exported scene that owns its arena.
///
/// The native graph lives exactly as long as this value. Construction
/// either yields a complete graph or leaves nothing allocated.
pub struct NativeScene {
    arena: NativeArena,
    ptr: *mut AiScene,
}

// SAFETY: the graph is only reachable through `self` and the arena is
// internally synchronised; the raw pointer is never shared mutably.
#[allow(unsafe_code)]
unsafe impl Send for NativeScene {}

impl NativeScene {
    /// Export `scene` into a fresh arena with default settings.
    pub fn export(scene: &Scene) -> Result<Self, InteropError> {
        Self::export_into(scene, NativeArena::with_defaults())
    }

    /// Export `scene` into a fresh arena built from `config`.
    pub fn export_with(scene: &Scene, config: ArenaConfig) -> Result<Self, InteropError> {
        Self::export_into(scene, NativeArena::new(config)?)
    }

    fn export_into(scene: &Scene, arena: NativeArena) -> Result<Self, InteropError> {
        match export_scene(scene, &arena) {
            Ok(ptr) => Ok(Self { arena, ptr }),
            Err(e) => {
                arena.free_all();
                Err(e)
            }
        }
    }

    /// The native scene root, valid while `self` lives.
    pub fn as_ptr(&self) -> *const AiScene {
        self.ptr
    }

    /// The arena holding the graph.
    pub fn arena(&self) -> &NativeArena {
        &self.arena
    }

    /// Read the graph back into a managed scene.
    #[allow(unsafe_code)]
    pub fn to_scene(&self) -> Result<Scene, InteropError> {
        // SAFETY: `ptr` was produced by `export_scene` into `arena`, which
        // has not been touched since.
        unsafe { import_scene(self.ptr) }
    }
}

impl Drop for NativeScene {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        // SAFETY: as in `to_scene`; the pointer is not used afterwards.
        unsafe { free_scene(&self.arena, self.ptr, true) };
        self.ptr = ptr::null_mut();
    }
}

impl std::fmt::Debug for NativeScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeScene")
            .field("ptr", &self.ptr)
            .field("live_allocations", &self.arena.live_allocations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::{Face, PrimitiveType, Vector3D};

    fn triangle_scene() -> Scene {
        let mut mesh = Mesh::new("tri", PrimitiveType::TRIANGLE);
        mesh.vertices = vec![
            Vector3D::new(0.0, 0.0, 0.0),
            Vector3D::new(1.0, 0.0, 0.0),
            Vector3D::new(0.0, 1.0, 0.0),
        ];
        mesh.faces = vec![Face::new([0, 1, 2])];

        let mut root = Node::new("root");
        root.add_child(Node::new("tri")).mesh_indices = vec![0];

        Scene {
            root_node: Some(root),
            meshes: vec![mesh],
            materials: vec![Material::named("red")],
            cameras: vec![Camera::new("cam")],
            ..Scene::new()
        }
    }

    #[test]
    #[allow(unsafe_code)]
    fn scene_round_trip_and_balance() {
        let arena = NativeArena::with_defaults();
        let scene = triangle_scene();
        let ptr = export_scene(&scene, &arena).unwrap();
        // SAFETY: `ptr` was just produced by `export_scene`.
        let back = unsafe { import_scene(ptr) }.unwrap();
        assert_eq!(back, scene);
        // SAFETY: as above.
        unsafe { free_scene(&arena, ptr, true) };
        assert_eq!(arena.live_allocations(), 0);
    }

    #[test]
    fn bad_reference_allocates_nothing() {
        let arena = NativeArena::with_defaults();
        let mut scene = triangle_scene();
        scene.meshes[0].material_index = 5;
        let err = export_scene(&scene, &arena).unwrap_err();
        assert!(matches!(err, InteropError::MarshalFailure { .. }));
        assert_eq!(arena.total_allocations(), 0);
    }

    #[test]
    #[allow(unsafe_code)]
    fn null_scene_is_marshal_failure() {
        // SAFETY: null is explicitly allowed.
        let err = unsafe { import_scene(ptr::null()) }.unwrap_err();
        assert!(matches!(err, InteropError::MarshalFailure { .. }));
    }

    #[test]
    fn native_scene_frees_on_drop() {
        let owned = NativeScene::export(&triangle_scene()).unwrap();
        assert!(owned.arena().live_allocations() > 0);
        assert_eq!(owned.to_scene().unwrap(), triangle_scene());
    }

    #[test]
    fn failed_export_leaves_arena_empty() {
        let mut scene = triangle_scene();
        scene.meshes[0].name = "x".repeat(4096);
        let config = ArenaConfig::new().with_max_bytes(1 << 20);
        let err = NativeScene::export_with(&scene, config).unwrap_err();
        assert!(matches!(err, InteropError::MarshalFailure { .. }));
    }

    #[test]
    fn arena_budget_surfaces_out_of_memory() {
        let config = ArenaConfig::new().with_max_bytes(64);
        let err = NativeScene::export_with(&triangle_scene(), config).unwrap_err();
        assert!(matches!(err, InteropError::OutOfMemory { .. }));
    }
}
