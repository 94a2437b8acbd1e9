//! Integration test: library load, reference counting, and teardown
//! against the in-process mock library.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use loam_core::InteropError;
use loam_ffi::{CallPolicy, LibraryConfig, NativeApi, NativeLibrary, NativeScene};
use loam_test_utils::{fixtures, reimport_via_blob, MockLibrary};

fn loaded(mock: &Arc<MockLibrary>) -> NativeLibrary {
    let _ = env_logger::builder().is_test(true).try_init();
    let library = NativeLibrary::new(LibraryConfig::new());
    let _ = library.load_with(mock.clone()).unwrap();
    library
}

#[test]
fn calls_fail_before_load_and_after_free() {
    let library = NativeLibrary::new(LibraryConfig::new());
    assert!(matches!(
        library.with_api(|api| api.error_string()),
        Err(InteropError::LibraryNotLoaded)
    ));

    let mock = Arc::new(MockLibrary::new());
    let _ = library.load_with(mock.clone()).unwrap();
    assert!(library.with_api(|api| api.supports_export_format("obj")).unwrap());

    library.free_library();
    assert!(!library.is_loaded());
    assert!(matches!(
        library.with_api(|_| ()),
        Err(InteropError::LibraryNotLoaded)
    ));
}

#[test]
fn reported_size_mismatch_fails_load() {
    let mock = Arc::new(MockLibrary::new().with_struct_size("aiNode", 8));
    let library = NativeLibrary::new(LibraryConfig::new());
    let err = library.load_with(mock).unwrap_err();
    match err {
        InteropError::InvalidLayout {
            type_name,
            expected,
            actual,
        } => {
            assert_eq!(type_name, "aiNode");
            assert_eq!(expected, 8);
            assert_ne!(actual, 8);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!library.is_loaded());
}

#[test]
fn matching_reported_sizes_load() {
    let mock = Arc::new(MockLibrary::new());
    let library = loaded(&mock);
    assert_eq!(library.ref_count(), 1);
}

#[test]
fn sessions_share_one_binding() {
    let mock = Arc::new(MockLibrary::new());
    let library = Arc::new(NativeLibrary::new(LibraryConfig::new()));
    let first = library.load_with(mock.clone()).unwrap();
    let freed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&freed);
    let _sub = library.on_freed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let library = Arc::clone(&library);
            let barrier = Arc::clone(&barrier);
            let mock = Arc::clone(&mock);
            thread::spawn(move || {
                let lease = library.load_with(mock).unwrap();
                barrier.wait();
                let back = library
                    .with_api(|api| reimport_via_blob(api, &fixtures::triangle_scene()))
                    .unwrap()
                    .unwrap();
                assert_eq!(back.meshes[0].indices(), vec![0, 1, 2]);
                assert!(library.release(lease));
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(library.ref_count(), 1);
    assert_eq!(freed.load(Ordering::SeqCst), 0);
    assert_eq!(mock.live_allocations(), 0);
    assert!(library.release(first));
    assert!(!library.is_loaded());
    assert_eq!(freed.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_policy_allows_overlapping_calls() {
    let mock = Arc::new(MockLibrary::new());
    let library = Arc::new(NativeLibrary::new(
        LibraryConfig::new().with_call_policy(CallPolicy::Concurrent),
    ));
    let _ = library.load_with(mock.clone()).unwrap();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let library = Arc::clone(&library);
            thread::spawn(move || {
                library
                    .with_api(|api| reimport_via_blob(api, &fixtures::hierarchy_scene()))
                    .unwrap()
                    .unwrap()
            })
        })
        .collect();
    for h in handles {
        let scene = h.join().unwrap();
        assert_eq!(scene.meshes.len(), 2);
    }
    assert_eq!(mock.import_calls(), 3);
    assert_eq!(mock.export_calls(), 3);
}

#[test]
#[allow(unsafe_code)]
fn imported_scenes_go_back_to_the_library() {
    let mock = Arc::new(MockLibrary::new());
    let library = loaded(&mock);
    library
        .with_api(|api| {
            let scene = api.import_memory(fixtures::TRIANGLE_OBJ.as_bytes(), 0, c"obj");
            assert!(!scene.is_null());
            // The caller's arena never owns library memory.
            let ours = NativeScene::export(&fixtures::triangle_scene()).unwrap();
            assert!(!ours.arena().owns(scene));
            // SAFETY: released once through the library that produced it.
            unsafe { api.release_import(scene) };
        })
        .unwrap();
    assert_eq!(mock.outstanding_imports(), 0);
    assert_eq!(mock.live_allocations(), 0);
}

#[test]
fn reload_starts_a_new_epoch() {
    let mock = Arc::new(MockLibrary::new());
    let library = NativeLibrary::new(LibraryConfig::new());
    let stale = library.load_with(mock.clone()).unwrap();
    library.free_library();

    let current = library.load_with(mock.clone()).unwrap();
    assert!(current.epoch() > stale.epoch());
    assert!(!library.release(stale));
    let back = library
        .with_api(|api| reimport_via_blob(api, &fixtures::triangle_scene()))
        .unwrap()
        .unwrap();
    assert_eq!(back.meshes.len(), 1);

    assert!(library.release(current));
    assert!(!library.is_loaded());
}
