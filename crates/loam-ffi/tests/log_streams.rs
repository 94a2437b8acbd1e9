//! Integration test: log stream attachment and teardown against the mock
//! library.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use loam_core::InteropError;
use loam_ffi::{LibraryConfig, LogStream, LogStreamRegistry, NativeLibrary};
use loam_test_utils::{fixtures, MockLibrary};

fn setup() -> (Arc<MockLibrary>, Arc<NativeLibrary>, Arc<LogStreamRegistry>) {
    let mock = Arc::new(MockLibrary::new());
    let _ = env_logger::builder().is_test(true).try_init();
    let library = Arc::new(NativeLibrary::new(LibraryConfig::new()));
    let _ = library.load_with(mock.clone()).unwrap();
    let registry = LogStreamRegistry::new(Arc::clone(&library));
    (mock, library, registry)
}

fn recording_stream(sink: &Arc<Mutex<Vec<String>>>, tag: &str) -> LogStream {
    let sink = Arc::clone(sink);
    LogStream::with_user_data(
        move |msg, user| sink.lock().unwrap().push(format!("{user}|{}", msg.trim_end())),
        tag,
    )
    .unwrap()
}

#[test]
fn freeing_the_library_detaches_three_streams() {
    let (mock, library, registry) = setup();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let streams: Vec<LogStream> = ["a", "b", "c"]
        .into_iter()
        .map(|tag| recording_stream(&sink, tag))
        .collect();
    for s in &streams {
        registry.attach(s).unwrap();
    }
    assert_eq!(registry.len(), 3);
    assert_eq!(mock.attached_stream_count(), 3);

    library.free_library();

    assert!(registry.is_empty());
    assert!(streams.iter().all(|s| !s.is_attached()));
    assert_eq!(mock.attached_stream_count(), 0);
}

#[test]
fn attaching_twice_keeps_one_entry() {
    let (mock, _library, registry) = setup();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let stream = recording_stream(&sink, "once");
    registry.attach(&stream).unwrap();
    registry.attach(&stream).unwrap();
    registry.attach(&stream.clone()).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(mock.attached_stream_count(), 1);

    registry.detach(&stream).unwrap();
    registry.detach(&stream).unwrap();
    assert!(registry.is_empty());
    assert!(!stream.is_attached());
}

#[test]
fn import_messages_reach_attached_streams_only() {
    let (_mock, library, registry) = setup();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let attached = recording_stream(&sink, "on");
    let idle = recording_stream(&sink, "off");
    registry.attach(&attached).unwrap();

    library
        .with_api(|api| {
            let scene = api.import_memory(fixtures::TRIANGLE_OBJ.as_bytes(), 0, c"obj");
            // SAFETY: released once.
            unsafe { api.release_import(scene) };
        })
        .unwrap();

    let seen = sink.lock().unwrap().clone();
    assert!(seen.contains(&"on|Info,  T0: Import successful".to_string()));
    assert!(seen.iter().all(|m| m.starts_with("on|")));
    assert!(!idle.is_attached());
}

#[test]
fn verbose_logging_adds_debug_messages() {
    let (mock, library, registry) = setup();
    let sink = Arc::new(Mutex::new(Vec::new()));
    let stream = recording_stream(&sink, "v");
    registry.attach(&stream).unwrap();
    registry.set_verbose_logging(true).unwrap();
    assert!(mock.is_verbose());
    assert!(registry.is_verbose_logging());

    library
        .with_api(|api| loam_test_utils::reimport_via_blob(api, &fixtures::triangle_scene()))
        .unwrap()
        .unwrap();
    assert!(sink
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.starts_with("v|Debug, T0:")));
}

#[test]
fn attach_needs_a_loaded_library() {
    let library = Arc::new(NativeLibrary::new(LibraryConfig::new()));
    let registry = LogStreamRegistry::new(Arc::clone(&library));
    let stream = LogStream::new(|_, _| {}).unwrap();
    assert!(matches!(
        registry.attach(&stream),
        Err(InteropError::LibraryNotLoaded)
    ));
    assert!(!stream.is_attached());
    assert!(registry.is_empty());
}

#[test]
fn streams_can_reattach_after_reload() {
    let (mock, library, registry) = setup();
    let stream = LogStream::new(|_, _| {}).unwrap();
    registry.attach(&stream).unwrap();
    library.free_library();
    assert!(!stream.is_attached());

    let _ = library.load_with(mock.clone()).unwrap();
    registry.attach(&stream).unwrap();
    assert!(stream.is_attached());
    assert_eq!(mock.attached_stream_count(), 1);
    assert_eq!(registry.detach_all().unwrap(), 1);
    assert_eq!(mock.attached_stream_count(), 0);
}

#[test]
fn callback_can_detach_its_stream_during_an_import() {
    let (mock, library, registry) = setup();
    let (done_tx, done_rx) = mpsc::channel();

    let worker = thread::spawn(move || {
        let slot: Arc<Mutex<Option<LogStream>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0usize));
        let stream = {
            let slot = Arc::clone(&slot);
            let registry = Arc::clone(&registry);
            let calls = Arc::clone(&calls);
            LogStream::new(move |_, _| {
                *calls.lock().unwrap() += 1;
                if let Some(own) = slot.lock().unwrap().take() {
                    registry.detach(&own).unwrap();
                }
            })
            .unwrap()
        };
        *slot.lock().unwrap() = Some(stream.clone());
        registry.attach(&stream).unwrap();

        library
            .with_api(|api| {
                let scene = api.import_memory(fixtures::TRIANGLE_OBJ.as_bytes(), 0, c"obj");
                // SAFETY: released once.
                unsafe { api.release_import(scene) };
            })
            .unwrap();

        // A second call still works once the first has unwound.
        registry.attach(&stream).unwrap();
        registry.detach(&stream).unwrap();
        let _ = done_tx.send((stream.is_attached(), registry.len(), *calls.lock().unwrap()));
    });

    let (attached, left, calls) = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("detaching from a callback deadlocked");
    worker.join().unwrap();
    assert!(!attached);
    assert_eq!(left, 0);
    assert!(calls >= 1);
    assert_eq!(mock.attached_stream_count(), 0);
}
